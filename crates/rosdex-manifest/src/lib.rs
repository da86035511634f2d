pub use crate::manifest::{ManifestError, ManifestFormat, PackageManifest};
pub use crate::name::{GroupName, InvalidNameError, PackageName};

mod manifest;
mod name;
