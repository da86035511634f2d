pub use crate::git::{GIT, GitError};
pub use crate::oid::{GitOid, OidParseError};
pub use crate::source::{
    GitReference, GitSource, GitWorkspace, ManifestBlob, OpenSource, SourceUnavailable,
};
pub use crate::url::RepositoryUrl;

mod git;
mod oid;
mod source;
mod url;
