pub use crate::distribution::{Distribution, DistributionFile, ReleaseCoordinate, Repository};
pub use crate::document::{DocumentUrl, FetchError, FormatError, parse_document};
pub use crate::index::{DistributionEntry, Index, IndexError};

mod distribution;
mod document;
mod index;
mod scalar;
