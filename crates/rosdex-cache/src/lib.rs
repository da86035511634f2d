pub use crate::cache::{CacheError, DistributionCache};
pub use crate::entry::{CacheEntry, FailedPackage, Failure, FailureKind, ResolvedPackage};

mod cache;
mod entry;
