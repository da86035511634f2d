use std::num::NonZeroUsize;
use std::path::PathBuf;

use rosdex_cache::DistributionCache;

/// Settings for a single cache generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Fetch every repository into a fresh temporary directory instead of reusing the
    /// persistent databases under `workspace`.
    pub ignore_local: bool,
    /// The number of repositories resolved in parallel.
    pub concurrency: usize,
    /// The root of the persistent Git databases.
    pub workspace: Option<PathBuf>,
    /// An earlier cache of the same distribution, whose entries are reused when their release
    /// is unchanged.
    pub previous: Option<DistributionCache>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            ignore_local: false,
            concurrency: Self::default_concurrency(),
            workspace: None,
            previous: None,
        }
    }
}

impl GenerateOptions {
    /// The default number of concurrent fetches: the available parallelism, or 1 if unknown.
    pub fn default_concurrency() -> usize {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}
