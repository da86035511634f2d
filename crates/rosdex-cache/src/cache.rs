use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rosdex_distribution::{
    DocumentUrl, FetchError, FormatError, Index, IndexError, parse_document,
};
use rosdex_manifest::PackageName;

use crate::entry::{CacheEntry, FailedPackage, ResolvedPackage};

/// The distribution cache format written and read by this crate.
const CACHE_VERSION: u64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Unavailable(#[from] FetchError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("Distribution `{0}` does not publish a cache")]
    NoCache(String),
    #[error("Expected a cache for distribution `{expected}`, found one for `{found}`")]
    WrongDistribution { expected: String, found: String },
    #[error("Failed to serialize the cache for `{0}`")]
    Serialize(String, #[source] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A consolidated snapshot of every package manifest in a distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionCache {
    name: String,
    distribution_file: Vec<DocumentUrl>,
    packages: IndexMap<PackageName, CacheEntry>,
}

#[derive(Serialize)]
struct CacheDocumentRef<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    version: u64,
    name: &'a str,
    distribution_file: &'a [DocumentUrl],
    packages: &'a IndexMap<PackageName, CacheEntry>,
}

#[derive(Deserialize)]
struct CacheDocument {
    name: String,
    #[serde(default)]
    distribution_file: Vec<DocumentUrl>,
    #[serde(default)]
    packages: IndexMap<PackageName, CacheEntry>,
}

impl DistributionCache {
    pub fn new(
        name: impl Into<String>,
        distribution_file: Vec<DocumentUrl>,
        packages: IndexMap<PackageName, CacheEntry>,
    ) -> Self {
        Self {
            name: name.into(),
            distribution_file,
            packages,
        }
    }

    /// The name of the distribution.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The distribution files the cache was generated from.
    pub fn distribution_files(&self) -> &[DocumentUrl] {
        &self.distribution_file
    }

    /// Every entry, in cache order.
    pub fn packages(&self) -> &IndexMap<PackageName, CacheEntry> {
        &self.packages
    }

    pub fn get(&self, name: &PackageName) -> Option<&CacheEntry> {
        self.packages.get(name)
    }

    /// Packages whose manifests were resolved.
    pub fn resolved(&self) -> impl Iterator<Item = (&PackageName, &ResolvedPackage)> {
        self.packages
            .iter()
            .filter_map(|(name, entry)| Some((name, entry.as_resolved()?)))
    }

    /// Packages that could not be resolved.
    pub fn failures(&self) -> impl Iterator<Item = (&PackageName, &FailedPackage)> {
        self.packages
            .iter()
            .filter_map(|(name, entry)| Some((name, entry.as_failed()?)))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Serialize the cache to a YAML document.
    pub fn to_yaml(&self) -> Result<String, CacheError> {
        let document = CacheDocumentRef {
            kind: "cache",
            version: CACHE_VERSION,
            name: &self.name,
            distribution_file: &self.distribution_file,
            packages: &self.packages,
        };
        serde_yaml::to_string(&document)
            .map_err(|err| CacheError::Serialize(self.name.clone(), err))
    }

    /// Parse a cache document read from `url`.
    pub fn parse(content: &str, url: &DocumentUrl) -> Result<Self, FormatError> {
        let (document, _): (CacheDocument, _) =
            parse_document(content, url, "cache", CACHE_VERSION..=CACHE_VERSION)?;
        Ok(Self {
            name: document.name,
            distribution_file: document.distribution_file,
            packages: document.packages,
        })
    }

    /// Read the cache document at `url`.
    pub fn read(url: &DocumentUrl) -> Result<Self, CacheError> {
        let content = url.read()?;
        Ok(Self::parse(&content, url)?)
    }

    /// Read the cache the index publishes for the distribution `name`.
    pub fn load_from_index(index: &Index, name: &str) -> Result<Self, CacheError> {
        let url = index
            .distribution(name)?
            .distribution_cache
            .as_ref()
            .ok_or_else(|| CacheError::NoCache(name.to_string()))?;
        let cache = Self::read(url)?;
        if cache.name != name {
            return Err(CacheError::WrongDistribution {
                expected: name.to_string(),
                found: cache.name,
            });
        }
        debug!(
            "Loaded cache for `{name}` with {} packages from: {url}",
            cache.len()
        );
        Ok(cache)
    }

    /// Write the cache to `path`, replacing any existing file.
    pub fn write(&self, path: &Path) -> Result<(), CacheError> {
        let content = self.to_yaml()?;
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        fs_err::write(path, content)?;
        debug!("Wrote cache for `{}` to: {}", self.name, path.display());
        Ok(())
    }
}
