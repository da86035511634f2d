use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::distribution::{Distribution, DistributionFile};
use crate::document::{DocumentUrl, FetchError, FormatError, parse_document};
use crate::scalar::deserialize_optional_string;

/// Index format versions that can be read (REP 153).
const INDEX_VERSIONS: std::ops::RangeInclusive<u64> = 2..=4;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Unavailable(#[from] FetchError),
    #[error("Distribution `{name}` is not listed in `{url}`")]
    UnknownDistribution { name: String, url: DocumentUrl },
}

/// A distribution index: the entry point that names every distribution and where its files live.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    url: DocumentUrl,
    version: u64,
    distributions: IndexMap<String, DistributionEntry>,
}

/// A distribution as listed in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionEntry {
    /// Distribution files, merged in order.
    pub distribution: Vec<DocumentUrl>,
    /// Location of the pre-generated cache, if published.
    pub distribution_cache: Option<DocumentUrl>,
    pub distribution_status: Option<String>,
    pub distribution_type: Option<String>,
    /// Attributes that are carried along but not interpreted (e.g., `python_version`).
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Deserialize)]
struct IndexDocument {
    #[serde(default)]
    distributions: IndexMap<String, RawEntry>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    distribution: OneOrMany,
    #[serde(default)]
    distribution_cache: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    distribution_status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    distribution_type: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// Older indexes list a single distribution file as a plain string.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(location) => vec![location],
            Self::Many(locations) => locations,
        }
    }
}

impl Index {
    /// Read the index at `url`.
    #[instrument(skip_all, fields(url = %url))]
    pub fn load(url: &DocumentUrl) -> Result<Self, IndexError> {
        let content = url.read()?;
        Ok(Self::parse(&content, url)?)
    }

    /// Parse an index read from `url`, resolving relative locations against it.
    pub fn parse(content: &str, url: &DocumentUrl) -> Result<Self, FormatError> {
        let (document, version): (IndexDocument, _) =
            parse_document(content, url, "index", INDEX_VERSIONS)?;

        let resolve = |location: String| {
            url.join(&location)
                .map_err(|err| FormatError::InvalidLocation {
                    url: url.clone(),
                    location,
                    err,
                })
        };

        let mut distributions = IndexMap::with_capacity(document.distributions.len());
        for (name, entry) in document.distributions {
            let distribution = entry
                .distribution
                .into_vec()
                .into_iter()
                .map(resolve)
                .collect::<Result<Vec<_>, _>>()?;
            let distribution_cache = entry.distribution_cache.map(resolve).transpose()?;
            distributions.insert(
                name,
                DistributionEntry {
                    distribution,
                    distribution_cache,
                    distribution_status: entry.distribution_status,
                    distribution_type: entry.distribution_type,
                    extra: entry.extra,
                },
            );
        }

        debug!("Found {} distributions in: {url}", distributions.len());
        Ok(Self {
            url: url.clone(),
            version,
            distributions,
        })
    }

    /// The location the index was read from.
    pub fn url(&self) -> &DocumentUrl {
        &self.url
    }

    /// The index format version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// All distributions, in index order.
    pub fn distributions(&self) -> &IndexMap<String, DistributionEntry> {
        &self.distributions
    }

    /// Look up a distribution by name.
    pub fn distribution(&self, name: &str) -> Result<&DistributionEntry, IndexError> {
        self.distributions
            .get(name)
            .ok_or_else(|| IndexError::UnknownDistribution {
                name: name.to_string(),
                url: self.url.clone(),
            })
    }

    /// Read and merge the distribution files of `name`.
    #[instrument(skip(self))]
    pub fn distribution_files(&self, name: &str) -> Result<Distribution, IndexError> {
        let entry = self.distribution(name)?;
        let files = entry
            .distribution
            .iter()
            .map(|url| -> Result<_, IndexError> {
                let content = url.read()?;
                let file = DistributionFile::parse(&content, url)?;
                Ok((url.clone(), file))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Distribution::new(name, files))
    }
}
