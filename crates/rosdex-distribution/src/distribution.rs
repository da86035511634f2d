use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use rosdex_manifest::PackageName;

use crate::document::{DocumentUrl, FormatError, parse_document};
use crate::scalar::{deserialize_optional_string, deserialize_string_map};

/// The only supported distribution file format (REP 143).
const DISTRIBUTION_VERSION: u64 = 2;

/// A single distribution file, as listed under `distribution` in the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionFile {
    /// Repositories in document order, keyed by repository name.
    pub repositories: IndexMap<PackageName, Repository>,
}

#[derive(Deserialize)]
struct DistributionDocument {
    #[serde(default)]
    repositories: IndexMap<PackageName, Repository>,
}

impl DistributionFile {
    /// Parse a distribution file read from `url`.
    pub fn parse(content: &str, url: &DocumentUrl) -> Result<Self, FormatError> {
        let (document, _): (DistributionDocument, _) = parse_document(
            content,
            url,
            "distribution",
            DISTRIBUTION_VERSION..=DISTRIBUTION_VERSION,
        )?;
        debug!(
            "Read {} repositories from: {url}",
            document.repositories.len()
        );
        Ok(Self {
            repositories: document.repositories,
        })
    }

    /// Merge several distribution files into one.
    ///
    /// A repository defined by more than one file takes its definition from the last file, but
    /// keeps the position it was first seen at.
    pub fn merge(files: impl IntoIterator<Item = Self>) -> Self {
        let mut repositories = IndexMap::new();
        for file in files {
            for (name, repository) in file.repositories {
                if repositories.insert(name.clone(), repository).is_some() {
                    debug!("Overriding earlier definition of repository: {name}");
                }
            }
        }
        Self { repositories }
    }
}

/// A repository entry in a distribution file.
///
/// Only the `release` section is interpreted; `doc` and `source` sections are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseCoordinate>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
}

/// Where and at which revision a repository's manifests are released.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCoordinate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    /// The released version, including the packaging increment (e.g., `1.2.3-1`).
    #[serde(
        default,
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    /// Reference templates by symbolic name; `release` is the one used to locate manifests.
    #[serde(
        default,
        deserialize_with = "deserialize_string_map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub tags: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PackageName>,
}

impl ReleaseCoordinate {
    /// The packages released from `repository`.
    ///
    /// A release without an explicit package list hosts a single package named after the
    /// repository.
    pub fn released_packages(&self, repository: &PackageName) -> Vec<PackageName> {
        if self.packages.is_empty() {
            vec![repository.clone()]
        } else {
            self.packages.clone()
        }
    }

    /// The version with any trailing packaging increment (`-N`) removed.
    pub fn upstream_version(&self) -> Option<&str> {
        self.version.as_deref().map(upstream_version)
    }

    /// The references to try, in order, when locating the manifest of `package`.
    ///
    /// The expanded `release` tag comes first, then the bare version. Templates that need a
    /// version are skipped when the release has none.
    pub fn candidates(&self, package: &PackageName, distro: &str) -> Vec<String> {
        let mut candidates = Vec::new();
        if let Some(template) = self.tags.get("release") {
            match self.expand(template, package, distro) {
                Some(reference) => candidates.push(reference),
                None => debug!("Cannot expand `{template}` for `{package}` without a version"),
            }
        }
        if let Some(version) = &self.version {
            if !candidates.contains(version) {
                candidates.push(version.clone());
            }
        }
        candidates
    }

    /// Expand the placeholders of a reference template.
    fn expand(&self, template: &str, package: &PackageName, distro: &str) -> Option<String> {
        let mut reference = template
            .replace("{package}", package.as_str())
            .replace("{distro}", distro);
        if reference.contains("{upstream_version}") {
            reference = reference.replace("{upstream_version}", self.upstream_version()?);
        }
        if reference.contains("{version}") {
            reference = reference.replace("{version}", self.version.as_deref()?);
        }
        Some(reference)
    }
}

/// Strip a trailing packaging increment (`1.2.3-4` becomes `1.2.3`).
pub(crate) fn upstream_version(version: &str) -> &str {
    match version.rsplit_once('-') {
        Some((upstream, increment))
            if !increment.is_empty() && increment.bytes().all(|b| b.is_ascii_digit()) =>
        {
            upstream
        }
        _ => version,
    }
}

/// A named distribution: the merged contents of all of its distribution files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    name: String,
    files: Vec<DocumentUrl>,
    repositories: IndexMap<PackageName, Repository>,
}

impl Distribution {
    /// Combine the distribution files of `name`, in the order the index lists them.
    pub fn new(name: impl Into<String>, files: Vec<(DocumentUrl, DistributionFile)>) -> Self {
        let (urls, files): (Vec<_>, Vec<_>) = files.into_iter().unzip();
        Self {
            name: name.into(),
            files: urls,
            repositories: DistributionFile::merge(files).repositories,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The locations of the distribution files this distribution was read from.
    pub fn files(&self) -> &[DocumentUrl] {
        &self.files
    }

    pub fn repositories(&self) -> &IndexMap<PackageName, Repository> {
        &self.repositories
    }

    /// Repositories that have a `release` section, in document order.
    pub fn released(&self) -> impl Iterator<Item = (&PackageName, &ReleaseCoordinate)> {
        self.repositories
            .iter()
            .filter_map(|(name, repository)| Some((name, repository.release.as_ref()?)))
    }
}
