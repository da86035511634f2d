use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use url::Url;

use rosdex_git::{GitOid, GitReference};
use rosdex_manifest::{GroupName, ManifestFormat, PackageName};

/// A package in a distribution cache: either its resolved manifest, or why it could not be
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheEntry {
    // Failures are tried first; resolved entries never carry a `failure` key.
    Failed(FailedPackage),
    Resolved(ResolvedPackage),
}

impl CacheEntry {
    /// The repository the package is released from.
    pub fn repository(&self) -> &PackageName {
        match self {
            Self::Failed(failed) => &failed.repository,
            Self::Resolved(resolved) => &resolved.repository,
        }
    }

    pub fn as_resolved(&self) -> Option<&ResolvedPackage> {
        match self {
            Self::Resolved(resolved) => Some(resolved),
            Self::Failed(_) => None,
        }
    }

    pub fn as_failed(&self) -> Option<&FailedPackage> {
        match self {
            Self::Failed(failed) => Some(failed),
            Self::Resolved(_) => None,
        }
    }
}

impl From<ResolvedPackage> for CacheEntry {
    fn from(resolved: ResolvedPackage) -> Self {
        Self::Resolved(resolved)
    }
}

impl From<FailedPackage> for CacheEntry {
    fn from(failed: FailedPackage) -> Self {
        Self::Failed(failed)
    }
}

/// A package whose manifest was read from its release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub repository: PackageName,
    /// The URL the release was fetched from.
    pub url: Url,
    /// The version declared by the manifest.
    pub version: String,
    /// The version listed in the release section when the manifest was read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_version: Option<String>,
    pub format: ManifestFormat,
    /// The release reference the manifest was read at.
    pub reference: GitReference,
    /// The commit that reference resolved to.
    pub revision: GitOid,
    /// Direct dependencies, including those implied by `group_depends`.
    #[serde(default)]
    pub dependencies: Vec<PackageName>,
    /// The subset of `dependencies` that only exists because of `group_depends`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_dependencies: Vec<PackageName>,
    #[serde(default)]
    pub member_of_groups: Vec<GroupName>,
    #[serde(default)]
    pub group_depends: Vec<GroupName>,
}

impl ResolvedPackage {
    /// The dependencies declared directly in the manifest.
    pub fn manifest_dependencies(&self) -> impl Iterator<Item = &PackageName> {
        self.dependencies
            .iter()
            .filter(|dependency| !self.group_dependencies.contains(dependency))
    }
}

/// A package that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPackage {
    pub repository: PackageName,
    pub failure: Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    /// A human-readable explanation, stable across runs for the same inputs.
    pub reason: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The repository could not be fetched.
    SourceUnavailable,
    /// None of the release references exist in the repository.
    MissingRevision,
    /// The release revision has no manifest for the package.
    MissingManifest,
    /// The manifest could not be parsed.
    ParseError,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceUnavailable => f.write_str("source_unavailable"),
            Self::MissingRevision => f.write_str("missing_revision"),
            Self::MissingManifest => f.write_str("missing_manifest"),
            Self::ParseError => f.write_str("parse_error"),
        }
    }
}
