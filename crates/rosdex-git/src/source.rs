use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::git::GitDatabase;
use crate::oid::GitOid;
use crate::url::RepositoryUrl;

/// A reference to a release in a repository: a tag, a branch, or a commit.
///
/// Release references are not qualified in distribution files, so the kind is only known once
/// the reference has been resolved against a fetched repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GitReference(String);

impl GitReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Return the reference as a revision string.
    pub fn as_rev(&self) -> &str {
        &self.0
    }
}

impl Display for GitReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a release could not be read from its source repository.
///
/// Messages only ever include the repository URL and the requested references, never local
/// workspace paths, so that they are stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceUnavailable {
    #[error("Failed to prepare a local workspace for `{url}`")]
    Workspace { url: Url },
    #[error("Failed to fetch `{url}`")]
    Unreachable { url: Url },
    #[error("None of the references {} exist in `{url}`", quoted(.references))]
    MissingRevision {
        url: Url,
        references: Vec<GitReference>,
    },
    #[error("No manifest at {} for `{reference}` in `{url}`", quoted(.paths))]
    MissingManifest {
        url: Url,
        reference: GitReference,
        paths: Vec<String>,
    },
    #[error("Failed to read `{path}` for `{reference}` in `{url}`")]
    Read {
        url: Url,
        reference: GitReference,
        path: String,
    },
}

fn quoted<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| format!("`{item}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where Git databases live while a repository is being read.
#[derive(Debug, Clone, Default)]
pub struct GitWorkspace {
    /// Root for persistent databases, or `None` to use a fresh temporary directory per fetch.
    root: Option<PathBuf>,
    /// Serializes access to each persistent database within this process.
    locks: Arc<DashMap<RepositoryUrl, Arc<Mutex<()>>>>,
}

impl GitWorkspace {
    /// A workspace that fetches every repository from scratch into a temporary directory,
    /// which is removed once the repository has been read.
    pub fn transient() -> Self {
        Self::default()
    }

    /// A workspace that keeps one bare database per repository under `root`, and updates it
    /// in place on subsequent fetches.
    pub fn persistent(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            locks: Arc::default(),
        }
    }

    /// Returns `true` if every fetch starts from an empty temporary directory.
    pub fn is_transient(&self) -> bool {
        self.root.is_none()
    }

    /// Return the root of the persistent databases, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

/// A manifest read from a repository at a resolved revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestBlob {
    /// The candidate reference that resolved.
    pub reference: GitReference,
    /// The commit the reference resolved to.
    pub commit: GitOid,
    /// The path of the manifest within the repository.
    pub path: String,
    /// The raw manifest content.
    pub content: Vec<u8>,
}

/// A remote Git repository that release manifests can be read from.
pub struct GitSource<'a> {
    url: Url,
    workspace: &'a GitWorkspace,
}

impl<'a> GitSource<'a> {
    /// Initialize a new Git source.
    pub fn new(url: Url, workspace: &'a GitWorkspace) -> Self {
        Self { url, workspace }
    }

    /// Fetch the repository into the workspace and run `f` against it.
    ///
    /// The workspace is held for the duration of `f` and released afterwards, whatever the
    /// outcome: temporary directories are deleted, and persistent databases are unlocked.
    #[instrument(skip_all, fields(url = %self.url))]
    pub fn open<T>(&self, f: impl FnOnce(&OpenSource<'_>) -> T) -> Result<T, SourceUnavailable> {
        match self.workspace.root() {
            None => {
                let temp_dir = tempfile::tempdir().map_err(|err| {
                    debug!("Failed to create a temporary workspace: {err}");
                    SourceUnavailable::Workspace {
                        url: self.url.clone(),
                    }
                })?;
                let db = self.clone_into(temp_dir.path())?;
                Ok(f(&OpenSource {
                    url: &self.url,
                    db,
                }))
            }
            Some(root) => {
                let repository = RepositoryUrl::new(&self.url);
                let db_path = root.join("db").join(repository.digest());

                // Avoid races between repositories that share a URL.
                let lock = self
                    .workspace
                    .locks
                    .entry(repository)
                    .or_default()
                    .value()
                    .clone();
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

                let db = self.update(&db_path)?;
                Ok(f(&OpenSource {
                    url: &self.url,
                    db,
                }))
            }
        }
    }

    /// Reuse the database at `path` if it is usable, otherwise start from scratch.
    fn update(&self, path: &Path) -> Result<GitDatabase, SourceUnavailable> {
        if let Ok(db) = GitDatabase::open(path) {
            match db.fetch(&self.url) {
                Ok(()) => {
                    debug!("Updated existing Git database for: {}", self.url);
                    return Ok(db);
                }
                Err(err) => {
                    debug!("Failed to update existing Git database, starting over: {err:#}");
                }
            }
        }
        self.clone_into(path)
    }

    /// Create a fresh database at `path` and fetch the repository into it.
    fn clone_into(&self, path: &Path) -> Result<GitDatabase, SourceUnavailable> {
        let db = GitDatabase::init(path).map_err(|err| {
            debug!("Failed to initialize Git database: {err:#}");
            SourceUnavailable::Workspace {
                url: self.url.clone(),
            }
        })?;
        db.fetch(&self.url).map_err(|err| {
            debug!("{err:#}");
            SourceUnavailable::Unreachable {
                url: self.url.clone(),
            }
        })?;
        Ok(db)
    }
}

/// A repository that has been fetched into a workspace.
pub struct OpenSource<'a> {
    url: &'a Url,
    db: GitDatabase,
}

impl OpenSource<'_> {
    /// Read the first manifest found at `paths`, at the first of `candidates` that exists.
    ///
    /// Candidates are tried in order and the first that resolves is used; later candidates
    /// are not consulted even if the manifest is missing at the resolved revision.
    pub fn read_manifest(
        &self,
        candidates: &[GitReference],
        paths: &[String],
    ) -> Result<ManifestBlob, SourceUnavailable> {
        for reference in candidates {
            let commit = match self.db.resolve(reference.as_rev()) {
                Ok(commit) => commit,
                Err(err) => {
                    debug!("{err:#}");
                    continue;
                }
            };
            debug!("Resolved `{reference}` to {commit} in {}", self.url);

            for path in paths {
                let content = self.db.read_blob(commit, path).map_err(|err| {
                    debug!("{err:#}");
                    SourceUnavailable::Read {
                        url: self.url.clone(),
                        reference: reference.clone(),
                        path: path.clone(),
                    }
                })?;
                if let Some(content) = content {
                    return Ok(ManifestBlob {
                        reference: reference.clone(),
                        commit,
                        path: path.clone(),
                        content,
                    });
                }
            }

            return Err(SourceUnavailable::MissingManifest {
                url: self.url.clone(),
                reference: reference.clone(),
                paths: paths.to_vec(),
            });
        }

        Err(SourceUnavailable::MissingRevision {
            url: self.url.clone(),
            references: candidates.to_vec(),
        })
    }
}
