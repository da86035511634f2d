use std::error::Error;

use indexmap::IndexMap;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument, warn};
use url::Url;

use rosdex_cache::{
    CacheEntry, DistributionCache, FailedPackage, Failure, FailureKind, ResolvedPackage,
};
use rosdex_distribution::{Index, IndexError, ReleaseCoordinate};
use rosdex_git::{GIT, GitReference, GitSource, GitWorkspace, ManifestBlob, SourceUnavailable};
use rosdex_manifest::{PackageManifest, PackageName};

use crate::groups::expand_group_dependencies;
use crate::options::GenerateOptions;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("{0}")]
    Git(String),
    #[error("Failed to start the fetch thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Build the cache of the distribution `name` listed in `index`.
///
/// Every released repository is resolved, in parallel, to the manifests of the packages it
/// hosts. Repositories and packages that cannot be resolved are recorded as failures rather
/// than aborting the run; only an unreadable index or distribution file is fatal.
#[instrument(skip(index, options), fields(index_url = %index.url()))]
pub fn generate_distribution_cache(
    index: &Index,
    name: &str,
    options: &GenerateOptions,
) -> Result<DistributionCache, GenerateError> {
    let distribution = index.distribution_files(name)?;

    if let Err(err) = GIT.as_ref() {
        return Err(GenerateError::Git(err.to_string()));
    }

    let workspace = match (&options.workspace, options.ignore_local) {
        (Some(root), false) => GitWorkspace::persistent(root),
        (None, false) => {
            debug!("No workspace configured; fetching into temporary directories");
            GitWorkspace::transient()
        }
        (_, true) => GitWorkspace::transient(),
    };

    let previous = options.previous.as_ref().filter(|previous| {
        if previous.name() == name {
            true
        } else {
            warn!(
                "Ignoring previous cache for `{}` while generating `{name}`",
                previous.name()
            );
            false
        }
    });

    let jobs = distribution
        .released()
        .map(|(repository, release)| RepositoryJob {
            repository,
            release,
        })
        .collect::<Vec<_>>();
    let unreleased = distribution.repositories().len() - jobs.len();
    if unreleased > 0 {
        debug!("Skipping {unreleased} unreleased repositories of `{name}`");
    }

    info!(
        "Resolving {} released repositories of `{name}` ({} concurrent fetches)",
        jobs.len(),
        options.concurrency
    );

    let context = Context {
        distro: name,
        workspace: &workspace,
        previous,
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.concurrency.max(1))
        .thread_name(|index| format!("rosdex-fetch-{index}"))
        .build()?;
    // `collect` keeps the results in descriptor order, whatever order the jobs finish in.
    let results: Vec<Vec<(PackageName, CacheEntry)>> =
        pool.install(|| jobs.par_iter().map(|job| job.resolve(&context)).collect());

    let mut packages = IndexMap::new();
    for (package, entry) in results.into_iter().flatten() {
        if let Some(existing) = packages.get(&package).map(CacheEntry::repository) {
            warn!(
                "Package `{package}` is released by both `{existing}` and `{}`; keeping the former",
                entry.repository()
            );
            continue;
        }
        packages.insert(package, entry);
    }

    expand_group_dependencies(&mut packages);

    let cache = DistributionCache::new(name, distribution.files().to_vec(), packages);
    info!(
        "Resolved {} packages of `{name}` ({} failed)",
        cache.resolved().count(),
        cache.failures().count()
    );
    Ok(cache)
}

/// State shared by every repository of a run.
struct Context<'a> {
    distro: &'a str,
    workspace: &'a GitWorkspace,
    previous: Option<&'a DistributionCache>,
}

/// A released repository to resolve.
struct RepositoryJob<'a> {
    repository: &'a PackageName,
    release: &'a ReleaseCoordinate,
}

/// A package to read from a release.
struct PackageRequest {
    package: PackageName,
    candidates: Vec<GitReference>,
    paths: Vec<String>,
}

impl RepositoryJob<'_> {
    /// Resolve every package of the repository, returning their entries in release order.
    #[instrument(skip_all, fields(repository = %self.repository))]
    fn resolve(&self, context: &Context<'_>) -> Vec<(PackageName, CacheEntry)> {
        let Some(url) = &self.release.url else {
            return vec![self.failure(
                FailureKind::SourceUnavailable,
                format!("The release of `{}` has no URL", self.repository),
            )];
        };

        let requests = self.requests(context.distro);
        if requests.iter().all(|request| request.candidates.is_empty()) {
            return vec![self.failure(
                FailureKind::MissingRevision,
                format!(
                    "The release of `{}` has neither a version nor a `release` tag",
                    self.repository
                ),
            )];
        }

        let mut entries = requests
            .iter()
            .map(|request| self.reuse(context.previous, url, request))
            .collect::<Vec<_>>();
        if entries.iter().all(Option::is_some) {
            debug!(
                "Release of `{}` is unchanged; reusing previous entries",
                self.repository
            );
            return entries.into_iter().flatten().collect();
        }

        let source = GitSource::new(url.clone(), context.workspace);
        let blobs = source.open(|source| {
            requests
                .iter()
                .zip(&entries)
                .map(|(request, entry)| {
                    if entry.is_some() || request.candidates.is_empty() {
                        None
                    } else {
                        Some(source.read_manifest(&request.candidates, &request.paths))
                    }
                })
                .collect::<Vec<_>>()
        });
        let blobs = match blobs {
            Ok(blobs) => blobs,
            Err(err) => {
                return vec![self.failure(FailureKind::SourceUnavailable, err.to_string())];
            }
        };

        // When no package has a matching revision, the release as a whole is missing.
        let all_missing = entries.iter().all(Option::is_none)
            && blobs.iter().all(|blob| {
                matches!(blob, None | Some(Err(SourceUnavailable::MissingRevision { .. })))
            });
        if all_missing {
            if let Some(Some(Err(err))) = blobs.iter().find(|blob| blob.is_some()) {
                return vec![self.failure(FailureKind::MissingRevision, err.to_string())];
            }
        }

        for ((entry, request), blob) in entries.iter_mut().zip(&requests).zip(blobs) {
            if entry.is_some() {
                continue;
            }
            *entry = Some(match blob {
                None => self.package_failure(
                    &request.package,
                    FailureKind::MissingRevision,
                    format!("No release reference for `{}`", request.package),
                ),
                Some(Ok(blob)) => self.parse(url, request, blob),
                Some(Err(err)) => {
                    let kind = match err {
                        SourceUnavailable::MissingRevision { .. } => FailureKind::MissingRevision,
                        SourceUnavailable::MissingManifest { .. } => FailureKind::MissingManifest,
                        SourceUnavailable::Workspace { .. }
                        | SourceUnavailable::Unreachable { .. }
                        | SourceUnavailable::Read { .. } => FailureKind::SourceUnavailable,
                    };
                    self.package_failure(&request.package, kind, err.to_string())
                }
            });
        }

        entries.into_iter().flatten().collect()
    }

    /// The packages to read, with the references and manifest paths to try for each.
    fn requests(&self, distro: &str) -> Vec<PackageRequest> {
        let multiple = !self.release.packages.is_empty();

        self.release
            .released_packages(self.repository)
            .into_iter()
            .map(|package| {
                let candidates = self
                    .release
                    .candidates(&package, distro)
                    .into_iter()
                    .map(GitReference::new)
                    .collect();
                // Source layouts keep each package in its own directory, while per-package
                // release tags carry the manifest at the root.
                let paths = if multiple {
                    vec![format!("{package}/package.xml"), "package.xml".to_string()]
                } else {
                    vec!["package.xml".to_string()]
                };
                PackageRequest {
                    package,
                    candidates,
                    paths,
                }
            })
            .collect()
    }

    /// Reuse the previous entry of a package if its release has not changed.
    ///
    /// An entry is reused when it came from the same repository and URL, at the reference that
    /// would be tried first now, for the same released version. A moving reference such as a
    /// branch can point elsewhere once the version is bumped. Failures are always retried.
    fn reuse(
        &self,
        previous: Option<&DistributionCache>,
        url: &Url,
        request: &PackageRequest,
    ) -> Option<(PackageName, CacheEntry)> {
        let resolved = previous?.get(&request.package)?.as_resolved()?;
        if resolved.repository != *self.repository
            || resolved.url != *url
            || request.candidates.first() != Some(&resolved.reference)
            || resolved.release_version != self.release.version
        {
            return None;
        }

        // Group dependencies are recomputed once the whole cache is known.
        let mut resolved = resolved.clone();
        resolved.dependencies = resolved.manifest_dependencies().cloned().collect();
        resolved.group_dependencies.clear();
        Some((request.package.clone(), CacheEntry::Resolved(resolved)))
    }

    /// Turn a manifest read from the release into a cache entry.
    fn parse(
        &self,
        url: &Url,
        request: &PackageRequest,
        blob: ManifestBlob,
    ) -> (PackageName, CacheEntry) {
        let manifest = match PackageManifest::from_slice(&blob.content) {
            Ok(manifest) => manifest,
            Err(err) => {
                return self.package_failure(
                    &request.package,
                    FailureKind::ParseError,
                    format!(
                        "Failed to parse `{}` at `{}` in `{url}`: {}",
                        blob.path,
                        blob.reference,
                        error_chain(&err)
                    ),
                );
            }
        };

        if manifest.name != request.package {
            warn!(
                "Manifest at `{}` in `{url}` declares `{}`, expected `{}`",
                blob.path, manifest.name, request.package
            );
        }
        if let Some(expected) = self.release.upstream_version() {
            if manifest.version != expected {
                warn!(
                    "Package `{}` has version `{}` in its manifest, but is released as `{}`",
                    manifest.name,
                    manifest.version,
                    self.release.version.as_deref().unwrap_or(expected)
                );
            }
        }
        debug!(
            "Resolved `{}` {} at `{}` ({})",
            manifest.name,
            manifest.version,
            blob.reference,
            blob.commit.as_short_str()
        );

        (
            manifest.name,
            CacheEntry::Resolved(ResolvedPackage {
                repository: self.repository.clone(),
                url: url.clone(),
                version: manifest.version,
                release_version: self.release.version.clone(),
                format: manifest.format,
                reference: blob.reference,
                revision: blob.commit,
                dependencies: manifest.dependencies,
                group_dependencies: Vec::new(),
                member_of_groups: manifest.member_of_groups,
                group_depends: manifest.group_depends,
            }),
        )
    }

    /// A failure of the repository as a whole, keyed by the repository name.
    fn failure(&self, kind: FailureKind, reason: String) -> (PackageName, CacheEntry) {
        self.package_failure(self.repository, kind, reason)
    }

    /// A failure of a single package, keyed by the package name.
    fn package_failure(
        &self,
        package: &PackageName,
        kind: FailureKind,
        reason: String,
    ) -> (PackageName, CacheEntry) {
        warn!("Failed to resolve `{package}` ({kind}): {reason}");
        (
            package.clone(),
            CacheEntry::Failed(FailedPackage {
                repository: self.repository.clone(),
                failure: Failure { kind, reason },
            }),
        )
    }
}

/// Render an error and its sources on one line.
fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
