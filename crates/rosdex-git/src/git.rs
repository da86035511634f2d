//! Git plumbing, modeled on Cargo's CLI-based Git support.
//! Cargo is dual-licensed under either Apache 2.0 or MIT, at the user's choice.
//! Source: <https://github.com/rust-lang/cargo/blob/23eb492cf920ce051abfc56bbaf838514dc8365c/src/cargo/sources/git/utils.rs>
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use cargo_util::ProcessBuilder;
use tracing::{debug, instrument, trace};
use url::Url;

use rosdex_static::EnvVars;

use crate::oid::GitOid;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("Git executable not found. Ensure that Git is installed and available.")]
    GitNotFound,
    #[error(transparent)]
    Other(#[from] which::Error),
}

/// A global cache of the result of `which git`.
pub static GIT: LazyLock<Result<PathBuf, GitError>> = LazyLock::new(|| {
    which::which("git").map_err(|err| match err {
        which::Error::CannotFindBinaryPath => GitError::GitNotFound,
        err => GitError::Other(err),
    })
});

/// A bare Git repository used as a local database of a remote.
///
/// Manifests are read straight from the object store (`git cat-file`), so no working tree is
/// ever checked out.
pub(crate) struct GitDatabase {
    /// Path to the bare repository on the local filesystem.
    path: PathBuf,
}

impl GitDatabase {
    /// Opens an existing bare repository at `path`.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            anyhow::bail!("`{}` is not a directory", path.display());
        }

        // Make sure the path is itself a bare repository, rather than somewhere inside an
        // unrelated working tree.
        let output = git()?
            .arg("rev-parse")
            .arg("--git-dir")
            .cwd(path)
            .exec_with_output()?;
        if output.stdout.trim_ascii() != b"." {
            anyhow::bail!("`{}` is not a bare Git repository", path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Initializes an empty bare repository at `path`, replacing anything already there.
    pub(crate) fn init(path: &Path) -> Result<Self> {
        match fs_err::remove_dir_all(path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        fs_err::create_dir_all(path)?;

        git()?
            .arg("init")
            .arg("--bare")
            .arg("--quiet")
            .cwd(path)
            .exec_with_output()?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Fetches every branch and tag of `remote_url` into this database.
    ///
    /// Branches land under `refs/remotes/origin/*` and tags under `refs/tags/*`, so that a
    /// release reference can later be resolved locally as either. Both namespaces mirror the
    /// remote: references deleted upstream are pruned, so an updated database resolves exactly
    /// what a fresh clone would.
    #[instrument(skip_all, fields(url = %remote_url))]
    pub(crate) fn fetch(&self, remote_url: &Url) -> Result<()> {
        debug!("Performing a Git fetch for: {remote_url}");

        git()?
            // Never block on a credential prompt.
            .env(EnvVars::GIT_TERMINAL_PROMPT, "0")
            .arg("fetch")
            .arg("--force") // handle force pushes
            // Pruning covers tags too, since they come from an explicit refspec.
            .arg("--prune")
            .arg("--quiet")
            .arg(remote_url.as_str())
            .arg("+refs/heads/*:refs/remotes/origin/*")
            .arg("+refs/tags/*:refs/tags/*")
            .cwd(&self.path)
            .exec_with_output()
            .with_context(|| format!("failed to fetch `{remote_url}`"))?;

        Ok(())
    }

    /// Resolves a release reference to a commit.
    ///
    /// The reference is tried as a tag, then as a branch, then as a (possibly abbreviated)
    /// commit. `^0` peels annotated tags down to the commit they point at.
    pub(crate) fn resolve(&self, reference: &str) -> Result<GitOid> {
        self.rev_parse(&format!("refs/tags/{reference}^0"))
            .or_else(|_| self.rev_parse(&format!("refs/remotes/origin/{reference}^0")))
            .or_else(|_| {
                if GitOid::from_str(reference).is_ok() {
                    self.rev_parse(&format!("{reference}^0"))
                } else {
                    Err(anyhow::anyhow!("`{reference}` is not a commit"))
                }
            })
            .with_context(|| format!("failed to find reference `{reference}`"))
    }

    /// Reads the blob at `path` in the tree of `revision`.
    ///
    /// Returns `None` if the path does not exist (or is not a file) at that revision.
    pub(crate) fn read_blob(&self, revision: GitOid, path: &str) -> Result<Option<Vec<u8>>> {
        let object = format!("{revision}:{path}");

        let kind = git()?
            .arg("cat-file")
            .arg("-t")
            .arg(&object)
            .cwd(&self.path)
            .exec_with_output();
        match kind {
            Ok(output) if output.stdout.trim_ascii() == b"blob" => {}
            Ok(_) | Err(_) => {
                trace!("No blob at `{object}`");
                return Ok(None);
            }
        }

        let output = git()?
            .arg("cat-file")
            .arg("blob")
            .arg(&object)
            .cwd(&self.path)
            .exec_with_output()?;
        Ok(Some(output.stdout))
    }

    /// Parses the object ID of the given `refname`.
    fn rev_parse(&self, refname: &str) -> Result<GitOid> {
        let result = git()?
            .arg("rev-parse")
            .arg("--verify")
            .arg("--quiet")
            .arg(refname)
            .cwd(&self.path)
            .exec_with_output()?;

        let mut result = String::from_utf8(result.stdout)?;
        result.truncate(result.trim_end().len());
        Ok(result.parse()?)
    }
}

/// Returns a [`ProcessBuilder`] for the system `git`.
///
/// If we are run by Git (e.g., from a hook), `GIT_DIR` and friends point to the wrong
/// repository and take precedence over the working directory, so they are always cleared.
fn git() -> Result<ProcessBuilder> {
    let mut process = ProcessBuilder::new(GIT.as_ref()?);
    for var in SCRUBBED_ENV_VARS {
        process.env_remove(var);
    }
    Ok(process)
}

/// Variables that redirect Git away from the repository in the working directory.
const SCRUBBED_ENV_VARS: [&str; 5] = [
    EnvVars::GIT_DIR,
    EnvVars::GIT_WORK_TREE,
    EnvVars::GIT_INDEX_FILE,
    EnvVars::GIT_OBJECT_DIRECTORY,
    EnvVars::GIT_ALTERNATE_OBJECT_DIRECTORIES,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_invocation_clears_redirecting_variables() -> Result<()> {
        let process = git()?;
        for var in SCRUBBED_ENV_VARS {
            // A removed variable is recorded as `None`.
            assert_eq!(process.get_env(var), None, "{var}");
            assert!(
                process
                    .get_envs()
                    .get(var)
                    .is_some_and(Option::is_none),
                "{var}"
            );
        }
        Ok(())
    }
}
