// The `unreachable_pub` is to silence false positives in RustRover.
#![allow(dead_code, unreachable_pub)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use indoc::{formatdoc, indoc};
use tempfile::TempDir;
use url::Url;

use rosdex_static::EnvVars;

/// The name of the synthetic distribution built by [`sim_distro`].
pub const SIM_DISTRO: &str = "sim";

/// The tag and version every synthetic package is released at.
pub const SIM_VERSION: &str = "0.0.0";

/// An unreachable repository URL.
pub const UNREACHABLE_URL: &str = "file:///dev/null";

/// A Git repository with a working tree, used as the upstream of a release.
#[derive(Debug, Clone)]
pub struct TestRepository {
    path: PathBuf,
}

impl TestRepository {
    /// Initialize a repository at `path` with an empty initial commit on `main`.
    pub fn init(path: &Path) -> Result<Self> {
        fs_err::create_dir_all(path)?;
        let repository = Self {
            path: path.to_path_buf(),
        };
        repository.git(&["init", "--quiet"])?;
        repository.git(&["commit", "--quiet", "--allow-empty", "-m", "Initial commit"])?;
        repository.git(&["checkout", "--quiet", "-b", "main"])?;
        Ok(repository)
    }

    /// Use an existing repository at `path`.
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Write a file relative to the root of the working tree.
    pub fn write(&self, relative: &str, content: &str) -> Result<&Self> {
        let path = self.path.join(relative);
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        fs_err::write(path, content)?;
        Ok(self)
    }

    /// Commit every change in the working tree.
    pub fn commit(&self, message: &str) -> Result<&Self> {
        self.git(&["add", "--all"])?;
        self.git(&["commit", "--quiet", "-m", message])?;
        Ok(self)
    }

    /// Create an annotated tag at `HEAD`.
    pub fn tag(&self, name: &str) -> Result<&Self> {
        self.git(&["tag", "-a", name, "-m", name])?;
        Ok(self)
    }

    /// Delete a tag, as when a release is withdrawn upstream.
    pub fn delete_tag(&self, name: &str) -> Result<&Self> {
        self.git(&["tag", "--delete", name])?;
        Ok(self)
    }

    /// Create a branch at `HEAD` without checking it out.
    pub fn branch(&self, name: &str) -> Result<&Self> {
        self.git(&["branch", name])?;
        Ok(self)
    }

    /// Return the full commit ID of `revision`.
    pub fn rev_parse(&self, revision: &str) -> Result<String> {
        let output = self.git(&["rev-parse", revision])?;
        Ok(output.trim().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `file://` URL of the repository.
    pub fn url(&self) -> Result<Url> {
        Url::from_file_path(&self.path)
            .map_err(|()| anyhow::anyhow!("Not an absolute path: {}", self.path.display()))
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            // Signing and hooks from the user's configuration must not leak into fixtures.
            .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
            .args(["-c", "core.hooksPath=/dev/null"])
            .args(args)
            .env(EnvVars::GIT_AUTHOR_NAME, "Nobody")
            .env(EnvVars::GIT_AUTHOR_EMAIL, "nobody@example.com")
            .env(EnvVars::GIT_COMMITTER_NAME, "Nobody")
            .env(EnvVars::GIT_COMMITTER_EMAIL, "nobody@example.com")
            .env(EnvVars::GIT_CONFIG_NOSYSTEM, "1")
            .env(EnvVars::GIT_CEILING_DIRECTORIES, &self.path)
            .env_remove(EnvVars::GIT_DIR)
            .env_remove(EnvVars::GIT_WORK_TREE)
            .env_remove(EnvVars::GIT_INDEX_FILE)
            .current_dir(&self.path)
            .output()
            .context("Failed to run `git`")?;
        if !output.status.success() {
            bail!(
                "`git {}` failed in {}:\n{}",
                args.join(" "),
                self.path.display(),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(String::from_utf8(output.stdout)?)
    }
}

/// A format 3 `package.xml` released at [`SIM_VERSION`], with `body` inserted after the
/// boilerplate elements.
pub fn package_manifest(name: &str, body: &str) -> String {
    let mut manifest = formatdoc! {r#"
        <package format="3">
          <name>{name}</name>
          <version>{SIM_VERSION}</version>
          <description>Simulated package {name}.</description>
          <maintainer email="nobody@example.com">Nobody</maintainer>
          <license>Apache-2.0</license>
    "#};
    for line in body.lines().filter(|line| !line.trim().is_empty()) {
        let _ = writeln!(manifest, "  {}", line.trim());
    }
    manifest.push_str("</package>\n");
    manifest
}

/// Create a single-package repository at `path`.
///
/// The manifest is committed on `main` after an empty initial commit, and tagged
/// [`SIM_VERSION`].
pub fn create_package(path: &Path, manifest: &str) -> Result<TestRepository> {
    let repository = TestRepository::init(path)?;
    repository
        .write("package.xml", manifest)?
        .commit("Add package manifest")?
        .tag(SIM_VERSION)?;
    Ok(repository)
}

/// A release entry to be written into a distribution file.
#[derive(Debug, Clone)]
struct ReleaseEntry {
    name: String,
    url: String,
    version: Option<String>,
    tag: Option<String>,
    packages: Vec<String>,
}

/// Builds an index and a single distribution file in a temporary directory.
pub struct DistributionBuilder {
    root: TempDir,
    releases: Vec<ReleaseEntry>,
    unreleased: Vec<String>,
}

impl DistributionBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            root: tempfile::tempdir()?,
            releases: Vec::new(),
            unreleased: Vec::new(),
        })
    }

    /// The directory repositories and documents are created in.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Create a single-package repository named `name` and release it at [`SIM_VERSION`].
    pub fn add_package(&mut self, name: &str, manifest: &str) -> Result<TestRepository> {
        let repository = create_package(&self.root.path().join("repos").join(name), manifest)?;
        self.add_release(
            name,
            repository.url()?.as_str(),
            Some(SIM_VERSION),
            Some(SIM_VERSION),
            &[],
        );
        Ok(repository)
    }

    /// Release an existing repository.
    pub fn add_release(
        &mut self,
        name: &str,
        url: &str,
        version: Option<&str>,
        tag: Option<&str>,
        packages: &[&str],
    ) -> &mut Self {
        self.releases.push(ReleaseEntry {
            name: name.to_string(),
            url: url.to_string(),
            version: version.map(ToString::to_string),
            tag: tag.map(ToString::to_string),
            packages: packages.iter().map(ToString::to_string).collect(),
        });
        self
    }

    /// Release a repository whose URL cannot be fetched.
    pub fn add_unreachable(&mut self, name: &str) -> &mut Self {
        self.add_release(name, UNREACHABLE_URL, None, Some(SIM_VERSION), &[])
    }

    /// List a repository without a `release` section.
    pub fn add_unreleased(&mut self, name: &str) -> &mut Self {
        self.unreleased.push(name.to_string());
        self
    }

    /// Write `index.yaml` and `distribution.yaml` for a distribution named `distro`.
    pub fn write(self, distro: &str) -> Result<TestIndex> {
        let root = self.root.path();

        let index = formatdoc! {"
            %YAML 1.1
            # ROS index file
            # see REP 153: http://ros.org/reps/rep-0153.html
            ---
            distributions:
              {distro}:
                distribution: [distribution.yaml]
                distribution_cache: distribution-cache.yaml
                distribution_status: rolling
                distribution_type: ros2
                python_version: 3
            type: index
            version: 4
        "};

        let mut distribution = indoc! {"
            %YAML 1.1
            # ROS distribution file
            # see REP 143: http://ros.org/reps/rep-0143.html
            ---
            repositories:
        "}
        .to_string();
        for release in &self.releases {
            writeln!(distribution, "  {}:", release.name)?;
            writeln!(distribution, "    release:")?;
            if !release.packages.is_empty() {
                writeln!(distribution, "      packages:")?;
                for package in &release.packages {
                    writeln!(distribution, "      - {package}")?;
                }
            }
            if let Some(tag) = &release.tag {
                writeln!(distribution, "      tags:")?;
                writeln!(distribution, "        release: '{tag}'")?;
            }
            writeln!(distribution, "      url: {}", release.url)?;
            if let Some(version) = &release.version {
                writeln!(distribution, "      version: '{version}'")?;
            }
        }
        for name in &self.unreleased {
            writeln!(distribution, "  {name}:")?;
            writeln!(distribution, "    source:")?;
            writeln!(distribution, "      type: git")?;
            writeln!(distribution, "      url: https://example.com/{name}.git")?;
            writeln!(distribution, "      version: main")?;
        }
        distribution.push_str("type: distribution\nversion: 2\n");

        fs_err::write(root.join("index.yaml"), index)?;
        fs_err::write(root.join("distribution.yaml"), distribution)?;

        Ok(TestIndex {
            distro: distro.to_string(),
            root: self.root,
        })
    }
}

/// An index written to disk by [`DistributionBuilder`].
pub struct TestIndex {
    distro: String,
    root: TempDir,
}

impl TestIndex {
    pub fn distro(&self) -> &str {
        &self.distro
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.path().join("index.yaml")
    }

    /// The `file://` URL of the index.
    pub fn index_url(&self) -> Result<Url> {
        let path = self.index_path();
        Url::from_file_path(&path)
            .map_err(|()| anyhow::anyhow!("Not an absolute path: {}", path.display()))
    }

    /// Where the index expects the distribution cache to be.
    pub fn cache_path(&self) -> PathBuf {
        self.root.path().join("distribution-cache.yaml")
    }
}

/// The simulated distribution:
///
/// - `sim_pkg_a`, with no dependencies
/// - `sim_pkg_b`, depending on `sim_pkg_a` and a member of `sim_group`
/// - `sim_pkg_c`, depending on `sim_group`
/// - `yanked_pkg`, released from an unreachable URL
pub fn sim_distro() -> Result<TestIndex> {
    let mut builder = DistributionBuilder::new()?;
    builder.add_package("sim_pkg_a", &package_manifest("sim_pkg_a", ""))?;
    builder.add_package(
        "sim_pkg_b",
        &package_manifest(
            "sim_pkg_b",
            indoc! {"
                <depend>sim_pkg_a</depend>
                <member_of_group>sim_group</member_of_group>
            "},
        ),
    )?;
    builder.add_package(
        "sim_pkg_c",
        &package_manifest("sim_pkg_c", "<group_depend>sim_group</group_depend>"),
    )?;
    builder.add_unreachable("yanked_pkg");
    builder.write(SIM_DISTRO)
}
