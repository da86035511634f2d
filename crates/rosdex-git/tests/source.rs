use anyhow::Result;
use url::Url;

use rosdex_git::{GitReference, GitSource, GitWorkspace, SourceUnavailable};
use rosdex_test::{TestRepository, create_package, package_manifest};

fn references(references: &[&str]) -> Vec<GitReference> {
    references.iter().copied().map(GitReference::new).collect()
}

fn paths(paths: &[&str]) -> Vec<String> {
    paths.iter().map(ToString::to_string).collect()
}

#[test]
fn read_tagged_manifest() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let manifest = package_manifest("sim_pkg_a", "");
    let repository = create_package(&temp_dir.path().join("sim_pkg_a"), &manifest)?;

    let workspace = GitWorkspace::transient();
    let source = GitSource::new(repository.url()?, &workspace);
    let blob = source.open(|source| {
        source.read_manifest(&references(&["0.0.0"]), &paths(&["package.xml"]))
    })??;

    assert_eq!(blob.reference.as_rev(), "0.0.0");
    assert_eq!(blob.path, "package.xml");
    assert_eq!(blob.commit.as_str(), repository.rev_parse("0.0.0^{commit}")?);
    assert_eq!(String::from_utf8(blob.content)?, manifest);
    Ok(())
}

#[test]
fn fall_back_to_later_candidates() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let repository = create_package(
        &temp_dir.path().join("sim_pkg_a"),
        &package_manifest("sim_pkg_a", ""),
    )?;
    repository.branch("rolling")?;

    let workspace = GitWorkspace::transient();
    let source = GitSource::new(repository.url()?, &workspace);

    // A branch is found when the tag is not.
    let blob = source.open(|source| {
        source.read_manifest(
            &references(&["release/sim/sim_pkg_a/0.0.0-1", "rolling"]),
            &paths(&["package.xml"]),
        )
    })??;
    assert_eq!(blob.reference.as_rev(), "rolling");

    // As is a commit.
    let head = repository.rev_parse("HEAD")?;
    let blob = source.open(|source| {
        source.read_manifest(&references(&[head.as_str()]), &paths(&["package.xml"]))
    })??;
    assert_eq!(blob.commit.as_str(), head);
    Ok(())
}

#[test]
fn missing_revision() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let repository = create_package(
        &temp_dir.path().join("sim_pkg_a"),
        &package_manifest("sim_pkg_a", ""),
    )?;
    let url = repository.url()?;

    let workspace = GitWorkspace::transient();
    let err = GitSource::new(url.clone(), &workspace)
        .open(|source| {
            source.read_manifest(&references(&["9.9.9", "1.0.0-1"]), &paths(&["package.xml"]))
        })?
        .unwrap_err();

    assert_eq!(
        err,
        SourceUnavailable::MissingRevision {
            url,
            references: references(&["9.9.9", "1.0.0-1"]),
        }
    );
    Ok(())
}

#[test]
fn missing_manifest() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let repository = TestRepository::init(&temp_dir.path().join("empty"))?;
    repository
        .write("README.md", "No packages here.\n")?
        .commit("Add readme")?
        .tag("0.0.0")?;

    let workspace = GitWorkspace::transient();
    let err = GitSource::new(repository.url()?, &workspace)
        .open(|source| {
            source.read_manifest(
                &references(&["0.0.0"]),
                &paths(&["sim_pkg_a/package.xml", "package.xml"]),
            )
        })?
        .unwrap_err();

    let SourceUnavailable::MissingManifest {
        reference, paths, ..
    } = err
    else {
        panic!("Expected a missing manifest, found: {err:?}");
    };
    assert_eq!(reference.as_rev(), "0.0.0");
    assert_eq!(paths, ["sim_pkg_a/package.xml", "package.xml"]);
    Ok(())
}

#[test]
fn unreachable() -> Result<()> {
    let url = Url::parse("file:///dev/null")?;
    let workspace = GitWorkspace::transient();
    let err = GitSource::new(url, &workspace).open(|_| ()).unwrap_err();

    insta::assert_snapshot!(err, @"Failed to fetch `file:///dev/null`");
    Ok(())
}

#[test]
fn persistent_workspace_is_updated() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let repository = create_package(
        &temp_dir.path().join("sim_pkg_a"),
        &package_manifest("sim_pkg_a", ""),
    )?;
    let workspace_dir = temp_dir.path().join("workspace");
    let workspace = GitWorkspace::persistent(&workspace_dir);
    assert!(!workspace.is_transient());

    let source = GitSource::new(repository.url()?, &workspace);
    let first = source.open(|source| {
        source.read_manifest(&references(&["0.0.0"]), &paths(&["package.xml"]))
    })??;
    assert!(workspace_dir.join("db").is_dir());

    // A release made after the first fetch is picked up by the next one.
    repository
        .write("package.xml", &package_manifest("sim_pkg_a", "<depend>rclcpp</depend>"))?
        .commit("Depend on rclcpp")?
        .tag("0.1.0")?;
    let second = source.open(|source| {
        source.read_manifest(&references(&["0.1.0"]), &paths(&["package.xml"]))
    })??;

    assert_ne!(first.commit, second.commit);
    assert!(String::from_utf8(second.content)?.contains("rclcpp"));
    Ok(())
}

#[test]
fn transient_and_persistent_agree() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let repository = create_package(
        &temp_dir.path().join("sim_pkg_a"),
        &package_manifest("sim_pkg_a", ""),
    )?;

    let read = |workspace: &GitWorkspace| -> Result<_> {
        let source = GitSource::new(repository.url()?, workspace);
        Ok(source.open(|source| {
            source.read_manifest(&references(&["0.0.0"]), &paths(&["package.xml"]))
        })??)
    };

    let transient = read(&GitWorkspace::transient())?;
    let persistent = read(&GitWorkspace::persistent(temp_dir.path().join("workspace")))?;
    assert_eq!(transient, persistent);
    Ok(())
}
