use std::str::FromStr;

use anyhow::Result;
use indoc::indoc;

use rosdex_cache::{CacheEntry, DistributionCache, FailureKind, ResolvedPackage};
use rosdex_distribution::{DocumentUrl, Index};
use rosdex_manifest::PackageName;
use rosdex_resolver::{GenerateError, GenerateOptions, generate_distribution_cache};
use rosdex_test::{
    DistributionBuilder, SIM_DISTRO, SIM_VERSION, TestIndex, TestRepository, package_manifest,
    sim_distro,
};

fn load(index: &TestIndex) -> Result<Index> {
    Ok(Index::load(&DocumentUrl::from(index.index_url()?))?)
}

fn transient() -> GenerateOptions {
    GenerateOptions {
        ignore_local: true,
        ..GenerateOptions::default()
    }
}

fn name(name: &str) -> PackageName {
    PackageName::from_str(name).unwrap()
}

fn resolved<'a>(cache: &'a DistributionCache, package: &str) -> &'a ResolvedPackage {
    cache
        .get(&name(package))
        .and_then(CacheEntry::as_resolved)
        .unwrap_or_else(|| panic!("`{package}` is not resolved"))
}

/// Replace text in the distribution file of `index`, as a maintainer editing it would.
fn edit_distribution(index: &TestIndex, from: &str, to: &str) -> Result<()> {
    let path = index.root().join("distribution.yaml");
    let content = fs_err::read_to_string(&path)?;
    assert!(content.contains(from), "{content}");
    fs_err::write(&path, content.replace(from, to))?;
    Ok(())
}

fn dependencies(cache: &DistributionCache, package: &str) -> Vec<String> {
    resolved(cache, package)
        .dependencies
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn failure(cache: &DistributionCache, package: &str) -> (FailureKind, String) {
    let failed = cache
        .get(&name(package))
        .and_then(CacheEntry::as_failed)
        .unwrap_or_else(|| panic!("`{package}` did not fail"));
    (failed.failure.kind, failed.failure.reason.clone())
}

#[test]
fn sim_distribution() -> Result<()> {
    let sim = sim_distro()?;
    let index = load(&sim)?;
    let cache = generate_distribution_cache(&index, SIM_DISTRO, &transient())?;

    assert_eq!(cache.name(), SIM_DISTRO);
    let names: Vec<_> = cache.resolved().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["sim_pkg_a", "sim_pkg_b", "sim_pkg_c"]);

    assert!(dependencies(&cache, "sim_pkg_a").is_empty());
    assert_eq!(dependencies(&cache, "sim_pkg_b"), ["sim_pkg_a"]);
    // `sim_pkg_c` depends on `sim_group`, of which `sim_pkg_b` is a member.
    assert_eq!(dependencies(&cache, "sim_pkg_c"), ["sim_pkg_b"]);

    let failures: Vec<_> = cache.failures().map(|(name, _)| name.as_str()).collect();
    assert_eq!(failures, ["yanked_pkg"]);
    let (kind, reason) = failure(&cache, "yanked_pkg");
    assert_eq!(kind, FailureKind::SourceUnavailable);
    insta::assert_snapshot!(reason, @"Failed to fetch `file:///dev/null`");

    let a = resolved(&cache, "sim_pkg_a");
    assert_eq!(a.version, SIM_VERSION);
    assert_eq!(a.reference.as_rev(), SIM_VERSION);
    assert_eq!(
        a.revision.as_str(),
        TestRepository::open(&sim.root().join("repos").join("sim_pkg_a"))
            .rev_parse("0.0.0^{commit}")?
    );
    Ok(())
}

#[test]
fn every_reachable_repository_resolves() -> Result<()> {
    let mut builder = DistributionBuilder::new()?;
    let names = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];
    for package in names {
        builder.add_package(package, &package_manifest(package, ""))?;
    }
    let sim = builder.write("many")?;
    let index = load(&sim)?;

    let serial = generate_distribution_cache(
        &index,
        "many",
        &GenerateOptions {
            concurrency: 1,
            ..transient()
        },
    )?;
    let parallel = generate_distribution_cache(
        &index,
        "many",
        &GenerateOptions {
            concurrency: 4,
            ..transient()
        },
    )?;

    assert_eq!(serial.len(), names.len());
    assert_eq!(serial.resolved().count(), names.len());
    assert_eq!(serial.failures().count(), 0);
    let order: Vec<_> = serial.packages().keys().map(PackageName::as_str).collect();
    assert_eq!(order, names);

    // The pool size never changes the result.
    assert_eq!(serial.to_yaml()?, parallel.to_yaml()?);
    Ok(())
}

#[test]
fn unreachable_repositories_are_isolated() -> Result<()> {
    let mut builder = DistributionBuilder::new()?;
    builder.add_unreachable("gone_first");
    builder.add_package("kept", &package_manifest("kept", ""))?;
    builder.add_unreachable("gone_last");
    let sim = builder.write("sim")?;

    let cache = generate_distribution_cache(&load(&sim)?, "sim", &transient())?;

    let order: Vec<_> = cache.packages().keys().map(PackageName::as_str).collect();
    assert_eq!(order, ["gone_first", "kept", "gone_last"]);
    assert_eq!(cache.resolved().count(), 1);
    assert_eq!(failure(&cache, "gone_first").0, FailureKind::SourceUnavailable);
    assert_eq!(failure(&cache, "gone_last").0, FailureKind::SourceUnavailable);
    Ok(())
}

#[test]
fn ignore_local_does_not_change_the_cache() -> Result<()> {
    let sim = sim_distro()?;
    let index = load(&sim)?;
    let workspace = tempfile::tempdir()?;

    let fresh = generate_distribution_cache(&index, SIM_DISTRO, &transient())?.to_yaml()?;
    let persistent = GenerateOptions {
        ignore_local: false,
        workspace: Some(workspace.path().to_path_buf()),
        ..GenerateOptions::default()
    };
    let first = generate_distribution_cache(&index, SIM_DISTRO, &persistent)?.to_yaml()?;
    // The second run updates the databases created by the first.
    let second = generate_distribution_cache(&index, SIM_DISTRO, &persistent)?.to_yaml()?;

    assert_eq!(fresh, first);
    assert_eq!(fresh, second);
    assert!(workspace.path().join("db").is_dir());
    Ok(())
}

#[test]
fn cache_round_trip() -> Result<()> {
    let sim = sim_distro()?;
    let index = load(&sim)?;
    let cache = generate_distribution_cache(&index, SIM_DISTRO, &transient())?;
    cache.write(&sim.cache_path())?;

    let loaded = DistributionCache::load_from_index(&index, SIM_DISTRO)?;
    assert_eq!(loaded, cache);
    assert_eq!(loaded.to_yaml()?, fs_err::read_to_string(sim.cache_path())?);
    Ok(())
}

#[test]
fn previous_entries_are_reused() -> Result<()> {
    let sim = sim_distro()?;
    let index = load(&sim)?;
    let first = generate_distribution_cache(&index, SIM_DISTRO, &transient())?;

    // Once its repository is gone, `sim_pkg_a` can only come from the previous cache.
    fs_err::remove_dir_all(sim.root().join("repos").join("sim_pkg_a"))?;

    let reused = generate_distribution_cache(
        &index,
        SIM_DISTRO,
        &GenerateOptions {
            previous: Some(first.clone()),
            ..transient()
        },
    )?;
    assert_eq!(reused, first);
    assert_eq!(dependencies(&reused, "sim_pkg_c"), ["sim_pkg_b"]);
    assert_eq!(failure(&reused, "yanked_pkg").0, FailureKind::SourceUnavailable);

    let fresh = generate_distribution_cache(&index, SIM_DISTRO, &transient())?;
    assert_eq!(failure(&fresh, "sim_pkg_a").0, FailureKind::SourceUnavailable);
    Ok(())
}

#[test]
fn version_bump_on_a_moving_reference() -> Result<()> {
    let mut builder = DistributionBuilder::new()?;
    let repository = TestRepository::init(&builder.root().join("repos").join("moving"))?;
    repository
        .write("package.xml", &package_manifest("moving", ""))?
        .commit("Add package manifest")?;
    builder.add_release(
        "moving",
        repository.url()?.as_str(),
        Some(SIM_VERSION),
        Some("main"),
        &[],
    );
    let sim = builder.write("sim")?;
    let first = generate_distribution_cache(&load(&sim)?, "sim", &transient())?;
    assert_eq!(resolved(&first, "moving").version, SIM_VERSION);
    assert_eq!(
        resolved(&first, "moving").release_version.as_deref(),
        Some(SIM_VERSION)
    );

    // The release moves to a new version, while the reference stays `main`.
    repository
        .write(
            "package.xml",
            &package_manifest("moving", "").replace(SIM_VERSION, "0.1.0"),
        )?
        .commit("Release 0.1.0")?;
    edit_distribution(&sim, "version: '0.0.0'", "version: '0.1.0'")?;
    let index = load(&sim)?;

    let updated = generate_distribution_cache(
        &index,
        "sim",
        &GenerateOptions {
            previous: Some(first),
            ..transient()
        },
    )?;
    let fresh = generate_distribution_cache(&index, "sim", &transient())?;
    assert_eq!(updated.to_yaml()?, fresh.to_yaml()?);
    assert_eq!(resolved(&updated, "moving").version, "0.1.0");
    assert_eq!(
        resolved(&updated, "moving").revision.as_str(),
        repository.rev_parse("main")?
    );
    Ok(())
}

#[test]
fn deleted_tags_are_pruned_from_the_workspace() -> Result<()> {
    let sim = sim_distro()?;
    let index = load(&sim)?;
    let workspace = tempfile::tempdir()?;
    let persistent = GenerateOptions {
        ignore_local: false,
        workspace: Some(workspace.path().to_path_buf()),
        ..GenerateOptions::default()
    };

    let first = generate_distribution_cache(&index, SIM_DISTRO, &persistent)?;
    resolved(&first, "sim_pkg_a");

    // The release is withdrawn upstream after the workspace has fetched it.
    TestRepository::open(&sim.root().join("repos").join("sim_pkg_a")).delete_tag(SIM_VERSION)?;

    let updated = generate_distribution_cache(&index, SIM_DISTRO, &persistent)?;
    let fresh = generate_distribution_cache(&index, SIM_DISTRO, &transient())?;
    assert_eq!(updated.to_yaml()?, fresh.to_yaml()?);

    let (kind, reason) = failure(&updated, "sim_pkg_a");
    assert_eq!(kind, FailureKind::MissingRevision);
    assert!(reason.starts_with("None of the references `0.0.0` exist in"), "{reason}");
    Ok(())
}

#[test]
fn unquoted_release_fields() -> Result<()> {
    let mut builder = DistributionBuilder::new()?;
    let repository = TestRepository::init(&builder.root().join("repos").join("numeric"))?;
    repository
        .write("package.xml", &package_manifest("numeric", ""))?
        .commit("Add package manifest")?
        .tag("2")?;
    builder.add_release("numeric", repository.url()?.as_str(), Some("1.0"), Some("2"), &[]);
    let sim = builder.write("sim")?;
    // YAML reads both as numbers once unquoted.
    edit_distribution(&sim, "release: '2'", "release: 2")?;
    edit_distribution(&sim, "version: '1.0'", "version: 1.0")?;

    let cache = generate_distribution_cache(&load(&sim)?, "sim", &transient())?;
    let numeric = resolved(&cache, "numeric");
    assert_eq!(numeric.reference.as_rev(), "2");
    assert_eq!(numeric.release_version.as_deref(), Some("1.0"));
    Ok(())
}

#[test]
fn package_level_failures() -> Result<()> {
    let mut builder = DistributionBuilder::new()?;
    builder.add_package("healthy", &package_manifest("healthy", ""))?;
    builder.add_package("malformed", "<package format=\"3\"><name>malformed</name>")?;
    builder.add_package(
        "nameless",
        indoc! {r#"
            <package format="3">
              <version>0.0.0</version>
            </package>
        "#},
    )?;
    let untagged = TestRepository::init(&builder.root().join("repos").join("untagged"))?;
    untagged
        .write("package.xml", &package_manifest("untagged", ""))?
        .commit("Add package manifest")?;
    builder.add_release(
        "untagged",
        untagged.url()?.as_str(),
        Some("1.0.0-1"),
        Some("release/{distro}/{package}/{version}"),
        &[],
    );
    builder.add_release(
        "unversioned",
        "https://example.com/unversioned.git",
        None,
        None,
        &[],
    );
    let sim = builder.write("sim")?;

    let cache = generate_distribution_cache(&load(&sim)?, "sim", &transient())?;
    assert_eq!(cache.resolved().count(), 1);

    let (kind, reason) = failure(&cache, "malformed");
    assert_eq!(kind, FailureKind::ParseError);
    assert!(reason.starts_with("Failed to parse `package.xml` at `0.0.0`"), "{reason}");

    let (kind, reason) = failure(&cache, "nameless");
    assert_eq!(kind, FailureKind::ParseError);
    assert!(
        reason.ends_with("Package manifest is missing the required `<name>` element"),
        "{reason}"
    );

    let (kind, reason) = failure(&cache, "untagged");
    assert_eq!(kind, FailureKind::MissingRevision);
    assert!(
        reason.starts_with(
            "None of the references `release/sim/untagged/1.0.0-1`, `1.0.0-1` exist in"
        ),
        "{reason}"
    );

    let (kind, reason) = failure(&cache, "unversioned");
    assert_eq!(kind, FailureKind::MissingRevision);
    insta::assert_snapshot!(reason, @"The release of `unversioned` has neither a version nor a `release` tag");
    Ok(())
}

#[test]
fn multiple_packages_per_repository() -> Result<()> {
    let mut builder = DistributionBuilder::new()?;
    let repository = TestRepository::init(&builder.root().join("repos").join("multi"))?;
    repository
        .write("multi_core/package.xml", &package_manifest("multi_core", ""))?
        .write(
            "multi_msgs/package.xml",
            &package_manifest(
                "multi_msgs",
                indoc! {"
                    <depend>multi_core</depend>
                    <depend>multi_core</depend>
                "},
            ),
        )?
        .commit("Add packages")?
        .tag(SIM_VERSION)?;
    builder.add_release(
        "multi",
        repository.url()?.as_str(),
        Some(SIM_VERSION),
        Some(SIM_VERSION),
        &["multi_core", "multi_msgs", "multi_missing"],
    );
    builder.add_unreleased("docs_only");
    let sim = builder.write("sim")?;

    let cache = generate_distribution_cache(&load(&sim)?, "sim", &transient())?;

    let order: Vec<_> = cache.packages().keys().map(PackageName::as_str).collect();
    assert_eq!(order, ["multi_core", "multi_msgs", "multi_missing"]);
    assert_eq!(resolved(&cache, "multi_core").repository.as_str(), "multi");
    assert_eq!(dependencies(&cache, "multi_msgs"), ["multi_core"]);

    let (kind, reason) = failure(&cache, "multi_missing");
    assert_eq!(kind, FailureKind::MissingManifest);
    assert!(
        reason.starts_with(
            "No manifest at `multi_missing/package.xml`, `package.xml` for `0.0.0` in"
        ),
        "{reason}"
    );
    Ok(())
}

#[test]
fn unknown_distribution() -> Result<()> {
    let sim = sim_distro()?;
    let err = generate_distribution_cache(&load(&sim)?, "humble", &transient()).unwrap_err();
    assert!(matches!(err, GenerateError::Index(_)));
    assert!(err.to_string().starts_with("Distribution `humble` is not listed in"));
    Ok(())
}
