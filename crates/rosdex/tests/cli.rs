use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;

use rosdex_cache::DistributionCache;
use rosdex_distribution::DocumentUrl;
use rosdex_static::EnvVars;
use rosdex_test::{SIM_DISTRO, sim_distro};

/// A `rosdex` command isolated from the caller's environment.
fn rosdex() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_rosdex"));
    command
        .env("NO_COLOR", "1")
        .env_remove(EnvVars::RUST_LOG)
        .env_remove(EnvVars::ROSDISTRO_INDEX_URL)
        .env_remove(EnvVars::ROSDEX_WORKSPACE_DIR)
        .env_remove(EnvVars::ROSDEX_CONCURRENT_FETCHES)
        .env_remove(EnvVars::ROSDEX_IGNORE_LOCAL);
    command
}

fn stderr(output: &std::process::Output) -> Result<String> {
    Ok(String::from_utf8(output.stderr.clone())?)
}

#[test]
fn list() -> Result<()> {
    let sim = sim_distro()?;

    rosdex()
        .arg("list")
        .arg("--index-url")
        .arg(sim.index_path())
        .assert()
        .success()
        .stdout("sim (rolling, ros2)\n");

    // The index location can also come from the environment.
    rosdex()
        .arg("list")
        .env(EnvVars::ROSDISTRO_INDEX_URL, sim.index_url()?.as_str())
        .assert()
        .success()
        .stdout("sim (rolling, ros2)\n");
    Ok(())
}

#[test]
fn build_cache() -> Result<()> {
    let sim = sim_distro()?;

    let assert = rosdex()
        .args(["build-cache", SIM_DISTRO, "--ignore-local", "--index-url"])
        .arg(sim.index_path())
        .assert()
        .success();
    let stderr = stderr(assert.get_output())?;
    assert!(
        stderr.starts_with("Resolved 3 packages of `sim` (1 failed) into "),
        "{stderr}"
    );
    assert!(
        stderr.contains("- yanked_pkg (source_unavailable): Failed to fetch `file:///dev/null`"),
        "{stderr}"
    );

    let cache = DistributionCache::read(&DocumentUrl::from_path(&sim.cache_path())?)?;
    assert_eq!(cache.name(), SIM_DISTRO);
    assert_eq!(cache.resolved().count(), 3);
    assert_eq!(cache.failures().count(), 1);
    Ok(())
}

#[test]
fn build_cache_quiet() -> Result<()> {
    let sim = sim_distro()?;
    let output = sim.root().join("out").join("cache.yaml");

    rosdex()
        .args(["build-cache", "--quiet", "--ignore-local", "--output"])
        .arg(&output)
        .arg("--index-url")
        .arg(sim.index_path())
        .assert()
        .success()
        .stdout("")
        .stderr("");

    assert!(output.is_file());
    assert!(!sim.cache_path().exists());
    Ok(())
}

#[test]
fn rust_log_writes_to_stderr() -> Result<()> {
    let sim = sim_distro()?;

    let assert = rosdex()
        .args(["build-cache", SIM_DISTRO, "--ignore-local", "--index-url"])
        .arg(sim.index_path())
        .env(EnvVars::RUST_LOG, "rosdex_resolver=info")
        .assert()
        .success()
        .stdout("");
    let stderr = stderr(assert.get_output())?;
    assert!(
        stderr.contains("Resolving 4 released repositories of `sim`"),
        "{stderr}"
    );
    // Debug messages stay filtered out.
    assert!(!stderr.contains("Performing a Git fetch"), "{stderr}");
    Ok(())
}

#[test]
fn build_cache_in_workspace() -> Result<()> {
    let sim = sim_distro()?;
    let workspace = tempfile::tempdir()?;

    rosdex()
        .args(["build-cache", SIM_DISTRO, "--concurrency", "2", "--index-url"])
        .arg(sim.index_path())
        .env(EnvVars::ROSDEX_WORKSPACE_DIR, workspace.path())
        .assert()
        .success();

    assert!(workspace.path().join("db").is_dir());
    assert!(sim.cache_path().is_file());
    Ok(())
}

#[test]
fn existing_cache_is_reused() -> Result<()> {
    let sim = sim_distro()?;
    let build = || {
        let mut command = rosdex();
        command
            .args(["build-cache", SIM_DISTRO, "--ignore-local", "--index-url"])
            .arg(sim.index_path());
        command
    };

    build().assert().success();
    let first = fs_err::read_to_string(sim.cache_path())?;

    // Without its repository, `sim_pkg_a` can only be taken from the existing cache.
    fs_err::remove_dir_all(sim.root().join("repos").join("sim_pkg_a"))?;
    build().assert().success();
    assert_eq!(fs_err::read_to_string(sim.cache_path())?, first);

    let assert = build().arg("--preclean").assert().success();
    let stderr = stderr(assert.get_output())?;
    assert!(
        stderr.starts_with("Resolved 2 packages of `sim` (2 failed)"),
        "{stderr}"
    );
    Ok(())
}

#[test]
fn unknown_distribution() -> Result<()> {
    let sim = sim_distro()?;

    let assert = rosdex()
        .args(["build-cache", "humble", "--ignore-local", "--index-url"])
        .arg(sim.index_path())
        .assert()
        .code(2);
    let stderr = stderr(assert.get_output())?;
    assert!(
        stderr.starts_with("error: Distribution `humble` is not listed in `file://"),
        "{stderr}"
    );
    Ok(())
}

#[test]
fn output_requires_a_single_distribution() -> Result<()> {
    let sim = sim_distro()?;

    let assert = rosdex()
        .args(["build-cache", "sim", "other", "--output", "cache.yaml", "--index-url"])
        .arg(sim.index_path())
        .assert()
        .code(1);
    insta::assert_snapshot!(stderr(assert.get_output())?.trim_end(), @"error: `--output` can only be used with a single distribution, but 2 were requested");
    Ok(())
}

#[test]
fn missing_index() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;

    let assert = rosdex()
        .arg("list")
        .arg("--index-url")
        .arg(temp_dir.path().join("index.yaml"))
        .assert()
        .code(2);
    let stderr = stderr(assert.get_output())?;
    assert!(stderr.starts_with("error: Failed to read `file://"), "{stderr}");
    assert!(stderr.contains("Caused by: "), "{stderr}");
    Ok(())
}
