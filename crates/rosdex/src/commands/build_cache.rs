use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::{debug, warn};

use rosdex_cache::DistributionCache;
use rosdex_distribution::{DocumentUrl, Index};
use rosdex_resolver::{GenerateOptions, generate_distribution_cache};

use crate::commands::ExitStatus;
use crate::printer::Printer;

/// The resolved settings of `rosdex build-cache`.
#[derive(Debug, Clone)]
pub(crate) struct BuildCacheSettings {
    pub(crate) ignore_local: bool,
    pub(crate) preclean: bool,
    pub(crate) output: Option<PathBuf>,
    pub(crate) workspace: Option<PathBuf>,
    pub(crate) concurrency: usize,
}

/// Generate the caches of the given distributions, or of every distribution in the index.
pub(crate) fn build_cache(
    index_url: &DocumentUrl,
    distributions: &[String],
    settings: &BuildCacheSettings,
    printer: Printer,
) -> Result<ExitStatus> {
    let index = Index::load(index_url)?;

    let names = if distributions.is_empty() {
        index
            .distributions()
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
    } else {
        distributions.iter().map(String::as_str).collect()
    };

    if settings.output.is_some() && names.len() > 1 {
        writeln!(
            printer.stderr(),
            "{}{} `--output` can only be used with a single distribution, but {} were requested",
            "error".red().bold(),
            ":".bold(),
            names.len()
        )?;
        return Ok(ExitStatus::Failure);
    }

    // Every destination is known before the first repository is fetched.
    let mut targets = Vec::with_capacity(names.len());
    for name in names {
        let destination = if let Some(output) = &settings.output {
            output.clone()
        } else {
            let entry = index.distribution(name)?;
            let Some(path) = entry
                .distribution_cache
                .as_ref()
                .and_then(DocumentUrl::to_file_path)
            else {
                writeln!(
                    printer.stderr(),
                    "{}{} Distribution `{name}` has no local cache location (use `--output` to choose one)",
                    "error".red().bold(),
                    ":".bold(),
                )?;
                return Ok(ExitStatus::Failure);
            };
            path
        };
        targets.push((name, destination));
    }

    for (name, destination) in targets {
        let previous = if settings.preclean {
            None
        } else {
            read_previous(&destination)
        };

        let options = GenerateOptions {
            ignore_local: settings.ignore_local,
            concurrency: settings.concurrency,
            workspace: settings.workspace.clone(),
            previous,
        };
        let cache = generate_distribution_cache(&index, name, &options)?;
        cache
            .write(&destination)
            .with_context(|| format!("Failed to write the cache for `{name}`"))?;

        let failures = cache.failures().count();
        writeln!(
            printer.stderr(),
            "Resolved {} of {} ({} failed) into {}",
            format!("{} packages", cache.resolved().count()).bold(),
            format!("`{name}`").cyan(),
            failures,
            destination.display()
        )?;
        for (package, failed) in cache.failures() {
            writeln!(
                printer.stderr(),
                "  {} {} ({}): {}",
                "-".red(),
                package.bold(),
                failed.failure.kind,
                failed.failure.reason.dimmed()
            )?;
        }
    }

    Ok(ExitStatus::Success)
}

/// Read the cache written by an earlier run, if there is a usable one.
fn read_previous(destination: &Path) -> Option<DistributionCache> {
    if !destination.is_file() {
        debug!("No previous cache at: {}", destination.display());
        return None;
    }
    let cache = DocumentUrl::from_path(destination)
        .map_err(anyhow::Error::from)
        .and_then(|url| Ok(DistributionCache::read(&url)?));
    match cache {
        Ok(cache) => {
            debug!(
                "Reusing {} entries of the previous cache at: {}",
                cache.len(),
                destination.display()
            );
            Some(cache)
        }
        Err(err) => {
            warn!(
                "Ignoring unreadable cache at `{}`: {err}",
                destination.display()
            );
            None
        }
    }
}
