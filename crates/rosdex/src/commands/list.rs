use std::fmt::Write;

use anyhow::Result;
use owo_colors::OwoColorize;

use rosdex_distribution::{DocumentUrl, Index};

use crate::commands::ExitStatus;
use crate::printer::Printer;

/// List the distributions in the index.
pub(crate) fn list(index_url: &DocumentUrl, printer: Printer) -> Result<ExitStatus> {
    let index = Index::load(index_url)?;

    for (name, entry) in index.distributions() {
        let details = [
            entry.distribution_status.as_deref(),
            entry.distribution_type.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

        if details.is_empty() {
            writeln!(printer.stdout(), "{name}")?;
        } else {
            writeln!(
                printer.stdout(),
                "{name} {}",
                format!("({})", details.join(", ")).dimmed()
            )?;
        }

        if printer.is_verbose() {
            for file in &entry.distribution {
                writeln!(printer.stdout(), "  {}", file.dimmed())?;
            }
            if let Some(cache) = &entry.distribution_cache {
                writeln!(printer.stdout(), "  {} {}", "cache:".dimmed(), cache.dimmed())?;
            }
        }
    }

    Ok(ExitStatus::Success)
}
