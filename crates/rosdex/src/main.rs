use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use anstream::eprintln;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use etcetera::BaseStrategy;
use owo_colors::OwoColorize;

use rosdex_distribution::DocumentUrl;
use rosdex_resolver::GenerateOptions;
use rosdex_static::EnvVars;

use crate::commands::{BuildCacheSettings, ExitStatus};

mod commands;
mod logging;
mod printer;

/// The index read when neither `--index-url` nor `ROSDISTRO_INDEX_URL` is given.
const DEFAULT_INDEX_URL: &str =
    "https://raw.githubusercontent.com/ros/rosdistro/master/index-v4.yaml";

#[derive(Parser)]
#[command(name = "rosdex", author, version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Do not print any output.
    #[arg(global = true, long, short, conflicts_with = "verbose")]
    quiet: bool,

    /// Use verbose output.
    #[arg(global = true, long, short, conflicts_with = "quiet")]
    verbose: bool,

    #[command(flatten)]
    index_args: IndexArgs,
}

#[derive(Args)]
struct IndexArgs {
    /// The URL or local path of the distribution index.
    #[arg(
        global = true,
        long,
        env = EnvVars::ROSDISTRO_INDEX_URL,
        default_value = DEFAULT_INDEX_URL
    )]
    index_url: DocumentUrl,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the package caches of one or more distributions.
    BuildCache(BuildCacheArgs),
    /// List the distributions in the index.
    List,
}

#[derive(Args)]
struct BuildCacheArgs {
    /// The distributions to generate caches for. Defaults to every distribution in the index.
    distributions: Vec<String>,

    /// Fetch every repository into a temporary directory instead of the persistent workspace.
    #[arg(long, env = EnvVars::ROSDEX_IGNORE_LOCAL, value_parser = clap::builder::BoolishValueParser::new())]
    ignore_local: bool,

    /// Resolve every package again instead of reusing the entries of an existing cache.
    #[arg(long)]
    preclean: bool,

    /// Write the cache to the given path instead of the location listed in the index.
    ///
    /// Required when the index is not on the local filesystem.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// The directory to keep persistent Git databases in.
    ///
    /// Defaults to `$XDG_CACHE_HOME/rosdex` or `$HOME/.cache/rosdex` on Linux and macOS, and
    /// `%LOCALAPPDATA%\rosdex` on Windows.
    #[arg(long, env = EnvVars::ROSDEX_WORKSPACE_DIR)]
    workspace: Option<PathBuf>,

    /// The maximum number of repositories fetched at the same time. Defaults to the number of
    /// available CPUs.
    #[arg(long, env = EnvVars::ROSDEX_CONCURRENT_FETCHES)]
    concurrency: Option<NonZeroUsize>,
}

/// Returns the default directory for persistent Git databases.
fn user_workspace_dir() -> Option<PathBuf> {
    etcetera::base_strategy::choose_base_strategy()
        .ok()
        .map(|dirs| dirs.cache_dir().join("rosdex"))
}

fn inner() -> Result<ExitStatus> {
    let cli = Cli::parse();

    logging::setup_logging(if cli.verbose {
        logging::Level::Verbose
    } else if cli.quiet {
        logging::Level::Quiet
    } else {
        logging::Level::Default
    })?;

    let printer = if cli.quiet {
        printer::Printer::Quiet
    } else if cli.verbose {
        printer::Printer::Verbose
    } else {
        printer::Printer::Default
    };

    let index_url = cli.index_args.index_url;

    match cli.command {
        Commands::BuildCache(args) => {
            let settings = BuildCacheSettings {
                ignore_local: args.ignore_local,
                preclean: args.preclean,
                output: args.output,
                workspace: args.workspace.or_else(user_workspace_dir),
                concurrency: args
                    .concurrency
                    .map_or_else(GenerateOptions::default_concurrency, NonZeroUsize::get),
            };
            commands::build_cache(&index_url, &args.distributions, &settings, printer)
        }
        Commands::List => commands::list(&index_url, printer),
    }
}

fn main() -> ExitCode {
    match inner() {
        Ok(code) => code.into(),
        Err(err) => {
            let mut causes = err.chain();
            if let Some(cause) = causes.next() {
                eprintln!("{}: {}", "error".red().bold(), cause);
            }
            for err in causes {
                eprintln!("  {}: {}", "Caused by".red().bold(), err);
            }
            ExitStatus::Error.into()
        }
    }
}
