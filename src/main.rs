use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod init;
mod report;
mod search;
mod stats;
mod syntax;
mod tree;

use config::Config;
use docidx::SearchIndex;
use docidx::index::{self, has_errors};
use init::init_config;
use report::format_issues;
use search::{SearchContext, interactive_search, list_crates, show_item};
use stats::show_stats;
use tree::show_tree;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "docidx")]
#[command(about = "Search and check generated documentation search indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Search index file (overrides `index` from docidx.toml)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Config file (defaults to ./docidx.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colors and signature highlighting
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search item names, paths or function signatures
    Search {
        /// Query, e.g. `Args`, `fn:main`, `clap::Args::command` or `ArgMatches -> Result`
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Only search the named crate (repeatable)
        #[arg(long = "crate")]
        crates: Vec<String>,

        /// Maximum number of results (0 for all)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one item by its full path
    Show {
        /// Full path, e.g. `robot_head_service::RobotHeadCommand::pitch`
        path: String,
    },
    /// Show the item tree of a crate
    Tree {
        /// Crate to show (shows every crate if not specified)
        #[arg(value_name = "CRATE")]
        krate: Option<String>,
    },
    /// List the crates in the index
    Crates,
    /// Check the index for internal consistency
    Check,
    /// Show per-crate item statistics
    Stats,
    /// Interactive search
    Interactive,
    /// Initialize a new docidx.toml configuration file
    Init {
        /// Overwrite existing docidx.toml if present
        #[arg(long)]
        force: bool,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn setup_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path).map_err(anyhow::Error::msg)?,
        None => Config::load(),
    };

    // CLI flags override config file
    if let Some(index) = &cli.index {
        config.index = index.clone();
    }
    if cli.no_color {
        config.highlight = false;
    }

    Ok(config)
}

fn load_index(path: &Path) -> Result<SearchIndex> {
    Ok(index::load(path)?)
}

/// Validate without decoding, so that broken indexes can still be reported
fn check(path: &Path) -> Result<()> {
    let source = index::read_index_file(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let json = index::extract_json(&source)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let records = index::parse_records(&json)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let issues = index::validate_all(&records);

    print!("{}", format_issues(&issues, records.len()));

    if has_errors(&issues) {
        return Err(anyhow!("{} is not a consistent search index", path.display()));
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Init { force } = cli.command {
        return init_config(Path::new("."), force).map_err(anyhow::Error::msg);
    }

    let config = load_config(&cli)?;

    if let Commands::Check = cli.command {
        return check(&config.index);
    }

    let index = load_index(&config.index)?;
    let ctx = SearchContext {
        index: &index,
        config: &config,
    };

    match cli.command {
        Commands::Search {
            query,
            crates,
            limit,
            json,
        } => search::search(&ctx, &query.join(" "), &crates, limit, json),
        Commands::Show { path } => show_item(&ctx, &path),
        Commands::Tree { krate } => show_tree(&index, krate.as_deref()),
        Commands::Crates => {
            list_crates(&index);
            Ok(())
        }
        Commands::Stats => show_stats(&index, &config.index).map_err(anyhow::Error::msg),
        Commands::Interactive => interactive_search(&ctx),
        Commands::Check | Commands::Init { .. } => Ok(()),
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    setup_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("\n{} {}", "❌".red(), format!("{e:#}").red());
        std::process::exit(1);
    }
}
