//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod search;
mod state;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{load_settings, LoadOptions, DEFAULT_CUTOFF};
use crate::services::StopSignal;

#[derive(Parser)]
#[command(name = "fda-miner")]
#[command(about = "Deep search of FDA 510(k) summary documents")]
#[command(version)]
pub struct Cli {
    /// Data directory holding the cursor database and the pdf/ tree
    #[arg(long, global = true, env = "FDA_MINER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file path (defaults to fda-miner.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Page through the catalog, OCR each summary and store the artifacts
    Crawl(CrawlArgs),

    /// Score stored artifacts against a term group and write a report
    Search(SearchArgs),

    /// Inspect or change the crawl cursor
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Args)]
pub struct CrawlArgs {
    /// Continue from the saved cursor instead of starting over
    #[arg(short, long)]
    pub restart: bool,

    /// Records per catalog page
    #[arg(short, long)]
    pub limit: Option<u32>,

    /// File for the live hit report ("-" for stdout)
    #[arg(short, long, default_value = "-")]
    pub output: String,

    /// Append to the output file instead of truncating it
    #[arg(short, long)]
    pub append: bool,

    /// Number of document workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<u64>,

    /// Term group used for the live hit report
    #[arg(short, long, default_value = "BE")]
    pub group: String,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Base name for the .json and .dat reports ("-" for stdout)
    #[arg(short, long, default_value = "-")]
    pub output: String,

    /// Named term group
    #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
    pub search: Option<String>,

    /// File with one term per line ("!" prefix excludes)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Delete incomplete artifact folders
    #[arg(short, long)]
    pub purge: bool,

    /// Minimum fuzzy score (0-100) for a term to count
    #[arg(short, long, default_value_t = DEFAULT_CUTOFF,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    pub cutoff: u8,

    /// Result field to sort by (falls back to k_number)
    #[arg(long, default_value = "k_number")]
    pub sortby: String,
}

#[derive(Subcommand)]
enum StateCommands {
    /// Show the cursor offset and run state
    Show,
    /// Ask a running crawl to stop after its current page
    Stop,
    /// Clear a stop request
    Resume,
    /// Start the next crawl from offset 0
    Reset {
        /// Confirm the reset
        #[arg(long)]
        confirm: bool,
    },
}

/// Run the parsed command.
pub async fn run(cli: Cli, stop: StopSignal) -> anyhow::Result<()> {
    let options = LoadOptions {
        config_path: cli.config,
        data_dir: cli.data_dir,
    };
    let settings = load_settings(&options)?;

    match cli.command {
        Commands::Crawl(args) => crawl::cmd_crawl(&settings, &args, stop).await,
        Commands::Search(args) => search::cmd_search(&settings, &args).await,
        Commands::State { command } => match command {
            StateCommands::Show => state::cmd_state_show(&settings),
            StateCommands::Stop => state::cmd_state_stop(&settings),
            StateCommands::Resume => state::cmd_state_resume(&settings),
            StateCommands::Reset { confirm } => state::cmd_state_reset(&settings, confirm),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_requires_exactly_one_source() {
        assert!(Cli::try_parse_from(["fda-miner", "search", "-s", "BE"]).is_ok());
        assert!(Cli::try_parse_from(["fda-miner", "search", "-f", "terms.txt"]).is_ok());
        assert!(Cli::try_parse_from(["fda-miner", "search"]).is_err());
        assert!(
            Cli::try_parse_from(["fda-miner", "search", "-s", "BE", "-f", "terms.txt"]).is_err()
        );
    }

    #[test]
    fn test_crawl_flags() {
        let cli = Cli::try_parse_from([
            "fda-miner", "-v", "crawl", "-r", "-l", "100", "-o", "hits.txt", "-a",
            "--workers", "2", "--max-pages", "5",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Crawl(args) = cli.command else {
            panic!("expected crawl");
        };
        assert!(args.restart);
        assert!(args.append);
        assert_eq!(args.limit, Some(100));
        assert_eq!(args.output, "hits.txt");
        assert_eq!(args.workers, Some(2));
        assert_eq!(args.max_pages, Some(5));
        assert_eq!(args.group, "BE");
    }

    #[test]
    fn test_cutoff_range() {
        assert!(Cli::try_parse_from(["fda-miner", "search", "-s", "AM", "-c", "101"]).is_err());
        let cli = Cli::try_parse_from(["fda-miner", "search", "-s", "AM", "-c", "90"]).unwrap();
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.cutoff, 90);
        assert_eq!(args.sortby, "k_number");
    }
}
