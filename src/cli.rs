use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::history::Period;
use crate::plugin::{Category, RiskLevel};

/// Sweep - reclaim disk space with pluggable cleaning modules
#[derive(Parser, Debug)]
#[command(name = "sweep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available cleaning plugins
    List(ListArgs),

    /// Show details about one plugin
    Info(InfoArgs),

    /// Report reclaimable space without deleting anything
    Scan(ScanArgs),

    /// Scan, confirm and delete reclaimable items
    Clean(CleanArgs),

    /// Show space freed by past cleans
    Stats(StatsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Run a privileged batch read from stdin (used through pkexec)
    #[command(name = "clean-as-root", hide = true)]
    CleanAsRoot,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only plugins in this category
    #[arg(short = 'C', long, value_name = "CATEGORY")]
    pub category: Option<Category>,

    /// Highest risk level to show (safe, caution, dangerous)
    #[arg(short, long, value_name = "LEVEL")]
    pub max_risk: Option<RiskLevel>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Plugin id
    #[arg(value_name = "PLUGIN")]
    pub plugin: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Plugin ids to scan (default: all)
    #[arg(value_name = "PLUGIN")]
    pub plugins: Vec<String>,

    /// Scan every plugin in this category
    #[arg(short = 'C', long, value_name = "CATEGORY")]
    pub category: Option<Category>,

    /// Per-plugin timeout in seconds
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Plugin ids to clean (default: all except dangerous ones)
    #[arg(value_name = "PLUGIN")]
    pub plugins: Vec<String>,

    /// Skip confirmation prompts
    #[arg(short, long)]
    pub yes: bool,

    /// Include dangerous plugins when cleaning everything
    #[arg(long)]
    pub allow_dangerous: bool,

    /// Show what would be cleaned without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Per-plugin scan timeout in seconds
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Period to report (today, week, month, all)
    #[arg(short, long, default_value = "all", value_name = "PERIOD")]
    pub period: Period,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
