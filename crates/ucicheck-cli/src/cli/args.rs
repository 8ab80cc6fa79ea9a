use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Include pattern used when no `--include` is given.
pub const DEFAULT_INCLUDE: &str = "*.exe";

#[derive(Parser, Debug)]
#[command(
    name = "ucicheck",
    version,
    about = "UCI protocol conformance harness for chess engine binaries"
)]
pub struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Test every discovered engine and write JSON + Markdown reports
    Run(RunArgs),
    /// Print the engines a run would test, without launching them
    List(DiscoveryArgs),
    /// Re-render the Markdown summary from an existing JSON report
    Render(RenderArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct DiscoveryArgs {
    /// Root directory searched (recursively) for engine binaries
    #[arg(long, default_value = "engines")]
    pub dir: PathBuf,

    /// Glob over paths relative to --dir; repeatable (default: *.exe)
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Glob over file names; excluded files are never tested. Repeatable.
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,
}

impl DiscoveryArgs {
    pub fn includes(&self) -> Vec<String> {
        if self.include.is_empty() {
            vec![DEFAULT_INCLUDE.to_string()]
        } else {
            self.include.clone()
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub discovery: DiscoveryArgs,

    /// YAML harness config (timeouts, go parameters, log dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Multiply every stage deadline by this factor
    #[arg(long)]
    pub timeout_scale: Option<f64>,

    /// Hard cap (ms) on every wait for a bestmove
    #[arg(long)]
    pub max_move_ms: Option<u64>,

    /// Directory for per-engine transcripts
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// JSON report path (default: <out-dir>/engine_test_report_<timestamp>.json)
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Markdown report path (default: <out-dir>/engine_test_report_<timestamp>.md)
    #[arg(long)]
    pub md: Option<PathBuf>,

    #[arg(long, default_value = "results")]
    pub out_dir: PathBuf,

    /// Print the effective config as JSON and exit
    #[arg(long)]
    pub print_config: bool,

    /// Exit 0 even when engines fail their critical stages
    #[arg(long)]
    pub allow_failures: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RenderArgs {
    /// JSON report written by `ucicheck run`
    pub json: PathBuf,

    /// Write Markdown here instead of stdout
    #[arg(long)]
    pub md: Option<PathBuf>,

    #[arg(long, default_value_t = 120)]
    pub detail_max_len: usize,
}
