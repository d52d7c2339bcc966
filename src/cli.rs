use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::io_utils::parse_delimiter;

#[derive(Debug, Parser)]
#[command(author, version, about = "Map tabular rows into typed records", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the compiled binding trace of the bundled sample shapes
    Trace(TraceArgs),
    /// Map a CSV file with columns `1`..`10` into ten-column records
    Map(MapArgs),
    /// Compare hand-written and mapped materialisation of in-memory rows
    Bench(BenchArgs),
}

#[derive(Debug, Args)]
pub struct TraceArgs {
    /// Optional YAML file with converter settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    /// Input CSV file (use '-' for stdin)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Maximum number of rows to map
    #[arg(long)]
    pub limit: Option<usize>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Optional YAML file with converter settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BenchArgs {
    /// Number of rows to materialise per run
    #[arg(long, default_value_t = 10_000)]
    pub rows: usize,
    /// Number of timed runs per strategy
    #[arg(long, default_value_t = 5)]
    pub runs: usize,
    /// Optional YAML file with converter settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
