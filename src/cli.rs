use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Enriches a CSV of businesses with Maps listings and generated copy.
#[derive(Parser, Debug)]
#[command(
    name = "business-enricher",
    version,
    about = "Enrich business listings with Google Maps data and generated About sections",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process an input CSV and write the enriched table
    Run(RunArgs),
    /// Probe both API keys and print a report
    CheckKeys(CheckKeysArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Input CSV with Business Name, Address and Telephone columns
    #[arg(long, short = 'i', value_name = "CSV")]
    pub input: PathBuf,

    /// Destination CSV; rewritten at every checkpoint
    #[arg(long, short = 'o', value_name = "CSV")]
    pub output: PathBuf,

    /// Process only the first N records
    #[arg(long, short = 'l', value_name = "N")]
    pub limit: Option<usize>,

    /// Write the output after every N finalized records (overrides CHECKPOINT_EVERY)
    #[arg(long, value_name = "N")]
    pub checkpoint_every: Option<usize>,

    /// Pause between records in milliseconds (overrides RECORD_DELAY_MS)
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Skip the confirmation and record-limit prompts
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Do not probe the API keys before processing
    #[arg(long)]
    pub skip_key_check: bool,
}

#[derive(Parser, Debug)]
pub struct CheckKeysArgs {
    /// Emit the report as JSON
    #[arg(long)]
    pub json: bool,
}
