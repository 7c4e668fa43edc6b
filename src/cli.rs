use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{config::InputFormat, pipeline::Step, writer::OverwriteMode};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Build the I-94 arrivals warehouse as partitioned Parquet tables",
    long_about = None
)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert the raw inputs into the warehouse tables
    Run(RunArgs),
    /// Preview the first few rows of a written table
    Preview(PreviewArgs),
    /// List the warehouse tables with their partition keys and columns
    Tables(TablesArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// YAML configuration file; command-line flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Directory the input files are resolved against
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Directory the tables are written under
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Immigration input (Parquet file or directory, or a delimited file)
    #[arg(long)]
    pub immigration: Option<PathBuf>,
    /// Format of the immigration input
    #[arg(long = "immigration-format", value_enum)]
    pub immigration_format: Option<InputFormat>,
    /// Repeatable step selection; all steps run when omitted
    #[arg(long = "step", value_enum, action = clap::ArgAction::Append)]
    pub steps: Vec<Step>,
    /// Replace whole tables or only the partitions present in the new data
    #[arg(long, value_enum)]
    pub overwrite: Option<OverwriteMode>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long)]
    pub delimiter: Option<String>,
    /// Character encoding of the delimited inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Run the selected steps concurrently
    #[arg(long)]
    pub parallel: bool,
    /// Write a JSON report of every step's outcome
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Table directory to read (e.g. output/immigration)
    #[arg(short = 't', long = "table")]
    pub table: PathBuf,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct TablesArgs {
    /// Show the columns of this table only
    #[arg(long)]
    pub table: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
