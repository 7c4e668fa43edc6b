pub mod aggregate;
pub mod cli;
pub mod columns;
pub mod config;
pub mod context;
pub mod convert;
pub mod data;
pub mod dates;
pub mod error;
pub mod io_utils;
pub mod pipeline;
pub mod preview;
pub mod project;
pub mod schema;
pub mod source;
pub mod table;
pub mod tables;
pub mod writer;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("i94_warehouse", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!("Command: {:?}", cli.command);
    match cli.command {
        Commands::Run(args) => pipeline::execute(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Tables(args) => columns::execute(&args),
    }
}
