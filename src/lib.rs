pub mod cli;
pub mod config;
pub mod data;
pub mod db;
pub mod ddl;
pub mod import;
pub mod infer;
pub mod io_utils;
pub mod mapping;
pub mod naming;
pub mod profile;
pub mod rows;
pub mod schema_cmd;
pub mod source;
pub mod writer;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabload", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => import::execute(&args),
        Commands::Schema(args) => schema_cmd::execute(&args),
    }
}
