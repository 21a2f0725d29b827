//! CLI module for dataset-cache
//!
//! Inspection subcommands over a cache root:
//! - `list`: index records, optionally for one source
//! - `status`: freshness of the record a query maps to
//! - `show`: print the cached artifact for a query

pub mod list;
pub mod params;
pub mod show;
pub mod status;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::cache::CacheStore;

/// Dataset cache - inspect cached connector datasets
#[derive(Parser)]
#[command(name = "dataset-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Cache root, overriding configuration and environment
    #[arg(long, global = true)]
    pub cache_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List cached records
    List(list::ListArgs),

    /// Report whether a query is cached and fresh
    Status(status::StatusArgs),

    /// Print the cached artifact for a query
    Show(show::ShowArgs),
}

/// Runs a parsed command against the configured cache root
pub async fn run(cli: Cli, config: &AppConfig, out: &mut dyn Write) -> anyhow::Result<()> {
    let root = cli.cache_root.unwrap_or_else(|| config.cache.root.clone());
    let store = CacheStore::open_with(&root, config.cache.index_max_connections).await?;

    match cli.command {
        Command::List(args) => list::run(&args, &store, out).await,
        Command::Status(args) => status::run(&args, &store, out).await,
        Command::Show(args) => show::run(&args, &store, out).await,
    }
}
