//! CLI command definitions and dispatch

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tokens::utils::{display_activation, display_time, pretty_size};
use tokens::{validity_window, StoreError, TokenStore};

use crate::config::Config;

/// Share a local file through a single-use, time-limited download link
#[derive(Debug, Parser)]
#[command(name = "onetime", version, about)]
pub struct Cli {
    /// Configuration file (default: onetime.json next to the executable)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a default configuration file to edit before serving
    Config,
    /// Serve the registered links over HTTP
    #[command(alias = "server")]
    Serve,
    /// Register a file and print its one-time link
    #[command(alias = "create")]
    Add {
        /// File to share
        path: PathBuf,
    },
    /// List every registered token
    #[command(alias = "list")]
    Ls,
    /// Delete tokens
    #[command(aliases = ["delete", "rm"])]
    Del {
        /// Token ids to remove
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Drop every expired token from the store
    Purge,
}

impl Cli {
    /// Execute the parsed command
    pub async fn execute(self) -> Result<()> {
        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => Config::default_path()?,
        };

        match self.command {
            Commands::Config => run_config(&config_path),
            Commands::Serve => {
                let (config, store) = setup(&config_path, true)?;
                run_serve(&config_path, config, store).await
            }
            Commands::Add { path } => {
                let (config, store) = setup(&config_path, false)?;
                run_add(&config, &store, &path)
            }
            Commands::Ls => {
                let (config, store) = setup(&config_path, false)?;
                run_ls(&config, &store)
            }
            Commands::Del { ids } => {
                let (_, store) = setup(&config_path, false)?;
                run_del(&store, &ids)
            }
            Commands::Purge => {
                let (_, store) = setup(&config_path, false)?;
                run_purge(&store)
            }
        }
    }
}

/// Load the config, wire up logging, open the store
fn setup(config_path: &Path, serving: bool) -> Result<(Config, TokenStore)> {
    let config = Config::load(config_path)
        .with_context(|| format!("cannot load config {}", config_path.display()))?;
    init_logging(&config, serving)?;
    let store = TokenStore::new(config.token_db.clone());
    Ok((config, store))
}

/// Route logs to the configured file when serving, stderr otherwise
fn init_logging(config: &Config, serving: bool) -> Result<()> {
    let default_filter = if serving { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match config.log_destination() {
        Some(path) if serving => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// `config`: create the default file for the operator to edit
fn run_config(path: &Path) -> Result<()> {
    Config::write_default(path)?;
    println!("config file created: {}", path.display());
    println!("edit it before launching the server");
    Ok(())
}

/// `serve`: print the effective settings and run the HTTP server
async fn run_serve(config_path: &Path, config: Config, store: TokenStore) -> Result<()> {
    let log = match config.log_destination() {
        Some(path) => path.display().to_string(),
        None => "(stderr)".to_string(),
    };
    println!("   config: {}", config_path.display());
    println!(" token db: {}", config.token_db.display());
    println!(" log file: {}", log);
    println!("base addr: {}", config.base_addr);
    println!("   listen: {}", config.listen);

    let server = server::ShareServer::new(store, validity_window());
    server
        .serve(&config.listen)
        .await
        .map_err(|err| anyhow::anyhow!(err))
}

/// `add`: register a file and print the link to hand out
fn run_add(config: &Config, store: &TokenStore, path: &Path) -> Result<()> {
    let added = match store.add(path) {
        Ok(added) => added,
        Err(StoreError::Validation(msg)) => bail!(msg),
        Err(err) => return Err(err).context("cannot update token store"),
    };
    println!();
    println!("A file is ready for download");
    println!("Name: {}", added.name);
    println!("Size: {} bytes", pretty_size(added.size));
    println!("URL: {}/{}", config.link_base(), added.id);
    println!();
    Ok(())
}

/// `ls`: one block per token, oldest first
fn run_ls(config: &Config, store: &TokenStore) -> Result<()> {
    let entries = store.list().context("cannot read token store")?;
    for (id, record) in entries {
        let validity = record
            .expires_at(validity_window())
            .map(display_time)
            .unwrap_or_else(|| "-".to_string());
        println!();
        println!("    token: {}", id);
        println!("      url: {}/{}", config.link_base(), id);
        println!("     file: {}", record.path.display());
        println!("  created: {}", display_time(record.created_at));
        println!("activated: {}", display_activation(record.activated_at));
        println!(" validity: {}", validity);
    }
    println!();
    Ok(())
}

/// `del`: remove tokens; unknown ids are reported, not fatal
fn run_del(store: &TokenStore, ids: &[String]) -> Result<()> {
    for id in ids {
        if store.remove(id)? {
            println!("removing token: {}", id);
        } else {
            println!("no such token: {}", id);
        }
    }
    Ok(())
}

/// `purge`: drop every expired token
fn run_purge(store: &TokenStore) -> Result<()> {
    let purged = store.purge(validity_window())?;
    for id in &purged {
        println!("removing token: {}", id);
    }
    println!("purged {} expired token(s)", purged.len());
    Ok(())
}
