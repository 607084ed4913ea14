//! blobstack CLI - Command line interface for a configured blob stack
//!
//! Builds the stack described by a config file (or a bare authority root)
//! and runs a single operation against it.

use anyhow::Context;
use blobstack::StackConfig;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blobstack")]
#[command(about = "A layered blob store with LRU, tiered caching and namespaces")]
#[command(version)]
struct Cli {
    /// Path to the stack config file (default: ~/.config/blobstack/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Authority root for a stack without caches, instead of a config file
    #[arg(short, long, conflicts_with = "config")]
    root: Option<PathBuf>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a blob
    Put {
        /// The blob key
        key: String,
        /// Read the blob from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Fetch a blob
    Get {
        /// The blob key
        key: String,
        /// Write the blob to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a blob
    Delete {
        /// The blob key
        key: String,
    },

    /// Check whether a blob exists
    Contains {
        /// The blob key
        key: String,
    },

    /// Show the resolved stack configuration
    Info,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let build = || {
        config
            .build_with_populations()
            .context("Failed to build stack")
    };

    match cli.command {
        Commands::Info => {
            output(&cli.format, &serde_json::to_value(&config)?)?;
        }

        Commands::Put { key, file } => {
            let (store, populations) = build()?;
            let length = match file {
                Some(path) => {
                    let mut file = File::open(&path)
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    let length = file.metadata()?.len();
                    store.put(&key, &mut file, length)?;
                    length
                }
                None => {
                    let mut data = Vec::new();
                    io::stdin().read_to_end(&mut data)?;
                    store.put_bytes(&key, &data)?;
                    data.len() as u64
                }
            };
            populations.wait_idle();
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "length": length
                }),
            )?;
        }

        Commands::Get { key, output: path } => {
            let (store, populations) = build()?;
            let mut blob = store.get(&key)?;
            let length = blob.length();
            match path {
                Some(path) => {
                    let mut file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    let copied = io::copy(&mut blob, &mut file)?;
                    anyhow::ensure!(
                        copied == length,
                        "Blob {} ended after {} of {} bytes",
                        key,
                        copied,
                        length
                    );
                    populations.wait_idle();
                    output(
                        &cli.format,
                        &serde_json::json!({
                            "status": "ok",
                            "key": key,
                            "length": length,
                            "output": path.display().to_string()
                        }),
                    )?;
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    io::copy(&mut blob, &mut stdout)?;
                    stdout.flush()?;
                    populations.wait_idle();
                }
            }
        }

        Commands::Delete { key } => {
            let (store, _) = build()?;
            store.delete(&key)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key
                }),
            )?;
        }

        Commands::Contains { key } => {
            let (store, _) = build()?;
            let exists = store.contains(&key)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "key": key,
                    "exists": exists
                }),
            )?;
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> anyhow::Result<StackConfig> {
    if let Some(root) = &cli.root {
        return Ok(StackConfig::authority_only(root));
    }

    let path = match &cli.config {
        Some(path) => path.clone(),
        None => StackConfig::default_path()?,
    };
    Ok(StackConfig::load(&path)?)
}

fn output(format: &OutputFormat, value: &serde_json::Value) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Text => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}
