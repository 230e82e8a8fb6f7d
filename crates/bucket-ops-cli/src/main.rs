use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Context, OutputFormat, StorageSource};

#[derive(Parser)]
#[command(name = "bucket-ops")]
#[command(about = "Bulk list, stat, delete and transfer for object storage", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML configuration file
    #[arg(short, long, global = true, conflicts_with = "url")]
    config: Option<PathBuf>,

    /// Storage URL (s3://bucket/prefix?region=..., file:///path, memory://)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Keys per batch for bulk stat / delete (overrides the config file)
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Concurrent batches for bulk stat / delete (overrides the config file)
    #[arg(long, global = true)]
    batch_concurrency: Option<usize>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List keys under a prefix
    List {
        /// Key prefix to list
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Show size, last modified time and hash for every key
        #[arg(short, long)]
        long: bool,

        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show size and status of one or more keys
    Stat {
        /// Keys to stat
        #[arg(required = true)]
        keys: Vec<String>,

        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete keys, or every key under a prefix
    Delete {
        /// Keys to delete
        #[arg(required_unless_present = "prefix", conflicts_with = "prefix")]
        keys: Vec<String>,

        /// Delete every key starting with this prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Upload a local file
    Upload {
        /// Local file to upload
        file: PathBuf,

        /// Destination key
        key: String,
    },

    /// Download a key into a local file, resuming a partial download
    Download {
        /// Key to download
        key: String,

        /// Local destination path
        path: PathBuf,
    },

    /// Write an object, or a byte range of it, to stdout
    Cat {
        /// Key to read
        key: String,

        /// First byte to read; -1 reads the last `size` bytes
        #[arg(long, allow_negative_numbers = true)]
        offset: Option<i64>,

        /// Number of bytes to read (requires --offset)
        #[arg(long, requires = "offset")]
        size: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    // Priority: RUST_LOG env var > verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let source = match (cli.config, cli.url) {
        (Some(path), _) => StorageSource::File(path),
        (None, Some(url)) => StorageSource::Url(url),
        (None, None) => anyhow::bail!("either --config or --url is required"),
    };
    let ctx = Context::load(source, cli.batch_size, cli.batch_concurrency, cancel)?;

    match cli.command {
        Commands::List {
            prefix,
            long,
            format,
        } => {
            commands::list::run(&ctx, &prefix, long, OutputFormat::from(format.as_str())).await?;
        }
        Commands::Stat { keys, format } => {
            commands::stat::run(&ctx, &keys, OutputFormat::from(format.as_str())).await?;
        }
        Commands::Delete { keys, prefix } => {
            commands::delete::run(&ctx, &keys, prefix.as_deref()).await?;
        }
        Commands::Upload { file, key } => {
            commands::transfer::upload(&ctx, &file, &key).await?;
        }
        Commands::Download { key, path } => {
            commands::transfer::download(&ctx, &key, &path).await?;
        }
        Commands::Cat { key, offset, size } => {
            commands::transfer::cat(&ctx, &key, offset, size).await?;
        }
    }

    Ok(())
}
