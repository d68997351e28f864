use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use s3mini::cli::commands;
use s3mini::s3::{Acl, StorageClass, StoreOptions};
use s3mini::S3Client;

#[derive(Parser)]
#[command(name = "s3mini")]
#[command(version, about = "Minimal S3 client with SigV2 request signing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<String>,

    /// Profile to use from config
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Disable SSL certificate verification
    #[arg(long, global = true)]
    insecure: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Make bucket
    Mb {
        /// Bucket name (s3://bucket/)
        bucket: String,

        /// Canned ACL for the new bucket
        #[arg(long, default_value = "private")]
        acl: Acl,

        /// Location constraint, e.g. eu-west-1
        #[arg(long)]
        region: Option<String>,
    },

    /// Remove an empty bucket
    Rb {
        /// Bucket name (s3://bucket/)
        bucket: String,
    },

    /// Upload a local file
    Put {
        /// Local file
        source: PathBuf,

        /// Destination (s3://bucket/key)
        destination: String,

        /// Content type (detected from the file when omitted)
        #[arg(long)]
        content_type: Option<String>,

        /// Canned ACL for the object
        #[arg(long, default_value = "private")]
        acl: Acl,

        /// Storage class (standard, reduced-redundancy)
        #[arg(long, default_value = "standard")]
        storage_class: StorageClass,

        /// Do not request server-side encryption
        #[arg(long)]
        no_encrypt: bool,
    },

    /// Print an object to stdout
    Cat {
        /// S3 path (s3://bucket/key)
        path: String,
    },

    /// Download an object to a local file
    Get {
        /// S3 path (s3://bucket/key)
        path: String,

        /// Local destination
        destination: PathBuf,
    },

    /// Check whether a bucket or object exists
    Stat {
        /// S3 path (s3://bucket or s3://bucket/key)
        path: String,
    },

    /// Remove an object
    Rm {
        /// S3 path (s3://bucket/key)
        path: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // One request at a time, so a single thread is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let config = s3mini::config::load_config(cli.config.as_deref(), cli.profile.as_deref())?;
    let mut profile = config
        .get_profile(None)
        .cloned()
        .context("No profile configured")?;
    if cli.insecure {
        profile.insecure_tls = true;
    }

    let mut client = S3Client::from_profile(&profile)?;

    match cli.command {
        Commands::Mb {
            bucket,
            acl,
            region,
        } => {
            commands::cmd_mb(&mut client, &bucket, acl, region).await?;
        }
        Commands::Rb { bucket } => {
            commands::cmd_rb(&mut client, &bucket).await?;
        }
        Commands::Put {
            source,
            destination,
            content_type,
            acl,
            storage_class,
            no_encrypt,
        } => {
            let mut options = StoreOptions::default()
                .with_acl(acl)
                .with_storage_class(storage_class)
                .with_encryption(!no_encrypt);
            options.content_type = content_type;
            commands::cmd_put(&mut client, &source, &destination, &options).await?;
        }
        Commands::Cat { path } => {
            commands::cmd_cat(&mut client, &path, &mut std::io::stdout()).await?;
        }
        Commands::Get { path, destination } => {
            commands::cmd_get(&mut client, &path, &destination).await?;
        }
        Commands::Stat { path } => {
            if !commands::cmd_stat(&mut client, &path).await? {
                std::process::exit(1);
            }
        }
        Commands::Rm { path } => {
            commands::cmd_rm(&mut client, &path).await?;
        }
    }

    Ok(())
}
