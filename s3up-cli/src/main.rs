//! s3up - upload files to an S3 bucket
//!
//! Uploads a file (or stdin) to the configured bucket and prints the public
//! location of the stored object.

mod config;
mod input;

use aws_sdk_s3::error::DisplayErrorContext;
use clap::{Parser, Subcommand};
use s3up::Uploader;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "s3up")]
#[command(about = "Upload files to S3 and print their location", long_about = None)]
struct Args {
    #[command(flatten)]
    connection: config::ConnectionArgs,

    /// Config file (TOML); `s3up.toml` in the working directory is used when present
    #[arg(short, long, env = "S3UP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "S3UP_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file and print its location
    Upload {
        /// File to upload, `-` for stdin
        file: PathBuf,

        /// Destination key in the bucket
        key: String,

        /// Content type; guessed from the file extension when omitted
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Delete an object from the bucket
    Delete {
        /// Key of the object to delete
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing; stdout is reserved for the location
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("s3up={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(location) = run(args).await? {
        println!("{}", location);
    }

    Ok(())
}

/// Execute the subcommand; returns the location for uploads
async fn run(args: Args) -> anyhow::Result<Option<String>> {
    let config = args.connection.apply(config::load(args.config.as_deref())?);
    debug!(?config, "Loaded configuration");

    let uploader = Uploader::new(config)?;

    match args.command {
        Command::Upload {
            file,
            key,
            content_type,
        } => {
            let content_type = input::content_type(&file, content_type.as_deref());
            let body = input::open(&file).await?;

            info!(file = %file.display(), key = %key, content_type = %content_type, "Uploading");
            let location = uploader
                .upload(body, &key, &content_type)
                .await
                .map_err(|e| anyhow::anyhow!("upload failed: {}", DisplayErrorContext(&e)))?;

            Ok(Some(location))
        }
        Command::Delete { key } => {
            uploader
                .delete(&key)
                .await
                .map_err(|e| anyhow::anyhow!("delete failed: {}", DisplayErrorContext(&e)))?;

            Ok(None)
        }
    }
}
