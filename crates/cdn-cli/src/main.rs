//! CDN certificate control plane
//!
//! Serves the auto-renewal API or runs a single renewal batch from the command line.

mod commands;

use clap::{Parser, Subcommand};
use commands::{RenewCommand, ServeCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CDN_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "CDN_LOG_FORMAT", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve(ServeCommand),
    /// Run one renewal batch and print its summary
    Renew(RenewCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes full control when set
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e))?
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "cdn_certs={level},\
             cdn_cli={level},\
             cdn_core={level},\
             cdn_audit={level},\
             cdn_notifications={level},\
             cdn_database={level},\
             cdn_migrations={level},\
             sqlx=warn,\
             sea_orm=warn,\
             instant_acme=warn,\
             lettre=warn,\
             h2=warn,\
             tower=warn,\
             hyper=warn,\
             rustls=warn",
            level = cli.log_level
        ))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))?;

    match cli.command {
        Commands::Serve(serve_cmd) => serve_cmd.execute(),
        Commands::Renew(renew_cmd) => renew_cmd.execute(),
    }
}
