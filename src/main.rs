//! dockant-sync - realtime mirror of a Docker Ant backend.
//!
//! Usage:
//!   dockant-sync watch                      # Tail live activity
//!   dockant-sync containers|images|...      # One-shot collection dump
//!   dockant-sync export [--out <path>]      # Write the activity log file

use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};
use dockant_sync::{activity, api::DockerApi, sync, CollectionKey, SyncContext, WsConnector};

#[derive(Parser, Debug)]
#[command(name = "dockant-sync")]
#[command(about = "Realtime sync client for the Docker Ant backend")]
struct Args {
    /// Backend host and port
    #[arg(long, global = true, default_value = "localhost:8080")]
    host: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to the realtime channel and print activity as it happens
    Watch,
    /// List containers
    Containers,
    /// List images
    Images,
    /// List networks
    Networks,
    /// List volumes
    Volumes,
    /// Download the backend activity log as a text file
    Export {
        /// Output path (defaults to a dated filename in the current dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Watch => watch(&args.host).await,
        Commands::Containers => dump(&args.host, CollectionKey::Containers).await,
        Commands::Images => dump(&args.host, CollectionKey::Images).await,
        Commands::Networks => dump(&args.host, CollectionKey::Networks).await,
        Commands::Volumes => dump(&args.host, CollectionKey::Volumes).await,
        Commands::Export { out } => export(&args.host, out).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        exit(1);
    }
}

/// Run the sync actor and tail the activity log until ctrl-c.
async fn watch(host: &str) -> dockant_sync::Result<()> {
    let ctx = SyncContext::new();
    let mut entries = ctx.log.read().await.subscribe();
    let handle = sync::spawn(ctx.clone(), WsConnector::new(host));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            entry = entries.recv() => {
                if let Ok(entry) = entry {
                    println!("{}", entry.render_line());
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

async fn dump(host: &str, key: CollectionKey) -> dockant_sync::Result<()> {
    let ctx = SyncContext::new();
    let api = DockerApi::new(host, ctx)?;
    let snapshot = api.list(key).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).unwrap_or_default()
    );
    Ok(())
}

async fn export(host: &str, out: Option<PathBuf>) -> dockant_sync::Result<()> {
    let ctx = SyncContext::new();
    let api = DockerApi::new(host, ctx)?;
    let mut entries = api.fetch_activity().await?;
    // Backend returns oldest-first; the export format is newest-first.
    entries.reverse();

    let path = out.unwrap_or_else(|| PathBuf::from(activity::export_filename(chrono::Utc::now())));
    let body = activity::export_text(entries.iter());
    std::fs::write(&path, body)?;
    println!("Wrote {} entries to {}", entries.len(), path.display());
    Ok(())
}
