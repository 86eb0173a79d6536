//! Command-line front end for the prompt cache.
//!
//! Logs go to stderr (filter with `RUST_LOG`); content and status go to stdout.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use promptcache::cache::Content;
use promptcache::engine::Resolved;
use promptcache::github::{ListingItem, sort_listing};
use promptcache::status::{StatusLevel, StatusMessage};
use promptcache::{App, AppConfig};

#[derive(Parser)]
#[command(version, about = "Browse Markdown prompts from a GitHub repository, online or off.")]
struct Args {
    /// Never touch the network; serve from the local cache only.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory (the repository root by default).
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// Print a document.
    Show { path: String },
    /// List recently viewed documents.
    Recent,
    /// Re-fetch the whole tree and cache every document.
    Refresh,
    /// Drop everything cached locally.
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let app = match App::start(config, !args.offline).await {
        Ok(app) => app,
        Err(e) => {
            print_status(&StatusMessage::from(&e));
            return ExitCode::FAILURE;
        }
    };

    let code = match run(&app, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_status(&StatusMessage::from(&e));
            ExitCode::FAILURE
        }
    };

    app.shutdown().await;
    code
}

async fn run(app: &App, command: Command) -> promptcache::Result<()> {
    match command {
        Command::Ls { path } => {
            let (resolved, revalidation) = app.open_optimistic(&path).await?;
            print_resolved(&resolved);
            if let Some(revalidation) = revalidation {
                if let Some(fresh) = revalidation.changed().await {
                    print_status(&StatusMessage::info("Listing changed upstream"));
                    print_listing(fresh);
                }
            }
        }
        Command::Show { path } => {
            let resolved = app.open(&path).await?;
            print_resolved(&resolved);
        }
        Command::Recent => {
            for entry in app.recent().await? {
                println!(
                    "{}  {}  ({})",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.name,
                    entry.path
                );
            }
        }
        Command::Refresh => {
            let count = app.refresh_all().await?;
            print_status(&StatusMessage::info(format!("Cached {} documents", count)));
        }
        Command::Clear => {
            app.clear_cache().await?;
            print_status(&StatusMessage::info("Cache cleared"));
        }
    }
    Ok(())
}

fn print_resolved(resolved: &Resolved) {
    if resolved.loaded_from_cache() {
        print_status(&StatusMessage::loaded_from_cache(&resolved.path));
    }
    match &resolved.content {
        Content::Listing(items) => print_listing(items.clone()),
        Content::Document(text) => println!("{}", text),
    }
}

fn print_listing(mut items: Vec<ListingItem>) {
    sort_listing(&mut items);
    for item in items {
        if item.is_navigable() {
            println!("{}/", item.name);
        } else {
            println!("{}", item.name);
        }
    }
}

fn print_status(status: &StatusMessage) {
    let prefix = match status.level {
        StatusLevel::Info => "info",
        StatusLevel::Warn => "warning",
        StatusLevel::Error => "error",
    };
    println!("[{}] {}", prefix, status.message);
}
