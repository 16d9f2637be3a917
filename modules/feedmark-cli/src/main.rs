use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use feedmark_common::Config;
use feedmark_store::{AnchorStore, JsonFileAnchorStore};

mod demo;
mod presenter;

use presenter::{format_time_ago, jump_label};

#[derive(Parser)]
#[command(name = "feedmark", about = "Save and restore reading positions in virtualized feeds")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save a position in a simulated feed, reload it, and restore
    Demo(demo::DemoArgs),
    /// Print the saved position
    Show,
    /// Delete the saved position
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env().add_directive("feedmark=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env()?;
    config.log_summary();

    let store = Arc::new(JsonFileAnchorStore::with_retention(
        config.anchor_path.clone(),
        config.retention(),
    ));

    match cli.command {
        Command::Demo(args) => demo::run(&config, store, &args).await?,
        Command::Show => match store.load_anchor().await? {
            Some(anchor) => {
                println!(
                    "{} saved {} ago",
                    jump_label(Some(&anchor)),
                    format_time_ago(anchor.age(Utc::now()))
                );
                println!("{}", serde_json::to_string_pretty(&anchor)?);
            }
            None => println!("No saved position"),
        },
        Command::Clear => {
            store.clear_anchor().await?;
            info!(path = %store.path().display(), "Cleared saved position");
            println!("Saved position cleared");
        }
    }

    Ok(())
}
