//! vacwatch: hh.ru vacancy watcher for Telegram
//!
//! Main binary with subcommands:
//! - `run`: Bot daemon (command handling, background polling)
//! - `filters`: Print the saved filters
//! - `clear-history`: Forget every delivered vacancy
//! - `reset`: Restore default filters

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vacwatch_store::{FilterStore, SeenRegistry};

mod bot;
mod config;
mod daemon;

use config::Paths;

#[derive(Parser)]
#[command(name = "vacwatch")]
#[command(about = "Watch hh.ru for new vacancies and send them to Telegram", long_about = None)]
struct Cli {
    /// Directory holding filters.json, seen_vacancies.json and .env
    #[arg(long, global = true, env = "VACWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Run {
        /// Telegram bot token (falls back to TELEGRAM_BOT_TOKEN in <data-dir>/.env)
        #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// hh.ru API base URL
        #[arg(long, env = "VACWATCH_HH_API_URL", default_value = vacwatch_hh::DEFAULT_API_URL)]
        hh_api_url: String,

        /// Telegram Bot API base URL
        #[arg(long, env = "VACWATCH_TELEGRAM_API_URL", default_value = vacwatch_telegram::DEFAULT_API_URL)]
        telegram_api_url: String,
    },

    /// Print the saved filters and history size
    Filters,

    /// Clear the history of seen vacancies
    ClearHistory,

    /// Reset filters to their defaults
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "vacwatch=info,vacwatch_poller=info,vacwatch_hh=info,vacwatch_store=info,vacwatch_telegram=info"
                    .to_string()
            }),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let paths = Paths::new(cli.data_dir.unwrap_or_else(config::default_data_dir));

    match cli.command {
        Commands::Run {
            token,
            hh_api_url,
            telegram_api_url,
        } => {
            let token =
                config::resolve_token(token, &paths).map_err(|e| miette::miette!("{}", e))?;
            daemon::run(daemon::DaemonConfig {
                token,
                paths,
                hh_api_url,
                telegram_api_url,
            })
            .await
        }

        Commands::Filters => show_filters(&paths).await,

        Commands::ClearHistory => {
            let mut seen = SeenRegistry::load(paths.seen()).await;
            let count = seen.count();
            seen.clear().await;
            println!("Cleared {count} seen vacancies");
            Ok(())
        }

        Commands::Reset => {
            let mut filters = FilterStore::load(paths.filters()).await;
            filters.reset().await;
            println!("{}", filters.summary());
            Ok(())
        }
    }
}

async fn show_filters(paths: &Paths) -> Result<()> {
    let filters = FilterStore::load(paths.filters()).await;
    let seen = SeenRegistry::load(paths.seen()).await;

    println!("{}", filters.summary());
    match filters.filters().chat_id {
        Some(chat_id) => println!("Чат: {chat_id}"),
        None => println!("Чат: не задан (отправьте /start боту)"),
    }
    println!("Просмотрено вакансий: {}", seen.count());
    Ok(())
}
