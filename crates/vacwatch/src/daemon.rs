//! The `run` command: bot update loop plus the background poller.
//!
//! Startup order:
//! - Validate the bot token with `getMe`
//! - Load filters and the seen registry from the data directory
//! - Build the poller and resume it if polling was enabled at last exit
//! - Long-poll Telegram for commands until Ctrl-C

use std::sync::Arc;
use std::time::Duration;

use miette::Result;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use vacwatch_hh::{HhClient, HhConfig};
use vacwatch_poller::{Poller, PollerTiming};
use vacwatch_store::{FilterStore, SeenRegistry};
use vacwatch_telegram::TelegramClient;

use crate::bot::CommandHandler;
use crate::config::Paths;

/// Server-side wait of one `getUpdates` call.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed `getUpdates` call.
const UPDATE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Configuration for the daemon.
pub struct DaemonConfig {
    pub token: String,
    pub paths: Paths,
    pub hh_api_url: String,
    pub telegram_api_url: String,
}

pub async fn run(config: DaemonConfig) -> Result<()> {
    info!(data_dir = %config.paths.data_dir().display(), "starting vacwatch daemon");

    let telegram = Arc::new(
        TelegramClient::new(&config.telegram_api_url, &config.token)
            .map_err(|e| miette::miette!("failed to create Telegram client: {}", e))?,
    );
    let me = telegram
        .get_me()
        .await
        .map_err(|e| miette::miette!("failed to validate bot token: {}", e))?;
    info!(
        bot_id = me.id,
        username = me.username.as_deref().unwrap_or("-"),
        "bot token validated"
    );

    let filters = Arc::new(Mutex::new(FilterStore::load(config.paths.filters()).await));
    let seen = Arc::new(Mutex::new(SeenRegistry::load(config.paths.seen()).await));

    let hh = HhClient::new(HhConfig::default().with_base_url(config.hh_api_url))
        .map_err(|e| miette::miette!("failed to create hh.ru client: {}", e))?;

    let poller = Arc::new(Poller::new(
        Arc::clone(&filters),
        Arc::clone(&seen),
        Arc::new(hh),
        telegram.clone(),
        PollerTiming::default(),
    ));
    match poller.resume_if_enabled().await {
        Ok(Some(_)) => info!("polling resumed from saved state"),
        Ok(None) => debug!("polling disabled in saved state"),
        Err(e) => warn!(error = %e, "could not resume polling"),
    }

    let handler = CommandHandler::new(filters, seen, Arc::clone(&poller));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx_clone.send(true);
    });

    poll_updates(&telegram, &handler, shutdown_rx, LONG_POLL_TIMEOUT).await;

    poller.shutdown().await;
    drop(shutdown_tx);
    info!("vacwatch daemon stopped");
    Ok(())
}

/// Long-poll for chat messages and answer each one until shutdown.
async fn poll_updates(
    telegram: &TelegramClient,
    handler: &CommandHandler,
    mut shutdown_rx: watch::Receiver<bool>,
    long_poll: Duration,
) {
    info!("update poller started");
    let mut offset: Option<i64> = None;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let result = tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }

            result = telegram.get_updates(offset, long_poll) => result,
        };

        let updates = match result {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "update poll failed");
                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => {}
                    _ = tokio::time::sleep(UPDATE_RETRY_DELAY) => {}
                }
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };

            let chat_id = message.chat.id;
            debug!(chat_id, "incoming message");
            let reply = handler.handle(chat_id, &text).await;
            if let Err(e) = telegram.send_message(chat_id, &reply).await {
                warn!(chat_id, error = %e, "failed to send reply");
            }
        }
    }

    info!("update poller stopped");
}
