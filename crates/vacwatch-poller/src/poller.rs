//! The polling loop and its lifecycle.
//!
//! One cycle is fetch, dedup, deliver, then sleep for the configured
//! interval. The loop runs as a single spawned task owned by [`Poller`];
//! `start` and `stop` serialize on one lifecycle lock, so at most one task
//! exists at a time and no cycle overlaps a `stop` that has returned.
//!
//! Delivery is at-most-once. A vacancy is marked seen before it is sent, and
//! a failed or cancelled send is not retried on later cycles. Cancellation
//! never interrupts the seen registry update.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use vacwatch_hh::{JobSource, format_posting};
use vacwatch_store::{FilterStore, FilterUpdate, SeenRegistry};

use crate::{Delivery, PollerError, filter_new};

/// Filter store shared between the loop and command handlers.
pub type SharedFilters = Arc<Mutex<FilterStore>>;

/// Seen registry shared between the loop and command handlers.
pub type SharedSeen = Arc<Mutex<SeenRegistry>>;

/// Time constants of the loop.
#[derive(Debug, Clone)]
pub struct PollerTiming {
    /// Length of one interval minute. Shortened in tests.
    pub interval_unit: Duration,
    /// Pause between two deliveries in the same cycle.
    pub message_delay: Duration,
    /// Sleep after a cycle that failed unexpectedly.
    pub error_backoff: Duration,
}

impl Default for PollerTiming {
    fn default() -> Self {
        Self {
            interval_unit: Duration::from_secs(60),
            message_delay: Duration::from_secs(1),
            error_backoff: Duration::from_secs(60),
        }
    }
}

/// Lifecycle state of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Stopped,
    Running,
    /// `stop` was requested and the task is unwinding.
    Cancelling,
}

/// Result of [`Poller::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// What one completed cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Running totals since the poller was created.
#[derive(Debug, Clone, Default)]
pub struct PollerStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub delivered: u64,
    pub failed_deliveries: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Marker for a cycle that observed cancellation.
#[derive(Debug)]
struct Cancelled;

/// Everything the loop task needs.
struct Context {
    filters: SharedFilters,
    seen: SharedSeen,
    source: Arc<dyn JobSource>,
    delivery: Arc<dyn Delivery>,
    timing: PollerTiming,
    stats: RwLock<PollerStats>,
    state: watch::Sender<PollerState>,
}

/// Handle to the spawned loop.
struct RunningTask {
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owner of the polling task.
pub struct Poller {
    ctx: Arc<Context>,
    task: Mutex<Option<RunningTask>>,
}

impl Poller {
    pub fn new(
        filters: SharedFilters,
        seen: SharedSeen,
        source: Arc<dyn JobSource>,
        delivery: Arc<dyn Delivery>,
        timing: PollerTiming,
    ) -> Self {
        let (state, _) = watch::channel(PollerState::Stopped);
        Self {
            ctx: Arc::new(Context {
                filters,
                seen,
                source,
                delivery,
                timing,
                stats: RwLock::new(PollerStats::default()),
                state,
            }),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PollerState {
        *self.ctx.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.ctx.state.subscribe()
    }

    pub async fn stats(&self) -> PollerStats {
        self.ctx.stats.read().await.clone()
    }

    /// Mark polling enabled and spawn the loop unless it is already alive.
    ///
    /// Refuses to start without a search keyword.
    pub async fn start(&self) -> Result<StartOutcome, PollerError> {
        let mut task = self.task.lock().await;

        {
            let mut filters = self.ctx.filters.lock().await;
            if !filters.filters().has_position() {
                return Err(PollerError::MissingPosition);
            }
            if let Err(e) = filters.set(FilterUpdate::Enabled(true)).await {
                warn!(error = %e, "failed to mark polling enabled");
            }
        }

        // A task that already published Stopped is on its way out.
        if let Some(running) = task.as_ref()
            && !running.handle.is_finished()
            && self.state() != PollerState::Stopped
        {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.ctx.state.send_replace(PollerState::Running);
        let handle = tokio::spawn(run_loop(Arc::clone(&self.ctx), cancel_rx));
        *task = Some(RunningTask { cancel_tx, handle });

        info!("poller started");
        Ok(StartOutcome::Started)
    }

    /// Start the loop if the persisted filters say it should be running.
    pub async fn resume_if_enabled(&self) -> Result<Option<StartOutcome>, PollerError> {
        let enabled = self.ctx.filters.lock().await.filters().enabled;
        if !enabled {
            return Ok(None);
        }
        self.start().await.map(Some)
    }

    /// Mark polling disabled, cancel the loop and wait for it to unwind.
    ///
    /// Returns whether a live task was stopped.
    pub async fn stop(&self) -> bool {
        {
            let mut filters = self.ctx.filters.lock().await;
            if let Err(e) = filters.set(FilterUpdate::Enabled(false)).await {
                warn!(error = %e, "failed to mark polling disabled");
            }
        }
        self.cancel_task().await
    }

    /// Cancel the loop for process exit, leaving `enabled` untouched so the
    /// next start resumes polling.
    pub async fn shutdown(&self) -> bool {
        self.cancel_task().await
    }

    async fn cancel_task(&self) -> bool {
        let mut task = self.task.lock().await;
        let Some(running) = task.take() else {
            return false;
        };

        let was_alive = !running.handle.is_finished();
        if was_alive {
            self.ctx.state.send_replace(PollerState::Cancelling);
            let _ = running.cancel_tx.send(true);
        }

        if let Err(e) = running.handle.await {
            error!(error = %e, "poller task ended abnormally");
        }
        self.ctx.state.send_replace(PollerState::Stopped);

        if was_alive {
            info!("poller stopped");
        }
        was_alive
    }
}

/// Run `fut` unless cancellation is requested first.
async fn cancellable<F: Future>(
    cancel: &mut watch::Receiver<bool>,
    fut: F,
) -> Result<F::Output, Cancelled> {
    if *cancel.borrow() {
        return Err(Cancelled);
    }
    tokio::select! {
        biased;

        _ = cancelled(cancel) => Err(Cancelled),
        out = fut => Ok(out),
    }
}

/// Resolve once cancellation is requested or the poller is dropped.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

async fn run_loop(ctx: Arc<Context>, mut cancel: watch::Receiver<bool>) {
    info!("poller loop running");

    loop {
        // Stopped is published under the filters lock so a concurrent start,
        // which flips `enabled` under the same lock, either keeps this loop
        // going or sees it stopped and spawns a new one.
        let keep_going = cancellable(&mut cancel, async {
            let filters = ctx.filters.lock().await;
            if filters.filters().enabled {
                true
            } else {
                mark_stopped(&ctx.state);
                false
            }
        })
        .await;
        match keep_going {
            Ok(true) => {}
            Ok(false) => {
                info!("polling disabled, leaving loop");
                return;
            }
            Err(Cancelled) => break,
        }

        let outcome = AssertUnwindSafe(run_cycle(&ctx, &mut cancel))
            .catch_unwind()
            .await;

        let pause = match outcome {
            Ok(Ok(report)) => {
                record_cycle(&ctx, &report).await;
                let minutes = ctx.filters.lock().await.filters().interval_minutes;
                info!(
                    fetched = report.fetched,
                    new = report.new,
                    delivered = report.delivered,
                    failed = report.failed,
                    next_check_minutes = minutes,
                    "cycle finished"
                );
                ctx.timing.interval_unit * minutes
            }
            Ok(Err(Cancelled)) => break,
            Err(panic) => {
                ctx.stats.write().await.failed_cycles += 1;
                error!(
                    error = %panic_message(panic.as_ref()),
                    backoff = ?ctx.timing.error_backoff,
                    "polling cycle failed, backing off"
                );
                ctx.timing.error_backoff
            }
        };

        if cancellable(&mut cancel, sleep(pause)).await.is_err() {
            break;
        }
    }

    // The disabled exit returns above, having published Stopped under the
    // filters lock; a start may already have published Running since.
    mark_stopped(&ctx.state);
    info!("poller loop finished");
}

/// Running -> Stopped. A stop in progress publishes Stopped itself once it
/// has joined the task.
fn mark_stopped(state: &watch::Sender<PollerState>) {
    state.send_if_modified(|state| {
        if *state == PollerState::Running {
            *state = PollerState::Stopped;
            true
        } else {
            false
        }
    });
}

#[tracing::instrument(skip_all)]
async fn run_cycle(
    ctx: &Context,
    cancel: &mut watch::Receiver<bool>,
) -> Result<CycleReport, Cancelled> {
    let mut report = CycleReport::default();
    info!("checking for new vacancies");

    let filters = cancellable(cancel, async {
        ctx.filters.lock().await.filters().clone()
    })
    .await?;

    let postings = cancellable(cancel, ctx.source.fetch(&filters)).await?;
    report.fetched = postings.len();
    if postings.is_empty() {
        info!("no vacancies received");
        return Ok(report);
    }

    // Not cancellable: ids marked seen here must reach disk.
    let fresh = {
        let mut seen = ctx.seen.lock().await;
        filter_new(postings, &mut seen).await
    };
    report.new = fresh.len();
    if fresh.is_empty() {
        return Ok(report);
    }

    let destination = cancellable(cancel, async {
        ctx.filters.lock().await.filters().chat_id
    })
    .await?;
    let Some(chat_id) = destination else {
        warn!(count = fresh.len(), "no destination chat set, vacancies not sent");
        return Ok(report);
    };

    info!(count = fresh.len(), chat_id, "sending new vacancies");
    for (i, posting) in fresh.iter().enumerate() {
        if i > 0 {
            cancellable(cancel, sleep(ctx.timing.message_delay)).await?;
        }

        let text = format_posting(posting);
        match cancellable(cancel, ctx.delivery.deliver(chat_id, &text)).await? {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                error!(id = %posting.id, error = %e, "failed to send vacancy");
            }
        }
    }

    Ok(report)
}

async fn record_cycle(ctx: &Context, report: &CycleReport) {
    let mut stats = ctx.stats.write().await;
    stats.cycles += 1;
    stats.delivered += report.delivered as u64;
    stats.failed_deliveries += report.failed as u64;
    stats.last_cycle_at = Some(Utc::now());
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
