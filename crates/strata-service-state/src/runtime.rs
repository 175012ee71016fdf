use crate::config::ServiceStateConfig;
use crate::notify::{EventKind, NotificationHub, Observer};
use crate::radio::{QueryReply, RawReply};
use crate::session::selector::DataSessionHandle;
use crate::state::Snapshot;
use crate::tracker::{Collaborators, CycleReport, Reconciler};
use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, select, Receiver, RecvError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Control messages sent to the worker via crossbeam channel.
enum ControlMessage {
    Poll,
    CardRecordsLoaded,
    SignalStrength(RawReply),
    Shutdown,
}

enum WorkerEvent {
    Control(Result<ControlMessage, RecvError>),
    Reply(Result<QueryReply, RecvError>),
    Expired,
}

/// Thread-safe handle to the service-state tracker.
///
/// Owns a background thread that runs the [`Reconciler`]: it starts polling
/// cycles on request, merges radio replies as they arrive and gives up on
/// cycles that outlive the configured query timeout.
///
/// Readers never touch the worker: [`ServiceStateRuntime::snapshot`] loads
/// the last committed snapshot directly.
///
/// Dropping the runtime triggers a graceful shutdown of the worker thread.
pub struct ServiceStateRuntime {
    control_tx: Sender<ControlMessage>,
    shutdown: Arc<AtomicBool>,
    committed: Arc<ArcSwap<Snapshot>>,
    commits: Arc<AtomicU64>,
    hub: Arc<NotificationHub>,
    sessions: DataSessionHandle,
    handle: Option<thread::JoinHandle<()>>,
}

impl ServiceStateRuntime {
    /// Builds the reconciler and starts the worker. Nothing is polled until
    /// [`ServiceStateRuntime::request_poll`].
    pub fn start(config: ServiceStateConfig, deps: Collaborators) -> anyhow::Result<Self> {
        let reconciler = Reconciler::new(config, deps)?;
        let committed = reconciler.shared_snapshot();
        let hub = reconciler.hub();
        let sessions = reconciler.sessions();

        let (control_tx, control_rx) = bounded(64);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let commits = Arc::new(AtomicU64::new(0));
        let commits_clone = commits.clone();

        let handle = thread::Builder::new()
            .name("service-state".into())
            .spawn(move || runtime_worker(reconciler, control_rx, shutdown_clone, commits_clone))
            .map_err(|e| anyhow::anyhow!("Failed to spawn service-state worker: {}", e))?;

        Ok(Self {
            control_tx,
            shutdown,
            committed,
            commits,
            hub,
            sessions,
            handle: Some(handle),
        })
    }

    /// Starts a new polling cycle, superseding any cycle still in flight.
    pub fn request_poll(&self) -> anyhow::Result<()> {
        self.control_tx
            .send(ControlMessage::Poll)
            .map_err(|e| anyhow::anyhow!("Failed to request poll: {}", e))
    }

    /// Card records are available; reloads the home network table and polls.
    pub fn card_records_loaded(&self) -> anyhow::Result<()> {
        self.control_tx
            .send(ControlMessage::CardRecordsLoaded)
            .map_err(|e| anyhow::anyhow!("Failed to signal card records: {}", e))
    }

    /// Forwards an unsolicited signal report.
    pub fn push_signal_strength(&self, raw: RawReply) -> anyhow::Result<()> {
        self.control_tx
            .send(ControlMessage::SignalStrength(raw))
            .map_err(|e| anyhow::anyhow!("Failed to send signal report: {}", e))
    }

    /// The last committed snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.committed.load_full()
    }

    /// Number of snapshots committed by polling cycles so far.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }

    pub fn subscribe(&self, kind: EventKind, observer: Arc<dyn Observer>) -> bool {
        self.hub.subscribe(kind, observer)
    }

    pub fn unsubscribe(&self, kind: EventKind, observer: &Arc<dyn Observer>) -> bool {
        self.hub.unsubscribe(kind, observer)
    }

    /// Session requests go to whichever strategy is active when they run.
    pub fn sessions(&self) -> DataSessionHandle {
        self.sessions.clone()
    }

    /// Gracefully shuts down the worker thread. Idempotent.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.control_tx.send(ControlMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ServiceStateRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn runtime_worker(
    mut reconciler: Reconciler,
    control_rx: Receiver<ControlMessage>,
    shutdown: Arc<AtomicBool>,
    commits: Arc<AtomicU64>,
) {
    let replies = reconciler.reply_receiver();
    info!("service-state worker started");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        let event = match reconciler.deadline() {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                select! {
                    recv(control_rx) -> msg => WorkerEvent::Control(msg),
                    recv(replies) -> reply => WorkerEvent::Reply(reply),
                    default(wait) => WorkerEvent::Expired,
                }
            }
            None => select! {
                recv(control_rx) -> msg => WorkerEvent::Control(msg),
                recv(replies) -> reply => WorkerEvent::Reply(reply),
            },
        };

        let report = match event {
            WorkerEvent::Control(Ok(msg)) => match msg {
                ControlMessage::Poll => reconciler.poll_state(),
                ControlMessage::CardRecordsLoaded => reconciler.on_card_records_loaded(),
                ControlMessage::SignalStrength(raw) => {
                    reconciler.on_signal_strength(&raw);
                    None
                }
                ControlMessage::Shutdown => break,
            },
            WorkerEvent::Control(Err(_)) => break,
            WorkerEvent::Reply(Ok(reply)) => reconciler.handle_reply(reply),
            // The reconciler holds a sender; this cannot disconnect.
            WorkerEvent::Reply(Err(_)) => None,
            WorkerEvent::Expired => {
                if let Some(cycle) = reconciler.in_flight() {
                    warn!(%cycle, "polling cycle timed out");
                }
                reconciler.expire_in_flight()
            }
        };

        if let Some(report) = report {
            record(&report);
            commits.fetch_add(1, Ordering::AcqRel);
        }
    }

    debug!("service-state worker stopped");
}

fn record(report: &CycleReport) {
    debug!(
        cycle = %report.cycle,
        events = report.transitions.fired().len(),
        delivered = report.delivered,
        anomalies = report.anomalies.len(),
        failed = report.failed_queries.len(),
        "cycle committed"
    );
}
