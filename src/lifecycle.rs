//! Process lifecycle: spawning activities and shutting them down together.
//!
//! The [`Coordinator`] owns a single [`CancellationToken`]. Every activity it
//! spawns receives a clone; cancelling the token is the only way activities
//! learn about shutdown. Fan-in happens through the `JoinHandle`s kept here.

use futures_util::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where the coordinator is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Nothing spawned yet
    Idle,
    /// At least one activity running
    Running,
    /// Shutdown in progress
    Cancelling,
    /// Every activity has finished or been aborted
    Stopped,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Cancelling,
            _ => Self::Stopped,
        }
    }
}

/// Whether an activity does work after cancellation that must be awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    /// Await the activity on shutdown (e.g. blanking a display)
    Required,
    /// Abort the activity on shutdown
    None,
}

/// How an activity ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    Completed,
    Aborted,
    Panicked,
}

impl fmt::Display for ActivityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Panicked => "panicked",
        };
        f.write_str(text)
    }
}

/// Outcome of every activity: cleanup-bearing ones first, each group in
/// spawn order.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSummary {
    pub activities: Vec<(String, ActivityOutcome)>,
}

impl ShutdownSummary {
    /// Number of activities that ended with `outcome`.
    pub fn count(&self, outcome: ActivityOutcome) -> usize {
        self.activities.iter().filter(|(_, o)| *o == outcome).count()
    }

    /// Outcome of the activity called `name`.
    pub fn outcome(&self, name: &str) -> Option<ActivityOutcome> {
        self.activities
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| *o)
    }
}

struct Activity {
    name: String,
    cleanup: Cleanup,
    handle: JoinHandle<()>,
}

/// Spawns activities and cancels them exactly once.
pub struct Coordinator {
    token: CancellationToken,
    triggered: AtomicBool,
    activities: Vec<Activity>,
    state: AtomicU8,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            triggered: AtomicBool::new(false),
            activities: Vec::new(),
            state: AtomicU8::new(LifecycleState::Idle as u8),
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// A clone of the shared token. Cancelling it from outside has the same
    /// effect as [`Coordinator::shutdown_trigger`].
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn `activity` with its own clone of the token.
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, cleanup: Cleanup, activity: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        debug!("Spawning {} ({:?} cleanup)", name, cleanup);
        let handle = tokio::spawn(activity(self.token.clone()));
        self.activities.push(Activity {
            name,
            cleanup,
            handle,
        });
        if self.state() == LifecycleState::Idle {
            self.set_state(LifecycleState::Running);
        }
    }

    /// Cancel every activity and move to [`LifecycleState::Cancelling`].
    /// Returns `false` if shutdown was already triggered.
    pub fn shutdown_trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.set_state(LifecycleState::Cancelling);
        self.token.cancel();
        true
    }

    /// Wait for SIGINT, SIGTERM, `quit_after` elapsing, or the token being
    /// cancelled elsewhere, then trigger shutdown.
    pub async fn run(&self, quit_after: Option<Duration>) {
        let quit_timer = async {
            match quit_after {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = interrupt() => info!("Interrupted, shutting down"),
            _ = terminate() => info!("Terminated, shutting down"),
            _ = quit_timer => info!("Quitting after {:?}", quit_after.unwrap_or_default()),
            _ = self.token.cancelled() => info!("Shutdown requested"),
        }

        self.shutdown_trigger();
    }

    /// Cancel, wait for every cleanup-bearing activity, abort the rest.
    pub async fn shutdown(&mut self) -> ShutdownSummary {
        self.shutdown_trigger();

        let activities = std::mem::take(&mut self.activities);
        let (required, other): (Vec<_>, Vec<_>) = activities
            .into_iter()
            .partition(|a| a.cleanup == Cleanup::Required);

        for activity in &other {
            activity.handle.abort();
        }

        // Cleanup-bearing activities first, then reap the aborted ones.
        let mut summary = ShutdownSummary::default();
        reap(required, &mut summary).await;
        reap(other, &mut summary).await;

        self.set_state(LifecycleState::Stopped);
        info!(
            "Shutdown complete: {} completed, {} aborted, {} panicked",
            summary.count(ActivityOutcome::Completed),
            summary.count(ActivityOutcome::Aborted),
            summary.count(ActivityOutcome::Panicked)
        );
        summary
    }
}

async fn reap(activities: Vec<Activity>, summary: &mut ShutdownSummary) {
    let (names, handles): (Vec<_>, Vec<_>) = activities
        .into_iter()
        .map(|a| (a.name, a.handle))
        .unzip();

    for (name, result) in names.into_iter().zip(join_all(handles).await) {
        let outcome = match result {
            Ok(()) => ActivityOutcome::Completed,
            Err(e) if e.is_cancelled() => ActivityOutcome::Aborted,
            Err(e) => {
                error!("{} panicked: {}", name, e);
                ActivityOutcome::Panicked
            }
        };
        debug!("{} {}", name, outcome);
        summary.activities.push((name, outcome));
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for SIGINT: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
