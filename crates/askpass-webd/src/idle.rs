//! Idle shutdown supervision.
//!
//! The daemon typically runs inside an initramfs, where a web server left
//! running after the disks are unlocked only holds on to resources. The
//! [`IdleSupervisor`] watches request activity and asks the server to shut
//! down once nothing has arrived for the configured idle timeout.
//!
//! # States
//!
//! ```text
//! Active ──(idle timeout)──▶ IdleTriggered ──▶ ShuttingDown ──(drained | grace elapsed)──▶ Terminated
//!   ▲  │
//!   └──┘ touch()
//! ```
//!
//! Every request calls [`IdleSupervisor::touch`], which pushes the deadline
//! out while the supervisor is `Active`. The timer task and `touch` both
//! inspect and change the state under one mutex, so a request racing the
//! deadline either resets it or observes that shutdown already started;
//! shutdown is never entered twice and a successful reset is never lost.
//!
//! A zero idle timeout disables supervision: the supervisor stays `Active`
//! forever and never requests shutdown.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default upper bound on graceful shutdown.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Lifecycle state of the supervised server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Serving; requests reset the idle timer.
    Active,
    /// The idle timeout expired.
    IdleTriggered,
    /// Graceful shutdown in progress, bounded by the grace period.
    ShuttingDown,
    /// Shutdown finished or the grace period ran out.
    Terminated,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::Active => write!(f, "active"),
            SupervisorState::IdleTriggered => write!(f, "idle_triggered"),
            SupervisorState::ShuttingDown => write!(f, "shutting_down"),
            SupervisorState::Terminated => write!(f, "terminated"),
        }
    }
}

struct Machine {
    state: SupervisorState,
    deadline: Instant,
}

struct Shared {
    idle_timeout: Duration,
    grace_period: Duration,
    machine: Mutex<Machine>,
    state_tx: watch::Sender<SupervisorState>,
    drained: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Machine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next`, publishing it to observers while the lock is held so
    /// that observers see transitions in order.
    fn transition(&self, machine: &mut Machine, next: SupervisorState) {
        debug!(from = %machine.state, to = %next, "Supervisor state change");
        machine.state = next;
        self.state_tx.send_replace(next);
    }

    async fn run(self: Arc<Self>) {
        loop {
            let deadline = {
                let machine = self.lock();
                if machine.state != SupervisorState::Active {
                    return;
                }
                machine.deadline
            };

            tokio::time::sleep_until(deadline).await;

            let mut machine = self.lock();
            // A request may have pushed the deadline while we slept.
            if machine.state == SupervisorState::Active && Instant::now() >= machine.deadline {
                self.transition(&mut machine, SupervisorState::IdleTriggered);
                break;
            }
        }

        info!(
            idle_secs = self.idle_timeout.as_secs_f64(),
            grace_secs = self.grace_period.as_secs_f64(),
            "Server was idle, shutting down"
        );
        {
            let mut machine = self.lock();
            self.transition(&mut machine, SupervisorState::ShuttingDown);
        }

        if tokio::time::timeout(self.grace_period, self.drained.notified())
            .await
            .is_err()
        {
            warn!(
                grace_secs = self.grace_period.as_secs_f64(),
                "Grace period elapsed, closing remaining connections"
            );
        } else {
            debug!("Server drained before grace period elapsed");
        }

        let mut machine = self.lock();
        self.transition(&mut machine, SupervisorState::Terminated);
    }
}

/// Shuts the server down after a period without requests.
///
/// Cloning is cheap; all clones observe and drive the same state machine.
#[derive(Clone)]
pub struct IdleSupervisor {
    shared: Option<Arc<Shared>>,
    state_rx: watch::Receiver<SupervisorState>,
}

impl IdleSupervisor {
    /// Start supervising with the default grace period.
    ///
    /// Must be called within a tokio runtime when `idle_timeout` is non-zero.
    pub fn new(idle_timeout: Duration) -> Self {
        Self::with_grace_period(idle_timeout, DEFAULT_GRACE_PERIOD)
    }

    /// Start supervising with an explicit grace period.
    pub fn with_grace_period(idle_timeout: Duration, grace_period: Duration) -> Self {
        let (state_tx, state_rx) = watch::channel(SupervisorState::Active);

        if idle_timeout.is_zero() {
            debug!("Idle shutdown disabled");
            return Self {
                shared: None,
                state_rx,
            };
        }

        let shared = Arc::new(Shared {
            idle_timeout,
            grace_period,
            machine: Mutex::new(Machine {
                state: SupervisorState::Active,
                deadline: Instant::now() + idle_timeout,
            }),
            state_tx,
            drained: Notify::new(),
        });
        tokio::spawn(Arc::clone(&shared).run());

        debug!(
            idle_secs = idle_timeout.as_secs_f64(),
            grace_secs = grace_period.as_secs_f64(),
            "Idle shutdown enabled"
        );
        Self {
            shared: Some(shared),
            state_rx,
        }
    }

    /// A supervisor that never shuts anything down.
    pub fn disabled() -> Self {
        Self::with_grace_period(Duration::ZERO, DEFAULT_GRACE_PERIOD)
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_some()
    }

    /// Current state.
    pub fn state(&self) -> SupervisorState {
        *self.state_rx.borrow()
    }

    /// Record activity, pushing the idle deadline out.
    ///
    /// Returns false if shutdown has already begun (or supervision is
    /// disabled) and the timer was therefore not reset.
    pub fn touch(&self) -> bool {
        let Some(shared) = &self.shared else {
            return false;
        };
        let mut machine = shared.lock();
        if machine.state != SupervisorState::Active {
            return false;
        }
        machine.deadline = Instant::now() + shared.idle_timeout;
        true
    }

    /// Resolves once the idle timeout has fired.
    ///
    /// Never resolves when supervision is disabled.
    pub async fn shutdown_requested(&self) {
        self.wait_for(|state| state != SupervisorState::Active)
            .await;
    }

    /// Report that graceful shutdown has finished.
    pub fn mark_drained(&self) {
        if let Some(shared) = &self.shared {
            shared.drained.notify_one();
        }
    }

    /// Resolves once the supervisor has terminated: either the server
    /// drained or the grace period elapsed, whichever came first.
    ///
    /// Never resolves when supervision is disabled.
    pub async fn terminated(&self) {
        self.wait_for(|state| state == SupervisorState::Terminated)
            .await;
    }

    async fn wait_for(&self, condition: impl Fn(SupervisorState) -> bool) {
        if self.shared.is_none() {
            return std::future::pending().await;
        }
        let mut rx = self.state_rx.clone();
        if rx.wait_for(|state| condition(*state)).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl std::fmt::Debug for IdleSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleSupervisor")
            .field("enabled", &self.is_enabled())
            .field("state", &self.state())
            .finish()
    }
}
