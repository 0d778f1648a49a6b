//! Component lifecycle: `Created → Started → Stopped`.

use std::fmt;

use tokio::sync::watch;
use tracing::info;

use notary_core::error::AppError;
use notary_core::result::AppResult;

/// Where a component is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Constructed, not yet serving.
    Created,
    /// Dependencies ready, serving requests.
    Started,
    /// Shut down. Terminal.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Lifecycle state published on a watch channel so other tasks can
/// observe or await transitions.
#[derive(Debug)]
pub struct Lifecycle {
    name: &'static str,
    tx: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    /// A lifecycle in the `Created` state.
    pub fn new(name: &'static str) -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Created);
        Self { name, tx }
    }

    /// The current state.
    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Whether the component is serving.
    pub fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    /// Receive every subsequent transition.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move to `Started`. Only valid from `Created`; starting twice is a
    /// no-op.
    pub fn mark_started(&self) -> AppResult<()> {
        match self.state() {
            LifecycleState::Created => {
                self.tx.send_replace(LifecycleState::Started);
                info!(component = self.name, "Component started");
                Ok(())
            }
            LifecycleState::Started => Ok(()),
            LifecycleState::Stopped => Err(AppError::service_unavailable(format!(
                "{} has been stopped and cannot be restarted",
                self.name
            ))),
        }
    }

    /// Move to `Stopped`.
    pub fn mark_stopped(&self) {
        let previous = self.tx.send_replace(LifecycleState::Stopped);
        if previous != LifecycleState::Stopped {
            info!(component = self.name, from = %previous, "Component stopped");
        }
    }

    /// Resolve once the lifecycle reaches `target`, or fail if it stops
    /// first.
    pub async fn wait_for(&self, target: LifecycleState) -> AppResult<()> {
        let mut rx = self.subscribe();
        let reached = rx
            .wait_for(|state| *state == target || *state == LifecycleState::Stopped)
            .await
            .map_err(|_| AppError::internal(format!("{} lifecycle channel closed", self.name)))?;
        if *reached == target {
            Ok(())
        } else {
            Err(AppError::service_unavailable(format!(
                "{} stopped before reaching {target}",
                self.name
            )))
        }
    }

    /// Fail with `ServiceUnavailable` unless started.
    pub fn ensure_started(&self) -> AppResult<()> {
        match self.state() {
            LifecycleState::Started => Ok(()),
            other => Err(AppError::service_unavailable(format!(
                "{} is {other}",
                self.name
            ))),
        }
    }
}
