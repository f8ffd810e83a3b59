//! Session state machine
//!
//! Publish runs `Idle → Building → Encrypting → Published`. Host and
//! retrieve run `Idle → Decrypting → Registering → AwaitingReadiness →
//! Transferring → Complete`. Any non-terminal state may move to `Failed`.

use std::fmt;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{Mode, NodeError, NodeResult};

/// A non-terminal position in a session, used to report where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Building,
    Encrypting,
    Decrypting,
    Registering,
    AwaitingReadiness,
    Transferring,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Building => "building",
            Stage::Encrypting => "encrypting",
            Stage::Decrypting => "decrypting",
            Stage::Registering => "registering",
            Stage::AwaitingReadiness => "awaiting readiness",
            Stage::Transferring => "transferring",
        };
        f.write_str(name)
    }
}

/// State of an orchestrated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Building,
    Encrypting,
    Published,
    Decrypting,
    Registering,
    AwaitingReadiness,
    Transferring,
    Complete,
    Failed { stage: Stage, reason: String },
}

impl SessionState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Published | SessionState::Complete | SessionState::Failed { .. }
        )
    }

    /// The stage this state corresponds to, if it is non-terminal
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SessionState::Idle => Some(Stage::Idle),
            SessionState::Building => Some(Stage::Building),
            SessionState::Encrypting => Some(Stage::Encrypting),
            SessionState::Decrypting => Some(Stage::Decrypting),
            SessionState::Registering => Some(Stage::Registering),
            SessionState::AwaitingReadiness => Some(Stage::AwaitingReadiness),
            SessionState::Transferring => Some(Stage::Transferring),
            SessionState::Published | SessionState::Complete | SessionState::Failed { .. } => None,
        }
    }

    fn can_advance_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Building)
                | (Building, Encrypting)
                | (Encrypting, Published)
                | (Idle, Decrypting)
                | (Decrypting, Registering)
                | (Registering, AwaitingReadiness)
                | (AwaitingReadiness, Transferring)
                | (Transferring, Complete)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Published => f.write_str("published"),
            SessionState::Complete => f.write_str("complete"),
            SessionState::Failed { stage, .. } => write!(f, "failed during {}", stage),
            other => match other.stage() {
                Some(stage) => write!(f, "{}", stage),
                None => Ok(()),
            },
        }
    }
}

/// Tracks one session's state and publishes every transition
///
/// Observers subscribe to a `watch` channel; the full history is kept for
/// inspection after the session ends.
pub struct SessionTracker {
    mode: Mode,
    tx: watch::Sender<SessionState>,
    history: Mutex<Vec<SessionState>>,
}

impl SessionTracker {
    /// Create a tracker in the `Idle` state
    pub fn new(mode: Mode) -> Self {
        let (tx, _) = watch::channel(SessionState::Idle);
        Self {
            mode,
            tx,
            history: Mutex::new(vec![SessionState::Idle]),
        }
    }

    /// Mode of the tracked session
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Stage of the current state (the last non-terminal stage reached)
    pub fn current_stage(&self) -> Stage {
        self.history
            .lock()
            .iter()
            .rev()
            .find_map(SessionState::stage)
            .unwrap_or(Stage::Idle)
    }

    /// Every state visited so far, oldest first
    pub fn history(&self) -> Vec<SessionState> {
        self.history.lock().clone()
    }

    /// Receive each state as it is entered
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Move to `next`, rejecting transitions the state machine does not allow
    pub fn advance(&self, next: SessionState) -> NodeResult<()> {
        let current = self.state();
        if !current.can_advance_to(&next) {
            return Err(NodeError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        match &next {
            SessionState::Published | SessionState::Complete => {
                info!(mode = %self.mode, from = %current, to = %next, "Session finished");
            }
            _ => debug!(mode = %self.mode, from = %current, to = %next, "Session transition"),
        }
        self.enter(next);
        Ok(())
    }

    /// Move to `Failed`, recording the stage that was active
    ///
    /// Returns the failed stage. A tracker already in a terminal state is
    /// left unchanged.
    pub fn fail(&self, reason: &NodeError) -> Stage {
        let stage = self.current_stage();
        if self.state().is_terminal() {
            return stage;
        }

        warn!(mode = %self.mode, %stage, error = %reason, "Session failed");
        self.enter(SessionState::Failed {
            stage,
            reason: reason.to_string(),
        });
        stage
    }

    fn enter(&self, state: SessionState) {
        self.history.lock().push(state.clone());
        self.tx.send_replace(state);
    }
}
