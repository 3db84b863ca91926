//! Processing state machine of a stage.
//!
//! ```text
//!   Idle ──Start──► Processing ──Succeed──► Succeeded
//!    ▲                  │                       │
//!    │                  └──────Fail──► Failed   │
//!    └──────────── Invalidate ◄────────┴────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::discovery::WaitReason;

/// Lifecycle state of a node's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    #[default]
    Idle,
    Processing,
    Succeeded,
    Failed,
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    /// A run begins.
    Start,

    /// The run produced output.
    Succeed,

    /// The run failed.
    Fail,

    /// Input or configuration changed; prior output is stale.
    Invalidate,
}

/// Result of applying a [`StageEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State changed from the first to the second value.
    Moved(ProcessingState, ProcessingState),

    /// Event has no effect in the current state.
    Ignored,

    /// Event is not allowed in the current state.
    Rejected,
}

impl Transition {
    pub fn is_moved(self) -> bool {
        matches!(self, Self::Moved(..))
    }
}

impl ProcessingState {
    /// Apply `event`, updating `self` when the transition is legal.
    ///
    /// A `Start` while already processing is ignored, so a second trigger
    /// can never begin a concurrent run.
    pub fn apply(&mut self, event: StageEvent) -> Transition {
        use ProcessingState::*;
        use StageEvent::*;

        let next = match (*self, event) {
            (Idle, Start) => Processing,
            (Processing, Start) => return Transition::Ignored,
            (Processing, Succeed) => Succeeded,
            (Processing, Fail) => Failed,
            (Processing | Succeeded | Failed, Invalidate) => Idle,
            (Idle, Invalidate) => return Transition::Ignored,
            _ => return Transition::Rejected,
        };

        let previous = *self;
        *self = next;
        Transition::Moved(previous, next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status shown for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum NodeStatus {
    /// Idle with no usable upstream input.
    Waiting(WaitReason),
    Idle,
    Processing,
    Succeeded,
    /// Last run failed with this message.
    Failed(String),
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting(reason) => write!(f, "waiting for input ({reason})"),
            Self::Idle => f.write_str("idle"),
            Self::Processing => f.write_str("processing"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}
