pub mod console;
pub mod controller;
pub mod negotiator;
pub mod protocol;
pub mod stream;

pub use console::{ConsoleLog, OperatorConsole, ScriptedConsole, StdConsole};
pub use controller::{SessionConfig, SessionController, SessionReport};
pub use negotiator::{AttemptOutcome, ParameterNegotiator};
pub use protocol::{CompletionToken, SentinelSet};
pub use stream::{StreamItem, TelemetrySample, TelemetryStream};

use serde::{Deserialize, Serialize};

use crate::display::DisplayError;
use crate::profile::ProfileError;
use crate::serial::SerialError;

/// Why a streaming session ended. None of these are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    ThermocoupleFault,
    UserStopped,
    Completed,
    UserClosedDisplay,
}

impl TerminationReason {
    /// One-line explanation shown to the operator.
    pub fn message(&self) -> &'static str {
        match self {
            TerminationReason::ThermocoupleFault => "Error: thermocouple not correctly placed in oven",
            TerminationReason::UserStopped => "Reflow process stopped by user",
            TerminationReason::Completed => "Reflow process complete",
            TerminationReason::UserClosedDisplay => "Display closed, reflow session ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Negotiating,
    AwaitingStart,
    Streaming,
    Terminated(TerminationReason),
}

impl SessionState {
    /// Transitions only move forward; `Terminated` is absorbing.
    pub fn can_advance_to(&self, next: &SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Negotiating, AwaitingStart)
                | (AwaitingStart, Streaming)
                | (Streaming, Terminated(_))
        )
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionState::Terminated(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Connection to controller failed: {0}")]
    Connection(#[source] SerialError),

    #[error("Serial communication error: {0}")]
    Transport(#[from] SerialError),

    #[error("Operator input closed before the profile was complete")]
    OperatorInputClosed,

    #[error("Console error: {0}")]
    Console(#[from] std::io::Error),

    #[error("Invalid session transition from {from:?} to {to:?}")]
    IllegalTransition { from: SessionState, to: SessionState },

    #[error("Invalid thermal profile: {0}")]
    Profile(#[from] ProfileError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
