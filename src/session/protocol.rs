//! Line vocabulary of the oven firmware.
//!
//! Every line the controller sends is either an echo of a parameter, a
//! temperature reading, or one of the exact, case-sensitive sentinels below.
use serde::{Deserialize, Serialize};

use super::TerminationReason;

pub const START: &str = "Start";
pub const STOP: &str = "Stop";
pub const THERMOCOUPLE_FAULT: &str = "Therm";

/// Firmware builds disagree on how they announce a finished cycle.
/// A deployment picks exactly one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum CompletionToken {
    #[default]
    Complete,
    Done,
}

impl CompletionToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionToken::Complete => "Complete",
            CompletionToken::Done => "Done",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelSet {
    pub completion: CompletionToken,
}

impl SentinelSet {
    pub fn new(completion: CompletionToken) -> Self {
        Self { completion }
    }

    pub fn is_start(&self, line: &str) -> bool {
        line == START
    }

    /// Map a terminal sentinel to its reason. Data lines yield `None`.
    pub fn termination(&self, line: &str) -> Option<TerminationReason> {
        match line {
            THERMOCOUPLE_FAULT => Some(TerminationReason::ThermocoupleFault),
            STOP => Some(TerminationReason::UserStopped),
            _ if line == self.completion.as_str() => Some(TerminationReason::Completed),
            _ => None,
        }
    }
}
