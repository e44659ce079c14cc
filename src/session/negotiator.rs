use std::time::Duration;

use crate::profile::{ParameterKind, ParameterSpec, ProfileBuilder, ThermalProfile};
use crate::serial::LineTransport;

use super::{OperatorConsole, Result, SessionError};

/// Marker shown in front of each operator entry.
const INPUT_MARKER: &str = "-";

/// Result of a single prompt → send → echo round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The controller echoed the value back unchanged.
    Accepted(i32),
    /// Operator entry was not an integer. Nothing was sent.
    NotANumber(String),
    /// Operator entry was outside the parameter's bounds. Nothing was sent.
    OutOfRange(i32),
    /// The value went out but the controller echoed something else.
    NotReceived { sent: i32, echoed: String },
}

impl AttemptOutcome {
    /// Operator-facing line for a rejected attempt.
    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            AttemptOutcome::Accepted(_) => None,
            AttemptOutcome::NotANumber(_) => Some("Error: not a number"),
            AttemptOutcome::OutOfRange(_) => Some("Error: outside range"),
            AttemptOutcome::NotReceived { .. } => Some("Error: data not received by controller"),
        }
    }
}

/// Drives the value handshake for one parameter at a time.
///
/// Borrows the session's transport and console; it never opens or closes
/// either of them.
///
/// Each value is paired with the next line the controller sends after it.
/// Input left over from earlier rounds is dropped before a value goes out,
/// and the echo wait only gives up on a transport fault.
pub struct ParameterNegotiator<'a, T: ?Sized, C: ?Sized> {
    transport: &'a mut T,
    console: &'a mut C,
    /// Length of one echo read; a quiet controller is simply read again.
    echo_timeout: Duration,
}

impl<'a, T, C> ParameterNegotiator<'a, T, C>
where
    T: LineTransport + ?Sized,
    C: OperatorConsole + ?Sized,
{
    pub fn new(transport: &'a mut T, console: &'a mut C, echo_timeout: Duration) -> Self {
        Self {
            transport,
            console,
            echo_timeout,
        }
    }

    /// Run one attempt. Only transport faults and closed operator input are errors;
    /// every rejected value comes back as an [`AttemptOutcome`].
    pub async fn attempt(&mut self, spec: &ParameterSpec) -> Result<AttemptOutcome> {
        let entry = self
            .console
            .read_token(INPUT_MARKER)
            .await?
            .ok_or(SessionError::OperatorInputClosed)?;

        let value = match entry.parse::<i32>() {
            Ok(value) => value,
            Err(_) => return Ok(AttemptOutcome::NotANumber(entry)),
        };

        if !spec.contains(value) {
            return Ok(AttemptOutcome::OutOfRange(value));
        }

        self.transport.discard_input()?;
        self.transport.write_line(&value.to_string()).await?;
        let echoed = self.await_echo(value).await?;

        if echoed.trim().parse::<i32>().ok() == Some(value) {
            Ok(AttemptOutcome::Accepted(value))
        } else {
            Ok(AttemptOutcome::NotReceived { sent: value, echoed })
        }
    }

    async fn await_echo(&mut self, sent: i32) -> Result<String> {
        let mut waited = Duration::ZERO;
        loop {
            match self.transport.read_line(self.echo_timeout).await {
                Ok(line) => return Ok(line),
                Err(e) if e.is_timeout() => {
                    waited += self.echo_timeout;
                    log::warn!("Still waiting for the controller to echo {} ({:?})", sent, waited);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Keep attempting until the controller confirms a value for `spec`.
    pub async fn negotiate(&mut self, spec: &ParameterSpec) -> Result<i32> {
        self.console.say("");
        self.console.say(&spec.prompt());

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let outcome = self.attempt(spec).await?;

            match outcome {
                AttemptOutcome::Accepted(value) => {
                    log::info!("{} set to {} after {} attempt(s)", spec.name, value, attempts);
                    return Ok(value);
                }
                AttemptOutcome::NotReceived { sent, ref echoed } => {
                    log::warn!("{}: sent {} but controller echoed {:?}", spec.name, sent, echoed);
                }
                _ => log::debug!("{}: rejected entry {:?}", spec.name, outcome),
            }

            if let Some(message) = outcome.error_message() {
                self.console.say(message);
            }
        }
    }

    /// Negotiate every parameter in firmware order.
    pub async fn negotiate_profile(&mut self) -> Result<ThermalProfile> {
        let mut builder = ProfileBuilder::new();
        for kind in ParameterKind::NEGOTIATION_ORDER {
            let value = self.negotiate(kind.spec()).await?;
            builder.set(kind, value)?;
        }
        Ok(builder.build()?)
    }
}
