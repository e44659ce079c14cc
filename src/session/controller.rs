use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::display::{DisplayEvent, DisplaySink, SampleFeed};
use crate::profile::ThermalProfile;
use crate::serial::{LineTransport, SerialInterface, SerialSettings};

use super::{
    OperatorConsole, ParameterNegotiator, Result, SentinelSet, SessionError, SessionState, StreamItem, TelemetryStream,
    TerminationReason,
};

/// Everything one session needs to know about the link and the firmware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub serial: SerialSettings,
    /// How long a single read waits before being retried.
    pub read_timeout: Duration,
    /// Quiet period after opening the port; opening resets Arduino boards.
    pub startup_delay: Duration,
    pub sentinels: SentinelSet,
    /// Samples that may queue up ahead of a slow display.
    pub display_capacity: usize,
}

impl SessionConfig {
    pub fn new(serial: SerialSettings) -> Self {
        Self {
            serial,
            read_timeout: Duration::from_millis(2000),
            startup_delay: Duration::from_millis(1000),
            sentinels: SentinelSet::default(),
            display_capacity: 64,
        }
    }
}

/// Summary handed back once a session has terminated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub profile: ThermalProfile,
    pub reason: TerminationReason,
    pub samples_delivered: u64,
}

/// Owns the serial link for the whole session and walks it through
/// negotiation, the start wait and streaming.
pub struct SessionController<T: LineTransport, C: OperatorConsole> {
    transport: T,
    console: C,
    config: SessionConfig,
    state: SessionState,
}

impl<C: OperatorConsole> SessionController<SerialInterface, C> {
    /// Open the configured port. Failure here ends the session before it starts.
    pub async fn connect(config: SessionConfig, mut console: C) -> Result<Self> {
        let transport = SerialInterface::open(config.serial.clone()).map_err(SessionError::Connection)?;
        console.say("Connection to controller established");

        if !config.startup_delay.is_zero() {
            log::debug!("Waiting {:?} for the controller to boot", config.startup_delay);
            tokio::time::sleep(config.startup_delay).await;
        }
        Ok(Self::new(transport, console, config))
    }
}

impl<T: LineTransport, C: OperatorConsole> SessionController<T, C> {
    pub fn new(transport: T, console: C, config: SessionConfig) -> Self {
        Self {
            transport,
            console,
            config,
            state: SessionState::Negotiating,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn advance(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_advance_to(&next) {
            return Err(SessionError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        log::info!("Session {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Run the session to completion. The transport is closed on every exit path.
    pub async fn run(mut self, sink: Box<dyn DisplaySink>) -> Result<SessionReport> {
        let result = self.drive(sink).await;
        self.transport.close();
        if let Err(ref e) = result {
            log::error!("Session aborted in {:?}: {}", self.state, e);
        }
        result
    }

    async fn drive(&mut self, sink: Box<dyn DisplaySink>) -> Result<SessionReport> {
        let profile = self.negotiate().await?;
        log::info!("Profile acknowledged: {}", profile);
        self.advance(SessionState::AwaitingStart)?;

        self.console.say("");
        self.console.say("Press 'set' button to begin reflow cycle");
        self.await_start().await?;
        self.advance(SessionState::Streaming)?;
        self.console.say("");
        self.console.say("Starting reflow cycle");

        let (feed, events_tx, close_rx) = SampleFeed::channel(self.config.display_capacity);
        let display = tokio::task::spawn_blocking(move || sink.run(feed));

        let streamed = self.stream(&events_tx, close_rx).await;
        if let Ok((reason, _)) = &streamed {
            // Release the device before the display is told, so nothing reads after close.
            self.transport.close();
            let _ = events_tx.send(DisplayEvent::Terminated(*reason)).await;
        }
        drop(events_tx);

        let display_result = match display.await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Display task ended abnormally: {}", e);
                Ok(())
            }
        };

        let (reason, samples_delivered) = streamed?;
        display_result?;
        self.advance(SessionState::Terminated(reason))?;
        self.console.say(reason.message());

        Ok(SessionReport {
            profile,
            reason,
            samples_delivered,
        })
    }

    async fn negotiate(&mut self) -> Result<ThermalProfile> {
        let mut negotiator = ParameterNegotiator::new(&mut self.transport, &mut self.console, self.config.read_timeout);
        negotiator.negotiate_profile().await
    }

    /// Block until the controller reports the cycle has started. Anything else is dropped.
    async fn await_start(&mut self) -> Result<()> {
        loop {
            match self.transport.read_line(self.config.read_timeout).await {
                Ok(line) if self.config.sentinels.is_start(&line) => return Ok(()),
                Ok(line) => log::debug!("Ignoring {:?} while waiting for start", line),
                Err(e) if e.is_timeout() => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn stream(
        &mut self,
        events_tx: &mpsc::Sender<DisplayEvent>,
        mut close_rx: oneshot::Receiver<()>,
    ) -> Result<(TerminationReason, u64)> {
        let mut stream = TelemetryStream::new(&mut self.transport, self.config.sentinels, self.config.read_timeout);
        let mut delivered = 0u64;

        loop {
            tokio::select! {
                biased;

                // Fires on an explicit close and also if the display simply went away.
                _ = &mut close_rx => {
                    log::info!("Display closed after {} samples", delivered);
                    return Ok((TerminationReason::UserClosedDisplay, delivered));
                }

                item = stream.next() => match item? {
                    StreamItem::Sample(sample) => {
                        if events_tx.send(DisplayEvent::Sample(sample)).await.is_err() {
                            log::info!("Display stopped consuming after {} samples", delivered);
                            return Ok((TerminationReason::UserClosedDisplay, delivered));
                        }
                        delivered += 1;
                    }
                    StreamItem::Terminated(reason) => return Ok((reason, delivered)),
                },
            }
        }
    }
}
