pub mod chart;
pub mod plain;

pub use chart::ChartDisplay;
pub use plain::PlainDisplay;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::session::{TelemetrySample, TerminationReason};

/// Render loop cadence. Each tick takes at most one pending sample.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed plot bounds: the controller tops out at 255C and an average cycle
/// runs about eight minutes.
pub const TEMPERATURE_AXIS_MAX: f64 = 255.0;
pub const TIME_AXIS_MAX: f64 = 480.0;

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("Terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DisplayError>;

/// What the session pushes to the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Sample(TelemetrySample),
    Terminated(TerminationReason),
}

/// Result of one non-blocking look at the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedPoll {
    Sample(TelemetrySample),
    Idle,
    /// The session is over. `None` if it went away without saying why.
    Finished(Option<TerminationReason>),
}

/// The display's end of the session: a sample queue plus a one-shot close line.
///
/// A sink never sees the serial connection, only this.
pub struct SampleFeed {
    events: mpsc::Receiver<DisplayEvent>,
    close: Option<oneshot::Sender<()>>,
}

impl SampleFeed {
    /// Build a feed with room for `capacity` undelivered events.
    pub fn channel(capacity: usize) -> (SampleFeed, mpsc::Sender<DisplayEvent>, oneshot::Receiver<()>) {
        let (events_tx, events) = mpsc::channel(capacity.max(1));
        let (close_tx, close_rx) = oneshot::channel();
        let feed = SampleFeed {
            events,
            close: Some(close_tx),
        };
        (feed, events_tx, close_rx)
    }

    pub fn poll(&mut self) -> FeedPoll {
        match self.events.try_recv() {
            Ok(DisplayEvent::Sample(sample)) => FeedPoll::Sample(sample),
            Ok(DisplayEvent::Terminated(reason)) => FeedPoll::Finished(Some(reason)),
            Err(mpsc::error::TryRecvError::Empty) => FeedPoll::Idle,
            Err(mpsc::error::TryRecvError::Disconnected) => FeedPoll::Finished(None),
        }
    }

    /// Ask the session to end. Only the first call signals; returns whether it did.
    pub fn request_close(&mut self) -> bool {
        match self.close.take() {
            Some(close) => {
                let _ = close.send(());
                true
            }
            None => false,
        }
    }
}

/// A renderer for the live temperature curve.
///
/// `run` is called on a blocking thread and should return once the feed is
/// finished or after the operator closes the view via
/// [`SampleFeed::request_close`].
pub trait DisplaySink: Send {
    fn run(self: Box<Self>, feed: SampleFeed) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum DisplayMode {
    #[default]
    Chart,
    Plain,
}

impl DisplayMode {
    pub fn into_sink(self) -> Box<dyn DisplaySink> {
        match self {
            DisplayMode::Chart => Box::new(ChartDisplay::new()),
            DisplayMode::Plain => Box::new(PlainDisplay::stdout()),
        }
    }
}
