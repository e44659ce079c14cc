use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::serial::{LineTransport, SerialError};

use super::{SentinelSet, TerminationReason};

/// One telemetry line and its position in the stream.
///
/// `time_index` counts samples, it is not a wall clock; the firmware emits
/// roughly one reading per second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub time_index: u64,
    pub raw: String,
}

impl TelemetrySample {
    /// Reading in degrees, if the line parses as a number.
    pub fn temperature(&self) -> Option<f64> {
        self.raw.trim().parse::<f64>().ok().filter(|t| t.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Sample(TelemetrySample),
    Terminated(TerminationReason),
}

/// Pull-based telemetry reader over a borrowed transport.
///
/// Each call to [`next`](Self::next) performs reads until it has either a
/// sample or a terminal sentinel. Read timeouts are retried. Once a sentinel
/// has been seen the stream is finished and never reads again.
pub struct TelemetryStream<'a, T: ?Sized> {
    transport: &'a mut T,
    sentinels: SentinelSet,
    read_timeout: Duration,
    next_index: u64,
    finished: Option<TerminationReason>,
}

impl<'a, T> TelemetryStream<'a, T>
where
    T: LineTransport + ?Sized,
{
    pub fn new(transport: &'a mut T, sentinels: SentinelSet, read_timeout: Duration) -> Self {
        Self {
            transport,
            sentinels,
            read_timeout,
            next_index: 0,
            finished: None,
        }
    }

    pub async fn next(&mut self) -> Result<StreamItem, SerialError> {
        if let Some(reason) = self.finished {
            return Ok(StreamItem::Terminated(reason));
        }

        let line = loop {
            match self.transport.read_line(self.read_timeout).await {
                Ok(line) => break line,
                Err(e) if e.is_timeout() => {
                    log::trace!("No telemetry within {:?}, still waiting", self.read_timeout);
                }
                Err(e) => return Err(e),
            }
        };

        if let Some(reason) = self.sentinels.termination(&line) {
            log::info!("Stream ended by {:?} after {} samples", line, self.next_index);
            self.finished = Some(reason);
            return Ok(StreamItem::Terminated(reason));
        }

        let sample = TelemetrySample {
            time_index: self.next_index,
            raw: line,
        };
        self.next_index += 1;
        Ok(StreamItem::Sample(sample))
    }

    /// Samples produced so far.
    pub fn produced(&self) -> u64 {
        self.next_index
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        self.finished
    }
}
