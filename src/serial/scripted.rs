//! In-memory stand-in for the oven controller.
//!
//! Plays back a fixed list of device lines and records everything the host
//! does to it, so negotiation and streaming can be exercised without hardware.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{LineTransport, Result, SerialError};

/// One step of the device script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptItem {
    Line(String),
    /// The device stays quiet for one read, which then times out.
    Silence,
}

#[derive(Debug, Default)]
struct Activity {
    writes: Vec<String>,
    reads: usize,
    reads_after_close: usize,
    discards: usize,
    close_calls: usize,
}

/// Shared view of what the host did to a [`ScriptedTransport`].
#[derive(Debug, Clone, Default)]
pub struct TransportLog {
    inner: Arc<Mutex<Activity>>,
}

impl TransportLog {
    fn with<R>(&self, f: impl FnOnce(&mut Activity) -> R) -> R {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn writes(&self) -> Vec<String> {
        self.with(|a| a.writes.clone())
    }

    pub fn write_count(&self) -> usize {
        self.with(|a| a.writes.len())
    }

    pub fn reads(&self) -> usize {
        self.with(|a| a.reads)
    }

    pub fn reads_after_close(&self) -> usize {
        self.with(|a| a.reads_after_close)
    }

    /// How often the host asked for unread input to be dropped.
    pub fn discards(&self) -> usize {
        self.with(|a| a.discards)
    }

    pub fn close_calls(&self) -> usize {
        self.with(|a| a.close_calls)
    }
}

pub struct ScriptedTransport {
    script: VecDeque<ScriptItem>,
    open: bool,
    log: TransportLog,
}

impl ScriptedTransport {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_items(lines.into_iter().map(|l| ScriptItem::Line(l.into())))
    }

    pub fn from_items(items: impl IntoIterator<Item = ScriptItem>) -> Self {
        Self {
            script: items.into_iter().collect(),
            open: true,
            log: TransportLog::default(),
        }
    }

    pub fn log(&self) -> TransportLog {
        self.log.clone()
    }

    /// Script steps not yet consumed by a read.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl LineTransport for ScriptedTransport {
    async fn read_line(&mut self, wait: Duration) -> Result<String> {
        if !self.open {
            self.log.with(|a| a.reads_after_close += 1);
            return Err(SerialError::NotConnected);
        }
        self.log.with(|a| a.reads += 1);

        match self.script.pop_front() {
            Some(ScriptItem::Line(line)) => Ok(line),
            Some(ScriptItem::Silence) => Err(SerialError::Timeout),
            None => {
                // An exhausted script behaves like a silent device.
                tokio::time::sleep(wait).await;
                Err(SerialError::Timeout)
            }
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        if !self.open {
            return Err(SerialError::NotConnected);
        }
        self.log.with(|a| a.writes.push(line.to_string()));
        Ok(())
    }

    /// Only recorded: a script cannot tell lines already received from ones still on the way.
    fn discard_input(&mut self) -> Result<()> {
        if !self.open {
            return Err(SerialError::NotConnected);
        }
        self.log.with(|a| a.discards += 1);
        Ok(())
    }

    fn close(&mut self) {
        self.log.with(|a| a.close_calls += 1);
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
