use std::io::Write;

use super::{DisplaySink, FeedPoll, Result, SampleFeed, POLL_INTERVAL};
use crate::session::TelemetrySample;

/// Prints one `index<TAB>reading` line per sample. For pipes and dumb terminals.
pub struct PlainDisplay {
    out: Box<dyn Write + Send>,
}

impl PlainDisplay {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

pub(crate) fn format_sample(sample: &TelemetrySample) -> String {
    format!("{}\t{}", sample.time_index, sample.raw.trim())
}

impl DisplaySink for PlainDisplay {
    fn run(mut self: Box<Self>, mut feed: SampleFeed) -> Result<()> {
        loop {
            match feed.poll() {
                FeedPoll::Sample(sample) => {
                    writeln!(self.out, "{}", format_sample(&sample))?;
                    self.out.flush()?;
                }
                FeedPoll::Idle => {}
                FeedPoll::Finished(reason) => {
                    log::debug!("Plain display finished ({:?})", reason);
                    return Ok(());
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}
