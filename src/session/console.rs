use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Operator-facing text interface used during negotiation and for status lines.
#[async_trait]
pub trait OperatorConsole: Send {
    /// Print one line for the operator.
    fn say(&mut self, message: &str);

    /// Show `marker` and read one whitespace-delimited token.
    /// `Ok(None)` means the input has ended.
    async fn read_token(&mut self, marker: &str) -> std::io::Result<Option<String>>;
}

pub struct StdConsole {
    input: Lines<BufReader<Stdin>>,
}

impl StdConsole {
    pub fn new() -> Self {
        Self {
            input: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorConsole for StdConsole {
    fn say(&mut self, message: &str) {
        println!("{}", message);
    }

    async fn read_token(&mut self, marker: &str) -> std::io::Result<Option<String>> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{} ", marker)?;
        stdout.flush()?;

        Ok(self.input.next_line().await?.map(|line| first_token(&line)))
    }
}

/// First whitespace-delimited token, or an empty string for a blank line.
pub(crate) fn first_token(line: &str) -> String {
    line.split_whitespace().next().unwrap_or_default().to_string()
}

#[derive(Debug, Default)]
struct ConsoleActivity {
    prompts: usize,
    messages: Vec<String>,
}

/// Shared record of what a [`ScriptedConsole`] was asked and told.
#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    inner: Arc<Mutex<ConsoleActivity>>,
}

impl ConsoleLog {
    fn with<R>(&self, f: impl FnOnce(&mut ConsoleActivity) -> R) -> R {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn prompts(&self) -> usize {
        self.with(|a| a.prompts)
    }

    pub fn messages(&self) -> Vec<String> {
        self.with(|a| a.messages.clone())
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.with(|a| a.messages.iter().filter(|m| m.contains(needle)).count())
    }
}

/// Console that answers prompts from a fixed list of operator entries.
pub struct ScriptedConsole {
    entries: VecDeque<String>,
    log: ConsoleLog,
}

impl ScriptedConsole {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
            log: ConsoleLog::default(),
        }
    }

    pub fn log(&self) -> ConsoleLog {
        self.log.clone()
    }
}

#[async_trait]
impl OperatorConsole for ScriptedConsole {
    fn say(&mut self, message: &str) {
        self.log.with(|a| a.messages.push(message.to_string()));
    }

    async fn read_token(&mut self, _marker: &str) -> std::io::Result<Option<String>> {
        self.log.with(|a| a.prompts += 1);
        Ok(self.entries.pop_front().map(|entry| first_token(&entry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_token_ignores_trailing_words() {
        assert_eq!(first_token("  150 degrees"), "150");
        assert_eq!(first_token(""), "");
        assert_eq!(first_token("   "), "");
    }

    #[tokio::test]
    async fn scripted_console_counts_prompts_and_ends() {
        let mut console = ScriptedConsole::new(["150"]);
        let log = console.log();

        assert_eq!(console.read_token("-").await.unwrap().as_deref(), Some("150"));
        assert_eq!(console.read_token("-").await.unwrap(), None);
        console.say("hello");

        assert_eq!(log.prompts(), 2);
        assert_eq!(log.messages(), vec!["hello".to_string()]);
    }
}
