use std::sync::{Arc, Mutex};
use std::time::Duration;

use reflow_host_lib::display::{self, DisplaySink, FeedPoll, SampleFeed};
use reflow_host_lib::serial::{ScriptItem, ScriptedTransport, SerialSettings};
use reflow_host_lib::session::{
    ScriptedConsole, SessionConfig, SessionController, SessionError, SessionState, TelemetrySample,
    TerminationReason,
};

const PROFILE_ENTRIES: [&str; 4] = ["150", "60", "220", "30"];

#[derive(Default)]
struct Recorded {
    samples: Vec<TelemetrySample>,
    finished: Option<Option<TerminationReason>>,
    close_results: Vec<bool>,
}

/// Display that records what it was fed and can close itself after `close_after` samples.
struct RecordingDisplay {
    recorded: Arc<Mutex<Recorded>>,
    close_after: Option<usize>,
}

impl RecordingDisplay {
    fn new(close_after: Option<usize>) -> (Box<Self>, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let display = Box::new(Self {
            recorded: recorded.clone(),
            close_after,
        });
        (display, recorded)
    }
}

impl DisplaySink for RecordingDisplay {
    fn run(self: Box<Self>, mut feed: SampleFeed) -> display::Result<()> {
        loop {
            match feed.poll() {
                FeedPoll::Sample(sample) => {
                    let mut recorded = self.recorded.lock().unwrap();
                    recorded.samples.push(sample);
                    if Some(recorded.samples.len()) == self.close_after {
                        recorded.close_results.push(feed.request_close());
                        recorded.close_results.push(feed.request_close());
                        return Ok(());
                    }
                }
                FeedPoll::Idle => std::thread::sleep(Duration::from_millis(2)),
                FeedPoll::Finished(reason) => {
                    self.recorded.lock().unwrap().finished = Some(reason);
                    return Ok(());
                }
            }
        }
    }
}

fn test_config() -> SessionConfig {
    let mut config = SessionConfig::new(SerialSettings::new("scripted"));
    config.read_timeout = Duration::from_millis(20);
    config.startup_delay = Duration::ZERO;
    config
}

fn device_script(after_profile: &[&str]) -> ScriptedTransport {
    let lines = PROFILE_ENTRIES.iter().chain(after_profile.iter()).map(|l| l.to_string());
    ScriptedTransport::new(lines)
}

fn raw_samples(recorded: &Arc<Mutex<Recorded>>) -> Vec<(u64, String)> {
    recorded
        .lock()
        .unwrap()
        .samples
        .iter()
        .map(|s| (s.time_index, s.raw.clone()))
        .collect()
}

#[tokio::test]
async fn full_cycle_until_stop() {
    let transport = device_script(&["150", "Start", "100", "110", "Stop"]);
    let transport_log = transport.log();
    let console = ScriptedConsole::new(PROFILE_ENTRIES);
    let console_log = console.log();
    let (display, recorded) = RecordingDisplay::new(None);

    let controller = SessionController::new(transport, console, test_config());
    assert_eq!(controller.state(), SessionState::Negotiating);
    let report = controller.run(display).await.unwrap();

    assert_eq!(report.reason, TerminationReason::UserStopped);
    assert_eq!(report.samples_delivered, 2);
    assert_eq!(report.profile.reflow_temperature(), 220);
    assert_eq!(raw_samples(&recorded), vec![(0, "100".to_string()), (1, "110".to_string())]);
    assert_eq!(
        recorded.lock().unwrap().finished,
        Some(Some(TerminationReason::UserStopped))
    );

    assert!(transport_log.close_calls() >= 1);
    assert_eq!(transport_log.reads_after_close(), 0);
    assert_eq!(console_log.count_containing("Starting reflow cycle"), 1);
    assert_eq!(console_log.count_containing(TerminationReason::UserStopped.message()), 1);
}

#[tokio::test]
async fn fault_right_after_start_yields_nothing() {
    let transport = device_script(&["Start", "Therm"]);
    let console = ScriptedConsole::new(PROFILE_ENTRIES);
    let console_log = console.log();
    let (display, recorded) = RecordingDisplay::new(None);

    let report = SessionController::new(transport, console, test_config())
        .run(display)
        .await
        .unwrap();

    assert_eq!(report.reason, TerminationReason::ThermocoupleFault);
    assert_eq!(report.samples_delivered, 0);
    assert!(raw_samples(&recorded).is_empty());
    assert_eq!(console_log.count_containing("thermocouple"), 1);
}

#[tokio::test]
async fn indices_start_at_zero_after_negotiation_retries() {
    let transport = ScriptedTransport::from_items(
        [
            // soak temperature: bad echo, then a slow confirmation
            ScriptItem::Line("15".into()),
            ScriptItem::Silence,
            ScriptItem::Line("150".into()),
            ScriptItem::Line("60".into()),
            ScriptItem::Line("220".into()),
            ScriptItem::Line("30".into()),
            ScriptItem::Line("Start".into()),
            ScriptItem::Line("40".into()),
            ScriptItem::Silence,
            ScriptItem::Line("41".into()),
            ScriptItem::Line("Complete".into()),
        ]
        .into_iter(),
    );
    let transport_log = transport.log();
    let console = ScriptedConsole::new(["abc", "999", "150", "150", "60", "220", "30"]);
    let (display, recorded) = RecordingDisplay::new(None);

    let report = SessionController::new(transport, console, test_config())
        .run(display)
        .await
        .unwrap();

    assert_eq!(report.reason, TerminationReason::Completed);
    assert_eq!(raw_samples(&recorded), vec![(0, "40".to_string()), (1, "41".to_string())]);
    // Two soak temperature transmissions plus one per remaining parameter.
    assert_eq!(transport_log.writes(), vec!["150", "150", "60", "220", "30"]);
}

#[tokio::test]
async fn lines_before_start_are_ignored() {
    let transport = device_script(&["Heating", "Stop", "Start", "55", "Complete"]);
    let console = ScriptedConsole::new(PROFILE_ENTRIES);
    let (display, recorded) = RecordingDisplay::new(None);

    let report = SessionController::new(transport, console, test_config())
        .run(display)
        .await
        .unwrap();

    // "Stop" before "Start" is not a termination.
    assert_eq!(report.reason, TerminationReason::Completed);
    assert_eq!(raw_samples(&recorded), vec![(0, "55".to_string())]);
}

#[tokio::test]
async fn closing_the_display_ends_the_session_once() {
    let transport = device_script(&["Start", "100"]);
    let transport_log = transport.log();
    let console = ScriptedConsole::new(PROFILE_ENTRIES);
    let console_log = console.log();
    let (display, recorded) = RecordingDisplay::new(Some(1));

    let report = SessionController::new(transport, console, test_config())
        .run(display)
        .await
        .unwrap();

    assert_eq!(report.reason, TerminationReason::UserClosedDisplay);
    assert_eq!(report.samples_delivered, 1);
    assert_eq!(recorded.lock().unwrap().close_results, vec![true, false]);
    assert_eq!(console_log.count_containing(TerminationReason::UserClosedDisplay.message()), 1);

    // Closed from both the shutdown sequence and the final release; neither faults.
    assert_eq!(transport_log.close_calls(), 2);
    assert_eq!(transport_log.reads_after_close(), 0);
}

#[tokio::test]
async fn operator_running_out_of_input_aborts_and_releases_port() {
    let transport = ScriptedTransport::new(Vec::<String>::new());
    let transport_log = transport.log();
    let console = ScriptedConsole::new(["abc"]);
    let (display, recorded) = RecordingDisplay::new(None);

    let err = SessionController::new(transport, console, test_config())
        .run(display)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::OperatorInputClosed));
    assert_eq!(transport_log.close_calls(), 1);
    assert_eq!(transport_log.write_count(), 0);
    assert!(raw_samples(&recorded).is_empty());
}

#[tokio::test]
async fn unopenable_port_is_a_connection_error() {
    let mut config = test_config();
    config.serial = SerialSettings::new("/dev/reflow-host-no-such-port");

    let result = SessionController::connect(config, ScriptedConsole::new(Vec::<String>::new())).await;

    let err = result.err().unwrap();
    assert!(matches!(err, SessionError::Connection(_)));
    let message = err.to_string();
    assert!(message.contains("/dev/reflow-host-no-such-port"), "{}", message);
    assert_eq!(message.matches("failed").count(), 1, "{}", message);
}
