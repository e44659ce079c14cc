use std::time::Duration;

use reflow_host_lib::profile::{ParameterKind, SOAK_TEMPERATURE, SOAK_TIME};
use reflow_host_lib::serial::{ScriptItem, ScriptedTransport};
use reflow_host_lib::session::{AttemptOutcome, ParameterNegotiator, ScriptedConsole};

const ECHO_WAIT: Duration = Duration::from_millis(5);

#[tokio::test]
async fn out_of_range_entries_are_never_sent() {
    for kind in ParameterKind::NEGOTIATION_ORDER {
        let spec = kind.spec();
        let mut transport = ScriptedTransport::new(Vec::<String>::new());
        let log = transport.log();
        let mut console = ScriptedConsole::new([
            (spec.minimum - 1).to_string(),
            (spec.maximum + 1).to_string(),
        ]);
        let mut negotiator = ParameterNegotiator::new(&mut transport, &mut console, ECHO_WAIT);

        assert_eq!(
            negotiator.attempt(spec).await.unwrap(),
            AttemptOutcome::OutOfRange(spec.minimum - 1)
        );
        assert_eq!(
            negotiator.attempt(spec).await.unwrap(),
            AttemptOutcome::OutOfRange(spec.maximum + 1)
        );
        assert_eq!(log.write_count(), 0, "{} sent an out-of-range value", spec.name);
        assert_eq!(log.reads(), 0);
    }
}

#[tokio::test]
async fn non_numeric_entries_retry_without_sending() {
    let mut transport = ScriptedTransport::new(["150"]);
    let log = transport.log();
    let mut console = ScriptedConsole::new(["hot", "15O", "1.5e2", "150"]);
    let console_log = console.log();
    let mut negotiator = ParameterNegotiator::new(&mut transport, &mut console, ECHO_WAIT);

    let value = negotiator.negotiate(&SOAK_TEMPERATURE).await.unwrap();

    assert_eq!(value, 150);
    assert_eq!(log.writes(), vec!["150".to_string()]);
    assert_eq!(console_log.prompts(), 4);
    assert_eq!(console_log.count_containing("not a number"), 3);
}

#[tokio::test]
async fn wrong_echo_reprompts_the_operator() {
    let mut transport = ScriptedTransport::new(["151", "160"]);
    let log = transport.log();
    let mut console = ScriptedConsole::new(["150", "160"]);
    let console_log = console.log();
    let mut negotiator = ParameterNegotiator::new(&mut transport, &mut console, ECHO_WAIT);

    let value = negotiator.negotiate(&SOAK_TEMPERATURE).await.unwrap();

    // The second transmission carries the operator's new entry, not a resend.
    assert_eq!(value, 160);
    assert_eq!(log.writes(), vec!["150".to_string(), "160".to_string()]);
    assert_eq!(console_log.prompts(), 2);
    assert_eq!(console_log.count_containing("data not received"), 1);
}

#[tokio::test]
async fn echo_confirmed_on_third_attempt() {
    let mut transport = ScriptedTransport::new(["149", "garbage", "150"]);
    let log = transport.log();
    let mut console = ScriptedConsole::new(["150", "150", "150"]);
    let console_log = console.log();
    let mut negotiator = ParameterNegotiator::new(&mut transport, &mut console, ECHO_WAIT);

    let value = negotiator.negotiate(&SOAK_TEMPERATURE).await.unwrap();

    assert_eq!(value, 150);
    assert_eq!(log.write_count(), 3);
    assert_eq!(console_log.prompts(), 3);
    assert_eq!(console_log.count_containing("data not received"), 2);
}

#[tokio::test]
async fn late_echo_is_not_taken_for_the_next_value() {
    // The controller is slow to echo the soak temperature and repeats it once.
    let mut transport = ScriptedTransport::from_items([
        ScriptItem::Silence,
        ScriptItem::Line("150".into()),
        ScriptItem::Line("150".into()),
        ScriptItem::Line("60".into()),
        ScriptItem::Line("60".into()),
    ]);
    let log = transport.log();
    let mut console = ScriptedConsole::new(["150", "150", "60", "60"]);
    let console_log = console.log();

    let mut negotiator = ParameterNegotiator::new(&mut transport, &mut console, ECHO_WAIT);
    let soak_temperature = negotiator.negotiate(&SOAK_TEMPERATURE).await.unwrap();
    let soak_time = negotiator.negotiate(&SOAK_TIME).await.unwrap();
    drop(negotiator);

    assert_eq!((soak_temperature, soak_time), (150, 60));
    // The second "150" is out of range for soak time and never leaves the host.
    assert_eq!(log.writes(), vec!["150", "60", "60"]);
    assert_eq!(log.discards(), 3);
    assert_eq!(console_log.count_containing("outside range"), 1);
    assert_eq!(console_log.count_containing("data not received"), 1);
    assert_eq!(transport.remaining(), 1);
}

#[tokio::test]
async fn profile_is_negotiated_in_firmware_order() {
    let mut transport = ScriptedTransport::new(["150", "60", "220", "30"]);
    let log = transport.log();
    let mut console = ScriptedConsole::new(["150", "60", "220", "30"]);
    let console_log = console.log();
    let mut negotiator = ParameterNegotiator::new(&mut transport, &mut console, ECHO_WAIT);

    let profile = negotiator.negotiate_profile().await.unwrap();

    assert_eq!(profile.soak_temperature(), 150);
    assert_eq!(profile.soak_time(), 60);
    assert_eq!(profile.reflow_temperature(), 220);
    assert_eq!(profile.reflow_time(), 30);
    assert_eq!(log.writes(), vec!["150", "60", "220", "30"]);

    let prompts: Vec<String> = console_log
        .messages()
        .into_iter()
        .filter(|m| m.starts_with("Enter"))
        .collect();
    assert_eq!(
        prompts,
        vec![
            "Enter soak temperature (120C - 180C):",
            "Enter soak time (30s - 90s):",
            "Enter reflow temperature (200C - 240C):",
            "Enter reflow time (15s - 60s):",
        ]
    );
}
