pub mod cli;
pub mod display;
pub mod profile;
pub mod serial;
pub mod session;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use serial::SerialInterface;
use session::{SessionController, SessionReport, StdConsole, TerminationReason};

/// Entry point for the `reflow-host` binary.
pub fn run() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.log_level());

  if cli.list_ports {
    return match list_ports() {
      Ok(()) => ExitCode::SUCCESS,
      Err(e) => {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
      }
    };
  }

  let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
    Ok(runtime) => runtime,
    Err(e) => {
      eprintln!("Error: failed to start async runtime: {}", e);
      return ExitCode::FAILURE;
    }
  };

  match runtime.block_on(run_session(&cli)) {
    Ok(report) => {
      log::info!(
        "Session finished: {:?} after {} samples ({})",
        report.reason,
        report.samples_delivered,
        report.profile
      );
      exit_code(report.reason)
    }
    // Session errors already spell out their cause, so only the outermost one is printed.
    Err(e) => {
      eprintln!("Error: {}", e);
      ExitCode::FAILURE
    }
  }
}

async fn run_session(cli: &Cli) -> anyhow::Result<SessionReport> {
  let config = cli.session_config()?;
  let controller = SessionController::connect(config, StdConsole::new()).await?;

  let report = controller.run(cli.display.into_sink()).await?;
  Ok(report)
}

fn list_ports() -> anyhow::Result<()> {
  let ports = SerialInterface::discover_ports().context("could not enumerate serial ports")?;
  if ports.is_empty() {
    println!("No serial ports found");
  }
  for port in ports {
    match (port.vid, port.pid) {
      (Some(vid), Some(pid)) => println!(
        "{}\t{:04X}:{:04X}\t{}",
        port.port_name,
        vid,
        pid,
        port.product.or(port.manufacturer).unwrap_or_default()
      ),
      _ => println!("{}", port.port_name),
    }
  }
  Ok(())
}

/// A thermocouple fault is the only ending that should look like a failure to scripts.
fn exit_code(reason: TerminationReason) -> ExitCode {
  match reason {
    TerminationReason::ThermocoupleFault => ExitCode::from(2),
    TerminationReason::Completed | TerminationReason::UserStopped | TerminationReason::UserClosedDisplay => {
      ExitCode::SUCCESS
    }
  }
}

fn init_logging(level: &str) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init();
}
