use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};

use crate::display::DisplayMode;
use crate::serial::interface::DEFAULT_BAUD_RATE;
use crate::serial::{DataBitsSetting, ParitySetting, SerialSettings, StopBitsSetting};
use crate::session::{CompletionToken, SentinelSet, SessionConfig};

/// Send a thermal profile to the reflow oven controller and plot the cycle.
#[derive(Debug, Parser)]
#[command(name = "reflow-host", version, about)]
pub struct Cli {
    /// Serial port the controller is attached to (e.g. COM3, /dev/ttyACM0)
    #[arg(short, long, env = "REFLOW_PORT", required_unless_present = "list_ports")]
    pub port: Option<String>,

    #[arg(long, env = "REFLOW_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,

    #[arg(long, value_enum, default_value = "8")]
    pub data_bits: DataBitsSetting,

    #[arg(long, value_enum, default_value = "none")]
    pub parity: ParitySetting,

    #[arg(long, value_enum, default_value = "1")]
    pub stop_bits: StopBitsSetting,

    /// How long one serial read waits before it is retried
    #[arg(long, default_value_t = 2000)]
    pub read_timeout_ms: u64,

    /// Pause after opening the port while the board resets
    #[arg(long, default_value_t = 1000)]
    pub startup_delay_ms: u64,

    /// Fixed pause after each value sent to the controller
    #[arg(long, default_value_t = 0)]
    pub settle_delay_ms: u64,

    /// Line the firmware sends when the cycle finishes
    #[arg(long, value_enum, default_value = "complete")]
    pub completion_token: CompletionToken,

    #[arg(long, value_enum, default_value = "chart")]
    pub display: DisplayMode,

    /// List serial ports and exit
    #[arg(long)]
    pub list_ports: bool,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let port = self.port.clone().context("no serial port given (use --port or REFLOW_PORT)")?;

        let mut serial = SerialSettings::new(port);
        serial.baud_rate = self.baud;
        serial.data_bits = self.data_bits;
        serial.parity = self.parity;
        serial.stop_bits = self.stop_bits;
        serial.settle_delay = Duration::from_millis(self.settle_delay_ms);

        let mut config = SessionConfig::new(serial);
        config.read_timeout = Duration::from_millis(self.read_timeout_ms.max(1));
        config.startup_delay = Duration::from_millis(self.startup_delay_ms);
        config.sentinels = SentinelSet::new(self.completion_token);
        Ok(config)
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
