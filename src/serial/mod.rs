pub mod interface;
pub mod scripted;

pub use interface::{LineTransport, SerialInterface, SerialSettings, DataBitsSetting, ParitySetting, StopBitsSetting};
pub use scripted::{ScriptItem, ScriptedTransport, TransportLog};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialDeviceInfo {
    pub port_name: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Port unavailable: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Communication timeout")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

impl SerialError {
    /// Timeouts are a soft condition: the device may just be quiet.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SerialError::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, SerialError>;
