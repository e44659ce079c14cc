use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serialport::{SerialPort, SerialPortType};
use tokio::time::timeout;

use super::{Result, SerialDeviceInfo, SerialError};

pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Upper bound on a single telemetry or echo line. Anything longer is noise.
const MAX_LINE_BYTES: usize = 4096;

/// Line-oriented, half-duplex access to the oven controller.
///
/// `read_line` never hands back a partial line: bytes of an unfinished line
/// stay buffered until a terminator arrives on a later call.
#[async_trait]
pub trait LineTransport: Send {
    /// Read one line without its terminator, or fail with `SerialError::Timeout`.
    async fn read_line(&mut self, wait: Duration) -> Result<String>;

    /// Send `line` followed by a newline.
    async fn write_line(&mut self, line: &str) -> Result<()>;

    /// Drop everything received but not yet read, buffered lines included.
    fn discard_input(&mut self) -> Result<()>;

    /// Release the device. Calling it again is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum DataBitsSetting {
    #[value(name = "5")]
    Five,
    #[value(name = "6")]
    Six,
    #[value(name = "7")]
    Seven,
    #[value(name = "8")]
    Eight,
}

impl From<DataBitsSetting> for serialport::DataBits {
    fn from(bits: DataBitsSetting) -> Self {
        match bits {
            DataBitsSetting::Five => serialport::DataBits::Five,
            DataBitsSetting::Six => serialport::DataBits::Six,
            DataBitsSetting::Seven => serialport::DataBits::Seven,
            DataBitsSetting::Eight => serialport::DataBits::Eight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ParitySetting {
    None,
    Odd,
    Even,
}

impl From<ParitySetting> for serialport::Parity {
    fn from(parity: ParitySetting) -> Self {
        match parity {
            ParitySetting::None => serialport::Parity::None,
            ParitySetting::Odd => serialport::Parity::Odd,
            ParitySetting::Even => serialport::Parity::Even,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum StopBitsSetting {
    #[value(name = "1")]
    One,
    #[value(name = "2")]
    Two,
}

impl From<StopBitsSetting> for serialport::StopBits {
    fn from(bits: StopBitsSetting) -> Self {
        match bits {
            StopBitsSetting::One => serialport::StopBits::One,
            StopBitsSetting::Two => serialport::StopBits::Two,
        }
    }
}

/// Port parameters. These must match whatever the firmware was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: DataBitsSetting,
    pub parity: ParitySetting,
    pub stop_bits: StopBitsSetting,
    /// Grace period after every write so the firmware can digest the value.
    pub settle_delay: Duration,
}

impl SerialSettings {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBitsSetting::Eight,
            parity: ParitySetting::None,
            stop_bits: StopBitsSetting::One,
            settle_delay: Duration::ZERO,
        }
    }
}

/// Bytes received from the device that have not been handed out as a line yet.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    bytes: Vec<u8>,
    /// Set once an oversized line was dropped; cleared at that line's terminator.
    skipping: bool,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        let chunk = if self.skipping {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.skipping = false;
                    &chunk[pos + 1..]
                }
                None => return,
            }
        } else {
            chunk
        };
        self.bytes.extend_from_slice(chunk);
    }

    /// Next complete line, if one has arrived.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        if let Some(line) = take_line(&mut self.bytes) {
            return Some(line);
        }
        if self.bytes.len() > MAX_LINE_BYTES {
            log::warn!("Discarding {} bytes without a line terminator", self.bytes.len());
            self.bytes.clear();
            self.skipping = true;
        }
        None
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
        self.skipping = false;
    }
}

pub struct SerialInterface {
    port: Option<Box<dyn SerialPort>>,
    settings: SerialSettings,
    buffer: LineBuffer,
}

impl SerialInterface {
    /// List every serial port the OS reports, with USB metadata where known.
    pub fn discover_ports() -> Result<Vec<SerialDeviceInfo>> {
        let ports = serialport::available_ports()?;

        Ok(ports
            .into_iter()
            .map(|port| match port.port_type {
                SerialPortType::UsbPort(usb_info) => SerialDeviceInfo {
                    port_name: port.port_name,
                    vid: Some(usb_info.vid),
                    pid: Some(usb_info.pid),
                    serial_number: usb_info.serial_number,
                    manufacturer: usb_info.manufacturer,
                    product: usb_info.product,
                },
                _ => SerialDeviceInfo {
                    port_name: port.port_name,
                    vid: None,
                    pid: None,
                    serial_number: None,
                    manufacturer: None,
                    product: None,
                },
            })
            .collect())
    }

    /// Claim the port described by `settings`.
    pub fn open(settings: SerialSettings) -> Result<Self> {
        let port = serialport::new(&settings.port_name, settings.baud_rate)
            .data_bits(settings.data_bits.into())
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.into())
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| SerialError::ConnectionFailed(format!("{}: {}", settings.port_name, e)))?;

        log::info!(
            "Opened {} at {} baud ({:?}, {:?} parity, {:?} stop bits)",
            settings.port_name,
            settings.baud_rate,
            settings.data_bits,
            settings.parity,
            settings.stop_bits
        );

        Ok(Self::from_port(port, settings))
    }

    pub(crate) fn from_port(port: Box<dyn SerialPort>, settings: SerialSettings) -> Self {
        Self {
            port: Some(port),
            settings,
            buffer: LineBuffer::default(),
        }
    }
}

#[async_trait]
impl LineTransport for SerialInterface {
    async fn read_line(&mut self, wait: Duration) -> Result<String> {
        if let Some(line) = self.buffer.next_line() {
            return Ok(line);
        }

        let port = self.port.as_mut().ok_or(SerialError::NotConnected)?;
        let pending = &mut self.buffer;

        let read_operation = async {
            let mut buffer = [0u8; 256];
            loop {
                match port.bytes_to_read() {
                    Ok(0) => {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    Ok(available) => {
                        let want = (available as usize).min(buffer.len());
                        match port.read(&mut buffer[..want]) {
                            Ok(bytes_read) => {
                                pending.push(&buffer[..bytes_read]);
                                if let Some(line) = pending.next_line() {
                                    return Ok(line);
                                }
                            }
                            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                            Err(e) => return Err(SerialError::IoError(e)),
                        }
                    }
                    Err(e) => return Err(SerialError::SerialportError(e)),
                }
            }
        };

        timeout(wait, read_operation)
            .await
            .map_err(|_| SerialError::Timeout)?
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let port = self.port.as_mut().ok_or(SerialError::NotConnected)?;

        port.write_all(format!("{}\n", line).as_bytes())?;
        port.flush()?;
        log::debug!("-> {}", line);

        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(SerialError::NotConnected)?;
        port.clear(serialport::ClearBuffer::Input)?;

        let dropped = self.buffer.len();
        if dropped > 0 {
            log::debug!("Dropped {} unread bytes", dropped);
        }
        self.buffer.clear();
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            log::info!("Closed {}", self.settings.port_name);
        }
        self.buffer.clear();
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialInterface {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pop the first complete line off `buffer`, dropping `\n` or `\r\n`.
pub(crate) fn take_line(buffer: &mut Vec<u8>) -> Option<String> {
    let newline_pos = buffer.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=newline_pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    let line = String::from_utf8_lossy(&line).into_owned();
    log::debug!("<- {}", line);
    Some(line)
}
