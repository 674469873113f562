//! OBD-II Client for ELM327 Adapters
//!
//! Provides async serial communication with OBD-II adapters.

use crate::elm::{self, PROMPT, READ_VOLTAGE};
use crate::error::ObdError;
use crate::pid::{Pid, PidResponse};
use crate::protocol::ObdProtocol;
use crate::transport::DiagnosticTransport;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

/// Default timeout for OBD commands
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default serial baud rate for ELM327 adapters
pub const DEFAULT_BAUD_RATE: u32 = 38400;

/// Setup commands sent after reset, before the protocol selection
const SETUP_COMMANDS: [&str; 4] = ["ATE0", "ATL0", "ATS0", "ATH0"];

/// Empty waits for a late reply before it is written off as lost
const MAX_MISSED_DRAINS: u32 = 3;

/// OBD-II client for communicating with ELM327-compatible adapters
pub struct ObdClient<S> {
    /// Serial port device path (e.g., "/dev/ttyUSB0")
    device: String,
    /// Byte stream to the adapter
    stream: S,
    /// OBD protocol to use
    protocol: ObdProtocol,
    /// Command timeout
    timeout: Duration,
    /// Whether the client is connected
    connected: bool,
    /// Bytes read past the last prompt
    pending: Vec<u8>,
    /// Replies still owed by the adapter for commands that timed out
    stale_replies: usize,
    /// Consecutive waits for a stale reply that saw no prompt
    missed_drains: u32,
}

impl ObdClient<SerialStream> {
    /// Open the serial port of an adapter
    ///
    /// # Arguments
    /// * `device` - Serial port device path
    /// * `baud_rate` - Baud rate for serial communication
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, ObdError> {
        info!("Opening OBD adapter on {} at {} baud", device, baud_rate);
        let stream = tokio_serial::new(device, baud_rate).open_native_async()?;
        Ok(Self::with_stream(device, stream))
    }
}

impl<S> ObdClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already opened byte stream
    pub fn with_stream(device: &str, stream: S) -> Self {
        Self {
            device: device.to_string(),
            stream,
            protocol: ObdProtocol::Auto,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            connected: false,
            pending: Vec::new(),
            stale_replies: 0,
            missed_drains: 0,
        }
    }

    /// Initialize the ELM327 adapter: reset, silence echo/linefeeds/spaces/
    /// headers, then select the protocol.
    pub async fn initialize(&mut self) -> Result<(), ObdError> {
        info!("Initializing OBD adapter on {}", self.device);
        self.connected = true;

        // The reset banner can be preceded by line noise, so only the prompt matters.
        self.send_command("ATZ").await?;

        for command in SETUP_COMMANDS {
            self.expect_ok(command).await?;
        }
        let select = self.protocol.to_elm_command();
        self.expect_ok(&select).await?;

        info!("OBD adapter initialized successfully");
        Ok(())
    }

    /// Set the OBD protocol
    pub async fn set_protocol(&mut self, protocol: ObdProtocol) -> Result<(), ObdError> {
        info!("Setting OBD protocol to {}", protocol);
        if self.connected {
            self.expect_ok(&protocol.to_elm_command()).await?;
        }
        self.protocol = protocol;
        Ok(())
    }

    /// Set command timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Check if client is connected
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Get current protocol
    pub fn protocol(&self) -> ObdProtocol {
        self.protocol
    }

    /// Send one command and return the raw reply up to and including the prompt.
    ///
    /// A command that times out still owes a reply. That reply is read and
    /// discarded before the next command goes out, so replies never shift
    /// onto later commands. While it is still outstanding, new commands fail
    /// with [`ObdError::Timeout`] without being sent.
    pub async fn send_command(&mut self, command: &str) -> Result<String, ObdError> {
        if !self.connected {
            return Err(ObdError::AdapterNotResponding);
        }

        let result = self.run_command(command).await;
        if let Err(e) = &result {
            if e.is_session_lost() {
                warn!("Lost OBD adapter on {}: {}", self.device, e);
                self.connected = false;
            }
        }
        result
    }

    async fn run_command(&mut self, command: &str) -> Result<String, ObdError> {
        if self.stale_replies > 0 {
            self.drain_stale_replies().await?;
        }

        debug!("Sending to adapter: {:?}", command);
        match tokio::time::timeout(self.timeout, self.exchange(command)).await {
            Ok(result) => result,
            Err(_) => {
                self.stale_replies += 1;
                Err(self.timeout_error())
            }
        }
    }

    async fn exchange(&mut self, command: &str) -> Result<String, ObdError> {
        self.stream.write_all(command.as_bytes()).await?;
        self.stream.write_all(b"\r").await?;
        self.stream.flush().await?;

        let reply = self.read_reply().await?;
        let reply = String::from_utf8_lossy(&reply).into_owned();
        debug!("Reply from adapter: {:?}", reply);
        Ok(reply)
    }

    /// Read up to and including the next prompt. Anything after the prompt
    /// stays buffered for the next read.
    async fn read_reply(&mut self) -> Result<Vec<u8>, ObdError> {
        let mut buffer = [0u8; 64];
        loop {
            if let Some(end) = self.pending.iter().position(|b| *b == PROMPT) {
                let rest = self.pending.split_off(end + 1);
                return Ok(std::mem::replace(&mut self.pending, rest));
            }

            // Cancel safe: bytes land in `pending` only once a read completes.
            let n = self.stream.read(&mut buffer).await?;
            if n == 0 {
                return Err(ObdError::SessionLost(format!(
                    "{} closed while waiting for a reply",
                    self.device
                )));
            }
            self.pending.extend_from_slice(&buffer[..n]);
        }
    }

    async fn drain_stale_replies(&mut self) -> Result<(), ObdError> {
        while self.stale_replies > 0 {
            match tokio::time::timeout(self.timeout, self.read_reply()).await {
                Ok(reply) => {
                    let reply = reply?;
                    debug!(
                        "Discarding late reply from {}: {:?}",
                        self.device,
                        String::from_utf8_lossy(&reply)
                    );
                    self.stale_replies -= 1;
                    self.missed_drains = 0;
                }
                Err(_) => {
                    self.missed_drains += 1;
                    if self.missed_drains < MAX_MISSED_DRAINS {
                        return Err(self.timeout_error());
                    }
                    warn!(
                        "Giving up on {} late reply(ies) from {}",
                        self.stale_replies, self.device
                    );
                    self.pending.clear();
                    self.stale_replies = 0;
                    self.missed_drains = 0;
                }
            }
        }
        Ok(())
    }

    fn timeout_error(&self) -> ObdError {
        ObdError::Timeout(self.timeout.as_millis() as u64)
    }

    async fn expect_ok(&mut self, command: &str) -> Result<(), ObdError> {
        let reply = self.send_command(command).await?;
        if elm::is_acknowledged(command, &reply) {
            Ok(())
        } else {
            Err(ObdError::InvalidResponse(format!(
                "{} was not acknowledged: {:?}",
                command, reply
            )))
        }
    }
}

#[async_trait]
impl<S> DiagnosticTransport for ObdClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn query_pid(&mut self, pid: Pid) -> Result<PidResponse, ObdError> {
        debug!("Querying PID {}", pid);
        let reply = self.send_command(&elm::pid_command(pid)).await?;
        let raw_bytes = elm::parse_pid_reply(pid, &reply)?;
        PidResponse::decode(pid, raw_bytes)
    }

    async fn read_voltage(&mut self) -> Result<f64, ObdError> {
        let reply = self.send_command(READ_VOLTAGE).await?;
        elm::parse_voltage_reply(&reply)
    }
}
