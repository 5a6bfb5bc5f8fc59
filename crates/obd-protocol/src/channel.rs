//! Adapter Channel Contract
//!
//! The adapter speaks a half-duplex, line-oriented text protocol: a command
//! terminated by a carriage return, answered by free text that ends with the
//! `>` prompt. Only one command may be outstanding at a time, which is why
//! every implementation takes `&mut self`.

use crate::error::ObdError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

/// Prompt byte the adapter prints once it is ready for the next command
pub const PROMPT: u8 = b'>';

/// Command terminator
pub const TERMINATOR: char = '\r';

/// Default wait between writing a command and reading its answer
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

/// Default upper bound for a full response to arrive
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 3000;

/// A duplex text stream to an adapter
///
/// Returns the raw text received before the prompt. Nothing about its
/// content is validated here; `NO DATA`, `?` or an empty string are all
/// successful exchanges at this layer.
#[async_trait]
pub trait AdapterChannel: Send {
    /// Send one command and wait for the adapter's answer
    async fn send_and_receive(&mut self, command: &str) -> Result<String, ObdError>;

    /// Release the underlying transport; later exchanges must fail
    async fn close(&mut self) {}
}

/// Serial (USB or RFCOMM) connection to an ELM327 adapter
pub struct SerialChannel {
    /// Device path (e.g., "/dev/rfcomm0" or "COM3")
    device: String,
    /// Open port, `None` once closed
    port: Option<SerialStream>,
    /// Wait after each write before reading
    settle_delay: Duration,
    /// Upper bound for collecting a complete response
    read_timeout: Duration,
}

impl SerialChannel {
    /// Open a serial device
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        device: &str,
        baud_rate: u32,
        settle_delay: Duration,
        read_timeout: Duration,
    ) -> Result<Self, ObdError> {
        info!("Opening serial channel {} at {} baud", device, baud_rate);

        let port = tokio_serial::new(device, baud_rate)
            .timeout(read_timeout)
            .open_native_async()?;

        // Adapters print a banner on power-up; drop whatever is pending
        if let Err(e) = port.clear(ClearBuffer::Input) {
            warn!("Could not flush input buffer on {}: {}", device, e);
        }

        Ok(Self {
            device: device.to_string(),
            port: Some(port),
            settle_delay,
            read_timeout,
        })
    }

    /// Device path this channel was opened on
    pub fn device(&self) -> &str {
        &self.device
    }

    async fn read_until_prompt(
        port: &mut SerialStream,
        read_timeout: Duration,
    ) -> Result<String, ObdError> {
        let timeout_ms = read_timeout.as_millis() as u64;
        let collect = async {
            let mut buffer = [0u8; 64];
            let mut response = Vec::with_capacity(128);
            loop {
                let n = port.read(&mut buffer).await?;
                if n == 0 {
                    return Err(ObdError::Disconnected);
                }
                response.extend_from_slice(&buffer[..n]);
                if let Some(end) = response.iter().position(|&b| b == PROMPT) {
                    response.truncate(end);
                    return Ok(response);
                }
            }
        };

        let bytes = tokio::time::timeout(read_timeout, collect)
            .await
            .map_err(|_| ObdError::Timeout(timeout_ms))??;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[async_trait]
impl AdapterChannel for SerialChannel {
    async fn send_and_receive(&mut self, command: &str) -> Result<String, ObdError> {
        let port = self.port.as_mut().ok_or(ObdError::Disconnected)?;

        debug!("-> {}", command);
        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push(TERMINATOR);
        port.write_all(line.as_bytes()).await?;
        port.flush().await?;

        tokio::time::sleep(self.settle_delay).await;

        let response = Self::read_until_prompt(port, self.read_timeout).await?;
        debug!("<- {:?}", response);
        Ok(response)
    }

    async fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Closed serial channel {}", self.device);
        }
    }
}

/// In-memory adapter stand-in answering from a fixed script
///
/// Unknown commands get `?`, the adapter's own answer to input it does not
/// understand.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    responses: HashMap<String, String>,
    sent: Vec<String>,
    fail_on: Option<String>,
    closed: bool,
}

impl ScriptedChannel {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the answer to a command
    pub fn with_response(mut self, command: &str, response: &str) -> Self {
        self.responses
            .insert(command.to_string(), response.to_string());
        self
    }

    /// Answer every configuration command with `OK`
    pub fn with_init_ok(self) -> Self {
        const AT_COMMANDS: [&str; 14] = [
            "ATE0", "ATL0", "ATS0", "ATH1", "ATSP0", "ATSP1", "ATSP2", "ATSP3", "ATSP4",
            "ATSP5", "ATSP6", "ATSP7", "ATSP8", "ATSP9",
        ];
        AT_COMMANDS
            .into_iter()
            .fold(self, |channel, cmd| channel.with_response(cmd, "OK"))
    }

    /// Make the exchange for `command` fail as if the link dropped
    pub fn failing_on(mut self, command: &str) -> Self {
        self.fail_on = Some(command.to_string());
        self
    }

    /// Commands received so far, in order
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl AdapterChannel for ScriptedChannel {
    async fn send_and_receive(&mut self, command: &str) -> Result<String, ObdError> {
        if self.closed {
            return Err(ObdError::Disconnected);
        }
        self.sent.push(command.to_string());
        if self.fail_on.as_deref() == Some(command) {
            self.closed = true;
            return Err(ObdError::Disconnected);
        }
        Ok(self
            .responses
            .get(command)
            .cloned()
            .unwrap_or_else(|| "?".to_string()))
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_answers_and_records() {
        let mut channel = ScriptedChannel::new().with_response("0100", "4100BE3EB811");
        assert_eq!(channel.send_and_receive("0100").await.unwrap(), "4100BE3EB811");
        assert_eq!(channel.send_and_receive("ATZZ").await.unwrap(), "?");
        assert_eq!(channel.sent(), ["0100", "ATZZ"]);
    }

    #[tokio::test]
    async fn test_closed_channel_fails() {
        let mut channel = ScriptedChannel::new().with_response("03", "NO DATA");
        channel.close().await;
        let err = channel.send_and_receive("03").await.unwrap_err();
        assert!(err.is_transport());
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection_closes() {
        let mut channel = ScriptedChannel::new().failing_on("010C");
        assert!(channel.send_and_receive("010C").await.is_err());
        assert!(channel.is_closed());
        assert!(channel.send_and_receive("010D").await.is_err());
    }
}
