//! OBD-II Session over an Adapter Channel
//!
//! `Disconnected -> Connecting -> Initializing -> Ready`, back to
//! `Disconnected` on close or on any transport failure. There is no
//! automatic reconnect.

use crate::capability::{self, SupportedPids};
use crate::channel::{
    AdapterChannel, SerialChannel, DEFAULT_READ_TIMEOUT_MS, DEFAULT_SETTLE_DELAY_MS,
};
use crate::dtc::{self, CodeTable, TroubleCode};
use crate::error::ObdError;
use crate::init::{InitPolicy, InitSequencer, DEFAULT_INIT_DELAY_MS};
use crate::pid::{self, PidReading};
use crate::protocol::ObdProtocol;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default serial speed for ELM327 clones
pub const DEFAULT_BAUD_RATE: u32 = 38400;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Initializing,
    Ready,
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Serial device path
    pub device: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Protocol forced (or auto-selected) during init
    pub protocol: ObdProtocol,
    /// How init answers are treated
    pub init_policy: InitPolicy,
    /// Pause between init commands (ms)
    pub init_delay_ms: u64,
    /// Wait between write and read (ms)
    pub settle_delay_ms: u64,
    /// Upper bound for one response (ms)
    pub read_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: "/dev/rfcomm0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            protocol: ObdProtocol::Auto,
            init_policy: InitPolicy::BestEffort,
            init_delay_ms: DEFAULT_INIT_DELAY_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    fn sequencer(&self) -> InitSequencer {
        InitSequencer::new(self.protocol)
            .with_policy(self.init_policy)
            .with_command_delay(Duration::from_millis(self.init_delay_ms))
    }
}

/// Exclusive owner of one adapter channel
pub struct ObdSession<C: AdapterChannel> {
    channel: C,
    config: SessionConfig,
    state: SessionState,
    supported: Option<SupportedPids>,
}

impl ObdSession<SerialChannel> {
    /// Open the configured serial device and initialise the adapter
    pub async fn connect(config: SessionConfig) -> Result<Self, ObdError> {
        info!("Connecting to OBD adapter on {}", config.device);

        let channel = SerialChannel::open(
            &config.device,
            config.baud_rate,
            Duration::from_millis(config.settle_delay_ms),
            Duration::from_millis(config.read_timeout_ms),
        )
        .map_err(|e| {
            error!("Failed to open {}: {}", config.device, e);
            e
        })?;

        let mut session = Self::new(channel, config);
        session.state = SessionState::Connecting;
        session.initialize().await?;
        Ok(session)
    }
}

impl<C: AdapterChannel> ObdSession<C> {
    /// Wrap an already open channel; call [`initialize`](Self::initialize) next
    pub fn new(channel: C, config: SessionConfig) -> Self {
        Self {
            channel,
            config,
            state: SessionState::Connecting,
            supported: None,
        }
    }

    /// Run the init sequence and move to `Ready`
    pub async fn initialize(&mut self) -> Result<(), ObdError> {
        if self.state != SessionState::Connecting {
            return Err(ObdError::NotReady(self.state));
        }

        self.state = SessionState::Initializing;
        let sequencer = self.config.sequencer();
        match sequencer.run(&mut self.channel).await {
            Ok(()) => {
                self.state = SessionState::Ready;
                info!("OBD adapter initialized successfully");
                Ok(())
            }
            Err(e) => {
                warn!("Adapter initialisation failed: {}", e);
                self.drop_channel().await;
                Err(e)
            }
        }
    }

    /// Probe supported PIDs; the result is cached for the session
    pub async fn probe_capabilities(&mut self) -> Result<&SupportedPids, ObdError> {
        self.ensure_ready()?;
        let supported = match self.supported.take() {
            Some(supported) => supported,
            None => {
                let probed = capability::probe(&mut self.channel).await;
                self.track(probed).await?
            }
        };
        Ok(&*self.supported.insert(supported))
    }

    /// Supported set, if probed
    pub fn supported(&self) -> Option<&SupportedPids> {
        self.supported.as_ref()
    }

    /// Query and decode one PID
    ///
    /// `Ok(None)` means the adapter answered but no value could be read.
    /// PIDs outside the probed set are never sent.
    pub async fn query_pid(&mut self, pid: u8) -> Result<Option<PidReading>, ObdError> {
        self.ensure_ready()?;
        if self.supported.is_none() {
            self.probe_capabilities().await?;
        }
        let allowed = self.supported.as_ref().is_some_and(|s| s.contains(pid));
        if !allowed {
            return Err(ObdError::PidNotSupported(pid));
        }

        debug!("Querying PID {:02X}", pid);
        let command = format!("01{:02X}", pid);
        let exchanged = self.channel.send_and_receive(&command).await;
        let response = self.track(exchanged).await?;
        Ok(pid::decode(pid, &response))
    }

    /// Read stored codes, described from `table`
    pub async fn read_stored_codes(
        &mut self,
        table: &CodeTable,
    ) -> Result<Vec<TroubleCode>, ObdError> {
        self.ensure_ready()?;
        let read = dtc::read_stored_codes(&mut self.channel, table).await;
        self.track(read).await
    }

    /// Clear stored codes; `Ok(false)` when not confirmed
    pub async fn clear_stored_codes(&mut self) -> Result<bool, ObdError> {
        self.ensure_ready()?;
        let cleared = dtc::clear_stored_codes(&mut self.channel).await;
        self.track(cleared).await
    }

    /// Close the channel
    pub async fn close(&mut self) {
        if self.state != SessionState::Disconnected {
            info!("Disconnecting OBD session");
            self.drop_channel().await;
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if the session accepts queries
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Settings this session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn ensure_ready(&self) -> Result<(), ObdError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ObdError::NotReady(self.state))
        }
    }

    /// Disconnect on transport failures, pass everything else through
    async fn track<T>(&mut self, result: Result<T, ObdError>) -> Result<T, ObdError> {
        if let Err(e) = &result {
            if e.is_transport() {
                error!("Transport failure, session disconnected: {}", e);
                self.drop_channel().await;
            }
        }
        result
    }

    async fn drop_channel(&mut self) {
        self.channel.close().await;
        self.state = SessionState::Disconnected;
    }
}

/// A ready session is itself a channel, so collaborators can share it
/// without bypassing readiness or failure tracking.
#[async_trait]
impl<C: AdapterChannel> AdapterChannel for ObdSession<C> {
    async fn send_and_receive(&mut self, command: &str) -> Result<String, ObdError> {
        self.ensure_ready()?;
        let exchanged = self.channel.send_and_receive(command).await;
        self.track(exchanged).await
    }

    async fn close(&mut self) {
        if self.state != SessionState::Disconnected {
            self.drop_channel().await;
        }
    }
}
