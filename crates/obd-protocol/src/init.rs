//! Adapter Initialisation Sequence

use crate::channel::AdapterChannel;
use crate::error::ObdError;
use crate::protocol::ObdProtocol;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default pause between two configuration commands
pub const DEFAULT_INIT_DELAY_MS: u64 = 400;

/// Echo off, linefeeds off, spaces off, headers on
const FORMAT_COMMANDS: [&str; 4] = ["ATE0", "ATL0", "ATS0", "ATH1"];

/// How configuration answers are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitPolicy {
    /// Send every command and ignore what comes back
    #[default]
    BestEffort,
    /// Require `OK` in every answer, abort on the first that lacks it
    Strict,
}

/// Sends the fixed adapter configuration once per connection
#[derive(Debug, Clone)]
pub struct InitSequencer {
    protocol: ObdProtocol,
    policy: InitPolicy,
    command_delay: Duration,
}

impl InitSequencer {
    /// Create a best-effort sequencer ending with `protocol`'s select command
    pub fn new(protocol: ObdProtocol) -> Self {
        Self {
            protocol,
            policy: InitPolicy::BestEffort,
            command_delay: Duration::from_millis(DEFAULT_INIT_DELAY_MS),
        }
    }

    /// Set the response policy
    pub fn with_policy(mut self, policy: InitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the pause between commands
    pub fn with_command_delay(mut self, delay: Duration) -> Self {
        self.command_delay = delay;
        self
    }

    /// Commands in the order they are sent
    pub fn commands(&self) -> [&'static str; 5] {
        let [echo, linefeed, spaces, headers] = FORMAT_COMMANDS;
        [echo, linefeed, spaces, headers, self.protocol.to_elm_command()]
    }

    /// Run the sequence
    ///
    /// Transport failures always abort. Answer content is only checked
    /// under [`InitPolicy::Strict`].
    pub async fn run<C>(&self, channel: &mut C) -> Result<(), ObdError>
    where
        C: AdapterChannel + ?Sized,
    {
        info!(
            "Configuring adapter ({:?}, {:?})",
            self.protocol, self.policy
        );

        for (i, command) in self.commands().into_iter().enumerate() {
            if i > 0 && !self.command_delay.is_zero() {
                tokio::time::sleep(self.command_delay).await;
            }

            let response = channel.send_and_receive(command).await?;
            let accepted = response.to_ascii_uppercase().contains("OK");

            match (self.policy, accepted) {
                (_, true) => debug!("{} accepted", command),
                (InitPolicy::BestEffort, false) => {
                    warn!("{} answered {:?}, continuing", command, response.trim())
                }
                (InitPolicy::Strict, false) => {
                    return Err(ObdError::InitRejected {
                        command: command.to_string(),
                        response: response.trim().to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
