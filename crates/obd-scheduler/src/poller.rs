//! Sweep and Poller Implementation

use obd_protocol::{descriptor, AdapterChannel, ObdError, ObdSession, PidReading, CATALOG};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Configuration for the live poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Pause between the end of one sweep and the start of the next
    pub interval: Duration,
    /// PIDs to sweep, in order (default: the whole catalog)
    pub pids: Vec<u8>,
    /// Stop after this many sweeps; unbounded when `None`
    pub max_sweeps: Option<usize>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            pids: CATALOG.iter().map(|d| d.pid).collect(),
            max_sweeps: None,
        }
    }
}

/// Outcome for one parameter in a sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Sample {
    /// Decoded value
    Value(PidReading),
    /// Queried, but the answer held no usable value
    Absent,
    /// Not in the vehicle's supported set, so never sent
    Unsupported,
}

/// One parameter's slot in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    pub pid: u8,
    pub label: &'static str,
    pub sample: Sample,
}

/// Result of one sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSnapshot {
    /// Sweep start (Unix ms)
    pub timestamp_ms: u64,
    /// Entries in sweep order
    pub entries: Vec<SnapshotEntry>,
}

impl LiveSnapshot {
    /// Decoded value for a PID, if any
    pub fn value(&self, pid: u8) -> Option<f64> {
        self.entries.iter().find_map(|e| match &e.sample {
            Sample::Value(reading) if e.pid == pid => Some(reading.value),
            _ => None,
        })
    }

    /// Number of parameters that produced a value
    pub fn value_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.sample, Sample::Value(_)))
            .count()
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Repeated live-data sweeps over one session
pub struct LivePoller {
    config: PollerConfig,
    sweeps: usize,
}

impl LivePoller {
    /// Create a poller; PIDs outside the catalog are dropped
    pub fn new(mut config: PollerConfig) -> Self {
        config.pids.retain(|&pid| {
            let known = descriptor(pid).is_some();
            if !known {
                warn!("PID {:02X} has no decoder, not polling it", pid);
            }
            known
        });
        info!("Live poller created with {} PIDs", config.pids.len());
        Self { config, sweeps: 0 }
    }

    /// Sweeps completed so far
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Query every configured PID once
    ///
    /// Probes capabilities first if the session has not yet. A transport
    /// failure aborts the sweep.
    pub async fn sweep<C: AdapterChannel>(
        &mut self,
        session: &mut ObdSession<C>,
    ) -> Result<LiveSnapshot, ObdError> {
        let timestamp_ms = now_ms();
        let supported = session.probe_capabilities().await?.clone();

        let mut entries = Vec::with_capacity(self.config.pids.len());
        for &pid in &self.config.pids {
            let Some(desc) = descriptor(pid) else {
                continue;
            };

            let sample = if !supported.contains(pid) {
                debug!("{} ({}) not supported", desc.label, desc.command());
                Sample::Unsupported
            } else {
                match session.query_pid(pid).await? {
                    Some(reading) => Sample::Value(reading),
                    None => Sample::Absent,
                }
            };

            entries.push(SnapshotEntry {
                pid,
                label: desc.label,
                sample,
            });
        }

        self.sweeps += 1;
        Ok(LiveSnapshot {
            timestamp_ms,
            entries,
        })
    }

    /// Sweep until the receiver goes away, `max_sweeps` is reached, or the
    /// session fails
    pub async fn run<C: AdapterChannel>(
        &mut self,
        session: &mut ObdSession<C>,
        snapshot_tx: mpsc::Sender<LiveSnapshot>,
    ) -> Result<(), ObdError> {
        info!("Starting live poller");

        let mut first = true;
        loop {
            if self.config.max_sweeps.is_some_and(|max| self.sweeps >= max) {
                break;
            }
            if !first {
                tokio::time::sleep(self.config.interval).await;
            }
            first = false;

            let snapshot = self.sweep(session).await.map_err(|e| {
                warn!("Sweep {} failed: {}", self.sweeps + 1, e);
                e
            })?;

            if snapshot_tx.send(snapshot).await.is_err() {
                debug!("Snapshot receiver dropped");
                break;
            }
        }

        info!("Live poller stopped after {} sweeps", self.sweeps);
        Ok(())
    }
}
