//! Live-Data Polling
//!
//! Sweeps the parameter catalog over a ready session, querying only what
//! the vehicle reported as supported, and repeats sweeps on an interval.

mod poller;

pub use poller::{LivePoller, LiveSnapshot, PollerConfig, Sample, SnapshotEntry};
