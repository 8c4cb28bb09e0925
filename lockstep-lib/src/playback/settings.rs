//! Tunable pipeline parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::clock::DEFAULT_FRAME_INTERVAL;
use crate::sync::queue::{MIN_QUEUED_PACKETS, MIN_QUEUED_SECONDS};

/// Combined queue size (bytes) above which the demux thread backs off.
pub const MAX_QUEUE_BYTES: usize = 15 * 1024 * 1024;
/// Sleep between demux retries when backing off or idling.
pub const POLL_INTERVAL_MS: u64 = 10;

/// Buffering and pacing limits applied to a player's pipeline.
///
/// Missing JSON fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Combined video + audio queue bytes that trigger backpressure.
    pub max_queue_bytes: usize,
    /// Packets a queue must exceed to count as buffered enough.
    pub min_queued_packets: usize,
    /// Seconds a queue must exceed to count as buffered enough.
    pub min_queued_seconds: f64,
    pub poll_interval_ms: u64,
    /// Frame spacing assumed when a stream does not report one.
    pub default_frame_interval: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_queue_bytes: MAX_QUEUE_BYTES,
            min_queued_packets: MIN_QUEUED_PACKETS,
            min_queued_seconds: MIN_QUEUED_SECONDS,
            poll_interval_ms: POLL_INTERVAL_MS,
            default_frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

impl PipelineSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::sanitized)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Clamp values that would stall the pipeline.
    pub fn sanitized(mut self) -> Self {
        self.poll_interval_ms = self.poll_interval_ms.max(1);
        if !self.min_queued_seconds.is_finite() || self.min_queued_seconds < 0.0 {
            self.min_queued_seconds = MIN_QUEUED_SECONDS;
        }
        if !self.default_frame_interval.is_finite() || self.default_frame_interval <= 0.0 {
            self.default_frame_interval = DEFAULT_FRAME_INTERVAL;
        }
        self
    }
}
