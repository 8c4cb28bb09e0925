//! Presentation sinks receiving emitted frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::frame::Frame;

/// Fire-and-forget receiver of paced frames.
///
/// The sink decides its own drop/buffer policy. `set_paused` and `flush`
/// are hints sent on transport changes and seeks.
pub trait FrameSink: Send + Sync {
    fn emit(&self, frame: Frame);

    fn set_paused(&self, _paused: bool) {}

    fn flush(&self) {}
}

/// Sink that discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn emit(&self, _frame: Frame) {}
}

/// Sink that only counts frames and remembers the last pts.
#[derive(Debug, Default)]
pub struct CountingSink {
    frames: AtomicU64,
    last_pts: Mutex<Option<f64>>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn last_pts(&self) -> Option<f64> {
        *self.last_pts.lock().unwrap()
    }
}

impl FrameSink for CountingSink {
    fn emit(&self, frame: Frame) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        *self.last_pts.lock().unwrap() = Some(frame.pts);
    }

    fn flush(&self) {
        *self.last_pts.lock().unwrap() = None;
    }
}
