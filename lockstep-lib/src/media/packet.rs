use std::sync::Arc;

/// Index of an elementary stream inside its container.
pub type StreamIndex = usize;

/// Rational time base used to convert container ticks to seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub numer: u32,
    pub denom: u32,
}

impl TimeBase {
    pub const MILLISECONDS: TimeBase = TimeBase {
        numer: 1,
        denom: 1000,
    };

    pub fn new(numer: u32, denom: u32) -> Self {
        Self { numer, denom }
    }

    /// Convert a tick count to seconds. A zero denominator yields NaN.
    pub fn seconds(&self, ticks: u64) -> f64 {
        if self.denom == 0 {
            return f64::NAN;
        }
        ticks as f64 * self.numer as f64 / self.denom as f64
    }

    /// Convert seconds to the nearest tick count, saturating at zero.
    pub fn ticks(&self, seconds: f64) -> u64 {
        if self.numer == 0 || !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        (seconds * self.denom as f64 / self.numer as f64).round() as u64
    }
}

/// Compressed, stream-tagged unit of media data.
///
/// The payload is reference counted so queue hand-offs and decoder copies
/// never duplicate the bytes.
#[derive(Debug, Clone)]
pub struct Packet {
    pub stream: StreamIndex,
    pub data: Arc<[u8]>,
    /// Presentation timestamp in `time_base` ticks.
    pub ts: u64,
    /// Duration in `time_base` ticks.
    pub dur: u64,
    pub time_base: TimeBase,
}

impl Packet {
    pub fn new(
        stream: StreamIndex,
        data: impl Into<Arc<[u8]>>,
        ts: u64,
        dur: u64,
        time_base: TimeBase,
    ) -> Self {
        Self {
            stream,
            data: data.into(),
            ts,
            dur,
            time_base,
        }
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Presentation timestamp in seconds.
    pub fn pts(&self) -> f64 {
        self.time_base.seconds(self.ts)
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.time_base.seconds(self.dur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_converts_ticks_to_seconds() {
        let packet = Packet::new(1, vec![0u8; 32], 1500, 20, TimeBase::MILLISECONDS);
        assert_eq!(packet.size(), 32);
        assert!((packet.pts() - 1.5).abs() < 1e-9);
        assert!((packet.duration() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn zero_denominator_is_unknown_time() {
        assert!(TimeBase::new(1, 0).seconds(10).is_nan());
        assert_eq!(TimeBase::new(1, 48_000).ticks(-1.0), 0);
        assert_eq!(TimeBase::new(1, 48_000).ticks(0.5), 24_000);
    }
}
