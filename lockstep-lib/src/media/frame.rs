use std::sync::Arc;

use super::packet::StreamIndex;

/// Decoded payload carried by a [`Frame`].
#[derive(Debug, Clone)]
pub enum FramePayload {
    /// Interleaved `f32` samples.
    Audio {
        channels: u16,
        sample_rate: u32,
        samples: Arc<[f32]>,
    },
    Video {
        width: u32,
        height: u32,
        data: Arc<[u8]>,
    },
}

/// Decoded, presentable unit of media data.
#[derive(Debug, Clone)]
pub struct Frame {
    pub stream: StreamIndex,
    /// Presentation timestamp in seconds, NaN when unknown.
    pub pts: f64,
    /// Duration in seconds.
    pub duration: f64,
    pub payload: FramePayload,
}

impl Frame {
    pub fn is_audio(&self) -> bool {
        matches!(self.payload, FramePayload::Audio { .. })
    }

    /// Rescale the audio sample rate for playback at `speed`.
    ///
    /// Video frames are returned unchanged; their pacing is handled by the
    /// clock divisor.
    pub fn scaled_for_speed(mut self, speed: f64) -> Self {
        if let FramePayload::Audio { sample_rate, .. } = &mut self.payload {
            if speed > 0.0 && speed != 1.0 {
                *sample_rate = ((*sample_rate as f64) * speed).round().max(1.0) as u32;
            }
        }
        self
    }
}
