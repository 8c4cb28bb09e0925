//! Collaborator traits consumed by the playback pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::MediaError;

use super::frame::Frame;
use super::packet::{Packet, StreamIndex};

/// Cooperative cancellation token.
///
/// Passed by reference into every blocking collaborator call; implementations
/// poll it and bail out with [`MediaError::Interrupted`] once it is set.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Return `Err(Interrupted)` when the token is set.
    pub fn check(&self) -> Result<(), MediaError> {
        if self.is_set() {
            Err(MediaError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Stream layout and capabilities reported when a source is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub video_stream: Option<StreamIndex>,
    pub audio_stream: Option<StreamIndex>,
    /// Total duration in seconds, `0.0` when unknown.
    pub duration: f64,
    pub seekable: bool,
    /// Nominal spacing between video frames in seconds.
    pub video_frame_interval: Option<f64>,
    /// Nominal duration of one decoded audio frame in seconds.
    pub audio_frame_interval: Option<f64>,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        self.video_stream.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_stream.is_some()
    }

    pub fn duration_ms(&self) -> i64 {
        seconds_to_ms(self.duration)
    }
}

/// Outcome of a single [`Demuxer::read_packet`] call.
#[derive(Debug)]
pub enum ReadOutcome {
    Packet(Packet),
    /// Nothing available right now; retry later.
    Again,
    EndOfStream,
}

/// Container reader producing packets for the selected streams.
pub trait Demuxer: Send {
    fn read_packet(&mut self, interrupt: &Interrupt) -> Result<ReadOutcome, MediaError>;

    fn seek_to(&mut self, seconds: f64, interrupt: &Interrupt) -> Result<(), MediaError>;

    fn is_eof(&self) -> bool;
}

/// Per-stream decoder.
pub trait Decoder: Send {
    /// Decode one packet. `Ok(None)` means more input is needed.
    fn decode(&mut self, packet: &Packet) -> Result<Option<Frame>, MediaError>;

    /// Drop any internal state carried across packets (after a seek).
    fn flush(&mut self) {}
}

/// Everything a backend hands over for one opened source.
pub struct OpenedMedia {
    pub info: MediaInfo,
    pub demuxer: Box<dyn Demuxer>,
    pub video_decoder: Option<Box<dyn Decoder>>,
    pub audio_decoder: Option<Box<dyn Decoder>>,
}

/// Opens sources by URL.
pub trait MediaBackend: Send + Sync {
    fn open(&self, url: &str, interrupt: &Interrupt) -> Result<OpenedMedia, MediaError>;
}

pub(crate) fn seconds_to_ms(seconds: f64) -> i64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as i64
}
