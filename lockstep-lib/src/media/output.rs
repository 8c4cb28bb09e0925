//! Audio output through rodio.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};
use rodio::buffer::SamplesBuffer;
use rodio::mixer::Mixer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use super::frame::{Frame, FramePayload};
use super::sink::FrameSink;

const OUTPUT_STREAM_OPEN_RETRIES: usize = 3;
const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;

/// Open the default output device, retrying a few times before giving up.
///
/// The returned stream must outlive every [`RodioSink`] connected to its
/// mixer.
pub fn open_default_output() -> Option<OutputStream> {
    for attempt in 1..=OUTPUT_STREAM_OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(mut stream) => {
                stream.log_on_drop(false);
                return Some(stream);
            }
            Err(err) => {
                if attempt == OUTPUT_STREAM_OPEN_RETRIES {
                    error!(
                        "failed to open default output stream after {} attempts: {}",
                        OUTPUT_STREAM_OPEN_RETRIES, err
                    );
                    return None;
                }
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                );
                thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
            }
        }
    }
    None
}

/// Audio sink appending paced frames to a rodio [`Sink`].
///
/// Frames are released by the clock right at their presentation time, so an
/// optional silence pre-roll keeps the device queue slightly ahead of the
/// clock. The pre-roll is re-inserted after every flush.
pub struct RodioSink {
    sink: Sink,
    preroll_ms: f32,
    needs_preroll: AtomicBool,
    paused: AtomicBool,
}

impl RodioSink {
    /// Connect a new sink to the given output mixer.
    pub fn connect(mixer: &Mixer) -> Self {
        let sink = Sink::connect_new(mixer);
        sink.play();
        Self {
            sink,
            preroll_ms: 0.0,
            needs_preroll: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }

    /// Configure the silence pre-roll (ms) inserted before the first frame.
    pub fn with_preroll_ms(mut self, preroll_ms: f32) -> Self {
        self.preroll_ms = preroll_ms.max(0.0);
        self.needs_preroll
            .store(self.preroll_ms > 0.0, Ordering::Relaxed);
        self
    }

    pub fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.max(0.0));
    }

    pub fn volume(&self) -> f32 {
        self.sink.volume()
    }

    /// Number of buffers queued on the device sink.
    pub fn queued(&self) -> usize {
        self.sink.len()
    }

    fn append_preroll(&self, channels: u16, sample_rate: u32) {
        if !self.needs_preroll.swap(false, Ordering::Relaxed) {
            return;
        }
        let samples = ((self.preroll_ms / 1000.0) * sample_rate as f32).ceil() as usize
            * channels as usize;
        let silence = vec![0.0_f32; samples.max(1)];
        self.sink
            .append(SamplesBuffer::new(channels, sample_rate, silence));
    }
}

impl FrameSink for RodioSink {
    fn emit(&self, frame: Frame) {
        if let FramePayload::Audio {
            channels,
            sample_rate,
            samples,
        } = frame.payload
        {
            if channels == 0 || sample_rate == 0 || samples.is_empty() {
                return;
            }
            self.append_preroll(channels, sample_rate);
            self.sink
                .append(SamplesBuffer::new(channels, sample_rate, samples.to_vec()));
        }
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
        if paused {
            self.sink.pause();
        } else {
            self.sink.play();
        }
    }

    fn flush(&self) {
        // Sink::clear also pauses the sink.
        self.sink.clear();
        if !self.paused.load(Ordering::Relaxed) {
            self.sink.play();
        }
        self.needs_preroll
            .store(self.preroll_ms > 0.0, Ordering::Relaxed);
        debug!("audio output flushed");
    }
}
