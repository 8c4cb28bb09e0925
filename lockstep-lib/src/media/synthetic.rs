//! Deterministic in-memory media source.
//!
//! A `synthetic://` URL describes a generated source, for example
//! `synthetic://?audio_ms=999` (audio only) or
//! `synthetic://?audio_ms=5000&video_ms=5000&fps=25`. Packets are produced
//! instantly in pts order, which makes the backend useful for exercising the
//! pipeline without a container library.
//!
//! Recognised parameters: `audio_ms`, `video_ms`, `fps`, `audio_packet_ms`,
//! `packet_bytes`, `sample_rate`, `channels`, `open_delay_ms`, `seekable`
//! and `fail` (`open` or `seek`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::MediaError;

use super::backend::{
    Decoder, Demuxer, Interrupt, MediaBackend, MediaInfo, OpenedMedia, ReadOutcome,
};
use super::frame::{Frame, FramePayload};
use super::packet::{Packet, StreamIndex, TimeBase};

pub const SCHEME: &str = "synthetic://";

const OPEN_POLL: Duration = Duration::from_millis(5);
const VIDEO_SIZE: u32 = 16;

/// Parameters of a generated source.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub audio_ms: u64,
    pub video_ms: u64,
    pub fps: u32,
    pub audio_packet_ms: u64,
    pub packet_bytes: usize,
    pub sample_rate: u32,
    pub channels: u16,
    pub open_delay_ms: u64,
    pub seekable: bool,
    pub fail_open: bool,
    pub fail_seek: bool,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            audio_ms: 0,
            video_ms: 0,
            fps: 25,
            audio_packet_ms: 20,
            packet_bytes: 256,
            sample_rate: 8_000,
            channels: 1,
            open_delay_ms: 0,
            seekable: true,
            fail_open: false,
            fail_seek: false,
        }
    }
}

impl SyntheticSpec {
    pub fn audio(audio_ms: u64) -> Self {
        Self {
            audio_ms,
            ..Self::default()
        }
    }

    pub fn audio_video(duration_ms: u64, fps: u32) -> Self {
        Self {
            audio_ms: duration_ms,
            video_ms: duration_ms,
            fps,
            ..Self::default()
        }
    }

    pub fn with_packet_bytes(mut self, packet_bytes: usize) -> Self {
        self.packet_bytes = packet_bytes;
        self
    }

    pub fn with_open_delay_ms(mut self, open_delay_ms: u64) -> Self {
        self.open_delay_ms = open_delay_ms;
        self
    }

    pub fn with_seek_failure(mut self) -> Self {
        self.fail_seek = true;
        self
    }

    pub fn with_open_failure(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Parse a `synthetic://` URL.
    pub fn parse(url: &str) -> Result<Self, MediaError> {
        let rest = url
            .strip_prefix(SCHEME)
            .ok_or_else(|| MediaError::InvalidSource(url.to_string()))?;
        let query = rest.trim_start_matches('?');
        let mut spec = Self::default();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                MediaError::InvalidSource(format!("malformed parameter `{}`", pair))
            })?;
            let invalid =
                || MediaError::InvalidSource(format!("bad value for `{}`: {}", key, value));
            match key {
                "audio_ms" => spec.audio_ms = value.parse().map_err(|_| invalid())?,
                "video_ms" => spec.video_ms = value.parse().map_err(|_| invalid())?,
                "fps" => spec.fps = value.parse().map_err(|_| invalid())?,
                "audio_packet_ms" => spec.audio_packet_ms = value.parse().map_err(|_| invalid())?,
                "packet_bytes" => spec.packet_bytes = value.parse().map_err(|_| invalid())?,
                "sample_rate" => spec.sample_rate = value.parse().map_err(|_| invalid())?,
                "channels" => spec.channels = value.parse().map_err(|_| invalid())?,
                "open_delay_ms" => spec.open_delay_ms = value.parse().map_err(|_| invalid())?,
                "seekable" => spec.seekable = parse_flag(value).ok_or_else(invalid)?,
                "fail" => match value {
                    "open" => spec.fail_open = true,
                    "seek" => spec.fail_seek = true,
                    _ => return Err(invalid()),
                },
                _ => {
                    return Err(MediaError::InvalidSource(format!(
                        "unknown parameter `{}`",
                        key
                    )))
                }
            }
        }
        if spec.fps == 0
            || spec.audio_packet_ms == 0
            || spec.sample_rate == 0
            || spec.channels == 0
        {
            return Err(MediaError::InvalidSource(url.to_string()));
        }
        Ok(spec)
    }

    /// Render the spec back to a URL accepted by [`SyntheticSpec::parse`].
    pub fn url(&self) -> String {
        let defaults = Self::default();
        let mut params = vec![
            format!("audio_ms={}", self.audio_ms),
            format!("video_ms={}", self.video_ms),
        ];
        if self.fps != defaults.fps {
            params.push(format!("fps={}", self.fps));
        }
        if self.audio_packet_ms != defaults.audio_packet_ms {
            params.push(format!("audio_packet_ms={}", self.audio_packet_ms));
        }
        if self.packet_bytes != defaults.packet_bytes {
            params.push(format!("packet_bytes={}", self.packet_bytes));
        }
        if self.sample_rate != defaults.sample_rate {
            params.push(format!("sample_rate={}", self.sample_rate));
        }
        if self.channels != defaults.channels {
            params.push(format!("channels={}", self.channels));
        }
        if self.open_delay_ms > 0 {
            params.push(format!("open_delay_ms={}", self.open_delay_ms));
        }
        if !self.seekable {
            params.push("seekable=0".to_string());
        }
        if self.fail_open {
            params.push("fail=open".to_string());
        }
        if self.fail_seek {
            params.push("fail=seek".to_string());
        }
        format!("{}?{}", SCHEME, params.join("&"))
    }

    fn stream_layout(&self) -> (Option<StreamIndex>, Option<StreamIndex>) {
        match (self.video_ms > 0, self.audio_ms > 0) {
            (true, true) => (Some(0), Some(1)),
            (true, false) => (Some(0), None),
            (false, true) => (None, Some(0)),
            (false, false) => (None, None),
        }
    }

    fn generate_packets(&self) -> Vec<Packet> {
        let (video, audio) = self.stream_layout();
        let payload: Arc<[u8]> = Arc::from(vec![0u8; self.packet_bytes]);
        let mut packets = Vec::new();

        if let Some(stream) = video {
            let interval = 1000.0 / self.fps as f64;
            let count = (self.video_ms as f64 / interval).ceil() as u64;
            for index in 0..count {
                let ts = (index as f64 * interval).round() as u64;
                let end = (((index + 1) as f64 * interval).round() as u64).min(self.video_ms);
                packets.push(Packet::new(
                    stream,
                    payload.clone(),
                    ts,
                    end.saturating_sub(ts),
                    TimeBase::MILLISECONDS,
                ));
            }
        }
        if let Some(stream) = audio {
            let mut ts = 0;
            while ts < self.audio_ms {
                let dur = self.audio_packet_ms.min(self.audio_ms - ts);
                packets.push(Packet::new(
                    stream,
                    payload.clone(),
                    ts,
                    dur,
                    TimeBase::MILLISECONDS,
                ));
                ts += dur;
            }
        }
        // Stable sort keeps video ahead of audio at equal timestamps.
        packets.sort_by_key(|packet| packet.ts);
        packets
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Read counters shared by every source a [`SyntheticBackend`] opens.
#[derive(Debug, Default)]
pub struct SyntheticStats {
    opens: AtomicUsize,
    packets_read: AtomicUsize,
    seeks: AtomicUsize,
}

impl SyntheticStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn packets_read(&self) -> usize {
        self.packets_read.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }
}

/// Backend serving `synthetic://` URLs.
#[derive(Debug, Default, Clone)]
pub struct SyntheticBackend {
    stats: Arc<SyntheticStats>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<SyntheticStats> {
        self.stats.clone()
    }
}

impl MediaBackend for SyntheticBackend {
    fn open(&self, url: &str, interrupt: &Interrupt) -> Result<OpenedMedia, MediaError> {
        let spec = SyntheticSpec::parse(url)?;
        if spec.open_delay_ms > 0 {
            let deadline = Instant::now() + Duration::from_millis(spec.open_delay_ms);
            while Instant::now() < deadline {
                interrupt.check()?;
                thread::sleep(OPEN_POLL);
            }
        }
        interrupt.check()?;
        if spec.fail_open {
            return Err(MediaError::Unsupported(format!("cannot open {}", url)));
        }

        let (video_stream, audio_stream) = spec.stream_layout();
        if video_stream.is_none() && audio_stream.is_none() {
            return Err(MediaError::NoStreams);
        }
        self.stats.opens.fetch_add(1, Ordering::SeqCst);

        let packets = spec.generate_packets();
        debug!("synthetic source with {} packets: {}", packets.len(), url);
        let info = MediaInfo {
            video_stream,
            audio_stream,
            duration: spec.audio_ms.max(spec.video_ms) as f64 / 1000.0,
            seekable: spec.seekable,
            video_frame_interval: video_stream.map(|_| 1.0 / spec.fps as f64),
            audio_frame_interval: audio_stream.map(|_| spec.audio_packet_ms as f64 / 1000.0),
        };
        let decoder = |video: bool| {
            Box::new(SyntheticDecoder {
                video,
                sample_rate: spec.sample_rate,
                channels: spec.channels,
            }) as Box<dyn Decoder>
        };

        Ok(OpenedMedia {
            info,
            demuxer: Box::new(SyntheticDemuxer {
                packets,
                cursor: 0,
                eof: false,
                fail_seek: spec.fail_seek,
                stats: self.stats.clone(),
            }),
            video_decoder: video_stream.map(|_| decoder(true)),
            audio_decoder: audio_stream.map(|_| decoder(false)),
        })
    }
}

struct SyntheticDemuxer {
    packets: Vec<Packet>,
    cursor: usize,
    eof: bool,
    fail_seek: bool,
    stats: Arc<SyntheticStats>,
}

impl Demuxer for SyntheticDemuxer {
    fn read_packet(&mut self, interrupt: &Interrupt) -> Result<ReadOutcome, MediaError> {
        interrupt.check()?;
        match self.packets.get(self.cursor) {
            Some(packet) => {
                self.cursor += 1;
                self.eof = false;
                self.stats.packets_read.fetch_add(1, Ordering::SeqCst);
                Ok(ReadOutcome::Packet(packet.clone()))
            }
            None => {
                self.eof = true;
                Ok(ReadOutcome::EndOfStream)
            }
        }
    }

    fn seek_to(&mut self, seconds: f64, interrupt: &Interrupt) -> Result<(), MediaError> {
        interrupt.check()?;
        if self.fail_seek {
            return Err(MediaError::Seek(format!("injected failure at {:.3}s", seconds)));
        }
        let target = TimeBase::MILLISECONDS.ticks(seconds);
        // Resume from the first packet still playing at the target so every
        // stream restarts within one packet of it.
        self.cursor = self
            .packets
            .iter()
            .position(|packet| packet.ts + packet.dur > target)
            .unwrap_or(self.packets.len());
        self.eof = false;
        self.stats.seeks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_eof(&self) -> bool {
        self.eof
    }
}

struct SyntheticDecoder {
    video: bool,
    sample_rate: u32,
    channels: u16,
}

impl Decoder for SyntheticDecoder {
    fn decode(&mut self, packet: &Packet) -> Result<Option<Frame>, MediaError> {
        let pts = packet.pts();
        let duration = packet.duration();
        let payload = if self.video {
            FramePayload::Video {
                width: VIDEO_SIZE,
                height: VIDEO_SIZE,
                data: packet.data.clone(),
            }
        } else {
            let frames = (duration * self.sample_rate as f64).round() as usize;
            FramePayload::Audio {
                channels: self.channels,
                sample_rate: self.sample_rate,
                samples: Arc::from(vec![0.0f32; frames * self.channels as usize]),
            }
        };
        Ok(Some(Frame {
            stream: packet.stream,
            pts,
            duration,
            payload,
        }))
    }
}
