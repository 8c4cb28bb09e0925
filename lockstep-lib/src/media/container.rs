//! File-backed media backend built on symphonia.
//!
//! Opens local files (a plain path or a `file://` URL), selects the first
//! decodable audio track and exposes it as a single-stream source.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use crate::error::MediaError;
use crate::init::registries;

use super::backend::{
    Decoder, Demuxer, Interrupt, MediaBackend, MediaInfo, OpenedMedia, ReadOutcome,
};
use super::frame::{Frame, FramePayload};
use super::packet::{Packet, StreamIndex, TimeBase};

const AUDIO_STREAM: StreamIndex = 0;
const DEFAULT_AUDIO_FRAME_INTERVAL: f64 = 0.02;

impl From<Error> for MediaError {
    fn from(value: Error) -> Self {
        match value {
            Error::IoError(err) => Self::Io(err),
            Error::DecodeError(err) => Self::Decode(err.to_string()),
            Error::SeekError(kind) => Self::Seek(format!("{:?}", kind)),
            Error::Unsupported(err) => Self::Unsupported(err.to_string()),
            Error::LimitError(err) => Self::Unsupported(err.to_string()),
            Error::ResetRequired => Self::Unsupported("decoder reset required".to_string()),
        }
    }
}

/// Backend opening local audio files through the registered symphonia
/// formats and codecs. Requires [`crate::init`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaBackend;

impl SymphoniaBackend {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for SymphoniaBackend {
    fn open(&self, url: &str, interrupt: &Interrupt) -> Result<OpenedMedia, MediaError> {
        let registries = registries()?;
        let path = url.strip_prefix("file://").unwrap_or(url);
        if path.is_empty() {
            return Err(MediaError::InvalidSource(url.to_string()));
        }
        interrupt.check()?;

        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());
        let mut hint = Hint::new();
        if let Some(ext) = Path::new(path).extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(&ext.to_lowercase());
        }
        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let probed = registries
            .probe
            .format(&hint, mss, &format_opts, &MetadataOptions::default())?;
        interrupt.check()?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(MediaError::NoStreams)?;
        let track_id = track.id;
        let params = track.codec_params.clone();
        let decoder = registries
            .codecs
            .make(&params, &DecoderOptions::default())?;

        let time_base = params
            .time_base
            .map(|tb| TimeBase::new(tb.numer, tb.denom))
            .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)))
            .unwrap_or(TimeBase::new(1, 1));
        let info = MediaInfo {
            video_stream: None,
            audio_stream: Some(AUDIO_STREAM),
            duration: duration_from_params(&params),
            seekable: true,
            video_frame_interval: None,
            audio_frame_interval: Some(audio_frame_interval(&params)),
        };
        debug!(
            "opened {} (track {}, {:.3}s, codec {:?})",
            path, track_id, info.duration, params.codec
        );

        Ok(OpenedMedia {
            info,
            demuxer: Box::new(SymphoniaDemuxer {
                format,
                track_id,
                time_base,
                eof: false,
                required_ts: None,
            }),
            video_decoder: None,
            audio_decoder: Some(Box::new(SymphoniaDecoder {
                decoder,
                track_id,
                time_base,
            })),
        })
    }
}

/// Convert codec parameters to a duration in seconds using the frame count.
fn duration_from_params(params: &CodecParameters) -> f64 {
    let frames = match params.n_frames {
        Some(frames) => frames,
        None => return 0.0,
    };
    match (params.time_base, params.sample_rate) {
        (Some(tb), _) => {
            let time = tb.calc_time(frames);
            time.seconds as f64 + time.frac
        }
        (None, Some(rate)) if rate > 0 => frames as f64 / rate as f64,
        _ => 0.0,
    }
}

fn audio_frame_interval(params: &CodecParameters) -> f64 {
    match (params.max_frames_per_packet, params.sample_rate) {
        (Some(frames), Some(rate)) if frames > 0 && rate > 0 => frames as f64 / rate as f64,
        _ => DEFAULT_AUDIO_FRAME_INTERVAL,
    }
}

struct SymphoniaDemuxer {
    format: Box<dyn FormatReader>,
    track_id: u32,
    time_base: TimeBase,
    eof: bool,
    /// First timestamp wanted after an accurate seek. Packets ending at or
    /// before it are dropped.
    required_ts: Option<u64>,
}

/// True when a packet covering `ts..ts + dur` ends before `required_ts`.
fn ends_before(ts: u64, dur: u64, required_ts: u64) -> bool {
    ts.saturating_add(dur.max(1)) <= required_ts
}

impl Demuxer for SymphoniaDemuxer {
    fn read_packet(&mut self, interrupt: &Interrupt) -> Result<ReadOutcome, MediaError> {
        interrupt.check()?;
        if self.eof {
            return Ok(ReadOutcome::EndOfStream);
        }
        let packet = loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.eof = true;
                    return Ok(ReadOutcome::EndOfStream);
                }
                Err(Error::ResetRequired) => {
                    warn!("stream reset required, treating as end of stream");
                    self.eof = true;
                    return Ok(ReadOutcome::EndOfStream);
                }
                Err(err) => return Err(err.into()),
            };
            if packet.track_id() != self.track_id {
                return Ok(ReadOutcome::Again);
            }
            match self.required_ts {
                Some(required) if ends_before(packet.ts(), packet.dur(), required) => {
                    interrupt.check()?;
                }
                _ => {
                    self.required_ts = None;
                    break packet;
                }
            }
        };
        Ok(ReadOutcome::Packet(Packet::new(
            AUDIO_STREAM,
            Arc::<[u8]>::from(packet.buf()),
            packet.ts(),
            packet.dur(),
            self.time_base,
        )))
    }

    fn seek_to(&mut self, seconds: f64, interrupt: &Interrupt) -> Result<(), MediaError> {
        interrupt.check()?;
        let seconds = seconds.max(0.0);
        let time = Time::new(seconds.floor() as u64, seconds.fract());
        let seeked = self.format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time,
                track_id: Some(self.track_id),
            },
        )?;
        debug!(
            "symphonia seek landed at ts {} (wanted {})",
            seeked.actual_ts, seeked.required_ts
        );
        self.required_ts = Some(seeked.required_ts);
        self.eof = false;
        Ok(())
    }

    fn is_eof(&self) -> bool {
        self.eof
    }
}

struct SymphoniaDecoder {
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    time_base: TimeBase,
}

impl Decoder for SymphoniaDecoder {
    fn decode(&mut self, packet: &Packet) -> Result<Option<Frame>, MediaError> {
        let source = symphonia::core::formats::Packet::new_from_slice(
            self.track_id,
            packet.ts,
            packet.dur,
            &packet.data,
        );
        let decoded = match self.decoder.decode(&source) {
            Ok(decoded) => decoded,
            Err(Error::DecodeError(err)) => {
                warn!("decode error: {}", err);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let spec = *decoded.spec();
        let frames = decoded.frames();
        if frames == 0 {
            return Ok(None);
        }
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        Ok(Some(Frame {
            stream: packet.stream,
            pts: self.time_base.seconds(packet.ts),
            duration: frames as f64 / spec.rate.max(1) as f64,
            payload: FramePayload::Audio {
                channels: spec.channels.count() as u16,
                sample_rate: spec.rate,
                samples: Arc::from(buffer.samples()),
            },
        }))
    }

    fn flush(&mut self) {
        self.decoder.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_uses_time_base_when_present() {
        let mut params = CodecParameters::new();
        params
            .with_sample_rate(48_000)
            .with_time_base(symphonia::core::units::TimeBase::new(1, 48_000))
            .with_n_frames(96_000);
        assert!((duration_from_params(&params) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn missing_frame_count_means_unknown_duration() {
        let params = CodecParameters::new();
        assert_eq!(duration_from_params(&params), 0.0);
        assert_eq!(audio_frame_interval(&params), DEFAULT_AUDIO_FRAME_INTERVAL);
    }

    #[test]
    fn packets_ending_before_the_seek_target_are_dropped() {
        assert!(ends_before(0, 1152, 4608));
        assert!(ends_before(3456, 1152, 4608));
        assert!(!ends_before(4000, 1152, 4608));
        assert!(!ends_before(4608, 1152, 4608));
        // Zero-length packets still count as covering their own timestamp.
        assert!(!ends_before(4608, 0, 4608));
    }

    /// Mono 16-bit PCM WAV of `frames` samples at `rate` Hz.
    fn write_wav(path: &std::path::Path, rate: u32, frames: u32) {
        let data_len = frames * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&rate.to_le_bytes());
        bytes.extend_from_slice(&(rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(44 + data_len as usize, 0);
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn first_packet_after_seek_reaches_the_target() {
        crate::init();
        let path = std::env::temp_dir().join(format!("lockstep-seek-{}.wav", std::process::id()));
        write_wav(&path, 8_000, 16_000);

        let mut opened = SymphoniaBackend::new()
            .open(path.to_str().unwrap(), &Interrupt::new())
            .unwrap();
        assert!((opened.info.duration - 2.0).abs() < 1e-6);
        opened.demuxer.seek_to(1.3, &Interrupt::new()).unwrap();
        let packet = match opened.demuxer.read_packet(&Interrupt::new()).unwrap() {
            ReadOutcome::Packet(packet) => packet,
            other => panic!("expected a packet, got {:?}", other),
        };
        let _ = std::fs::remove_file(&path);

        assert!(packet.pts() + packet.duration() > 1.3);
        assert!(packet.pts() <= 1.3 + 1e-6);
    }

    #[test]
    fn open_rejects_missing_file() {
        crate::init();
        let err = match SymphoniaBackend::new().open("/nonexistent/clip.wav", &Interrupt::new()) {
            Ok(_) => panic!("missing file should not open"),
            Err(err) => err,
        };
        assert!(matches!(err, MediaError::Io(_)));
    }
}
