//! High-level playback controller.
//!
//! A [`Player`] owns one source at a time. Opening happens on a loader
//! thread; once the source is open a demux thread feeds one
//! [`PacketQueue`] per stream and a render thread per stream paces frames
//! out to its [`FrameSink`]. Transport calls only record intent: they set the
//! transport state, append a [`PendingStatus`] and wake the threads. Each
//! render tick then runs the reconciliation step that retires pending
//! statuses in FIFO order once their preconditions hold.
//!
//! Locks are always taken in the order control, seek slot, queue.

mod controls;
mod reconcile;
mod runtime;
mod settings;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use log::debug;

use crate::diagnostics::reporter::Reporter;
use crate::error::PlayerError;
use crate::media::{FrameSink, Interrupt, MediaBackend, MediaInfo, NullSink};
use crate::playback::events::{EventBus, EventDispatcher, PlayerEvent};
use crate::playback::settings::PipelineSettings;
use crate::sync::PacketQueue;

/// Transport mode requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
}

/// Readiness of the current source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStatus {
    NoMedia,
    Loading,
    Seeking,
    Loaded,
    EndOfMedia,
    Invalid,
}

/// Requested transition waiting for the pipeline to confirm it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    Loading,
    Playing,
    Pausing,
    Stopping,
    Stepping,
    Seeking,
    EndOfMedia,
}

pub(crate) struct Control {
    state: PlayerState,
    media_status: MediaStatus,
    pending: VecDeque<PendingStatus>,
    source: Option<String>,
    info: Option<MediaInfo>,
    opened: bool,
    /// The demux thread hit end of stream with both queues empty. Cleared
    /// when a seek repositions the source.
    at_end: bool,
    speed: f64,
    error: Option<PlayerError>,
}

impl Control {
    fn new() -> Self {
        Self {
            state: PlayerState::Stopped,
            media_status: MediaStatus::NoMedia,
            pending: VecDeque::new(),
            source: None,
            info: None,
            opened: false,
            at_end: false,
            speed: 1.0,
            error: None,
        }
    }

    /// Loops run while something is pending or playback is requested.
    fn should_run(&self) -> bool {
        !self.pending.is_empty() || self.state == PlayerState::Playing
    }

    fn has_video(&self) -> bool {
        self.info.as_ref().map_or(false, MediaInfo::has_video)
    }

    fn has_audio(&self) -> bool {
        self.info.as_ref().map_or(false, MediaInfo::has_audio)
    }

    fn duration(&self) -> f64 {
        self.info.as_ref().map_or(0.0, |info| info.duration)
    }

    fn seekable(&self) -> bool {
        self.info.as_ref().map_or(false, |info| info.seekable)
    }
}

#[derive(Debug, Default)]
pub(crate) struct SeekSlot {
    /// Target reported by `position()` until the seek resolves.
    position: Option<f64>,
    /// Set by `seek`, taken by the demux thread.
    requested: bool,
    executing: bool,
    /// Bumped each time a seek finishes executing.
    serial: u64,
}

impl SeekSlot {
    fn awaiting(&self) -> bool {
        self.requested || self.executing
    }
}

pub(crate) struct Shared {
    backend: Arc<dyn MediaBackend>,
    video_sink: Arc<dyn FrameSink>,
    audio_sink: Arc<dyn FrameSink>,
    control: Mutex<Control>,
    gate: Condvar,
    seek: Mutex<SeekSlot>,
    video: PacketQueue,
    audio: PacketQueue,
    settings: Mutex<PipelineSettings>,
    events: EventBus,
    quit: AtomicBool,
    interrupt: Interrupt,
    loader: Mutex<Option<JoinHandle<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap()
    }

    fn lock_seek(&self) -> MutexGuard<'_, SeekSlot> {
        self.seek.lock().unwrap()
    }

    fn is_quitting(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    fn publish(&self, event: PlayerEvent) {
        self.events.publish(event);
    }

    fn set_state(&self, control: &mut Control, state: PlayerState) {
        if control.state != state {
            debug!("player state {:?} -> {:?}", control.state, state);
            control.state = state;
            self.publish(PlayerEvent::StateChanged(state));
        }
    }

    fn set_media_status(&self, control: &mut Control, status: MediaStatus) {
        if control.media_status != status {
            debug!("media status {:?} -> {:?}", control.media_status, status);
            control.media_status = status;
            self.publish(PlayerEvent::MediaStatusChanged(status));
        }
    }

    fn push_pending(&self, control: &mut Control, pending: PendingStatus) {
        control.pending.push_back(pending);
        self.gate.notify_all();
    }

    /// Make blocked render loops run one reconciliation tick.
    fn wake_loops(&self) {
        self.video.wake();
        self.audio.wake();
        self.gate.notify_all();
    }

    fn speed(&self) -> f64 {
        self.lock_control().speed
    }

    fn master_queue(&self, control: &Control) -> &PacketQueue {
        if control.has_video() {
            &self.video
        } else {
            &self.audio
        }
    }

    fn set_sinks_paused(&self, paused: bool) {
        self.video_sink.set_paused(paused);
        self.audio_sink.set_paused(paused);
    }

    fn flush_sinks(&self) {
        self.video_sink.flush();
        self.audio_sink.flush();
    }
}

/// Primary playback controller.
///
/// Every method takes `&self`; a `Player` can be shared across threads
/// behind an `Arc`. Dropping it stops and joins all pipeline threads.
pub struct Player {
    shared: Arc<Shared>,
    dispatcher: Mutex<Option<EventDispatcher>>,
    reporter: Mutex<Option<Reporter>>,
}

impl Player {
    /// Create a player that discards every frame.
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self::with_sinks(backend, Arc::new(NullSink), Arc::new(NullSink))
    }

    /// Create a player emitting video and audio frames to the given sinks.
    pub fn with_sinks(
        backend: Arc<dyn MediaBackend>,
        video_sink: Arc<dyn FrameSink>,
        audio_sink: Arc<dyn FrameSink>,
    ) -> Self {
        let settings = PipelineSettings::default();
        let video = PacketQueue::new("video");
        let audio = PacketQueue::new("audio");
        for queue in [&video, &audio] {
            queue.set_limits(settings.min_queued_packets, settings.min_queued_seconds);
        }

        Self {
            shared: Arc::new(Shared {
                backend,
                video_sink,
                audio_sink,
                control: Mutex::new(Control::new()),
                gate: Condvar::new(),
                seek: Mutex::new(SeekSlot::default()),
                video,
                audio,
                settings: Mutex::new(settings),
                events: EventBus::new(),
                quit: AtomicBool::new(false),
                interrupt: Interrupt::new(),
                loader: Mutex::new(None),
                workers: Mutex::new(Vec::new()),
            }),
            dispatcher: Mutex::new(None),
            reporter: Mutex::new(None),
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if let Some(reporter) = self.reporter.lock().unwrap().take() {
            reporter.stop();
        }
        self.shared.terminate();
        if let Some(mut dispatcher) = self.dispatcher.lock().unwrap().take() {
            dispatcher.stop();
        }
    }
}
