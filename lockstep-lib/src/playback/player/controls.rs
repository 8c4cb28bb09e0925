//! Transport and lifecycle operations for `Player`.
//!
//! Every transport call records intent under the control lock: it updates
//! the transport state, appends the matching pending status and wakes the
//! pipeline. Completion is reported later through events once a render tick
//! confirms it.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};

use crate::diagnostics::reporter::{Report, Reporter};
use crate::error::PlayerError;
use crate::media::backend::seconds_to_ms;
use crate::media::MediaInfo;
use crate::playback::events::{EventDispatcher, PlayerEvent};

use super::{Control, MediaStatus, PendingStatus, Player, PlayerState, Shared};

impl Shared {
    fn transport_allowed(&self, control: &Control, action: &str) -> bool {
        match control.media_status {
            MediaStatus::NoMedia | MediaStatus::Invalid => {
                warn!("ignoring {} with media status {:?}", action, control.media_status);
                false
            }
            _ => true,
        }
    }
}

impl Player {
    /// Switch to a new source and start opening it in the background.
    ///
    /// The previous pipeline is torn down first. Setting the current source
    /// again is a no-op. An empty URL unloads without opening anything.
    pub fn set_source(&self, url: &str) {
        let shared = &self.shared;
        if shared.lock_control().source.as_deref() == Some(url) {
            debug!("source unchanged: {}", url);
            return;
        }

        shared.terminate();
        shared.prepare_for_source();

        let mut control = shared.lock_control();
        let previous_duration = control.duration();
        control.source = Some(url.to_string());
        control.info = None;
        control.opened = false;
        control.at_end = false;
        control.error = None;
        control.pending.clear();
        shared.publish(PlayerEvent::SourceChanged(url.to_string()));
        if previous_duration > 0.0 {
            shared.publish(PlayerEvent::DurationChanged(0));
        }

        if url.is_empty() {
            shared.set_media_status(&mut control, MediaStatus::NoMedia);
            return;
        }

        info!("loading {}", url);
        shared.set_media_status(&mut control, MediaStatus::Loading);
        shared.push_pending(&mut control, PendingStatus::Loading);
        drop(control);
        shared.start_loader(url.to_string());
    }

    /// The current source URL, if any.
    pub fn source(&self) -> Option<String> {
        self.shared.lock_control().source.clone()
    }

    /// Start or resume playback. At the end of the media playback restarts
    /// from the beginning.
    pub fn play(&self) {
        let shared = &self.shared;
        let mut control = shared.lock_control();
        if !shared.transport_allowed(&control, "play") {
            return;
        }
        if control.media_status == MediaStatus::EndOfMedia {
            if !control.seekable() {
                warn!("ignoring play at end of non-seekable media");
                return;
            }
            shared.request_seek(&mut control, 0.0);
        } else if control.state == PlayerState::Playing {
            return;
        }
        shared.set_state(&mut control, PlayerState::Playing);
        shared.push_pending(&mut control, PendingStatus::Playing);
        drop(control);
        shared.set_sinks_paused(false);
        shared.wake_loops();
    }

    /// Pause playback. Confirmed once the next frame has been presented.
    pub fn pause(&self) {
        let shared = &self.shared;
        let mut control = shared.lock_control();
        if !shared.transport_allowed(&control, "pause") || control.state == PlayerState::Paused {
            return;
        }
        shared.set_state(&mut control, PlayerState::Paused);
        shared.push_pending(&mut control, PendingStatus::Pausing);
        drop(control);
        shared.set_sinks_paused(true);
        shared.wake_loops();
    }

    /// Stop playback and rewind to the start when the media is seekable.
    pub fn stop(&self) {
        let shared = &self.shared;
        let mut control = shared.lock_control();
        if !shared.transport_allowed(&control, "stop") {
            return;
        }
        shared.set_state(&mut control, PlayerState::Stopped);
        shared.push_pending(&mut control, PendingStatus::Stopping);
        if control.seekable() {
            shared.request_seek(&mut control, 0.0);
        }
        drop(control);
        shared.set_sinks_paused(true);
        shared.flush_sinks();
        shared.wake_loops();
    }

    /// Present exactly one more frame and stay paused.
    pub fn step_forward(&self) {
        let shared = &self.shared;
        let mut control = shared.lock_control();
        if !shared.transport_allowed(&control, "step") {
            return;
        }
        shared.set_state(&mut control, PlayerState::Paused);
        shared.push_pending(&mut control, PendingStatus::Stepping);
        drop(control);
        shared.set_sinks_paused(true);
        shared.wake_loops();
    }

    /// Seek to `position_ms`, clamped to the media duration.
    pub fn seek(&self, position_ms: i64) {
        let shared = &self.shared;
        let mut control = shared.lock_control();
        if !shared.transport_allowed(&control, "seek") {
            return;
        }
        if !control.seekable() {
            warn!("ignoring seek on non-seekable media");
            return;
        }
        let mut seconds = position_ms.max(0) as f64 / 1000.0;
        let duration = control.duration();
        if duration > 0.0 {
            seconds = seconds.min(duration);
        }
        debug!("seek requested to {:.3}s", seconds);
        shared.request_seek(&mut control, seconds);
        drop(control);
        shared.wake_loops();
    }

    /// Change the playback rate. Non-positive or non-finite rates are ignored.
    pub fn set_speed(&self, speed: f64) {
        if !speed.is_finite() || speed <= 0.0 {
            warn!("ignoring invalid playback speed {}", speed);
            return;
        }
        let shared = &self.shared;
        let mut control = shared.lock_control();
        if control.speed != speed {
            control.speed = speed;
            shared.publish(PlayerEvent::SpeedChanged(speed));
        }
    }

    pub fn state(&self) -> PlayerState {
        self.shared.lock_control().state
    }

    pub fn media_status(&self) -> MediaStatus {
        self.shared.lock_control().media_status
    }

    /// Duration of the current source in milliseconds, 0 when unknown.
    pub fn duration(&self) -> i64 {
        seconds_to_ms(self.shared.lock_control().duration())
    }

    /// Playback position in milliseconds.
    pub fn position(&self) -> i64 {
        let control = self.shared.lock_control();
        self.shared.position_ms(&control)
    }

    pub fn speed(&self) -> f64 {
        self.shared.speed()
    }

    pub fn is_seekable(&self) -> bool {
        self.shared.lock_control().seekable()
    }

    /// The last error surfaced to observers.
    pub fn error(&self) -> Option<PlayerError> {
        self.shared.lock_control().error.clone()
    }

    pub fn media_info(&self) -> Option<MediaInfo> {
        self.shared.lock_control().info.clone()
    }

    /// Snapshot of the transitions still waiting for confirmation.
    pub fn pending(&self) -> Vec<PendingStatus> {
        self.shared.lock_control().pending.iter().copied().collect()
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.shared.events.subscribe()
    }

    /// Run `handler` on a dedicated event thread for every event. Replaces a
    /// previously installed handler.
    pub fn set_event_handler<F>(&self, handler: F)
    where
        F: FnMut(PlayerEvent) + Send + 'static,
    {
        let dispatcher = EventDispatcher::spawn(self.subscribe(), handler);
        let previous = self.dispatcher.lock().unwrap().replace(dispatcher);
        if let Some(mut previous) = previous {
            previous.stop();
        }
    }

    /// Enable periodic reporting of playback status for UI consumers.
    ///
    /// Any previous reporter instance is stopped before a new one is started.
    pub fn set_reporting(
        &self,
        reporting: Arc<Mutex<dyn Fn(Report) + Send>>,
        reporting_interval: Duration,
    ) {
        if let Some(previous) = self.reporter.lock().unwrap().take() {
            previous.stop();
        }

        let shared = self.shared.clone();
        let snapshot = Arc::new(move || {
            let control = shared.lock_control();
            Report {
                position_ms: shared.position_ms(&control),
                duration_ms: seconds_to_ms(control.duration()),
                state: control.state,
                media_status: control.media_status,
                speed: control.speed,
            }
        });

        let reporter = Reporter::new(snapshot, reporting, reporting_interval);
        reporter.start();
        *self.reporter.lock().unwrap() = Some(reporter);
    }
}
