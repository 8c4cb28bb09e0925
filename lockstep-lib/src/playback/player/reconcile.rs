//! Pending-status reconciliation and the suspend gate.

use log::{debug, warn};

use crate::error::{MediaError, PlayerError};
use crate::media::backend::seconds_to_ms;
use crate::playback::events::PlayerEvent;

use super::{Control, MediaStatus, PendingStatus, PlayerState, Shared};

impl Shared {
    /// Retire pending statuses in FIFO order, stopping at the first whose
    /// precondition does not hold, then re-evaluate the suspend gate.
    ///
    /// `has_frame` is true when the calling render loop emitted a frame this
    /// tick that belongs to the current seek generation.
    pub(super) fn step(&self, has_frame: bool) {
        let mut control = self.lock_control();
        while let Some(pending) = control.pending.front().copied() {
            if !self.do_step(&mut control, pending, has_frame) {
                break;
            }
            control.pending.pop_front();
        }
        if control.should_run() {
            self.gate.notify_all();
        }
    }

    /// True once the source is exhausted and the master stream has
    /// presented everything it had. No further frame will arrive.
    fn drained_at_end(&self, control: &Control) -> bool {
        control.at_end && self.master_queue(control).is_idle()
    }

    /// Commit `pending` if its precondition holds. Returns false otherwise.
    ///
    /// Statuses waiting for a presented frame also resolve once the source
    /// is drained at its end.
    fn do_step(&self, control: &mut Control, pending: PendingStatus, has_frame: bool) -> bool {
        let seek_idle = !self.lock_seek().awaiting();
        let drained = !has_frame && self.drained_at_end(control);
        let frame_ready = has_frame || drained;
        match pending {
            PendingStatus::Loading => {
                if !control.opened {
                    return false;
                }
                self.set_media_status(control, MediaStatus::Loaded);
            }
            PendingStatus::Playing => {
                if !seek_idle {
                    return false;
                }
                let position = self.position_ms(control);
                self.publish(PlayerEvent::Played(position));
            }
            PendingStatus::Pausing => {
                if !frame_ready || !seek_idle {
                    return false;
                }
                let position = self.position_ms(control);
                self.publish(PlayerEvent::Paused(position));
            }
            PendingStatus::Stepping => {
                if !frame_ready || !seek_idle {
                    return false;
                }
                let position = self.position_ms(control);
                self.publish(PlayerEvent::Stepped(position));
            }
            PendingStatus::Stopping => {
                if !seek_idle {
                    return false;
                }
                let position = self.position_ms(control);
                self.publish(PlayerEvent::Stopped(position));
            }
            PendingStatus::Seeking => {
                if !frame_ready || !seek_idle {
                    return false;
                }
                let target = self.lock_seek().position.take();
                self.set_media_status(control, MediaStatus::Loaded);
                // Nothing was presented past the target; report the target.
                let position = match target {
                    Some(target) if drained => seconds_to_ms(target),
                    _ => self.position_ms(control),
                };
                self.publish(PlayerEvent::Seeked(position));
            }
            PendingStatus::EndOfMedia => {
                if !seek_idle || !self.master_queue(control).is_idle() {
                    return false;
                }
                self.set_media_status(control, MediaStatus::EndOfMedia);
                self.set_state(control, PlayerState::Stopped);
            }
        }
        debug!("committed {:?}", pending);
        true
    }

    /// Block a render loop until it may run. Returns false on shutdown.
    pub(super) fn wait_gate(&self) -> bool {
        let mut control = self.lock_control();
        loop {
            if self.is_quitting() {
                return false;
            }
            if control.should_run() {
                return true;
            }
            control = self.gate.wait(control).unwrap();
        }
    }

    /// Current position in seconds.
    pub(super) fn position(&self, control: &Control) -> f64 {
        if let Some(position) = self.lock_seek().position {
            return position;
        }
        let duration = control.duration();
        if control.media_status == MediaStatus::EndOfMedia {
            return duration;
        }
        let pts = self.master_queue(control).pts().unwrap_or(0.0).max(0.0);
        if duration > 0.0 {
            pts.min(duration)
        } else {
            pts
        }
    }

    pub(super) fn position_ms(&self, control: &Control) -> i64 {
        seconds_to_ms(self.position(control))
    }

    pub(super) fn seek_serial(&self) -> u64 {
        self.lock_seek().serial
    }

    /// Record a seek to `seconds` for the demux thread to execute.
    pub(super) fn request_seek(&self, control: &mut Control, seconds: f64) {
        {
            let mut seek = self.lock_seek();
            seek.position = Some(seconds);
            seek.requested = true;
        }
        self.set_media_status(control, MediaStatus::Seeking);
        self.push_pending(control, PendingStatus::Seeking);
    }

    /// Hand the outstanding seek target to the demux thread.
    pub(super) fn take_seek_request(&self) -> Option<f64> {
        let mut seek = self.lock_seek();
        if !seek.requested {
            return None;
        }
        seek.requested = false;
        seek.executing = true;
        seek.position
    }

    /// The demux thread repositioned and flushed both queues.
    pub(super) fn finish_seek(&self) {
        let mut control = self.lock_control();
        {
            let mut seek = self.lock_seek();
            seek.executing = false;
            seek.serial = seek.serial.wrapping_add(1);
        }
        // An end of media reached before the seek no longer applies.
        control.pending.retain(|pending| *pending != PendingStatus::EndOfMedia);
        control.at_end = false;
        drop(control);
        self.wake_loops();
    }

    /// The demux thread could not reposition. Playback continues from where
    /// it was.
    pub(super) fn fail_seek(&self, err: &MediaError) {
        let mut control = self.lock_control();
        let superseded = {
            let mut seek = self.lock_seek();
            seek.executing = false;
            if !seek.requested {
                seek.position = None;
            }
            seek.requested
        };
        warn!("seek failed: {}", err);
        if !superseded {
            control.pending.retain(|pending| *pending != PendingStatus::Seeking);
            if control.media_status == MediaStatus::Seeking {
                self.set_media_status(&mut control, MediaStatus::Loaded);
            }
        }
        let error = PlayerError::seek(err);
        self.publish(PlayerEvent::ErrorOccurred(error.kind, error.message.clone()));
        control.error = Some(error);
        drop(control);
        self.wake_loops();
    }

    /// The demux thread ran out of packets with both queues drained.
    pub(super) fn end_of_media(&self) {
        let mut control = self.lock_control();
        control.at_end = true;
        if !control.pending.contains(&PendingStatus::EndOfMedia) {
            debug!("end of media reached");
            self.push_pending(&mut control, PendingStatus::EndOfMedia);
        }
        drop(control);
        self.wake_loops();
    }
}
