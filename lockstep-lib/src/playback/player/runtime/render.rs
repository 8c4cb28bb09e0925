//! Per-stream consumer loops.

use std::sync::Arc;

use log::debug;

use crate::media::FrameSink;
use crate::playback::player::Shared;
use crate::sync::PacketQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StreamKind {
    Video,
    Audio,
}

pub(super) fn run_render(shared: Arc<Shared>, kind: StreamKind) {
    let (queue, sink): (&PacketQueue, &Arc<dyn FrameSink>) = match kind {
        StreamKind::Video => (&shared.video, &shared.video_sink),
        StreamKind::Audio => (&shared.audio, &shared.audio_sink),
    };
    let audio_is_master = kind == StreamKind::Video && shared.lock_control().has_audio();

    while shared.wait_gate() {
        let serial = shared.seek_serial();
        let speed = shared.speed();
        let master_pts = if audio_is_master {
            shared.audio.pts()
        } else {
            None
        };

        let has_frame = match queue.sync(speed, master_pts) {
            Some(frame) => {
                #[cfg(feature = "debug")]
                log::trace!("{:?} frame at {:.3}s", kind, frame.pts);
                let frame = match kind {
                    StreamKind::Audio => frame.scaled_for_speed(speed),
                    StreamKind::Video => frame,
                };
                sink.emit(frame);
                queue.pop();
                true
            }
            None => false,
        };

        // A frame from before a seek that completed meanwhile does not count.
        shared.step(has_frame && shared.seek_serial() == serial);
    }
    debug!("{:?} render thread exiting", kind);
}
