//! The producer loop: reads packets, executes seeks, applies backpressure.

use std::sync::Arc;
use std::thread;

use log::{debug, warn};

use crate::media::{Demuxer, Packet, ReadOutcome, StreamIndex};
use crate::playback::player::Shared;
use crate::sync::PacketQueue;

pub(super) fn run_demux(shared: Arc<Shared>, mut demuxer: Box<dyn Demuxer>) {
    let (video_stream, audio_stream) = {
        let control = shared.lock_control();
        let info = control.info.as_ref();
        (
            info.and_then(|info| info.video_stream),
            info.and_then(|info| info.audio_stream),
        )
    };
    let mut eof = false;

    while !shared.is_quitting() {
        let settings = shared.settings.lock().unwrap().clone();
        let poll_interval = settings.poll_interval();

        if let Some(target) = shared.take_seek_request() {
            match demuxer.seek_to(target, &shared.interrupt) {
                Ok(()) => {
                    debug!("seeked demuxer to {:.3}s", target);
                    shared.video.clear();
                    shared.audio.clear();
                    shared.video.wait_for_empty();
                    shared.audio.wait_for_empty();
                    shared.flush_sinks();
                    eof = false;
                    shared.finish_seek();
                }
                Err(err) => {
                    if err.is_interrupted() && shared.is_quitting() {
                        break;
                    }
                    shared.fail_seek(&err);
                }
            }
            continue;
        }

        let queued_bytes = shared.video.bytes() + shared.audio.bytes();
        let video_enough = video_stream.is_none() || shared.video.enough();
        let audio_enough = audio_stream.is_none() || shared.audio.enough();
        if queued_bytes > settings.max_queue_bytes || (video_enough && audio_enough) {
            thread::sleep(poll_interval);
            continue;
        }

        match demuxer.read_packet(&shared.interrupt) {
            Ok(ReadOutcome::Packet(packet)) => {
                route(&shared, video_stream, audio_stream, packet);
                eof = false;
            }
            Ok(ReadOutcome::Again) => thread::sleep(poll_interval),
            Ok(ReadOutcome::EndOfStream) => {
                if !eof && shared.video.is_empty() && shared.audio.is_empty() {
                    eof = true;
                    shared.end_of_media();
                }
                thread::sleep(poll_interval);
            }
            Err(err) => {
                if err.is_interrupted() && shared.is_quitting() {
                    break;
                }
                warn!("read error treated as end of stream: {}", err);
                if !eof && shared.video.is_empty() && shared.audio.is_empty() {
                    eof = true;
                    shared.end_of_media();
                }
                thread::sleep(poll_interval);
            }
        }
    }
    debug!("demux thread exiting");
}

fn route(
    shared: &Shared,
    video_stream: Option<StreamIndex>,
    audio_stream: Option<StreamIndex>,
    packet: Packet,
) {
    let queue: &PacketQueue = if Some(packet.stream) == video_stream {
        &shared.video
    } else if Some(packet.stream) == audio_stream {
        &shared.audio
    } else {
        debug_assert!(false, "packet for unknown stream {}", packet.stream);
        warn!("dropping packet for unknown stream {}", packet.stream);
        return;
    };
    queue.enqueue(packet);
}
