//! Asynchronous source opening.

use std::sync::Arc;
use std::thread;

use log::{debug, error, info};

use crate::error::{MediaError, PlayerError};
use crate::media::backend::seconds_to_ms;
use crate::media::{MediaInfo, OpenedMedia};
use crate::playback::events::PlayerEvent;
use crate::playback::player::{MediaStatus, PlayerState, Shared};

use super::demux::run_demux;
use super::render::{run_render, StreamKind};

pub(super) fn run_loader(shared: Arc<Shared>, url: String) {
    match shared.backend.open(&url, &shared.interrupt) {
        Ok(opened) => install(&shared, opened),
        Err(err) => load_failed(&shared, &url, err),
    }
}

fn install(shared: &Arc<Shared>, opened: OpenedMedia) {
    let OpenedMedia {
        info,
        demuxer,
        video_decoder,
        audio_decoder,
    } = opened;

    let settings = shared.settings.lock().unwrap().clone();
    shared.video.set_decoder(video_decoder);
    shared.video.set_frame_rate(
        info.video_frame_interval
            .unwrap_or(settings.default_frame_interval),
    );
    shared.audio.set_decoder(audio_decoder);
    shared.audio.set_frame_rate(
        info.audio_frame_interval
            .unwrap_or(settings.default_frame_interval),
    );

    let mut workers = shared.workers.lock().unwrap();
    if shared.is_quitting() {
        debug!("source opened after shutdown was requested; discarding it");
        return;
    }
    loaded(shared, info.clone());

    let demux_shared = shared.clone();
    workers.push(thread::spawn(move || run_demux(demux_shared, demuxer)));
    if info.has_video() {
        let render_shared = shared.clone();
        workers.push(thread::spawn(move || run_render(render_shared, StreamKind::Video)));
    }
    if info.has_audio() {
        let render_shared = shared.clone();
        workers.push(thread::spawn(move || run_render(render_shared, StreamKind::Audio)));
    }
}

/// Publish the stream layout and confirm `Loading`.
fn loaded(shared: &Shared, info: MediaInfo) {
    {
        let mut control = shared.lock_control();
        info!(
            "opened source: duration {:.3}s, video {:?}, audio {:?}, seekable {}",
            info.duration, info.video_stream, info.audio_stream, info.seekable
        );
        shared.publish(PlayerEvent::DurationChanged(seconds_to_ms(info.duration)));
        shared.publish(PlayerEvent::SeekableChanged(info.seekable));
        control.info = Some(info);
        control.opened = true;
    }
    shared.step(false);
}

fn load_failed(shared: &Shared, url: &str, err: MediaError) {
    if err.is_interrupted() || shared.is_quitting() {
        debug!("loading {} interrupted", url);
        return;
    }
    error!("failed to open {}: {}", url, err);

    let mut control = shared.lock_control();
    control.pending.clear();
    shared.set_state(&mut control, PlayerState::Stopped);
    shared.set_media_status(&mut control, MediaStatus::Invalid);
    let error = PlayerError::resource(&err);
    shared.publish(PlayerEvent::ErrorOccurred(error.kind, error.message.clone()));
    control.error = Some(error);
}
