use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use lockstep_lib::error::ErrorKind;
use lockstep_lib::media::synthetic::SyntheticSpec;
use lockstep_lib::media::{Frame, FrameSink, SyntheticBackend};
use lockstep_lib::playback::events::PlayerEvent;
use lockstep_lib::playback::player::{MediaStatus, Player, PlayerState};

const TIMEOUT: Duration = Duration::from_secs(10);
/// Teardown joins every pipeline thread within a few poll intervals.
const TEARDOWN_LIMIT: Duration = Duration::from_millis(50);

#[derive(Default)]
struct RecordingSink {
    pts: Mutex<Vec<f64>>,
}

impl RecordingSink {
    fn pts(&self) -> Vec<f64> {
        self.pts.lock().unwrap().clone()
    }
}

impl FrameSink for RecordingSink {
    fn emit(&self, frame: Frame) {
        self.pts.lock().unwrap().push(frame.pts);
    }
}

/// Collect events until `done` matches one, or panic after `TIMEOUT`.
fn collect_until<F>(events: &Receiver<PlayerEvent>, mut done: F) -> Vec<PlayerEvent>
where
    F: FnMut(&PlayerEvent) -> bool,
{
    let deadline = Instant::now() + TIMEOUT;
    let mut seen = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) => {
                let finished = done(&event);
                seen.push(event);
                if finished {
                    return seen;
                }
            }
            Err(_) => panic!("timed out waiting for event; saw {:?}", seen),
        }
    }
}

fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn load(player: &Player, events: &Receiver<PlayerEvent>, spec: &SyntheticSpec) {
    player.set_source(&spec.url());
    collect_until(events, |event| {
        matches!(
            event,
            PlayerEvent::MediaStatusChanged(MediaStatus::Loaded | MediaStatus::Invalid)
        )
    });
}

#[test]
fn audio_only_source_plays_to_end_of_media() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    let events = player.subscribe();

    player.set_source(&SyntheticSpec::audio(999).url());
    let loading = collect_until(&events, |event| {
        *event == PlayerEvent::MediaStatusChanged(MediaStatus::Loaded)
    });
    player.play();
    let playing = collect_until(&events, |event| {
        *event == PlayerEvent::StateChanged(PlayerState::Stopped)
    });

    let all: Vec<PlayerEvent> = loading.into_iter().chain(playing).collect();
    let statuses: Vec<MediaStatus> = all
        .iter()
        .filter_map(|event| match event {
            PlayerEvent::MediaStatusChanged(status) => Some(*status),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![MediaStatus::Loading, MediaStatus::Loaded, MediaStatus::EndOfMedia]
    );
    let states: Vec<PlayerState> = all
        .iter()
        .filter_map(|event| match event {
            PlayerEvent::StateChanged(state) => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![PlayerState::Playing, PlayerState::Stopped]);
    assert!(all.contains(&PlayerEvent::DurationChanged(999)));

    assert_eq!(player.duration(), 999);
    assert_eq!(player.position(), 999);
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.media_status(), MediaStatus::EndOfMedia);
}

#[test]
fn setting_the_same_source_twice_is_a_no_op() {
    let backend = SyntheticBackend::new();
    let stats = backend.stats();
    let player = Player::new(Arc::new(backend));
    let events = player.subscribe();
    let url = SyntheticSpec::audio(500).url();

    player.set_source(&url);
    player.set_source(&url);
    let seen = collect_until(&events, |event| {
        *event == PlayerEvent::MediaStatusChanged(MediaStatus::Loaded)
    });
    player.set_source(&url);
    thread::sleep(Duration::from_millis(50));

    let source_changes = seen
        .iter()
        .chain(events.try_iter().collect::<Vec<_>>().iter())
        .filter(|event| matches!(event, PlayerEvent::SourceChanged(_)))
        .count();
    assert_eq!(source_changes, 1);
    assert_eq!(stats.opens(), 1);
    assert_eq!(player.source(), Some(url));
    assert_eq!(player.media_status(), MediaStatus::Loaded);
}

#[test]
fn pause_resolves_before_a_following_seek() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    let events = player.subscribe();
    load(&player, &events, &SyntheticSpec::audio(5_000));

    player.play();
    collect_until(&events, |event| matches!(event, PlayerEvent::Played(_)));
    thread::sleep(Duration::from_millis(100));

    player.pause();
    player.seek(0);
    let seen = collect_until(&events, |event| matches!(event, PlayerEvent::Seeked(_)));
    let paused = seen
        .iter()
        .position(|event| matches!(event, PlayerEvent::Paused(_)))
        .expect("pause was confirmed");
    let seeked = seen
        .iter()
        .position(|event| matches!(event, PlayerEvent::Seeked(_)))
        .unwrap();
    assert!(paused < seeked);
    assert_eq!(player.state(), PlayerState::Paused);
    assert!(player.pending().is_empty());
}

#[test]
fn no_stale_frame_follows_the_first_post_seek_frame() {
    let video = Arc::new(RecordingSink::default());
    let audio = Arc::new(RecordingSink::default());
    let player = Player::with_sinks(
        Arc::new(SyntheticBackend::new()),
        video.clone(),
        audio.clone(),
    );
    let events = player.subscribe();
    load(&player, &events, &SyntheticSpec::audio_video(6_000, 25));

    player.play();
    thread::sleep(Duration::from_millis(300));
    player.seek(3_000);
    collect_until(&events, |event| matches!(event, PlayerEvent::Seeked(_)));
    thread::sleep(Duration::from_millis(200));
    player.pause();

    let tolerance = 0.04 + 1e-6;
    for (name, pts) in [("video", video.pts()), ("audio", audio.pts())] {
        let first = pts
            .iter()
            .position(|pts| *pts >= 3.0 - tolerance)
            .unwrap_or_else(|| panic!("no post-seek {} frame", name));
        assert!(
            pts[first..].iter().all(|pts| *pts >= 3.0 - tolerance),
            "{} emitted a stale frame: {:?}",
            name,
            &pts[first..]
        );
    }
    assert!(player.position() >= 3_000 - 40);
}

#[test]
fn demux_stops_reading_above_the_byte_cap() {
    let backend = SyntheticBackend::new();
    let stats = backend.stats();
    let player = Player::new(Arc::new(backend));
    let events = player.subscribe();
    let spec = SyntheticSpec::audio(600_000).with_packet_bytes(1024 * 1024);
    load(&player, &events, &spec);

    // 15 packets of 1 MiB plus overhead cross the 15 MiB cap.
    assert!(wait_until(|| stats.packets_read() >= 15));
    thread::sleep(Duration::from_millis(200));
    assert_eq!(stats.packets_read(), 15);

    // Consuming one packet lets exactly one more in.
    player.step_forward();
    assert!(wait_until(|| stats.packets_read() >= 16));
    thread::sleep(Duration::from_millis(100));
    assert!(stats.packets_read() <= 17);
}

#[test]
fn dropping_a_busy_player_returns_promptly() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    let events = player.subscribe();
    load(
        &player,
        &events,
        &SyntheticSpec::audio_video(600_000, 25).with_packet_bytes(1024 * 1024),
    );
    player.play();
    thread::sleep(Duration::from_millis(100));
    player.pause();
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    drop(player);
    assert!(started.elapsed() < TEARDOWN_LIMIT, "teardown took {:?}", started.elapsed());
}

#[test]
fn dropping_while_playing_under_backpressure_returns_promptly() {
    let backend = SyntheticBackend::new();
    let stats = backend.stats();
    let player = Player::new(Arc::new(backend));
    let events = player.subscribe();
    load(
        &player,
        &events,
        &SyntheticSpec::audio_video(600_000, 25).with_packet_bytes(1024 * 1024),
    );
    player.play();
    collect_until(&events, |event| matches!(event, PlayerEvent::Played(_)));
    // The byte cap is reached long before the source runs out.
    assert!(wait_until(|| stats.packets_read() >= 15));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(player.state(), PlayerState::Playing);

    let started = Instant::now();
    drop(player);
    assert!(started.elapsed() < TEARDOWN_LIMIT, "teardown took {:?}", started.elapsed());
}

#[test]
fn seeking_to_the_duration_reaches_end_of_media() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    let events = player.subscribe();
    load(&player, &events, &SyntheticSpec::audio(999));

    player.play();
    collect_until(&events, |event| matches!(event, PlayerEvent::Played(_)));
    thread::sleep(Duration::from_millis(100));
    player.seek(999);
    let seen = collect_until(&events, |event| {
        *event == PlayerEvent::MediaStatusChanged(MediaStatus::EndOfMedia)
    });

    assert!(seen.contains(&PlayerEvent::Seeked(999)));
    assert!(player.pending().is_empty());
    assert_eq!(player.media_status(), MediaStatus::EndOfMedia);
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.position(), 999);
}

#[test]
fn pause_and_step_after_end_of_media_are_confirmed() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    let events = player.subscribe();
    load(&player, &events, &SyntheticSpec::audio(300));

    player.play();
    collect_until(&events, |event| {
        *event == PlayerEvent::MediaStatusChanged(MediaStatus::EndOfMedia)
    });
    player.pause();
    let seen = collect_until(&events, |event| matches!(event, PlayerEvent::Paused(_)));
    assert_eq!(seen.last(), Some(&PlayerEvent::Paused(300)));

    player.step_forward();
    collect_until(&events, |event| matches!(event, PlayerEvent::Stepped(_)));
    assert!(player.pending().is_empty());
    assert_eq!(player.state(), PlayerState::Paused);

    // Later transitions are not stuck behind them.
    player.play();
    collect_until(&events, |event| matches!(event, PlayerEvent::Played(_)));
}

#[test]
fn dropping_during_a_slow_open_returns_promptly() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    player.set_source(&SyntheticSpec::audio(1_000).with_open_delay_ms(10_000).url());
    thread::sleep(Duration::from_millis(30));
    assert_eq!(player.media_status(), MediaStatus::Loading);

    let started = Instant::now();
    drop(player);
    assert!(started.elapsed() < TEARDOWN_LIMIT, "teardown took {:?}", started.elapsed());
}

#[test]
fn failed_seek_keeps_playing() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    let events = player.subscribe();
    load(&player, &events, &SyntheticSpec::audio(5_000).with_seek_failure());

    player.play();
    collect_until(&events, |event| matches!(event, PlayerEvent::Played(_)));
    player.seek(2_500);
    let seen = collect_until(&events, |event| {
        matches!(event, PlayerEvent::ErrorOccurred(ErrorKind::SeekError, _))
    });
    assert!(!seen.iter().any(|event| matches!(event, PlayerEvent::Seeked(_))));
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(player.media_status(), MediaStatus::Loaded);
    assert_eq!(player.error().map(|err| err.kind), Some(ErrorKind::SeekError));
    assert!(player.position() < 2_500);
}

#[test]
fn open_failure_marks_the_source_invalid_until_replaced() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    let events = player.subscribe();
    player.set_source(&SyntheticSpec::audio(500).with_open_failure().url());
    let seen = collect_until(&events, |event| {
        matches!(event, PlayerEvent::ErrorOccurred(ErrorKind::ResourceError, _))
    });
    assert!(seen.contains(&PlayerEvent::MediaStatusChanged(MediaStatus::Invalid)));

    player.play();
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.media_status(), MediaStatus::Invalid);

    load(&player, &events, &SyntheticSpec::audio(500));
    assert_eq!(player.media_status(), MediaStatus::Loaded);
    assert!(player.error().is_none());
}

#[test]
fn stop_rewinds_to_the_start() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    let events = player.subscribe();
    load(&player, &events, &SyntheticSpec::audio(5_000));

    player.play();
    assert!(wait_until(|| player.position() >= 200));
    player.stop();
    let seen = collect_until(&events, |event| matches!(event, PlayerEvent::Stopped(_)));
    assert_eq!(seen.last(), Some(&PlayerEvent::Stopped(0)));
    assert!(wait_until(|| player.pending().is_empty()));
    assert_eq!(player.state(), PlayerState::Stopped);
    assert!(player.position() <= 20);
}

#[test]
fn play_after_end_of_media_restarts() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    let events = player.subscribe();
    load(&player, &events, &SyntheticSpec::audio(300));

    player.play();
    collect_until(&events, |event| {
        *event == PlayerEvent::MediaStatusChanged(MediaStatus::EndOfMedia)
    });
    player.play();
    let seen = collect_until(&events, |event| matches!(event, PlayerEvent::Played(_)));
    assert!(seen.contains(&PlayerEvent::MediaStatusChanged(MediaStatus::Seeking)));
    assert!(seen.contains(&PlayerEvent::Seeked(0)));
    collect_until(&events, |event| {
        *event == PlayerEvent::MediaStatusChanged(MediaStatus::EndOfMedia)
    });
    assert_eq!(player.position(), 300);
}

#[test]
fn speed_changes_are_validated_and_announced() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    let events = player.subscribe();
    player.set_speed(2.0);
    player.set_speed(0.0);
    player.set_speed(f64::NAN);
    player.set_speed(2.0);
    assert_eq!(player.speed(), 2.0);
    let changes: Vec<_> = events.try_iter().collect();
    assert_eq!(changes, vec![PlayerEvent::SpeedChanged(2.0)]);
}

#[test]
fn transport_is_ignored_without_media() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    player.play();
    player.seek(100);
    player.step_forward();
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.media_status(), MediaStatus::NoMedia);
    assert!(player.pending().is_empty());
}

#[test]
fn event_handler_runs_on_event_thread() {
    let player = Player::new(Arc::new(SyntheticBackend::new()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    player.set_event_handler(move |event| sink.lock().unwrap().push(event));
    player.set_source(&SyntheticSpec::audio(200).url());
    assert!(wait_until(|| {
        seen.lock()
            .unwrap()
            .contains(&PlayerEvent::MediaStatusChanged(MediaStatus::Loaded))
    }));
}
