//! Periodic playback state reporter for UI updates.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::warn;

use crate::playback::player::{MediaStatus, PlayerState};

/// Snapshot of playback state sent to UI consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub position_ms: i64,
    pub duration_ms: i64,
    pub state: PlayerState,
    pub media_status: MediaStatus,
    pub speed: f64,
}

impl Report {
    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }
}

type Snapshot = Arc<dyn Fn() -> Report + Send + Sync>;
type Callback = Arc<Mutex<dyn Fn(Report) + Send>>;

/// Samples playback state every `interval` on its own thread and forwards
/// a [`Report`] to the callback when it differs from the previous one.
///
/// `stop` interrupts the interval sleep, so shutdown does not wait out a
/// long interval.
pub struct Reporter {
    snapshot: Snapshot,
    report: Callback,
    interval: Duration,
    worker: Mutex<Option<(Sender<()>, JoinHandle<()>)>>,
}

impl Reporter {
    pub fn new(snapshot: Snapshot, report: Callback, interval: Duration) -> Self {
        Self {
            snapshot,
            report,
            interval,
            worker: Mutex::new(None),
        }
    }

    /// Start sampling. A running sampler is stopped first.
    pub fn start(&self) {
        self.stop();
        let (stop_tx, stop_rx) = mpsc::channel();
        let snapshot = self.snapshot.clone();
        let report = self.report.clone();
        let interval = self.interval;
        let handle = thread::spawn(move || sample(snapshot, report, interval, stop_rx));
        *self.worker.lock().unwrap() = Some((stop_tx, handle));
    }

    pub fn stop(&self) {
        let Some((stop_tx, handle)) = self.worker.lock().unwrap().take() else {
            return;
        };
        let _ = stop_tx.send(());
        if handle.thread().id() == thread::current().id() {
            warn!("reporter stopped from its own thread; not joining");
        } else if handle.join().is_err() {
            warn!("reporter thread panicked");
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sample(snapshot: Snapshot, report: Callback, interval: Duration, stop: Receiver<()>) {
    let mut last: Option<Report> = None;
    loop {
        let current = snapshot();
        if last.as_ref() != Some(&current) {
            (*report.lock().unwrap())(current.clone());
            last = Some(current);
        }
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            // Stop requested or the reporter was dropped.
            _ => break,
        }
    }
}
