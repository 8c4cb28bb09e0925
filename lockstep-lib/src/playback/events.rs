//! Player notifications and their delivery.
//!
//! Pipeline threads never call user code directly. They publish
//! [`PlayerEvent`]s on an [`EventBus`]; consumers either drain a channel from
//! [`EventBus::subscribe`] on their own thread or register a callback that an
//! [`EventDispatcher`] runs on a dedicated event thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

use crate::error::ErrorKind;

use super::player::{MediaStatus, PlayerState};

const DISPATCH_POLL: Duration = Duration::from_millis(20);

/// Externally observable player notification. Positions and durations are
/// milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    SourceChanged(String),
    StateChanged(PlayerState),
    MediaStatusChanged(MediaStatus),
    DurationChanged(i64),
    SeekableChanged(bool),
    SpeedChanged(f64),
    Seeked(i64),
    Played(i64),
    Paused(i64),
    Stopped(i64),
    Stepped(i64),
    ErrorOccurred(ErrorKind, String),
}

/// Fan-out of events to every live subscriber.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<PlayerEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.lock().unwrap().push(sender);
        receiver
    }

    /// Deliver `event` to all subscribers, dropping those that hung up.
    pub fn publish(&self, event: PlayerEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

/// Runs a callback for every event received on a dedicated thread.
pub struct EventDispatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EventDispatcher {
    pub fn spawn<F>(receiver: Receiver<PlayerEvent>, mut callback: F) -> Self
    where
        F: FnMut(PlayerEvent) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("lockstep-events".to_string())
            .spawn(move || loop {
                match receiver.recv_timeout(DISPATCH_POLL) {
                    Ok(event) => callback(event),
                    Err(RecvTimeoutError::Timeout) => {
                        if thread_stop.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .ok();
        if handle.is_none() {
            debug!("failed to spawn event dispatcher thread");
        }
        Self { stop, handle }
    }

    /// Deliver what is already queued, then stop the thread.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
