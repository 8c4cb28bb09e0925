//! Pipeline threads behind a `Player`.
//!
//! - [`loader`] opens the source without blocking the caller and starts the
//!   other threads once it succeeds.
//! - [`demux`] is the single producer feeding both packet queues.
//! - [`render`] runs one consumer per present stream.
//!
//! [`Shared::terminate`] is the only place that joins them.

mod demux;
mod loader;
mod render;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use super::{PlayerState, SeekSlot, Shared};

impl Shared {
    /// Stop every pipeline thread and wait for them to exit.
    ///
    /// Safe to call repeatedly and from any thread; a pipeline thread calling
    /// it is never joined on itself.
    pub(super) fn terminate(&self) {
        {
            let mut control = self.lock_control();
            self.set_state(&mut control, PlayerState::Stopped);
            self.quit.store(true, Ordering::SeqCst);
            self.interrupt.set();
            self.gate.notify_all();
        }
        self.video.abort();
        self.audio.abort();

        // The loader may still be spawning workers; join it first so the
        // worker list is final.
        if let Some(loader) = self.loader.lock().unwrap().take() {
            join_worker(loader, "loader");
        }

        let workers: Vec<JoinHandle<()>> = self.workers.lock().unwrap().drain(..).collect();
        for worker in workers {
            // A late enqueue from the demux thread lifts the abort; renew it.
            self.video.abort();
            self.audio.abort();
            join_worker(worker, "pipeline");
        }
    }

    /// Reset queues, flags and the seek slot after [`Shared::terminate`].
    pub(super) fn prepare_for_source(&self) {
        self.quit.store(false, Ordering::SeqCst);
        self.interrupt.clear();
        for queue in [&self.video, &self.audio] {
            queue.reset();
            queue.set_decoder(None);
        }
        *self.lock_seek() = SeekSlot::default();
        self.flush_sinks();
    }

    pub(super) fn start_loader(self: &Arc<Self>, url: String) {
        let shared = self.clone();
        let handle = thread::spawn(move || loader::run_loader(shared, url));
        *self.loader.lock().unwrap() = Some(handle);
    }
}

fn join_worker(handle: JoinHandle<()>, name: &str) {
    if handle.thread().id() == thread::current().id() {
        debug!("{} thread terminating itself; skipping join", name);
        return;
    }
    if handle.join().is_err() {
        warn!("{} thread panicked during join", name);
    }
}
