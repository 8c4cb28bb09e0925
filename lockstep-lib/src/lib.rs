//! # Lockstep
//!
//! Playback pipeline and synchronization engine. Given a source URL, the
//! [`Player`](playback::player::Player) opens it through a
//! [`MediaBackend`](media::MediaBackend), keeps one packet queue per stream
//! fed from a demux thread, and paces decoded frames out to the configured
//! sinks while answering play/pause/stop/seek/step/speed commands.
//!
//! Call [`init`] once before opening real media files and [`shutdown`] when
//! the process is done with playback.

pub mod diagnostics;
pub mod error;
mod init;
pub mod media;
pub mod playback;
pub mod sync;

pub use init::{init, is_initialized, shutdown};
