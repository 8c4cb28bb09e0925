//! Process-wide media registry bootstrap.
//!
//! Format and codec tables are registered once into a guarded static by
//! [`init`]. Backends that need them look them up through [`registries`]
//! and fail with [`MediaError::NotInitialized`] until `init` has run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use log::{debug, info};
use symphonia::core::codecs::CodecRegistry;
use symphonia::core::probe::Probe;

use crate::error::MediaError;

pub(crate) struct Registries {
    pub codecs: CodecRegistry,
    pub probe: Probe,
}

static REGISTRIES: OnceLock<Registries> = OnceLock::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Register every enabled container format and codec.
///
/// Safe to call more than once; registration itself only happens on the
/// first call.
pub fn init() {
    REGISTRIES.get_or_init(|| {
        let mut codecs = CodecRegistry::new();
        symphonia::default::register_enabled_codecs(&mut codecs);
        let mut probe = Probe::default();
        symphonia::default::register_enabled_formats(&mut probe);
        debug!("registered symphonia formats and codecs");
        Registries { codecs, probe }
    });
    if !INITIALIZED.swap(true, Ordering::SeqCst) {
        info!("lockstep media registries initialized");
    }
}

/// Mark the registries unavailable. New sources fail to open until the next
/// [`init`]; players that already opened a source are unaffected.
pub fn shutdown() {
    if INITIALIZED.swap(false, Ordering::SeqCst) {
        info!("lockstep media registries shut down");
    }
}

/// Return true between [`init`] and [`shutdown`].
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

pub(crate) fn registries() -> Result<&'static Registries, MediaError> {
    if !is_initialized() {
        return Err(MediaError::NotInitialized);
    }
    REGISTRIES.get().ok_or(MediaError::NotInitialized)
}
