//! Media units and the narrow collaborator seams the pipeline talks through.
//!
//! Container parsing, decoding and presentation live behind the traits in
//! [`backend`] and [`sink`]; the pipeline only moves [`Packet`]s and
//! [`Frame`]s between them.

pub mod backend;
pub mod container;
mod frame;
pub mod output;
mod packet;
pub mod sink;
pub mod synthetic;

pub use backend::{
    Decoder, Demuxer, Interrupt, MediaBackend, MediaInfo, OpenedMedia, ReadOutcome,
};
pub use frame::{Frame, FramePayload};
pub use packet::{Packet, StreamIndex, TimeBase};
pub use container::SymphoniaBackend;
pub use output::{open_default_output, RodioSink};
pub use sink::{CountingSink, FrameSink, NullSink};
pub use synthetic::SyntheticBackend;
