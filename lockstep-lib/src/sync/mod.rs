//! Packet queues and the clocks that pace them.

pub mod clock;
pub mod queue;

pub use clock::{Clock, ManualTime, MonotonicTime, Pacing, TimeSource};
pub use queue::PacketQueue;
