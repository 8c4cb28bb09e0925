//! Player state machine, pipeline threads and event delivery.

pub mod events;
pub mod player;
pub mod settings;
