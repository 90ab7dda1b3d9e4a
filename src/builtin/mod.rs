//! Plugins shipped with the crate.

mod heart;
mod hello;

pub use heart::{HEARTBEAT_SIGNAL, Heart};
pub use hello::Hello;
