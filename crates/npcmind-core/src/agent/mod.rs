//! NPC think cycle
//!
//! One think cycle: optional approval, then a clock gate held for the whole
//! model call, then the call itself. A failed cycle leaves the NPC's previous
//! plan in place.

pub mod think;

pub use think::{GateMode, ThinkCycle};
