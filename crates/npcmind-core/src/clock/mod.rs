//! Simulation clock
//!
//! - `GameTime`: minute-resolution calendar time
//! - `TimeService`: flow, scale, subscriptions and the pause/slowdown gates
//! - `delay_sim_*`: cancellable waits measured in game time

mod delay;
mod events;
mod game_time;
mod gate;
mod service;

pub use delay::{delay_sim_hours, delay_sim_minutes, delay_sim_seconds, SimWait};
pub use events::SubscriptionId;
pub use game_time::{GameTime, GameTimeParseError};
pub use gate::{HardPauseGuard, SlowdownGuard};
pub use service::TimeService;
