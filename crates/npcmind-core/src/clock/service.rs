//! Simulation clock
//!
//! `TimeService` owns the current game time, its flow state and time scale,
//! and notifies subscribers when minutes pass. The pause and slowdown gates
//! that mutate the same state live in `gate.rs`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::events::{fire, SubscriberList, SubscriptionId};
use super::game_time::GameTime;
use crate::constants::clock::{
    DEFAULT_SLOWDOWN_FACTOR, DEFAULT_TIME_SCALE, MIN_TIME_SCALE, SECONDS_PER_GAME_MINUTE,
};

/// Mutable clock state, guarded by one lock so gates and flow changes never interleave
pub(crate) struct ClockState {
    pub(crate) current: GameTime,
    pub(crate) time_scale: f32,
    pub(crate) flowing: bool,
    /// Scaled seconds not yet turned into a whole minute
    pub(crate) accumulated: f64,
    pub(crate) hard_pause_count: u32,
    /// Flow state to restore when the last hard pause releases
    pub(crate) was_flowing: bool,
    pub(crate) slowdown_count: u32,
    /// Time scale to restore when the last slowdown releases
    pub(crate) pre_slow_scale: f32,
}

/// Process-wide simulation clock
pub struct TimeService {
    pub(crate) state: Mutex<ClockState>,
    pub(crate) slowdown_factor: f32,
    time_changed: Mutex<SubscriberList<GameTime>>,
    ticks: Mutex<SubscriberList<f64>>,
    next_id: AtomicU64,
    tx: watch::Sender<GameTime>,
}

impl TimeService {
    /// Stopped clock at `start` with default scale and slowdown factor
    pub fn new(start: GameTime) -> Arc<Self> {
        Self::with_settings(start, DEFAULT_TIME_SCALE, DEFAULT_SLOWDOWN_FACTOR)
    }

    pub fn with_settings(start: GameTime, time_scale: f32, slowdown_factor: f32) -> Arc<Self> {
        let (tx, _rx) = watch::channel(start);
        Arc::new(Self {
            state: Mutex::new(ClockState {
                current: start,
                time_scale: time_scale.max(MIN_TIME_SCALE),
                flowing: false,
                accumulated: 0.0,
                hard_pause_count: 0,
                was_flowing: false,
                slowdown_count: 0,
                pre_slow_scale: time_scale.max(MIN_TIME_SCALE),
            }),
            slowdown_factor: if slowdown_factor > 0.0 {
                slowdown_factor
            } else {
                DEFAULT_SLOWDOWN_FACTOR
            },
            time_changed: Mutex::new(SubscriberList::new()),
            ticks: Mutex::new(SubscriberList::new()),
            next_id: AtomicU64::new(1),
            tx,
        })
    }

    pub fn current_time(&self) -> GameTime {
        self.state.lock().current
    }

    /// Effective time scale, including any active slowdown
    pub fn time_scale(&self) -> f32 {
        self.state.lock().time_scale
    }

    /// Set the base time scale (at least 0.1).
    ///
    /// During a slowdown the new value becomes the scale restored afterwards
    /// and the slowed scale is recomputed from it.
    pub fn set_time_scale(&self, scale: f32) {
        let scale = scale.max(MIN_TIME_SCALE);
        let mut state = self.state.lock();
        if state.slowdown_count > 0 {
            state.pre_slow_scale = scale;
            state.time_scale = scale / self.slowdown_factor;
        } else {
            state.time_scale = scale;
        }
        debug!(scale, "Time scale set");
    }

    pub fn is_flowing(&self) -> bool {
        self.state.lock().flowing
    }

    pub fn start_time_flow(&self) {
        let mut state = self.state.lock();
        if state.hard_pause_count > 0 {
            state.was_flowing = true;
            debug!("Clock is hard-paused, flow will start on release");
            return;
        }
        if state.flowing {
            warn!("Time is already flowing");
            return;
        }
        state.flowing = true;
        info!(time = %state.current, "Time flow started");
    }

    pub fn stop_time_flow(&self) {
        let mut state = self.state.lock();
        if state.hard_pause_count > 0 {
            state.was_flowing = false;
            debug!("Clock is hard-paused, flow stays off on release");
            return;
        }
        if !state.flowing {
            warn!("Time is not flowing");
            return;
        }
        state.flowing = false;
        info!(time = %state.current, "Time flow stopped");
    }

    /// Jump to `time` (clamped to a valid date) and notify subscribers
    pub fn set_time(&self, time: GameTime) {
        let time = GameTime::clamped(time.year, time.month, time.day, time.hour, time.minute);
        self.state.lock().current = time;
        info!(time = %time, "Time set");
        self.notify_time_changed(time);
    }

    /// Keep the date, change the time of day
    pub fn set_time_of_day(&self, hour: u32, minute: u32) {
        let time = self.current_time().at(hour, minute);
        self.set_time(time);
    }

    /// Advance by `delta_secs` real seconds.
    ///
    /// Scaled seconds accumulate while flowing; every 60 of them add one game
    /// minute. Tick subscribers get the scaled delta on every flowing update.
    pub fn update(&self, delta_secs: f64) {
        let (scaled, changed) = {
            let mut state = self.state.lock();
            if !state.flowing || delta_secs <= 0.0 {
                return;
            }
            let scaled = delta_secs * f64::from(state.time_scale);
            state.accumulated += scaled;

            let mut changed = None;
            if state.accumulated >= SECONDS_PER_GAME_MINUTE {
                let minutes = (state.accumulated / SECONDS_PER_GAME_MINUTE).floor();
                state.accumulated -= minutes * SECONDS_PER_GAME_MINUTE;
                state.current = state.current.advance_minutes(minutes as u64);
                changed = Some(state.current);
            }
            (scaled, changed)
        };

        let ticks = self.ticks.lock().snapshot();
        fire(&ticks, scaled);

        if let Some(time) = changed {
            self.notify_time_changed(time);
        }
    }

    /// Whether the current time of day lies in `[start, end]`; wraps midnight
    /// when `start > end`
    pub fn is_time_between(
        &self,
        start_hour: u32,
        start_minute: u32,
        end_hour: u32,
        end_minute: u32,
    ) -> bool {
        let now = self.current_time().minute_of_day();
        let start = start_hour * 60 + start_minute;
        let end = end_hour * 60 + end_minute;
        if start <= end {
            now >= start && now <= end
        } else {
            now >= start || now <= end
        }
    }

    /// Called with the new time whenever it changes; lower priority runs first
    pub fn subscribe_time_changed<F>(&self, priority: i32, callback: F) -> SubscriptionId
    where
        F: Fn(GameTime) + Send + Sync + 'static,
    {
        let id = self.next_subscription_id();
        self.time_changed
            .lock()
            .insert(id, priority, Arc::new(callback));
        id
    }

    /// Called with the scaled delta on every flowing update; lower priority runs first
    pub fn subscribe_tick<F>(&self, priority: i32, callback: F) -> SubscriptionId
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        let id = self.next_subscription_id();
        self.ticks.lock().insert(id, priority, Arc::new(callback));
        id
    }

    /// Remove a subscription of either kind
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.time_changed.lock().remove(id) || self.ticks.lock().remove(id)
    }

    /// Receiver that observes every time change
    pub fn watch(&self) -> watch::Receiver<GameTime> {
        self.tx.subscribe()
    }

    fn next_subscription_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn notify_time_changed(&self, time: GameTime) {
        self.tx.send_replace(time);
        let callbacks = self.time_changed.lock().snapshot();
        fire(&callbacks, time);
    }
}

impl std::fmt::Debug for TimeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TimeService")
            .field("current", &state.current)
            .field("time_scale", &state.time_scale)
            .field("flowing", &state.flowing)
            .field("hard_pause_count", &state.hard_pause_count)
            .field("slowdown_count", &state.slowdown_count)
            .finish()
    }
}
