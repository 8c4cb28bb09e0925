//! Per-stream drift-correcting pacing.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Largest gap between consecutive pts treated as a real frame spacing.
pub const MAX_FRAME_GAP: f64 = 10.0;
/// Lower bound of the master/slave resync window.
pub const SYNC_THRESHOLD_MIN: f64 = 0.04;
/// Upper bound of the master/slave resync window.
pub const SYNC_THRESHOLD_MAX: f64 = 0.1;
/// Frames spaced further apart than this absorb a lag in one step.
pub const FRAME_DUP_THRESHOLD: f64 = 0.1;
/// Longest single wait handed back to the caller.
pub const MAX_WAIT: f64 = 0.01;
const MIN_WAIT: Duration = Duration::from_micros(1);
/// Drift beyond which the frame timer snaps to the current time.
pub const MAX_DRIFT: f64 = 0.1;
/// Fallback frame spacing (25 fps) used until the stream reports one.
pub const DEFAULT_FRAME_INTERVAL: f64 = 0.04;

/// Wall-clock used by a [`Clock`].
pub trait TimeSource: Send + Sync {
    /// Current time in seconds from an arbitrary fixed origin.
    fn now(&self) -> f64;

    fn sleep(&self, duration: Duration);
}

/// Offset added to [`MonotonicTime`] readings so a freshly reset clock,
/// whose frame timer sits at zero, is always overdue.
const MONOTONIC_EPOCH: f64 = 3600.0;

/// Real monotonic time backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> f64 {
        MONOTONIC_EPOCH + self.origin.elapsed().as_secs_f64()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Virtual time for deterministic tests. `sleep` advances the clock instead
/// of blocking.
#[derive(Debug, Default)]
pub struct ManualTime {
    now: Mutex<f64>,
}

impl ManualTime {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, seconds: f64) {
        *self.now.lock().unwrap() += seconds;
    }

    pub fn set(&self, seconds: f64) {
        *self.now.lock().unwrap() = seconds;
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration.as_secs_f64());
    }
}

/// Decision returned by [`Clock::poll`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// Present the frame now; the clock has advanced.
    Present,
    /// Too early. Retry after the given wait (at most [`MAX_WAIT`]).
    Wait(Duration),
}

/// Pacing state for one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
    frame_rate: f64,
    frame_timer: f64,
    prev_pts: f64,
    last_delay: f64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl Clock {
    pub fn new(frame_rate: f64) -> Self {
        Self {
            frame_rate: sanitize_interval(frame_rate),
            frame_timer: 0.0,
            prev_pts: 0.0,
            last_delay: 0.0,
        }
    }

    /// Fallback spacing between frames, in seconds.
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn set_frame_rate(&mut self, frame_rate: f64) {
        self.frame_rate = sanitize_interval(frame_rate);
    }

    pub fn frame_timer(&self) -> f64 {
        self.frame_timer
    }

    pub fn prev_pts(&self) -> f64 {
        self.prev_pts
    }

    /// Delay applied to the most recently presented frame.
    pub fn last_delay(&self) -> f64 {
        self.last_delay
    }

    /// Forget pacing history. The frame rate is stream metadata and stays.
    pub fn reset(&mut self) {
        self.frame_timer = 0.0;
        self.prev_pts = 0.0;
        self.last_delay = 0.0;
    }

    /// Delay before `pts` may be presented, after master correction and
    /// speed scaling.
    pub fn delay_for(&self, pts: f64, speed: f64, master_pts: Option<f64>) -> f64 {
        let mut delay = pts - self.prev_pts;
        if delay.is_nan() || delay <= 0.0 || delay > MAX_FRAME_GAP {
            delay = self.frame_rate;
        }

        if let Some(master) = master_pts {
            let diff = pts - master;
            let threshold = delay.clamp(SYNC_THRESHOLD_MIN, SYNC_THRESHOLD_MAX);
            if diff <= -threshold {
                delay = (delay + diff).max(0.0);
            } else if diff >= threshold && delay > FRAME_DUP_THRESHOLD {
                delay += diff;
            } else if diff >= threshold {
                delay *= 2.0;
            }
        }

        let speed = if speed.is_finite() && speed > 0.0 { speed } else { 1.0 };
        delay / speed
    }

    /// Decide whether `pts` is due at time `now`, advancing the clock when
    /// it is.
    pub fn poll(&mut self, pts: f64, speed: f64, master_pts: Option<f64>, now: f64) -> Pacing {
        let delay = self.delay_for(pts, speed, master_pts);
        let deadline = self.frame_timer + delay;
        if now < deadline {
            let wait = Duration::from_secs_f64((deadline - now).min(MAX_WAIT));
            return Pacing::Wait(wait.max(MIN_WAIT));
        }

        self.prev_pts = pts;
        self.frame_timer = deadline;
        if now - self.frame_timer > MAX_DRIFT {
            self.frame_timer = now;
        }
        self.last_delay = delay;
        Pacing::Present
    }

    /// Poll against `time`, sleeping through it when the frame is early.
    ///
    /// Returns `true` when the frame should be presented now. A `false`
    /// return leaves the frame unconsumed; the caller retries.
    pub fn sync(
        &mut self,
        pts: f64,
        speed: f64,
        master_pts: Option<f64>,
        time: &dyn TimeSource,
    ) -> bool {
        match self.poll(pts, speed, master_pts, time.now()) {
            Pacing::Present => true,
            Pacing::Wait(wait) => {
                time.sleep(wait);
                false
            }
        }
    }
}

fn sanitize_interval(interval: f64) -> f64 {
    if interval.is_finite() && interval > 0.0 {
        interval
    } else {
        DEFAULT_FRAME_INTERVAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primed(prev_pts: f64) -> Clock {
        let mut clock = Clock::new(0.04);
        clock.prev_pts = prev_pts;
        clock
    }

    #[test]
    fn constant_spacing_presents_at_frame_intervals() {
        let time = ManualTime::new(100.0);
        let mut clock = Clock::new(0.04);
        let mut presented = Vec::new();
        let mut pts = 0.0;
        while presented.len() < 20 {
            if clock.sync(pts, 1.0, None, &time) {
                presented.push(time.now());
                pts += 0.04;
            }
        }
        // The first frame snaps the timer; every later one lands on a
        // multiple of the spacing within one wait slice.
        for pair in presented[1..].windows(2) {
            let gap = pair[1] - pair[0];
            assert!((gap - 0.04).abs() <= MAX_WAIT + 1e-9, "gap {}", gap);
        }
    }

    #[test]
    fn early_frame_waits_at_most_one_slice() {
        let mut clock = primed(1.0);
        clock.frame_timer = 10.0;
        match clock.poll(1.04, 1.0, None, 10.0) {
            Pacing::Wait(wait) => assert!(wait.as_secs_f64() <= MAX_WAIT + 1e-12),
            Pacing::Present => panic!("frame presented early"),
        }
        assert_eq!(clock.prev_pts(), 1.0);
        assert_eq!(clock.poll(1.04, 1.0, None, 10.05), Pacing::Present);
        assert!((clock.frame_timer() - 10.04).abs() < 1e-9);
        assert_eq!(clock.prev_pts(), 1.04);
    }

    #[test]
    fn implausible_gaps_fall_back_to_frame_rate() {
        let clock = primed(5.0);
        assert!((clock.delay_for(5.0, 1.0, None) - 0.04).abs() < 1e-12);
        assert!((clock.delay_for(2.0, 1.0, None) - 0.04).abs() < 1e-12);
        assert!((clock.delay_for(f64::NAN, 1.0, None) - 0.04).abs() < 1e-12);
        assert!((clock.delay_for(30.0, 1.0, None) - 0.04).abs() < 1e-12);
    }

    #[test]
    fn slave_behind_master_catches_up() {
        let clock = primed(0.96);
        let unsynced = clock.delay_for(1.0, 1.0, None);
        let synced = clock.delay_for(1.0, 1.0, Some(1.5));
        assert!(synced < unsynced);
        assert_eq!(synced, 0.0);
    }

    #[test]
    fn slave_ahead_of_master_never_shrinks() {
        let clock = primed(0.96);
        let unsynced = clock.delay_for(1.0, 1.0, None);
        let small_gap = clock.delay_for(1.0, 1.0, Some(0.5));
        assert!(small_gap >= unsynced);
        assert!((small_gap - 2.0 * unsynced).abs() < 1e-12);

        let sparse = primed(0.5);
        let absorbed = sparse.delay_for(1.0, 1.0, Some(0.7));
        assert!((absorbed - 0.8).abs() < 1e-12);
    }

    #[test]
    fn within_threshold_is_untouched() {
        let clock = primed(0.96);
        assert!((clock.delay_for(1.0, 1.0, Some(1.01)) - 0.04).abs() < 1e-12);
    }

    #[test]
    fn speed_divides_delay() {
        let clock = primed(0.96);
        assert!((clock.delay_for(1.0, 2.0, None) - 0.02).abs() < 1e-12);
        assert!((clock.delay_for(1.0, 0.0, None) - 0.04).abs() < 1e-12);
    }

    #[test]
    fn large_drift_snaps_timer_to_now() {
        let mut clock = primed(0.0);
        assert_eq!(clock.poll(0.04, 1.0, None, 50.0), Pacing::Present);
        assert_eq!(clock.frame_timer(), 50.0);
    }

    #[test]
    fn reset_keeps_frame_rate() {
        let mut clock = Clock::new(0.02);
        clock.poll(1.0, 1.0, None, 3.0);
        clock.reset();
        assert_eq!(clock.prev_pts(), 0.0);
        assert_eq!(clock.frame_timer(), 0.0);
        assert_eq!(clock.frame_rate(), 0.02);
    }
}
