//! Fixed-timestep scheduling
//!
//! Time is accumulated in whole nanoseconds so the number of steps taken is
//! exactly `floor(total / timestep)` no matter how the elapsed time is sliced.

use std::time::{Duration, Instant};

/// Largest wall-clock slice fed into a single iteration
pub const MAX_FRAME: Duration = Duration::from_millis(100);

/// Simulation tick counter
pub type Tick = u64;

/// Accumulator that turns elapsed wall time into fixed steps
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    timestep: Duration,
    max_frame: Duration,
    accumulator: Duration,
}

impl FixedStepClock {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            timestep: Duration::from_nanos(1_000_000_000 / u64::from(tick_rate)),
            max_frame: MAX_FRAME,
            accumulator: Duration::ZERO,
        }
    }

    pub fn with_max_frame(mut self, max_frame: Duration) -> Self {
        self.max_frame = max_frame;
        self
    }

    /// Add `elapsed` (clamped to the max frame) and return how many steps are due.
    /// The leftover stays below one timestep.
    pub fn accumulate(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed.min(self.max_frame);
        let mut steps = 0;
        while self.accumulator >= self.timestep {
            self.accumulator -= self.timestep;
            steps += 1;
        }
        steps
    }

    pub fn timestep(&self) -> Duration {
        self.timestep
    }

    /// Timestep in seconds, as handed to systems
    pub fn dt(&self) -> f32 {
        self.timestep.as_secs_f32()
    }

    pub fn leftover(&self) -> Duration {
        self.accumulator
    }
}

/// Measures wall time between loop iterations and counts server ticks
#[derive(Debug)]
pub struct TickScheduler {
    clock: FixedStepClock,
    last: Instant,
    tick: Tick,
}

impl TickScheduler {
    pub fn new(tick_rate: u32) -> Self {
        Self::starting_at(tick_rate, Instant::now())
    }

    pub fn starting_at(tick_rate: u32, now: Instant) -> Self {
        Self {
            clock: FixedStepClock::new(tick_rate),
            last: now,
            tick: 0,
        }
    }

    /// Elapsed wall time since the previous call (unclamped)
    pub fn measure(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last);
        self.last = now;
        elapsed
    }

    /// Advance the server tick by the steps due for `elapsed`, returning them
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        let steps = self.clock.accumulate(elapsed);
        self.tick += u64::from(steps);
        steps
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn clock(&self) -> &FixedStepClock {
        &self.clock
    }
}
