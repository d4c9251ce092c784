// Helpers to handle budgeting subsystems based on time
//
// Austin Shafer - 2020
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn get_current_time() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Error getting system time")
}

// Helper to get the current time in milliseconds
#[allow(dead_code)]
pub fn get_current_millis() -> u32 {
    get_current_time().as_millis() as u32
}

// Manages subsystem timings
//
// The motivation for this is frame budgeting: the tile pipeline (§4.7)
// wants to know how much time is left before the next frame is overdue,
// and callers can use this number for their timeout values.
pub struct TimingManager {
    tm_period: Duration,
    tm_start: Duration,
}

impl TimingManager {
    pub fn new(period_ms: u32) -> TimingManager {
        TimingManager {
            tm_period: Duration::from_millis(period_ms as u64),
            tm_start: get_current_time(),
        }
    }

    pub fn reset(&mut self) {
        self.tm_start = get_current_time();
    }

    pub fn is_overdue(&mut self) -> bool {
        let time = get_current_time();
        time - self.tm_start >= self.tm_period
    }

    pub fn time_remaining(&mut self) -> usize {
        let time_elapsed = get_current_time() - self.tm_start;
        if self.is_overdue() {
            return 0;
        }
        (self.tm_period - time_elapsed).as_millis() as usize
    }
}

// A stopclock for measuring time intervals
//
// The order of use MUST be `new`, `start`, `end`; after that the
// recorded duration can be got with `get_duration`.
#[allow(dead_code)]
pub struct StopWatch {
    sw_start: Duration,
    sw_end: Duration,
}

impl StopWatch {
    pub fn new() -> StopWatch {
        StopWatch {
            sw_start: Duration::from_millis(0),
            sw_end: Duration::from_millis(0),
        }
    }

    pub fn start(&mut self) {
        self.sw_start = get_current_time();
    }

    pub fn end(&mut self) {
        self.sw_end = get_current_time();
    }

    pub fn get_duration(&mut self) -> Duration {
        self.sw_end - self.sw_start
    }
}

impl Default for StopWatch {
    fn default() -> Self {
        Self::new()
    }
}
