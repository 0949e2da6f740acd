//! Monotonic-deadline control loop. Each iteration's deadline is computed
//! from a fixed schedule rather than from "now + period", so the loop does
//! not drift the way a plain sleep-loop would.

use std::time::{Duration, Instant};

pub struct DeadlineSchedule {
    period: Duration,
    next: Instant,
}

impl DeadlineSchedule {
    pub fn new(rate_hz: f32) -> DeadlineSchedule {
        let period = Duration::from_secs_f32(1.0 / rate_hz);
        DeadlineSchedule { period, next: Instant::now() + period }
    }

    /// Sleeps until the next scheduled deadline, then advances it. If a
    /// previous iteration overran, this returns immediately and catches the
    /// schedule up rather than bursting to compensate.
    pub fn wait_for_next(&mut self) {
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
        }
        self.next += self.period;
        if self.next < now {
            self.next = now + self.period;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_matches_requested_rate() {
        let schedule = DeadlineSchedule::new(100.0);
        assert!((schedule.period.as_secs_f32() - 0.01).abs() < 1e-6);
    }
}
