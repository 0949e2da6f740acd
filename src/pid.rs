//! Software PID controller.
//!
//! Two deliberate departures from a textbook PID, both carried over from
//! the original controller: the integral term is time-weighted, and the
//! derivative term is the average slope of past *process values* over a
//! sliding window rather than the instantaneous error derivative. This
//! makes the derivative term smoother across setpoint changes.

use std::collections::VecDeque;
use std::time::Instant;

struct Sample {
    value: f32,
    time: f32,
}

pub struct PidController {
    target: f32,
    p_gain: f32,
    i_gain: f32,
    d_gain: f32,

    window_size: usize,
    window: VecDeque<Sample>,

    sum_error: f32,
    output: f32,

    time_current: f32,
    last_update: Instant,
}

impl PidController {
    pub fn new(target: f32, p_gain: f32, i_gain: f32, d_gain: f32, window_size: usize) -> PidController {
        PidController {
            target,
            p_gain,
            i_gain,
            d_gain,
            window_size,
            window: VecDeque::with_capacity(window_size),
            sum_error: 0.0,
            output: 0.0,
            time_current: 0.0,
            last_update: Instant::now(),
        }
    }

    /// Feeds a new process-value reading, advancing the controller by the
    /// wall-clock time elapsed since the previous `feed`.
    pub fn feed(&mut self, value: f32) {
        let now = Instant::now();
        let dtime = now.duration_since(self.last_update).as_secs_f32();
        self.time_current += dtime;
        self.last_update = now;

        self.window.push_back(Sample { value, time: self.time_current });
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }

        let p = self.target - value;
        self.sum_error += p * dtime;
        let i = self.sum_error;

        let mut d = 0.0f32;
        if !self.window.is_empty() {
            let first = &self.window[0];
            let (prev_value, prev_time) = (first.value, first.time);
            let mut prev_value = prev_value;
            let mut prev_time = prev_time;
            for sample in self.window.iter().skip(1) {
                let dt = sample.time - prev_time;
                if dt != 0.0 {
                    d += (sample.value - prev_value) / dt;
                }
                prev_value = sample.value;
                prev_time = sample.time;
            }
            d /= self.window.len() as f32;
        }

        self.output = self.p_gain * p + self.i_gain * i - self.d_gain * d;
    }

    /// Returns the last computed output. Idempotent between `feed` calls.
    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn set_gains(&mut self, p: f32, i: f32, d: f32) {
        self.p_gain = p;
        self.i_gain = i;
        self.d_gain = d;
    }

    pub fn sum_error(&self) -> f32 {
        self.sum_error
    }

    /// Clears integral, output, and the derivative window. Target and
    /// gains are preserved.
    pub fn reset(&mut self) {
        self.window.clear();
        self.sum_error = 0.0;
        self.output = 0.0;
        self.time_current = 0.0;
        self.last_update = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_feed_after_reset_is_pure_proportional() {
        let mut pid = PidController::new(10.0, 1.0, 0.5, 0.25, 3);
        pid.reset();
        pid.feed(0.0);
        // dt is ~0 on the very first feed after reset, so integral and
        // derivative contributions are both zero.
        assert!((pid.output() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn output_is_idempotent_between_feeds() {
        let mut pid = PidController::new(5.0, 1.0, 0.0, 0.0, 3);
        pid.feed(2.0);
        let a = pid.output();
        let b = pid.output();
        assert_eq!(a, b);
    }

    #[test]
    fn reset_preserves_target_and_gains() {
        let mut pid = PidController::new(3.0, 2.0, 1.0, 0.5, 4);
        pid.feed(1.0);
        pid.reset();
        pid.feed(1.0);
        assert!((pid.output() - 2.0 * (3.0 - 1.0)).abs() < 1e-3);
    }
}
