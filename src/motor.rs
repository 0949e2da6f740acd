//! Maps a normalized motor speed to a PWM high-time, via a `PwmExpander`
//! channel. For a Hobbywing 18A-class ESC, `min_high_ms` is the idle pulse
//! the ESC expects to arm against, and `max_high_ms` is full throttle.

use crate::error::Result;
use crate::i2c::I2CBus;
use crate::pwm::PwmExpander;

pub struct Motor {
    channel: usize,
    min_high_ms: f32,
    max_high_ms: f32,
    speed: f32,
}

impl Motor {
    /// Writes the initial idle signal immediately. Callers must wait for
    /// the ESC's priming window (several seconds) before arming.
    pub fn new(
        bus: &mut I2CBus,
        pwm: &mut PwmExpander,
        channel: usize,
        min_high_ms: f32,
        max_high_ms: f32,
    ) -> Result<Motor> {
        let mut motor = Motor {
            channel,
            min_high_ms,
            max_high_ms,
            speed: 0.0,
        };
        motor.set_speed(bus, pwm, 0.0)?;
        Ok(motor)
    }

    pub fn set_speed(&mut self, bus: &mut I2CBus, pwm: &mut PwmExpander, speed: f32) -> Result<()> {
        self.speed = speed;
        let high_time = self.min_high_ms + (self.max_high_ms - self.min_high_ms) * speed;
        pwm.set_high_time(bus, self.channel, high_time)
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn tick(&mut self, bus: &mut I2CBus, pwm: &mut PwmExpander) -> Result<()> {
        pwm.tick(bus, self.channel)
    }

    pub fn stop(&mut self, bus: &mut I2CBus, pwm: &mut PwmExpander) -> Result<()> {
        self.set_speed(bus, pwm, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_time_interpolates_between_min_and_max() {
        let min = 1.26f32;
        let max = 1.6f32;
        let half = min + (max - min) * 0.5;
        assert!((half - 1.43).abs() < 1e-4);
    }
}
