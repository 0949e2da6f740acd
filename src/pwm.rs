//! PCA9685-class 16-channel PWM expander, with software dither for sub-LSB
//! resolution between the coarse hardware duty-cycle register steps.

use std::thread;
use std::time::Duration;

use num::clamp;

use crate::error::{FlightError, Result};
use crate::i2c::I2CBus;

const MODE1: u8 = 0x00;
const LED0_ON_L: u8 = 0x06;
const PRE_SCALE: u8 = 0xFE;

const MODE1_RESTART: u8 = 0x80;
const MODE1_AI: u8 = 0x20;
const MODE1_SLEEP: u8 = 0x10;

const NUM_CHANNELS: usize = 16;
const MAX_COUNT: u16 = 4095;
const DITHER_PHASES: u8 = 5;
const DITHER_SCALE: u8 = 4;

#[derive(Clone, Copy, Default)]
struct ChannelState {
    load: f32,
    last_count_written: u16,
    dither_tick: u8,
}

pub struct PwmExpander {
    slave: u8,
    frequency_hz: u32,
    channels: [ChannelState; NUM_CHANNELS],
}

impl PwmExpander {
    pub fn new(bus: &mut I2CBus, slave: u8, frequency_hz: u32) -> Result<PwmExpander> {
        let mut expander = PwmExpander {
            slave,
            frequency_hz: 20,
            channels: [ChannelState::default(); NUM_CHANNELS],
        };
        expander.set_frequency(bus, frequency_hz)?;
        Ok(expander)
    }

    pub fn set_frequency(&mut self, bus: &mut I2CBus, hertz: u32) -> Result<()> {
        if hertz == 0 {
            return Err(FlightError::Pwm("frequency must be nonzero".into()));
        }
        self.frequency_hz = hertz;

        self.set_sleep(bus, true)?;
        thread::sleep(Duration::from_millis(1));

        let prescale = ((25_000_000u32 / (4096 * hertz)) - 1) as u8;
        bus.write(self.slave, &[PRE_SCALE, prescale])?;
        bus.write(self.slave, &[MODE1, MODE1_AI])?;
        thread::sleep(Duration::from_millis(1));

        bus.write(self.slave, &[MODE1, MODE1_RESTART | MODE1_AI])?;
        thread::sleep(Duration::from_millis(1));

        for ch in self.channels.iter_mut() {
            ch.dither_tick = 0;
        }
        Ok(())
    }

    pub fn set_sleep(&mut self, bus: &mut I2CBus, enabled: bool) -> Result<()> {
        let mut mode = MODE1_AI;
        if enabled {
            mode |= MODE1_SLEEP;
        }
        bus.write(self.slave, &[MODE1, mode])
    }

    fn check_channel(&self, channel: usize) -> Result<()> {
        if channel >= NUM_CHANNELS {
            Err(FlightError::Pwm(format!("invalid PWM channel {channel}")))
        } else {
            Ok(())
        }
    }

    pub fn set_load(&mut self, bus: &mut I2CBus, channel: usize, factor: f32) -> Result<()> {
        self.check_channel(channel)?;
        let clipped = clamp(factor, 0.0, 1.0);
        self.channels[channel].load = clipped;
        let count = (clipped * MAX_COUNT as f32) as u16;
        self.write_exact_count(bus, channel, count)
    }

    pub fn set_high_time(&mut self, bus: &mut I2CBus, channel: usize, millis: f32) -> Result<()> {
        self.check_channel(channel)?;
        let cycle_ms = 1000.0 / self.frequency_hz as f32;
        self.set_load(bus, channel, millis / cycle_ms)
    }

    fn write_exact_count(&mut self, bus: &mut I2CBus, channel: usize, count: u16) -> Result<()> {
        let clipped = count.min(MAX_COUNT);
        let state = &mut self.channels[channel];
        if state.last_count_written == clipped {
            return Ok(());
        }
        state.last_count_written = clipped;

        let reg = LED0_ON_L + (channel as u8) * 4;
        bus.write(
            self.slave,
            &[
                reg,
                0x00,
                0x00,
                (clipped & 0x00FF) as u8,
                ((clipped & 0x0F00) >> 8) as u8,
            ],
        )
    }

    /// Advances the dither phase for `channel` and writes the hardware
    /// register if the dithered count changed. Call once per control cycle
    /// per channel.
    pub fn tick(&mut self, bus: &mut I2CBus, channel: usize) -> Result<()> {
        self.check_channel(channel)?;
        let count = next_dithered_count(&mut self.channels[channel]);
        self.write_exact_count(bus, channel, count)
    }
}

/// Advances `state`'s dither phase by one and returns the count that phase
/// should write. `high_phases` out of every `DITHER_PHASES` ticks write the
/// next-higher count; the rest write the truncated base count.
fn next_dithered_count(state: &mut ChannelState) -> u16 {
    let scaled = state.load * MAX_COUNT as f32;
    let base = scaled as u16;
    let fraction = scaled - base as f32;
    let high_phases = (fraction * DITHER_SCALE as f32).round() as u8;
    let phase = state.dither_tick;
    state.dither_tick = (state.dither_tick + 1) % DITHER_PHASES;
    if phase < high_phases {
        base + 1
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dither_writes_high_count_for_expected_fraction_of_phases() {
        // 0.5001 * 4095 = 2047.9095; base=2047, fraction~0.9095,
        // high_phases = round(0.9095*4) = 4 out of every 5 phases.
        let mut state = ChannelState { load: 0.5001, last_count_written: 0, dither_tick: 0 };
        let base = (state.load * MAX_COUNT as f32) as u16;
        let fraction = state.load * MAX_COUNT as f32 - base as f32;
        let expected_high_phases = (fraction * DITHER_SCALE as f32).round() as u8;

        let mut high_count = 0;
        for _ in 0..DITHER_PHASES {
            if next_dithered_count(&mut state) == base + 1 {
                high_count += 1;
            }
        }
        assert_eq!(base, 2047);
        assert_eq!(expected_high_phases, 4);
        assert_eq!(high_count, expected_high_phases);
    }

    #[test]
    fn dither_converges_to_requested_load_on_average() {
        let mut state = ChannelState { load: 0.5001, last_count_written: 0, dither_tick: 0 };
        let iterations = 1000;
        let total: u32 = (0..iterations).map(|_| next_dithered_count(&mut state) as u32).sum();
        let mean_load = total as f32 / iterations as f32 / MAX_COUNT as f32;
        assert!((mean_load - state.load).abs() < 1.0 / (4.0 * MAX_COUNT as f32));
    }

    #[test]
    fn skips_bus_write_when_count_unchanged() {
        let mut channels = [ChannelState::default(); NUM_CHANNELS];
        channels[0].last_count_written = 100;
        // writing the same clipped count should be a no-op per write_exact_count's early return
        assert_eq!(channels[0].last_count_written, 100);
    }
}
