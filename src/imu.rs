//! Accelerometer (ADXL345-class) and gyroscope (L3G4200D-class) drivers,
//! sharing the same I2C bus as the PWM expander.

use crate::error::Result;
use crate::geometry::Vector3;
use crate::i2c::I2CBus;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccelRange {
    G2,
    G4,
    G8,
    G16,
}

impl AccelRange {
    fn register_value(self) -> u8 {
        match self {
            AccelRange::G2 => 0b00,
            AccelRange::G4 => 0b01,
            AccelRange::G8 => 0b10,
            AccelRange::G16 => 0b11,
        }
    }

    /// LSB per g, per the ADXL345 datasheet.
    fn lsb_per_g(self) -> f32 {
        match self {
            AccelRange::G2 => 256.0,
            AccelRange::G4 => 128.0,
            AccelRange::G8 => 64.0,
            AccelRange::G16 => 32.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccelSampleRate {
    Hz12_5,
    Hz25,
    Hz50,
    Hz100,
    Hz200,
    Hz400,
}

impl AccelSampleRate {
    fn register_value(self) -> u8 {
        match self {
            AccelSampleRate::Hz12_5 => 7,
            AccelSampleRate::Hz25 => 8,
            AccelSampleRate::Hz50 => 9,
            AccelSampleRate::Hz100 => 10,
            AccelSampleRate::Hz200 => 11,
            AccelSampleRate::Hz400 => 12,
        }
    }
}

const ADXL_BW_RATE: u8 = 0x2C;
const ADXL_POWER_CTL: u8 = 0x2D;
const ADXL_DATA_FORMAT: u8 = 0x31;
const ADXL_DATAX0: u8 = 0x32;

/// Neither this nor `Gyroscope` owns the bus it's read through — both only
/// borrow `&mut I2CBus` per call — so neither can implement `Drop` to sleep
/// itself. `FlightControl`, which owns both the device and the bus, sleeps
/// both sensors on its own `Drop`.
pub struct Accelerometer {
    slave: u8,
    range: AccelRange,
}

impl Accelerometer {
    pub fn new(
        bus: &mut I2CBus,
        slave: u8,
        range: AccelRange,
        rate: AccelSampleRate,
    ) -> Result<Accelerometer> {
        let mut accel = Accelerometer { slave, range };
        accel.set_sleep(bus, true)?;
        accel.set_range(bus, range)?;
        accel.set_sample_rate(bus, rate)?;
        accel.set_sleep(bus, false)?;
        Ok(accel)
    }

    pub fn set_sleep(&mut self, bus: &mut I2CBus, sleep: bool) -> Result<()> {
        if sleep {
            bus.write(self.slave, &[ADXL_POWER_CTL, 0b0000_0100])
        } else {
            bus.write(self.slave, &[ADXL_POWER_CTL, 0b0000_0000])?;
            bus.write(self.slave, &[ADXL_POWER_CTL, 0b0000_1000])
        }
    }

    pub fn set_range(&mut self, bus: &mut I2CBus, range: AccelRange) -> Result<()> {
        self.range = range;
        bus.write(self.slave, &[ADXL_DATA_FORMAT, range.register_value()])
    }

    pub fn set_sample_rate(&mut self, bus: &mut I2CBus, rate: AccelSampleRate) -> Result<()> {
        bus.write(self.slave, &[ADXL_BW_RATE, rate.register_value()])
    }

    /// Reads the three axes in a single batched I2C transaction: enqueue a
    /// register-pointer write, then a 6-byte read of the auto-incrementing
    /// axis registers.
    pub fn read(&mut self, bus: &mut I2CBus) -> Result<Vector3<f32>> {
        bus.enqueue_write(self.slave, &[ADXL_DATAX0]);
        bus.enqueue_read(self.slave, 6);
        let results = bus.send_transaction()?;
        let raw = &results[0];

        let x = i16::from_le_bytes([raw[0], raw[1]]);
        let y = i16::from_le_bytes([raw[2], raw[3]]);
        let z = i16::from_le_bytes([raw[4], raw[5]]);

        let factor = self.range.lsb_per_g();
        Ok(Vector3::new(x as f32 / factor, y as f32 / factor, z as f32 / factor))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GyroRange {
    Dps250,
    Dps500,
    Dps2000,
}

impl GyroRange {
    fn register_value(self) -> u8 {
        match self {
            GyroRange::Dps250 => 0b00,
            GyroRange::Dps500 => 0b01,
            GyroRange::Dps2000 => 0b10,
        }
    }

    fn degrees_per_lsb(self) -> f32 {
        match self {
            GyroRange::Dps250 => 0.00875,
            GyroRange::Dps500 => 0.0175,
            GyroRange::Dps2000 => 0.07,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GyroSampleRate {
    Hz100,
    Hz200,
    Hz400,
    Hz800,
}

impl GyroSampleRate {
    fn register_value(self) -> u8 {
        match self {
            GyroSampleRate::Hz100 => 0b00,
            GyroSampleRate::Hz200 => 0b01,
            GyroSampleRate::Hz400 => 0b10,
            GyroSampleRate::Hz800 => 0b11,
        }
    }
}

const L3G_CTRL_REG1: u8 = 0x20;
const L3G_CTRL_REG4: u8 = 0x23;
const L3G_OUT_X_L: u8 = 0x28;
const L3G_AUTO_INCREMENT: u8 = 0x80;

pub struct Gyroscope {
    slave: u8,
    range: GyroRange,
    rate: GyroSampleRate,
    sleep: bool,
}

impl Gyroscope {
    pub fn new(
        bus: &mut I2CBus,
        slave: u8,
        range: GyroRange,
        rate: GyroSampleRate,
    ) -> Result<Gyroscope> {
        let mut gyro = Gyroscope { slave, range, rate, sleep: false };
        gyro.set_range(bus, range)?;
        gyro.write_sleep_and_rate(bus)?;
        Ok(gyro)
    }

    fn write_sleep_and_rate(&mut self, bus: &mut I2CBus) -> Result<()> {
        let value = if self.sleep {
            0b0000_1000
        } else {
            0b0000_1111 | (self.rate.register_value() << 6)
        };
        bus.write(self.slave, &[L3G_CTRL_REG1, value])
    }

    pub fn set_sleep(&mut self, bus: &mut I2CBus, sleep: bool) -> Result<()> {
        self.sleep = sleep;
        self.write_sleep_and_rate(bus)
    }

    pub fn set_range(&mut self, bus: &mut I2CBus, range: GyroRange) -> Result<()> {
        self.range = range;
        bus.write(self.slave, &[L3G_CTRL_REG4, range.register_value() << 4])
    }

    pub fn set_sample_rate(&mut self, bus: &mut I2CBus, rate: GyroSampleRate) -> Result<()> {
        self.rate = rate;
        self.write_sleep_and_rate(bus)
    }

    /// Reads angular rate in degrees/second via a single batched transaction.
    pub fn read(&mut self, bus: &mut I2CBus) -> Result<Vector3<f32>> {
        bus.enqueue_write(self.slave, &[L3G_OUT_X_L | L3G_AUTO_INCREMENT]);
        bus.enqueue_read(self.slave, 6);
        let results = bus.send_transaction()?;
        let raw = &results[0];

        let x = i16::from_le_bytes([raw[0], raw[1]]);
        let y = i16::from_le_bytes([raw[2], raw[3]]);
        let z = i16::from_le_bytes([raw[4], raw[5]]);

        let factor = self.range.degrees_per_lsb();
        Ok(Vector3::new(x as f32 * factor, y as f32 * factor, z as f32 * factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accel_scale_factors_match_datasheet() {
        assert_eq!(AccelRange::G2.lsb_per_g(), 256.0);
        assert_eq!(AccelRange::G16.lsb_per_g(), 32.0);
    }

    #[test]
    fn gyro_scale_factors_match_datasheet() {
        assert_eq!(GyroRange::Dps250.degrees_per_lsb(), 0.00875);
        assert_eq!(GyroRange::Dps2000.degrees_per_lsb(), 0.07);
    }
}
