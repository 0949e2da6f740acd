//! Flight controller configuration, loaded from a TOML file.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::FlightError;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct FlightConfig {
    pub i2c_device_path: String,
    pub pwm_address: u8,
    pub accel_address: u8,
    pub gyro_address: u8,

    pub serial_port_path: String,
    pub baud_rate: u32,
    pub parity: Parity,

    pub control_rate_hz: f32,
    pub smoothing_window: usize,
    pub pid_window_size: usize,

    pub motor_channels: [u8; 4],
    pub motor_min_high_ms: f32,
    pub motor_max_high_ms: f32,
    pub enabled_motors: [bool; 4],

    pub angle_pid_gains: PidGains,
    pub rate_pid_gains: PidGains,

    pub calibration_path: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct PidGains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl FlightConfig {
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<FlightConfig, FlightError> {
        let mut file = err_config(File::open(path))?;
        let mut buffer = String::new();
        err_config(file.read_to_string(&mut buffer))?;
        err_config(toml::from_str(&buffer))
    }
}

fn err_config<T, U: Display>(result: Result<T, U>) -> Result<T, FlightError> {
    result.map_err(|err| FlightError::Config(format!("{}", err)))
}

impl Default for FlightConfig {
    /// Values modeled on a Hobbywing 18A-class ESC and a GY-80 breakout
    /// (ADXL345 + L3G4200D) on a PCA9685 expander.
    fn default() -> Self {
        FlightConfig {
            i2c_device_path: "/dev/i2c-1".into(),
            pwm_address: 0x40,
            accel_address: 0x53,
            gyro_address: 0x69,

            serial_port_path: "/dev/ttyUSB0".into(),
            baud_rate: 57600,
            parity: Parity::Even,

            control_rate_hz: 100.0,
            smoothing_window: 5,
            pid_window_size: 5,

            motor_channels: [0, 1, 2, 3],
            motor_min_high_ms: 1.26,
            motor_max_high_ms: 1.6,
            enabled_motors: [true, true, true, true],

            angle_pid_gains: PidGains { p: 1.0, i: 0.0, d: 0.0 },
            rate_pid_gains: PidGains { p: 1.0, i: 0.0, d: 0.0 },

            calibration_path: "calibration.ini".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = FlightConfig::default();
        assert!(cfg.motor_min_high_ms < cfg.motor_max_high_ms);
        assert_eq!(cfg.motor_channels.len(), 4);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = FlightConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed: FlightConfig = toml::from_str(&text).unwrap();
        assert_eq!(cfg, parsed);
    }
}
