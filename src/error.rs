//! Crate-wide error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlightError {
    #[error("i2c error on slave 0x{slave:02x}: {source}")]
    I2c {
        slave: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("pwm error: {0}")]
    Pwm(String),

    #[error("radio error: {0}")]
    Radio(#[from] serialport::Error),

    #[error("radio io error: {0}")]
    RadioIo(#[source] std::io::Error),

    #[error("calibration file error at {path}: {source}")]
    Calibration {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FlightError>;
