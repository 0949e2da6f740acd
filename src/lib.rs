//! Core flight-control library: sensor drivers, the PWM/I2C hardware
//! abstraction, the radio link, and the cascaded-PID control loop.

pub mod attitude;
pub mod bytequeue;
pub mod byteorder;
pub mod calibration;
pub mod config;
pub mod error;
pub mod flight_control;
pub mod geometry;
pub mod i2c;
pub mod imu;
pub mod motor;
pub mod pid;
pub mod pwm;
pub mod radio;

pub use error::{FlightError, Result};
pub use flight_control::FlightControl;
