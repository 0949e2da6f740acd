//! Setpoint fields written by the main thread, read once per cycle by the
//! control thread. A single mutex covers the whole group since they change
//! together and the control loop only needs to snapshot them, not hold the
//! lock across I/O.

use crate::config::PidGains;

#[derive(Clone, Copy)]
pub struct SharedSetpoints {
    pub target_roll: f32,
    pub target_pitch: f32,
    pub target_yaw: f32,
    pub throttle: f32,
    pub turn_rate: f32,
    pub angle_gains: PidGains,
    pub rate_gains: PidGains,
}

impl SharedSetpoints {
    pub fn new(angle_gains: PidGains, rate_gains: PidGains) -> SharedSetpoints {
        SharedSetpoints {
            target_roll: 0.0,
            target_pitch: 0.0,
            target_yaw: 0.0,
            throttle: 0.0,
            turn_rate: 0.0,
            angle_gains,
            rate_gains,
        }
    }
}
