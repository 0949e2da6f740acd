//! Complementary-filter attitude estimator: fuses gyro integration (drifts,
//! but immune to linear acceleration) with accelerometer-derived tilt
//! (drift-free, but unreliable under linear acceleration).

use std::collections::VecDeque;

use crate::geometry::Vector3;

pub struct CalibrationOffsets {
    pub accel: Vector3<f32>,
    pub gyro: Vector3<f32>,
}

impl Default for CalibrationOffsets {
    fn default() -> Self {
        CalibrationOffsets {
            accel: Vector3::new(0.0, 0.0, 0.0),
            gyro: Vector3::new(0.0, 0.0, 0.0),
        }
    }
}

pub struct AttitudeEstimator {
    accel_window: VecDeque<Vector3<f32>>,
    gyro_window: VecDeque<Vector3<f32>>,
    window_size: usize,

    orient: Vector3<f32>,
    roll: f32,
    pitch: f32,
    yaw: f32,
    last_gyro: Vector3<f32>,
}

impl AttitudeEstimator {
    pub fn new(window_size: usize) -> AttitudeEstimator {
        AttitudeEstimator {
            accel_window: VecDeque::with_capacity(window_size),
            gyro_window: VecDeque::with_capacity(window_size),
            window_size,
            orient: Vector3::new(0.0, 0.0, 0.0),
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            last_gyro: Vector3::new(0.0, 0.0, 0.0),
        }
    }

    pub fn push_samples(&mut self, accel: Vector3<f32>, gyro: Vector3<f32>) {
        push_bounded(&mut self.accel_window, accel, self.window_size);
        push_bounded(&mut self.gyro_window, gyro, self.window_size);
    }

    fn averaged(window: &VecDeque<Vector3<f32>>) -> Vector3<f32> {
        if window.is_empty() {
            return Vector3::new(0.0, 0.0, 0.0);
        }
        let sum = window.iter().fold(Vector3::new(0.0, 0.0, 0.0), |acc, v| acc + *v);
        sum / window.len() as f32
    }

    /// Advances the estimate by `dt` seconds using the current sample
    /// windows and calibration offsets. Returns the updated `(roll, pitch,
    /// yaw)` in degrees.
    pub fn update(&mut self, dt: f32, offsets: &CalibrationOffsets) -> (f32, f32, f32) {
        let accel = Self::averaged(&self.accel_window) - offsets.accel;
        let gyro = Self::averaged(&self.gyro_window) - offsets.gyro;
        self.last_gyro = gyro;

        // Gyro's Y axis runs opposite the accelerometer's on the target
        // board.
        self.orient.x = normalize_angle(self.orient.x + gyro.x * dt);
        self.orient.y = normalize_angle(self.orient.y - gyro.y * dt);
        self.orient.z = normalize_angle(self.orient.z + gyro.z * dt);

        let accel_roll = accel.x.atan2(-accel.z).to_degrees();
        let z_sign = if accel.z < 0.0 { -1.0 } else { 1.0 };
        let accel_pitch = accel
            .y
            .atan2(-z_sign * (accel.x * accel.x + accel.z * accel.z).sqrt())
            .to_degrees();

        let magnitude = accel.magnitude();
        let factor = (1.0 - (1.0 - magnitude).abs()).clamp(0.0, 1.0);

        self.roll = normalize_angle((1.0 - factor) * self.orient.x + factor * accel_roll);
        self.pitch = normalize_angle((1.0 - factor) * self.orient.y + factor * accel_pitch);
        self.yaw = self.orient.z;

        (self.roll, self.pitch, self.yaw)
    }

    pub fn roll(&self) -> f32 {
        self.roll
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// The calibrated, averaged gyro reading used by the most recent
    /// `update()`, for feeding the rate-PID ring.
    pub fn last_gyro(&self) -> Vector3<f32> {
        self.last_gyro
    }
}

fn push_bounded(window: &mut VecDeque<Vector3<f32>>, value: Vector3<f32>, cap: usize) {
    window.push_back(value);
    while window.len() > cap {
        window.pop_front();
    }
}

/// Normalizes an angle in degrees to `(-180, 180]`.
fn normalize_angle(mut degrees: f32) -> f32 {
    degrees %= 360.0;
    if degrees <= -180.0 {
        degrees += 360.0;
    } else if degrees > 180.0 {
        degrees -= 360.0;
    }
    degrees
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resting_upright_trusts_accelerometer_fully() {
        let mut est = AttitudeEstimator::new(1);
        est.push_samples(Vector3::new(0.0, 0.0, -1.0), Vector3::new(0.0, 0.0, 0.0));
        let offsets = CalibrationOffsets::default();
        let (roll, pitch, _yaw) = est.update(0.01, &offsets);
        assert!(roll.abs() < 1e-3);
        assert!(pitch.abs() < 1e-3);
    }

    #[test]
    fn tilted_accelerometer_gives_expected_roll() {
        let mut est = AttitudeEstimator::new(1);
        est.push_samples(Vector3::new(0.5, 0.0, -0.866), Vector3::new(0.0, 0.0, 0.0));
        let offsets = CalibrationOffsets::default();
        let (roll, _pitch, _yaw) = est.update(0.01, &offsets);
        assert!((roll - 30.0).abs() < 1.0);
    }

    #[test]
    fn normalize_angle_stays_in_range() {
        assert!((normalize_angle(181.0) - (-179.0)).abs() < 1e-4);
        assert!((normalize_angle(-181.0) - 179.0).abs() < 1e-4);
        assert_eq!(normalize_angle(180.0), 180.0);
    }
}
