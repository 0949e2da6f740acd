//! The top of the core: owns the sensors, motors, and the two cascaded PID
//! rings, and drives them from a dedicated control thread.

mod shared;
mod timer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::warn;
use num::clamp;

use crate::attitude::{AttitudeEstimator, CalibrationOffsets};
use crate::calibration;
use crate::config::FlightConfig;
use crate::error::Result;
use crate::geometry::Vector3;
use crate::i2c::I2CBus;
use crate::imu::{AccelRange, AccelSampleRate, Accelerometer, GyroRange, GyroSampleRate, Gyroscope};
use crate::motor::Motor;
use crate::pid::PidController;
use crate::pwm::PwmExpander;

pub use shared::SharedSetpoints;
use timer::DeadlineSchedule;

/// Motor array index order: front-left, front-right, rear-right, rear-left
/// (X-frame, Y forward, X right).
const FL: usize = 0;
const FR: usize = 1;
const RR: usize = 2;
const RL: usize = 3;

#[derive(Clone, Copy, Default)]
struct Telemetry {
    roll: f32,
    pitch: f32,
    yaw: f32,
}

struct Hardware {
    bus: I2CBus,
    accel: Accelerometer,
    gyro: Gyroscope,
    pwm: PwmExpander,
    motors: [Motor; 4],
    estimator: AttitudeEstimator,
    angle_pid: [PidController; 3],
    rate_pid: [PidController; 3],
    calibration: CalibrationOffsets,
    enabled_motors: [bool; 4],
    calibration_path: String,
    last_sample: Vector3<f32>,
    last_gyro_sample: Vector3<f32>,
    last_update: Instant,
}

pub struct FlightControl {
    setpoints: Arc<Mutex<SharedSetpoints>>,
    hardware: Arc<Mutex<Hardware>>,
    telemetry: Arc<Mutex<Telemetry>>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    control_rate_hz: f32,
}

impl FlightControl {
    pub fn new(config: &FlightConfig) -> Result<FlightControl> {
        let mut bus = I2CBus::new(&config.i2c_device_path);
        let accel = Accelerometer::new(&mut bus, config.accel_address, AccelRange::G4, AccelSampleRate::Hz100)?;
        let gyro = Gyroscope::new(&mut bus, config.gyro_address, GyroRange::Dps500, GyroSampleRate::Hz400)?;
        let mut pwm = PwmExpander::new(&mut bus, config.pwm_address, 50)?;

        let motors = [
            Motor::new(&mut bus, &mut pwm, config.motor_channels[0] as usize, config.motor_min_high_ms, config.motor_max_high_ms)?,
            Motor::new(&mut bus, &mut pwm, config.motor_channels[1] as usize, config.motor_min_high_ms, config.motor_max_high_ms)?,
            Motor::new(&mut bus, &mut pwm, config.motor_channels[2] as usize, config.motor_min_high_ms, config.motor_max_high_ms)?,
            Motor::new(&mut bus, &mut pwm, config.motor_channels[3] as usize, config.motor_min_high_ms, config.motor_max_high_ms)?,
        ];

        let angle_gains = config.angle_pid_gains;
        let rate_gains = config.rate_pid_gains;
        let angle_pid = [
            PidController::new(0.0, angle_gains.p, angle_gains.i, angle_gains.d, config.pid_window_size),
            PidController::new(0.0, angle_gains.p, angle_gains.i, angle_gains.d, config.pid_window_size),
            PidController::new(0.0, angle_gains.p, angle_gains.i, angle_gains.d, config.pid_window_size),
        ];
        let rate_pid = [
            PidController::new(0.0, rate_gains.p, rate_gains.i, rate_gains.d, config.pid_window_size),
            PidController::new(0.0, rate_gains.p, rate_gains.i, rate_gains.d, config.pid_window_size),
            PidController::new(0.0, rate_gains.p, rate_gains.i, rate_gains.d, config.pid_window_size),
        ];

        let calibration = calibration::load(&config.calibration_path);

        let hardware = Hardware {
            bus,
            accel,
            gyro,
            pwm,
            motors,
            estimator: AttitudeEstimator::new(config.smoothing_window),
            angle_pid,
            rate_pid,
            calibration,
            enabled_motors: config.enabled_motors,
            calibration_path: config.calibration_path.clone(),
            last_sample: Vector3::new(0.0, 0.0, -1.0),
            last_gyro_sample: Vector3::new(0.0, 0.0, 0.0),
            last_update: Instant::now(),
        };

        Ok(FlightControl {
            setpoints: Arc::new(Mutex::new(SharedSetpoints::new(angle_gains, rate_gains))),
            hardware: Arc::new(Mutex::new(hardware)),
            telemetry: Arc::new(Mutex::new(Telemetry::default())),
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            control_rate_hz: config.control_rate_hz,
        })
    }

    /// `x`/`y` drive target roll/pitch (`target_roll = -x`, `target_pitch =
    /// y`); `z` sets the throttle baseline.
    pub fn move_to(&self, translate: Vector3<f32>) {
        let mut sp = self.setpoints.lock().unwrap();
        sp.target_roll = -translate.x;
        sp.target_pitch = translate.y;
        sp.throttle = translate.z;
    }

    pub fn turn(&self, rate: f32) {
        self.setpoints.lock().unwrap().turn_rate = rate;
    }

    pub fn set_pid_angle(&self, p: f32, i: f32, d: f32) {
        {
            let mut sp = self.setpoints.lock().unwrap();
            sp.angle_gains.p = p;
            sp.angle_gains.i = i;
            sp.angle_gains.d = d;
        }
        let mut hw = self.hardware.lock().unwrap();
        for pid in hw.angle_pid.iter_mut() {
            pid.set_gains(p, i, d);
            pid.reset();
        }
    }

    pub fn set_pid_rate(&self, p: f32, i: f32, d: f32) {
        {
            let mut sp = self.setpoints.lock().unwrap();
            sp.rate_gains.p = p;
            sp.rate_gains.i = i;
            sp.rate_gains.d = d;
        }
        let mut hw = self.hardware.lock().unwrap();
        for pid in hw.rate_pid.iter_mut() {
            pid.set_gains(p, i, d);
            pid.reset();
        }
    }

    /// Samples both sensors every 10 ms for `duration_ms` and writes the
    /// averaged offsets to the configured calibration file. The timer must
    /// not be running while this executes.
    pub fn calibrate(&self, duration_ms: u64) -> Result<()> {
        let mut hw = self.hardware.lock().unwrap();
        let mut accel_sum = Vector3::new(0.0, 0.0, 0.0);
        let mut gyro_sum = Vector3::new(0.0, 0.0, 0.0);
        let mut accel_count = 0usize;
        let mut gyro_count = 0usize;

        let deadline = Instant::now() + Duration::from_millis(duration_ms);
        while Instant::now() < deadline {
            match hw.accel.read(&mut hw.bus) {
                Ok(sample) => {
                    accel_sum = accel_sum + sample;
                    accel_count += 1;
                }
                Err(e) => warn!("calibration accelerometer read failed: {e}"),
            }
            match hw.gyro.read(&mut hw.bus) {
                Ok(sample) => {
                    gyro_sum = gyro_sum + sample;
                    gyro_count += 1;
                }
                Err(e) => warn!("calibration gyroscope read failed: {e}"),
            }
            thread::sleep(Duration::from_millis(10));
        }

        let offsets = calibration::average_samples(accel_sum, accel_count, gyro_sum, gyro_count);
        calibration::save(&hw.calibration_path, &offsets)?;
        hw.calibration = offsets;
        Ok(())
    }

    pub fn start_timer(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let setpoints = Arc::clone(&self.setpoints);
        let hardware = Arc::clone(&self.hardware);
        let telemetry = Arc::clone(&self.telemetry);
        let running = Arc::clone(&self.running);
        let rate_hz = self.control_rate_hz;

        self.thread_handle = Some(thread::spawn(move || {
            let mut schedule = DeadlineSchedule::new(rate_hz);
            while running.load(Ordering::SeqCst) {
                schedule.wait_for_next();
                if let Err(e) = update_once(&setpoints, &hardware, &telemetry) {
                    warn!("control cycle failed: {e}");
                }
            }
        }));
    }

    pub fn stop_timer(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Unconditionally stops all motors, regardless of timer state.
    pub fn stop(&self) {
        let mut hw = self.hardware.lock().unwrap();
        let hw = &mut *hw;
        for motor in hw.motors.iter_mut() {
            if let Err(e) = motor.stop(&mut hw.bus, &mut hw.pwm) {
                warn!("failed to stop motor: {e}");
            }
        }
    }

    pub fn get_roll(&self) -> f32 {
        self.telemetry.lock().unwrap().roll
    }

    pub fn get_pitch(&self) -> f32 {
        self.telemetry.lock().unwrap().pitch
    }

    pub fn get_yaw(&self) -> f32 {
        self.telemetry.lock().unwrap().yaw
    }
}

impl Drop for FlightControl {
    fn drop(&mut self) {
        self.stop_timer();
        self.stop();

        // Accelerometer/Gyroscope don't own the bus they're read through,
        // so they can't implement Drop themselves; FlightControl is the
        // nearest owner that holds both the device and the bus together.
        if let Ok(mut hw) = self.hardware.lock() {
            let hw = &mut *hw;
            if let Err(e) = hw.accel.set_sleep(&mut hw.bus, true) {
                warn!("failed to sleep accelerometer on shutdown: {e}");
            }
            if let Err(e) = hw.gyro.set_sleep(&mut hw.bus, true) {
                warn!("failed to sleep gyroscope on shutdown: {e}");
            }
        }
    }
}

fn update_once(
    setpoints: &Arc<Mutex<SharedSetpoints>>,
    hardware: &Arc<Mutex<Hardware>>,
    telemetry: &Arc<Mutex<Telemetry>>,
) -> Result<()> {
    let mut hw = hardware.lock().unwrap();

    // Step 1: per-sensor reads; a failure keeps the previous sample and is
    // logged rather than aborting the cycle.
    match hw.accel.read(&mut hw.bus) {
        Ok(sample) => hw.last_sample = sample,
        Err(e) => warn!("accelerometer read failed, reusing last sample: {e}"),
    }
    match hw.gyro.read(&mut hw.bus) {
        Ok(sample) => hw.last_gyro_sample = sample,
        Err(e) => warn!("gyroscope read failed, reusing last sample: {e}"),
    }
    let accel_sample = hw.last_sample;
    let gyro_sample = hw.last_gyro_sample;
    hw.estimator.push_samples(accel_sample, gyro_sample);

    // Step 2: elapsed time and open-loop yaw integration.
    let now = Instant::now();
    let dt = now.duration_since(hw.last_update).as_secs_f32();
    hw.last_update = now;

    let (target_roll, target_pitch, target_yaw, throttle, angle_gains, rate_gains) = {
        let mut sp = setpoints.lock().unwrap();
        sp.target_yaw += sp.turn_rate * dt;
        (sp.target_roll, sp.target_pitch, sp.target_yaw, sp.throttle, sp.angle_gains, sp.rate_gains)
    };

    // Steps 3-4: averaging, calibration offsets, and the complementary
    // filter all live inside AttitudeEstimator::update.
    let (roll, pitch, yaw) = hw.estimator.update(dt, &hw.calibration);
    let gyro = hw.estimator.last_gyro();

    {
        let mut tel = telemetry.lock().unwrap();
        tel.roll = roll;
        tel.pitch = pitch;
        tel.yaw = yaw;
    }

    // Step 5: cascaded PID, one ring per axis. Roll and pitch feed the
    // mixer; yaw is run for parity but stays open-loop until tuned.
    let targets = [target_roll, target_pitch, target_yaw];
    let currents = [roll, pitch, yaw];
    let gyro_axes = [gyro.x, gyro.y, gyro.z];

    let mut rate_output = [0.0f32; 3];
    for axis in 0..3 {
        hw.angle_pid[axis].set_gains(angle_gains.p, angle_gains.i, angle_gains.d);
        hw.angle_pid[axis].set_target(targets[axis]);
        hw.angle_pid[axis].feed(currents[axis]);

        hw.rate_pid[axis].set_gains(rate_gains.p, rate_gains.i, rate_gains.d);
        hw.rate_pid[axis].set_target(hw.angle_pid[axis].output());
        hw.rate_pid[axis].feed(gyro_axes[axis]);
        rate_output[axis] = hw.rate_pid[axis].output();
    }

    // Step 6: mixer.
    let ends = rate_output[1] / 100.0;
    let sides = rate_output[0] / 100.0;

    let mut mix = [0.0f32; 4];
    mix[FL] += ends - sides;
    mix[FR] += ends + sides;
    mix[RR] += -ends + sides;
    mix[RL] += -ends - sides;

    for (i, m) in mix.iter_mut().enumerate() {
        if !hw.enabled_motors[i] {
            *m = 0.0;
        }
        *m += throttle;
        *m = clamp(*m, 0.0, f32::MAX);
    }

    for i in 0..4 {
        hw.motors[i].set_speed(&mut hw.bus, &mut hw.pwm, mix[i])?;
    }

    // Step 7: advance PWM dither on every motor.
    for i in 0..4 {
        hw.motors[i].tick(&mut hw.bus, &mut hw.pwm)?;
    }

    Ok(())
}
