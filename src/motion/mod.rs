//! Inertial motion state.
//!
//! Raw gyroscope/accelerometer samples are reduced to a short-term
//! "stationary" flag, then debounced by a symmetric time hysteresis into the
//! `MOVING`/`STATIONARY` state the scheduler gates on.
//!
//! Sensor access goes through `ImuSource`. A missing or failing sensor is an
//! ordinary state handled by `MotionStateDetector::poll`, which reports
//! `MOVING` rather than raising.

mod detector;
mod imu;

pub use detector::{MotionReading, MotionStateDetector, MotionThresholds};
pub use imu::{ReplayImu, SimulatedImu};

use anyhow::Result;

/// Six raw readings in sensor-native units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InertialSample {
    pub gyro: [f64; 3],
    pub accel: [f64; 3],
}

impl InertialSample {
    pub fn new(gyro: [f64; 3], accel: [f64; 3]) -> Self {
        Self { gyro, accel }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MotionState {
    /// Initial state; also reported whenever the sensor cannot be read.
    #[default]
    Moving,
    Stationary,
}

impl MotionState {
    pub fn opposite(self) -> Self {
        match self {
            MotionState::Moving => MotionState::Stationary,
            MotionState::Stationary => MotionState::Moving,
        }
    }
}

impl std::fmt::Display for MotionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MotionState::Moving => "MOVING",
            MotionState::Stationary => "STATIONARY",
        })
    }
}

/// Inertial sensor driver.
pub trait ImuSource: Send {
    fn read(&mut self) -> Result<InertialSample>;

    fn name(&self) -> &'static str {
        "imu"
    }
}
