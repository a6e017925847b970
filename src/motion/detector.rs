use serde::Deserialize;
use std::time::{Duration, Instant};

use super::{ImuSource, InertialSample, MotionState};

/// Calibration constants for the short-term motion test.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotionThresholds {
    /// Per-axis gyroscope offset subtracted before taking the magnitude.
    pub gyro_bias: [f64; 3],
    pub gyro_threshold: f64,
    /// Allowed deviation of the acceleration magnitude from 1 g.
    pub accel_threshold: f64,
    /// Accelerometer reading corresponding to 1 g.
    pub accel_one_g_lsb: f64,
    /// How long the opposite condition must hold before the state flips.
    #[serde(with = "dwell_secs")]
    pub dwell: Duration,
}

impl Default for MotionThresholds {
    fn default() -> Self {
        Self {
            gyro_bias: [-0.2185, 0.2443, -0.3015],
            gyro_threshold: 150.0,
            accel_threshold: 500.0,
            accel_one_g_lsb: 16384.0,
            dwell: Duration::from_millis(500),
        }
    }
}

mod dwell_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Short-term motion magnitudes for one sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionReading {
    pub gyro_magnitude: f64,
    pub accel_motion: f64,
    pub stationary: bool,
}

/// Debounces short-term readings into a `MotionState`.
///
/// Exactly one of the two dwell timers can be running: `stationary_since`
/// while MOVING, `motion_since` while STATIONARY.
#[derive(Debug)]
pub struct MotionStateDetector {
    thresholds: MotionThresholds,
    state: MotionState,
    stationary_since: Option<Instant>,
    motion_since: Option<Instant>,
    sensor_fault: bool,
}

impl MotionStateDetector {
    pub fn new(thresholds: MotionThresholds) -> Self {
        Self {
            thresholds,
            state: MotionState::Moving,
            stationary_since: None,
            motion_since: None,
            sensor_fault: false,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn thresholds(&self) -> &MotionThresholds {
        &self.thresholds
    }

    pub fn measure(&self, sample: &InertialSample) -> MotionReading {
        let t = &self.thresholds;
        let gyro_magnitude = norm([
            sample.gyro[0] - t.gyro_bias[0],
            sample.gyro[1] - t.gyro_bias[1],
            sample.gyro[2] - t.gyro_bias[2],
        ]);
        let accel_motion = (norm(sample.accel) - t.accel_one_g_lsb).abs();
        MotionReading {
            gyro_magnitude,
            accel_motion,
            stationary: gyro_magnitude < t.gyro_threshold && accel_motion < t.accel_threshold,
        }
    }

    pub fn update(&mut self, sample: &InertialSample) -> MotionState {
        self.update_at(sample, Instant::now())
    }

    /// Feed one sample observed at `now`.
    pub fn update_at(&mut self, sample: &InertialSample, now: Instant) -> MotionState {
        let reading = self.measure(sample);
        let dwell = self.thresholds.dwell;

        match self.state {
            MotionState::Moving => {
                if reading.stationary {
                    let since = *self.stationary_since.get_or_insert(now);
                    self.motion_since = None;
                    if now.saturating_duration_since(since) >= dwell {
                        self.transition(MotionState::Stationary, &reading);
                    }
                } else {
                    self.stationary_since = None;
                }
            }
            MotionState::Stationary => {
                if !reading.stationary {
                    let since = *self.motion_since.get_or_insert(now);
                    self.stationary_since = None;
                    if now.saturating_duration_since(since) >= dwell {
                        self.transition(MotionState::Moving, &reading);
                    }
                } else {
                    self.motion_since = None;
                }
            }
        }
        self.state
    }

    /// Read one sample from `source` and update.
    ///
    /// A missing source or a failed read yields `Moving` and restarts the
    /// debounce, so a recovered sensor must again hold still for a full dwell
    /// window before `Stationary` is reported.
    pub fn poll(&mut self, source: Option<&mut dyn ImuSource>) -> MotionState {
        let Some(source) = source else {
            return self.sensor_unavailable("no inertial sensor configured");
        };
        match source.read() {
            Ok(sample) => {
                if self.sensor_fault {
                    log::info!("inertial sensor {} recovered", source.name());
                    self.sensor_fault = false;
                }
                self.update(&sample)
            }
            Err(e) => self.sensor_unavailable(&format!("{} read failed: {:#}", source.name(), e)),
        }
    }

    /// Force the fail-safe state.
    ///
    /// This is the one transition that ignores the dwell: `Stationary` flips
    /// to `Moving` immediately, even if it was entered moments ago.
    pub fn sensor_unavailable(&mut self, reason: &str) -> MotionState {
        if !self.sensor_fault {
            log::warn!("{}; assuming MOVING", reason);
            self.sensor_fault = true;
        }
        if self.state != MotionState::Moving {
            log::info!("motion state {} -> {} (sensor fault)", self.state, MotionState::Moving);
        }
        self.state = MotionState::Moving;
        self.stationary_since = None;
        self.motion_since = None;
        self.state
    }

    pub fn has_sensor_fault(&self) -> bool {
        self.sensor_fault
    }

    fn transition(&mut self, next: MotionState, reading: &MotionReading) {
        log::info!(
            "motion state {} -> {} (gyro {:.1}, accel {:.1})",
            self.state,
            next,
            reading.gyro_magnitude,
            reading.accel_motion
        );
        self.state = next;
        self.stationary_since = None;
        self.motion_since = None;
    }
}

impl Default for MotionStateDetector {
    fn default() -> Self {
        Self::new(MotionThresholds::default())
    }
}

fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
