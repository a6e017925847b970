use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::gate::MotionGate;
use crate::motion::{ImuSource, MotionStateDetector};

/// Upper bound on the sensor poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sole writer of the gate: polls the sensor, debounces, publishes.
pub struct MotionLoop {
    detector: MotionStateDetector,
    source: Option<Box<dyn ImuSource>>,
    gate: Arc<MotionGate>,
    interval: Duration,
}

impl MotionLoop {
    pub fn new(
        detector: MotionStateDetector,
        source: Option<Box<dyn ImuSource>>,
        gate: Arc<MotionGate>,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() || interval > MAX_POLL_INTERVAL {
            return Err(anyhow!(
                "motion poll interval must be between 1 and {} ms",
                MAX_POLL_INTERVAL.as_millis()
            ));
        }
        Ok(Self {
            detector,
            source,
            gate,
            interval,
        })
    }

    pub fn gate(&self) -> Arc<MotionGate> {
        self.gate.clone()
    }

    /// Poll once and publish the debounced state.
    pub fn step(&mut self) -> bool {
        let state = match self.source.as_mut() {
            Some(source) => self.detector.poll(Some(&mut **source)),
            None => self.detector.poll(None),
        };
        let changed = self.gate.publish(state);
        if changed {
            log::debug!("gate generation {} now {}", self.gate.generation(), state);
        }
        changed
    }

    /// Poll until the gate is stopped.
    pub fn run(&mut self) {
        while !self.gate.is_stopped() {
            self.step();
            std::thread::sleep(self.interval);
        }
    }

    pub fn spawn(mut self) -> Result<JoinHandle<()>> {
        let join = std::thread::Builder::new()
            .name("motion-loop".to_string())
            .spawn(move || {
                log::info!(
                    "motion loop polling every {} ms",
                    self.interval.as_millis()
                );
                self.run();
                log::info!("motion loop stopped");
            })?;
        Ok(join)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{InertialSample, MotionState, MotionThresholds, ReplayImu};
    use std::time::Duration;

    fn fast_detector() -> MotionStateDetector {
        MotionStateDetector::new(MotionThresholds {
            dwell: Duration::from_millis(20),
            ..MotionThresholds::default()
        })
    }

    #[test]
    fn rejects_slow_or_zero_cadence() {
        let gate = Arc::new(MotionGate::default());
        assert!(MotionLoop::new(fast_detector(), None, gate.clone(), Duration::ZERO).is_err());
        assert!(
            MotionLoop::new(fast_detector(), None, gate, Duration::from_millis(250)).is_err()
        );
    }

    #[test]
    fn publishes_debounced_state() {
        let still = InertialSample::new([-0.2185, 0.2443, -0.3015], [0.0, 0.0, 16384.0]);
        let gate = Arc::new(MotionGate::default());
        let mut motion = MotionLoop::new(
            fast_detector(),
            Some(Box::new(ReplayImu::looping(vec![still]))),
            gate.clone(),
            Duration::from_millis(5),
        )
        .unwrap();

        assert!(!motion.step());
        std::thread::sleep(Duration::from_millis(30));
        assert!(motion.step());
        assert_eq!(gate.current(), MotionState::Stationary);
        assert!(!motion.step());
        assert_eq!(gate.generation(), 1);
    }

    #[test]
    fn missing_sensor_keeps_gate_moving() {
        let gate = Arc::new(MotionGate::new(MotionState::Stationary));
        let mut motion =
            MotionLoop::new(fast_detector(), None, gate.clone(), Duration::from_millis(5)).unwrap();
        assert!(motion.step());
        assert_eq!(gate.current(), MotionState::Moving);
    }

    #[test]
    fn spawned_loop_exits_on_stop() {
        let gate = Arc::new(MotionGate::default());
        let motion =
            MotionLoop::new(fast_detector(), None, gate.clone(), Duration::from_millis(5)).unwrap();
        let join = motion.spawn().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        gate.stop();
        join.join().unwrap();
    }
}
