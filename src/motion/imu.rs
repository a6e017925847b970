use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::{ImuSource, InertialSample};

/// Replays a fixed list of samples. Errors once exhausted unless looping.
#[derive(Debug, Clone)]
pub struct ReplayImu {
    samples: VecDeque<InertialSample>,
    looping: bool,
}

impl ReplayImu {
    pub fn new(samples: Vec<InertialSample>) -> Self {
        Self {
            samples: samples.into(),
            looping: false,
        }
    }

    pub fn looping(samples: Vec<InertialSample>) -> Self {
        Self {
            samples: samples.into(),
            looping: true,
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl ImuSource for ReplayImu {
    fn read(&mut self) -> Result<InertialSample> {
        let sample = self
            .samples
            .pop_front()
            .ok_or_else(|| anyhow!("replay exhausted"))?;
        if self.looping {
            self.samples.push_back(sample);
        }
        Ok(sample)
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}

/// Simulated forklift: alternates driving and standing phases with sensor noise.
pub struct SimulatedImu {
    rng: StdRng,
    drive: Duration,
    stop: Duration,
    started: Instant,
}

impl SimulatedImu {
    pub fn new(drive: Duration, stop: Duration) -> Self {
        Self::with_rng(drive, stop, StdRng::from_entropy())
    }

    pub fn seeded(drive: Duration, stop: Duration, seed: u64) -> Self {
        Self::with_rng(drive, stop, StdRng::seed_from_u64(seed))
    }

    fn with_rng(drive: Duration, stop: Duration, rng: StdRng) -> Self {
        Self {
            rng,
            drive,
            stop,
            started: Instant::now(),
        }
    }

    /// Whether the simulated vehicle is driving `elapsed` after start.
    pub fn driving_at(&self, elapsed: Duration) -> bool {
        let cycle = self.drive + self.stop;
        if cycle.is_zero() {
            return true;
        }
        let phase = elapsed.as_nanos() % cycle.as_nanos();
        phase < self.drive.as_nanos()
    }

    fn sample(&mut self, driving: bool) -> InertialSample {
        let (gyro_noise, accel_noise) = if driving { (600.0, 2500.0) } else { (20.0, 60.0) };
        let rng = &mut self.rng;
        let mut axis = |spread: f64| rng.gen_range(-spread..=spread);
        InertialSample {
            gyro: [axis(gyro_noise), axis(gyro_noise), axis(gyro_noise)],
            accel: [
                axis(accel_noise),
                axis(accel_noise),
                16384.0 + axis(accel_noise),
            ],
        }
    }
}

impl ImuSource for SimulatedImu {
    fn read(&mut self) -> Result<InertialSample> {
        let driving = self.driving_at(self.started.elapsed());
        Ok(self.sample(driving))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
