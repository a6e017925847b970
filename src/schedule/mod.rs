//! Motion-gated scheduling.
//!
//! One state owner (`MotionLoop`) and exactly two long-lived workers share a
//! `MotionGate` monitor. Workers block on the gate until the debounced state
//! matches their trigger, run one full iteration, and check again. Results go
//! to a `FrameSlot` guarded by its own lock.

mod gate;
mod motion_loop;
mod slot;
mod worker;

pub use gate::{GateWait, MotionGate};
pub use motion_loop::{MotionLoop, MAX_POLL_INTERVAL};
pub use slot::FrameSlot;
pub use worker::{spawn_worker, GatedWorker, WorkerHandle, WorkerStats};

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Running motion loop plus the two gated workers.
#[derive(Debug)]
pub struct Scheduler {
    gate: Arc<MotionGate>,
    motion: Option<JoinHandle<()>>,
    workers: Vec<WorkerHandle>,
}

impl Scheduler {
    /// Start the motion loop and both workers. The workers must wait on
    /// different states so at most one is ever scheduled.
    pub fn start<M, S>(motion: MotionLoop, moving: M, stationary: S) -> Result<Self>
    where
        M: GatedWorker + 'static,
        S: GatedWorker + 'static,
    {
        if moving.trigger() == stationary.trigger() {
            return Err(anyhow!(
                "workers '{}' and '{}' share trigger {}",
                moving.name(),
                stationary.name(),
                moving.trigger()
            ));
        }
        let gate = motion.gate();
        if gate.is_stopped() {
            return Err(anyhow!("motion gate already stopped"));
        }

        let first = spawn_worker(gate.clone(), moving)?;
        let second = match spawn_worker(gate.clone(), stationary) {
            Ok(handle) => handle,
            Err(e) => {
                gate.stop();
                join_after_failed_start(vec![first]);
                return Err(e);
            }
        };
        let motion = match motion.spawn() {
            Ok(join) => join,
            Err(e) => {
                gate.stop();
                join_after_failed_start(vec![first, second]);
                return Err(e);
            }
        };

        Ok(Self {
            gate,
            motion: Some(motion),
            workers: vec![first, second],
        })
    }

    pub fn gate(&self) -> Arc<MotionGate> {
        self.gate.clone()
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// Stop the gate and join every thread. In-flight iterations finish first.
    pub fn shutdown(mut self) -> Result<()> {
        self.gate.stop();
        let mut panicked = Vec::new();
        if let Some(motion) = self.motion.take() {
            if motion.join().is_err() {
                panicked.push("motion loop".to_string());
            }
        }
        for worker in self.workers.drain(..) {
            let name = worker.name();
            if worker.join().is_err() {
                panicked.push(format!("{} worker", name));
            }
        }
        if !panicked.is_empty() {
            return Err(anyhow!("threads panicked: {}", panicked.join(", ")));
        }
        log::info!("scheduler stopped");
        Ok(())
    }
}

/// Join workers of an aborted start; returns the names of those that panicked.
fn join_after_failed_start(workers: Vec<WorkerHandle>) -> Vec<&'static str> {
    let mut panicked = Vec::new();
    for worker in workers {
        let name = worker.name();
        if let Err(e) = worker.join() {
            log::warn!("scheduler start aborted: {:#}", e);
            panicked.push(name);
        }
    }
    panicked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionState;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Crashing {
        entered: Arc<AtomicBool>,
    }

    impl GatedWorker for Crashing {
        fn name(&self) -> &'static str {
            "crashing"
        }

        fn trigger(&self) -> MotionState {
            MotionState::Moving
        }

        fn run_once(&mut self) -> Result<()> {
            self.entered.store(true, Ordering::SeqCst);
            panic!("backend poisoned");
        }
    }

    struct Idle;

    impl GatedWorker for Idle {
        fn name(&self) -> &'static str {
            "idle"
        }

        fn trigger(&self) -> MotionState {
            MotionState::Stationary
        }

        fn run_once(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn aborted_start_reports_panicked_workers() {
        let gate = Arc::new(MotionGate::default());
        let entered = Arc::new(AtomicBool::new(false));
        let crashing = spawn_worker(
            gate.clone(),
            Crashing {
                entered: entered.clone(),
            },
        )
        .unwrap();
        let idle = spawn_worker(gate.clone(), Idle).unwrap();
        while !entered.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        gate.stop();
        assert_eq!(join_after_failed_start(vec![crashing, idle]), vec!["crashing"]);
    }
}
