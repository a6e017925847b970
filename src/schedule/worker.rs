use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::gate::{GateWait, MotionGate};
use crate::motion::MotionState;

/// A long-lived workload that runs only while the gate shows its trigger state.
pub trait GatedWorker: Send {
    fn name(&self) -> &'static str;

    fn trigger(&self) -> MotionState;

    /// One full iteration. Never preempted by a state change.
    fn run_once(&mut self) -> Result<()>;
}

/// Counters a worker thread updates after every iteration.
#[derive(Debug, Default)]
pub struct WorkerStats {
    iterations: AtomicU64,
    failures: AtomicU64,
}

impl WorkerStats {
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    trigger: MotionState,
    stats: Arc<WorkerStats>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn trigger(&self) -> MotionState {
        self.trigger
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Wait for the worker thread to exit. The gate must already be stopped.
    pub fn join(mut self) -> Result<()> {
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("{} worker thread panicked", self.name))?;
        }
        Ok(())
    }
}

/// Run `worker` on its own thread, gated on `gate`.
pub fn spawn_worker<W>(gate: Arc<MotionGate>, mut worker: W) -> Result<WorkerHandle>
where
    W: GatedWorker + 'static,
{
    let name = worker.name();
    let trigger = worker.trigger();
    let stats = Arc::new(WorkerStats::default());
    let thread_stats = stats.clone();

    let join = std::thread::Builder::new()
        .name(format!("{}-worker", name))
        .spawn(move || {
            log::info!("{} worker started (runs while {})", name, trigger);
            loop {
                match gate.wait_for(trigger) {
                    GateWait::Active { .. } => {}
                    GateWait::Stopped => break,
                    GateWait::TimedOut => continue,
                }
                if let Err(err) = worker.run_once() {
                    thread_stats.failures.fetch_add(1, Ordering::SeqCst);
                    log::warn!("{} iteration failed: {:#}", name, err);
                }
                thread_stats.iterations.fetch_add(1, Ordering::SeqCst);
            }
            log::info!("{} worker stopped", name);
        })?;

    Ok(WorkerHandle {
        name,
        trigger,
        stats,
        join: Some(join),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Flaky {
        calls: u64,
    }

    impl GatedWorker for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn trigger(&self) -> MotionState {
            MotionState::Moving
        }

        fn run_once(&mut self) -> Result<()> {
            self.calls += 1;
            std::thread::sleep(Duration::from_millis(2));
            if self.calls % 2 == 0 {
                return Err(anyhow!("camera hiccup"));
            }
            Ok(())
        }
    }

    #[test]
    fn errors_are_counted_and_worker_keeps_running() {
        let gate = Arc::new(MotionGate::default());
        let handle = spawn_worker(gate.clone(), Flaky { calls: 0 }).unwrap();
        let stats = handle.stats();
        while stats.iterations() < 10 {
            std::thread::sleep(Duration::from_millis(5));
        }
        gate.stop();
        handle.join().unwrap();
        assert!(stats.failures() >= 5);
        assert!(stats.iterations() >= stats.failures());
    }

    #[test]
    fn worker_idles_while_gate_shows_other_state() {
        let gate = Arc::new(MotionGate::new(MotionState::Stationary));
        let handle = spawn_worker(gate.clone(), Flaky { calls: 0 }).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(handle.stats().iterations(), 0);
        gate.stop();
        handle.join().unwrap();
    }
}
