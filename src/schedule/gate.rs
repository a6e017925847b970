use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::motion::MotionState;

/// Outcome of waiting on the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateWait {
    /// The requested state is current; `generation` identifies which publish made it so.
    Active { generation: u64 },
    Stopped,
    TimedOut,
}

#[derive(Debug)]
struct GateState {
    state: MotionState,
    generation: u64,
    stopped: bool,
}

/// Monitor holding the debounced motion state.
///
/// One writer (the motion loop) publishes; workers block until the state
/// matches their trigger. Every mutation broadcasts while still holding the
/// lock, and every waiter re-checks its predicate after waking.
#[derive(Debug)]
pub struct MotionGate {
    inner: Mutex<GateState>,
    changed: Condvar,
}

impl MotionGate {
    pub fn new(initial: MotionState) -> Self {
        Self {
            inner: Mutex::new(GateState {
                state: initial,
                generation: 0,
                stopped: false,
            }),
            changed: Condvar::new(),
        }
    }

    // The gate must keep working after a worker panics mid-iteration.
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a debounced state. Returns true when it changed.
    pub fn publish(&self, state: MotionState) -> bool {
        let mut inner = self.lock();
        if inner.stopped || inner.state == state {
            return false;
        }
        inner.state = state;
        inner.generation += 1;
        self.changed.notify_all();
        true
    }

    pub fn current(&self) -> MotionState {
        self.lock().state
    }

    /// Number of state changes published so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn stop(&self) {
        let mut inner = self.lock();
        inner.stopped = true;
        self.changed.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Block until the state equals `trigger` or the gate is stopped.
    pub fn wait_for(&self, trigger: MotionState) -> GateWait {
        let mut inner = self.lock();
        loop {
            if inner.stopped {
                return GateWait::Stopped;
            }
            if inner.state == trigger {
                return GateWait::Active {
                    generation: inner.generation,
                };
            }
            inner = self
                .changed
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn wait_for_timeout(&self, trigger: MotionState, timeout: Duration) -> GateWait {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            if inner.stopped {
                return GateWait::Stopped;
            }
            if inner.state == trigger {
                return GateWait::Active {
                    generation: inner.generation,
                };
            }
            let now = Instant::now();
            if now >= deadline {
                return GateWait::TimedOut;
            }
            inner = self
                .changed
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl Default for MotionGate {
    fn default() -> Self {
        Self::new(MotionState::Moving)
    }
}
