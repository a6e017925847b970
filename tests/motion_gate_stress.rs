use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use forkguard::{GateWait, MotionGate, MotionState};

const TOGGLES: u64 = 2_000;

/// Starting from MOVING at generation 0, even generations are MOVING.
fn state_for_generation(generation: u64) -> MotionState {
    if generation % 2 == 0 {
        MotionState::Moving
    } else {
        MotionState::Stationary
    }
}

fn spawn_waiter(
    gate: Arc<MotionGate>,
    trigger: MotionState,
    wakes: Arc<AtomicU64>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut last_generation = 0;
        loop {
            match gate.wait_for(trigger) {
                GateWait::Active { generation } => {
                    assert_eq!(
                        state_for_generation(generation),
                        trigger,
                        "woke for {} at generation {}",
                        trigger,
                        generation
                    );
                    assert!(generation >= last_generation, "generation went backwards");
                    last_generation = generation;
                    wakes.fetch_add(1, Ordering::SeqCst);
                    // Simulated iteration.
                    thread::yield_now();
                }
                GateWait::Stopped => return,
                GateWait::TimedOut => unreachable!("unbounded wait timed out"),
            }
        }
    })
}

#[test]
fn randomized_toggles_wake_only_matching_waiters() {
    let gate = Arc::new(MotionGate::new(MotionState::Moving));
    let moving_wakes = Arc::new(AtomicU64::new(0));
    let stationary_wakes = Arc::new(AtomicU64::new(0));

    let waiters = vec![
        spawn_waiter(gate.clone(), MotionState::Moving, moving_wakes.clone()),
        spawn_waiter(gate.clone(), MotionState::Stationary, stationary_wakes.clone()),
        spawn_waiter(gate.clone(), MotionState::Stationary, stationary_wakes.clone()),
    ];

    let mut rng = StdRng::seed_from_u64(0x5afe);
    let mut state = MotionState::Moving;
    for _ in 0..TOGGLES {
        state = state.opposite();
        assert!(gate.publish(state));
        // Re-publishing the same state must be a no-op.
        if rng.gen_bool(0.2) {
            assert!(!gate.publish(state));
        }
        let pause = rng.gen_range(0..200u64);
        if pause > 150 {
            thread::sleep(Duration::from_micros(pause));
        } else {
            thread::yield_now();
        }
    }
    assert_eq!(gate.generation(), TOGGLES);
    // Leave the gate STATIONARY long enough for its waiters to run.
    if state == MotionState::Moving {
        gate.publish(MotionState::Stationary);
    }
    thread::sleep(Duration::from_millis(20));

    gate.stop();
    for waiter in waiters {
        waiter.join().expect("waiter panicked");
    }
    assert!(moving_wakes.load(Ordering::SeqCst) > 0);
    assert!(stationary_wakes.load(Ordering::SeqCst) > 0);
}

#[test]
fn stop_interrupts_waiters_under_churn() {
    let gate = Arc::new(MotionGate::default());
    let wakes = Arc::new(AtomicU64::new(0));
    let waiters: Vec<_> = (0..4)
        .map(|_| spawn_waiter(gate.clone(), MotionState::Stationary, wakes.clone()))
        .collect();

    let publisher = {
        let gate = gate.clone();
        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(42);
            let mut state = MotionState::Moving;
            while !gate.is_stopped() {
                state = state.opposite();
                gate.publish(state);
                thread::sleep(Duration::from_micros(rng.gen_range(10..300)));
            }
        })
    };

    thread::sleep(Duration::from_millis(50));
    gate.stop();
    publisher.join().expect("publisher panicked");
    for waiter in waiters {
        waiter.join().expect("waiter panicked");
    }
    assert!(gate.is_stopped());
}
