//! forkguardd - forklift perception daemon
//!
//! This daemon:
//! 1. Loads configuration and the ground-plane calibration (degrading to
//!    torso-only distance when it is missing)
//! 2. Opens the frame source and perception backends
//! 3. Runs the motion loop and the two gated workers
//! 4. Reloads calibration on request (`r` + Enter) and exits on `q` or Ctrl-C

use anyhow::{anyhow, Result};
use std::io::BufRead;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use forkguard::{
    config::{ForkguardConfig, SensorKind},
    detect::DetectionCapability,
    frame::share_source,
    schedule::{FrameSlot, MotionGate, MotionLoop, Scheduler},
    BackendRegistry, FusionPolicy, ImuSource, LogAlertSink, MotionState,
    MotionStateDetector, PedestrianWorker, Presentation, SharedCalibration, SimulatedImu,
    StubBackend, SyntheticSource, TiltWorker,
};

const STATUS_INTERVAL: Duration = Duration::from_secs(1);
const SIM_DRIVE: Duration = Duration::from_secs(8);
const SIM_STOP: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlEvent {
    ResetCalibration,
    Quit,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = ForkguardConfig::load()?;
    log::info!(
        "forkguardd {} starting (layout {}, poll {} ms)",
        env!("CARGO_PKG_VERSION"),
        cfg.pose_layout,
        cfg.poll_interval.as_millis()
    );

    let calibration = Arc::new(SharedCalibration::load_or_degrade(&cfg.calibration_path));

    // Without frames or a pose model there is nothing to protect; fail hard.
    let size = cfg.frame.size();
    let source = share_source(SyntheticSource::from_url(
        &cfg.frame.url,
        size,
        cfg.frame.target_fps,
    )?);
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::demo(cfg.pose_layout, size, 60));
    registry.warm_up_all()?;
    let pose_backend = registry.backend_for_capability(DetectionCapability::PoseEstimation)?;
    let line_backend = registry.backend_for_capability(DetectionCapability::LineSegments)?;
    log::info!("perception backends: {}", registry.list().join(", "));

    let imu: Option<Box<dyn ImuSource>> = match cfg.motion.sensor {
        SensorKind::Simulated => Some(Box::new(SimulatedImu::new(SIM_DRIVE, SIM_STOP))),
        SensorKind::None => None,
    };
    let gate = Arc::new(MotionGate::new(MotionState::Moving));
    let motion = MotionLoop::new(
        MotionStateDetector::new(cfg.motion.thresholds),
        imu,
        gate,
        cfg.poll_interval,
    )?;

    let slot = Arc::new(FrameSlot::<Presentation>::new());
    let pedestrian = PedestrianWorker::new(
        source.clone(),
        pose_backend,
        cfg.pose_layout,
        FusionPolicy::new(cfg.profile, cfg.fusion),
        calibration.clone(),
        Box::new(LogAlertSink::new()),
        slot.clone(),
    );
    let tilt = TiltWorker::new(source, line_backend, cfg.tilt, slot.clone());
    let scheduler = Scheduler::start(motion, pedestrian, tilt)?;

    let (tx, rx) = mpsc::channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(ControlEvent::Quit);
    })
    .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;
    spawn_stdin_control(tx)?;

    log::info!("forkguardd running (r + Enter: reload calibration, q + Enter or Ctrl-C: quit)");
    let mut last_seen = 0;
    loop {
        match rx.recv_timeout(STATUS_INTERVAL) {
            Ok(ControlEvent::ResetCalibration) => {
                log::info!(
                    "reloading calibration from {}",
                    cfg.calibration_path.display()
                );
                calibration.reload();
            }
            Ok(ControlEvent::Quit) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if let Some((seq, latest)) = slot.snapshot() {
                    if seq != last_seen {
                        log::info!("[{}] {}", scheduler.gate().current(), latest);
                        last_seen = seq;
                    }
                }
            }
        }
    }

    log::info!("shutdown requested, waiting for in-flight iterations...");
    scheduler.shutdown()?;
    Ok(())
}

fn spawn_stdin_control(tx: mpsc::Sender<ControlEvent>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin-control".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let event = match line.trim() {
                    "r" | "reset" => ControlEvent::ResetCalibration,
                    "q" | "quit" => ControlEvent::Quit,
                    "" => continue,
                    other => {
                        log::warn!("unknown command '{}'", other);
                        continue;
                    }
                };
                if tx.send(event).is_err() || event == ControlEvent::Quit {
                    break;
                }
            }
        })?;
    Ok(())
}
