use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::distance::{DistanceProfile, FusionSettings};
use crate::frame::FrameSize;
use crate::motion::MotionThresholds;
use crate::pose::JointLayout;
use crate::schedule::MAX_POLL_INTERVAL;
use crate::tilt::TiltSettings;

const DEFAULT_CALIBRATION_PATH: &str = "camera_config.json";
const DEFAULT_PROFILE: &str = "field";
const DEFAULT_POLL_MS: u64 = 100;
const DEFAULT_FRAME_URL: &str = "stub://forklift_cam";
const DEFAULT_FRAME_FPS: u32 = 15;
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct ForkguardConfigFile {
    calibration_path: Option<PathBuf>,
    pose_layout: Option<JointLayout>,
    profile: Option<ProfileConfigFile>,
    fusion: Option<FusionSettings>,
    motion: Option<MotionConfigFile>,
    schedule: Option<ScheduleConfigFile>,
    frame: Option<FrameConfigFile>,
    tilt: Option<TiltSettings>,
}

/// A named preset with optional per-constant overrides.
#[derive(Debug, Deserialize, Default)]
struct ProfileConfigFile {
    preset: Option<String>,
    alpha: Option<f64>,
    beta: Option<f64>,
    correct_a: Option<f64>,
    correct_b: Option<f64>,
    correct_c: Option<f64>,
    clamp_negative: Option<bool>,
    correct_homography: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    #[serde(flatten)]
    thresholds: MotionThresholds,
    sensor: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ScheduleConfigFile {
    poll_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct FrameConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Where inertial samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Drive/stop simulation for bench runs.
    Simulated,
    /// No sensor fitted: the gate stays MOVING.
    None,
}

impl SensorKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simulated" | "stub" => Ok(SensorKind::Simulated),
            "none" | "absent" => Ok(SensorKind::None),
            other => Err(anyhow!("unknown motion sensor '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForkguardConfig {
    pub calibration_path: PathBuf,
    pub pose_layout: JointLayout,
    pub profile: DistanceProfile,
    pub fusion: FusionSettings,
    pub motion: MotionSettings,
    pub poll_interval: Duration,
    pub frame: FrameSettings,
    pub tilt: TiltSettings,
}

#[derive(Debug, Clone)]
pub struct MotionSettings {
    pub thresholds: MotionThresholds,
    pub sensor: SensorKind,
}

#[derive(Debug, Clone)]
pub struct FrameSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl FrameSettings {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

impl ForkguardConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FORKGUARD_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ForkguardConfigFile) -> Result<Self> {
        let calibration_path = file
            .calibration_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CALIBRATION_PATH));
        let pose_layout = file.pose_layout.unwrap_or_default();
        let profile = resolve_profile(file.profile.unwrap_or_default())?;
        let fusion = file.fusion.unwrap_or_default();

        let motion_file = file.motion.unwrap_or_default();
        let motion = MotionSettings {
            thresholds: motion_file.thresholds,
            sensor: match motion_file.sensor.as_deref() {
                Some(name) => SensorKind::parse(name)?,
                None => SensorKind::Simulated,
            },
        };

        let poll_interval = Duration::from_millis(
            file.schedule
                .and_then(|schedule| schedule.poll_ms)
                .unwrap_or(DEFAULT_POLL_MS),
        );

        let frame_file = file.frame.unwrap_or_default();
        let frame = FrameSettings {
            url: frame_file
                .url
                .unwrap_or_else(|| DEFAULT_FRAME_URL.to_string()),
            target_fps: frame_file.target_fps.unwrap_or(DEFAULT_FRAME_FPS),
            width: frame_file.width.unwrap_or(DEFAULT_FRAME_WIDTH),
            height: frame_file.height.unwrap_or(DEFAULT_FRAME_HEIGHT),
        };

        Ok(Self {
            calibration_path,
            pose_layout,
            profile,
            fusion,
            motion,
            poll_interval,
            frame,
            tilt: file.tilt.unwrap_or_default(),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("FORKGUARD_CALIBRATION_PATH") {
            if !path.trim().is_empty() {
                self.calibration_path = PathBuf::from(path);
            }
        }
        if let Ok(layout) = std::env::var("FORKGUARD_POSE_LAYOUT") {
            if !layout.trim().is_empty() {
                self.pose_layout = layout.parse()?;
            }
        }
        if let Ok(clamp) = std::env::var("FORKGUARD_CLAMP_CORRECTION") {
            self.profile.clamp_negative = parse_bool(&clamp)
                .ok_or_else(|| anyhow!("FORKGUARD_CLAMP_CORRECTION must be true or false"))?;
        }
        if let Ok(poll) = std::env::var("FORKGUARD_POLL_MS") {
            let millis: u64 = poll.trim().parse().map_err(|_| {
                anyhow!("FORKGUARD_POLL_MS must be an integer number of milliseconds")
            })?;
            self.poll_interval = Duration::from_millis(millis);
        }
        if let Ok(url) = std::env::var("FORKGUARD_FRAME_SOURCE") {
            if !url.trim().is_empty() {
                self.frame.url = url;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() || self.poll_interval > MAX_POLL_INTERVAL {
            return Err(anyhow!(
                "motion poll interval must be between 1 and {} ms",
                MAX_POLL_INTERVAL.as_millis()
            ));
        }

        let motion = &self.motion.thresholds;
        if motion.dwell.is_zero() {
            return Err(anyhow!("motion dwell time must be greater than zero"));
        }
        for (name, value) in [
            ("gyro_threshold", motion.gyro_threshold),
            ("accel_threshold", motion.accel_threshold),
            ("accel_one_g_lsb", motion.accel_one_g_lsb),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(anyhow!("motion {} must be positive", name));
            }
        }
        if motion.gyro_bias.iter().any(|b| !b.is_finite()) {
            return Err(anyhow!("motion gyro_bias must be finite"));
        }

        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(anyhow!("frame width and height must be greater than zero"));
        }
        if self.frame.target_fps == 0 {
            return Err(anyhow!("frame target_fps must be greater than zero"));
        }

        let clip = self.fusion.clip_ratio;
        if !(clip > 0.0 && clip <= 1.0) {
            return Err(anyhow!("fusion clip_ratio must be within (0, 1]"));
        }
        if !(self.fusion.lateral_sensitivity.is_finite() && self.fusion.lateral_sensitivity >= 0.0)
        {
            return Err(anyhow!("fusion lateral_sensitivity must be non-negative"));
        }

        self.profile.validate()?;
        self.tilt.validate()?;
        Ok(())
    }
}

fn resolve_profile(file: ProfileConfigFile) -> Result<DistanceProfile> {
    let mut profile = DistanceProfile::preset(file.preset.as_deref().unwrap_or(DEFAULT_PROFILE))?;
    if let Some(alpha) = file.alpha {
        profile.alpha = alpha;
    }
    if let Some(beta) = file.beta {
        profile.beta = beta;
    }
    if let Some(a) = file.correct_a {
        profile.correct_a = a;
    }
    if let Some(b) = file.correct_b {
        profile.correct_b = b;
    }
    if let Some(c) = file.correct_c {
        profile.correct_c = c;
    }
    if let Some(clamp) = file.clamp_negative {
        profile.clamp_negative = clamp;
    }
    if let Some(correct) = file.correct_homography {
        profile.correct_homography = correct;
    }
    Ok(profile)
}

fn read_config_file(path: &Path) -> Result<ForkguardConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
