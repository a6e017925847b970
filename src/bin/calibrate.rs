//! calibrate - write and check ground-plane calibration files, and fit
//! torso-distance profiles.
//!
//! The interactive capture (clicking markers on a live frame, recording torso
//! lengths at known distances) happens elsewhere. This tool takes the four
//! marker pixels it produced, writes the calibration file, and reports how
//! well the fitted mapping reproduces the 1-4 m markers. `profile` turns
//! recorded `(torso, distance)` samples into a `[profile]` config section.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use forkguard::distance::{
    load_calibration, save_calibration, CalibrationMapping, CalibrationPoints, DistanceProfile,
    MARKER_DISTANCES_M, MIN_PROFILE_SAMPLES, SCALE_POINT_GROUND_M, SCALE_POINT_OFFSET_PX,
};
use forkguard::Point2;

#[derive(Parser, Debug)]
#[command(name = "calibrate", about = "Write and check ground-plane calibration files")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a calibration file from four marker pixels (1 m, 2 m, 3 m, 4 m).
    Write {
        /// Output path
        #[arg(
            long,
            env = "FORKGUARD_CALIBRATION_PATH",
            default_value = "camera_config.json"
        )]
        output: PathBuf,

        /// Marker pixel as X,Y; repeat four times, nearest first
        #[arg(long = "point", value_name = "X,Y", num_args = 1, required = true)]
        points: Vec<String>,
    },
    /// Fit a calibration file and report residuals.
    Check {
        #[arg(
            long,
            env = "FORKGUARD_CALIBRATION_PATH",
            default_value = "camera_config.json"
        )]
        path: PathBuf,

        /// Additional pixels to project, as X,Y
        #[arg(long = "probe", value_name = "X,Y")]
        probes: Vec<String>,
    },
    /// Fit a torso-distance profile from ground-truth samples.
    Profile {
        /// Sample as TORSO_PX,DISTANCE_M; repeat at least five times
        #[arg(long = "sample", value_name = "TORSO,DIST", required = true)]
        samples: Vec<String>,

        /// Write the `[profile]` section here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Command::Write { output, points } => {
            let parsed = points
                .iter()
                .map(|p| parse_pixel(p))
                .collect::<Result<Vec<_>>>()?;
            let points = CalibrationPoints::from_slice(&parsed)?;
            let mapping = CalibrationMapping::from_points(&points)
                .map_err(|e| anyhow!("calibration rejected: {}", e))?;
            save_calibration(&output, &points)?;
            println!("calibrate: wrote {}", output.display());
            report(&points, &mapping);
        }
        Command::Check { path, probes } => {
            let points = load_calibration(&path)?;
            let mapping = CalibrationMapping::from_points(&points)
                .map_err(|e| anyhow!("calibration {} rejected: {}", path.display(), e))?;
            println!("calibrate: {}", path.display());
            report(&points, &mapping);
            for probe in &probes {
                let [x, y] = parse_pixel(probe)?;
                match mapping.map(Point2::new(x as f32, y as f32)) {
                    Some(g) => println!(
                        "  probe ({:.0}, {:.0}) -> lateral {:+.3} m, forward {:.3} m",
                        x, y, g.lateral_m, g.forward_m
                    ),
                    None => println!("  probe ({:.0}, {:.0}) -> at infinity", x, y),
                }
            }
        }
        Command::Profile { samples, output } => {
            let samples = samples
                .iter()
                .map(|s| parse_pair(s, "sample"))
                .collect::<Result<Vec<_>>>()?;
            if samples.len() < MIN_PROFILE_SAMPLES {
                return Err(anyhow!(
                    "need at least {} samples, got {}",
                    MIN_PROFILE_SAMPLES,
                    samples.len()
                ));
            }
            let samples: Vec<(f64, f64)> = samples.into_iter().map(|[t, d]| (t, d)).collect();
            let profile = DistanceProfile::fit(&samples)?;
            for &(torso, distance) in &samples {
                let predicted = profile.estimate(Some(torso as f32)).unwrap_or(f64::NAN);
                println!(
                    "  torso {:.1} px: {:.3} m predicted, {:.3} m measured",
                    torso, predicted, distance
                );
            }
            let section = toml::to_string(&ProfileSection { profile })?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &section)?;
                    println!("calibrate: wrote {}", path.display());
                }
                None => print!("{}", section),
            }
        }
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct ProfileSection {
    profile: DistanceProfile,
}

fn report(points: &CalibrationPoints, mapping: &CalibrationMapping) {
    let (src, dst) = points.correspondences();
    println!(
        "  rms residual {:.4} m over {} points",
        mapping.homography().rms_error(&src, &dst),
        src.len()
    );
    for (px, expected) in points.pixels().iter().zip(MARKER_DISTANCES_M) {
        print_projection(mapping, *px, [0.0, expected]);
    }
    let p1 = points.pixels()[0];
    print_projection(
        mapping,
        [p1[0] + SCALE_POINT_OFFSET_PX, p1[1]],
        SCALE_POINT_GROUND_M,
    );
}

fn print_projection(mapping: &CalibrationMapping, px: [f64; 2], expected: [f64; 2]) {
    match mapping.map(Point2::new(px[0] as f32, px[1] as f32)) {
        Some(g) => println!(
            "  ({:.0}, {:.0}) -> ({:+.3}, {:.3}) m, expected ({:+.1}, {:.1})",
            px[0], px[1], g.lateral_m, g.forward_m, expected[0], expected[1]
        ),
        None => println!("  ({:.0}, {:.0}) -> at infinity", px[0], px[1]),
    }
}

fn parse_pixel(value: &str) -> Result<[f64; 2]> {
    parse_pair(value, "pixel")
}

fn parse_pair(value: &str, what: &str) -> Result<[f64; 2]> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| anyhow!("{} '{}' must be two comma-separated numbers", what, value))?;
    let x: f64 = x
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} '{}' has an invalid first value", what, value))?;
    let y: f64 = y
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} '{}' has an invalid second value", what, value))?;
    Ok([x, y])
}
