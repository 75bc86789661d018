use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use courtcal_core::{CameraId, Pt2};
use courtcal_pipeline::{
    camera_positions, display_markers, evaluate_positions, run_extrinsic_stage,
    run_homography_stage, run_intrinsic_stage, transfer_point, ArtifactStore, BatchReport,
    InteractiveSession, PipelineConfig,
};
use serde::Serialize;

mod frames;
mod surface;

use frames::DirectoryFrameSource;
use surface::LineSurface;

/// Multi-camera court calibration and cross-camera point mapping.
#[derive(Debug, Parser)]
#[command(author, version, about = "Court camera calibration pipeline")]
struct Args {
    /// JSON PipelineConfig. Defaults are used if the file is missing.
    #[arg(long, default_value = "courtcal.json")]
    config: PathBuf,

    /// Directory holding the JSON artifacts.
    #[arg(long, default_value = "results")]
    results: PathBuf,

    /// Log debug output (overrides RUST_LOG).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calibrate intrinsics from chessboard frames in `<frames>/<camera>/`.
    Intrinsic {
        #[arg(long)]
        frames: PathBuf,
    },
    /// Solve camera poses from the reference points and stored intrinsics.
    Extrinsic,
    /// Fit image → ground homographies from the reference points.
    Homography,
    /// Transfer one native-resolution pixel of a camera to every other camera.
    Map {
        #[arg(long)]
        camera: CameraId,
        x: f64,
        y: f64,
    },
    /// Pick cameras and points on stdin.
    Interactive,
    /// Compare solved camera positions with `ground_truth_cameras.json`.
    Evaluate,
}

#[derive(Debug, Serialize)]
struct StageSummary<T> {
    succeeded: BTreeMap<CameraId, T>,
    failed: BTreeMap<CameraId, String>,
}

fn summarize<T, U: Serialize>(report: &BatchReport<T>, f: impl Fn(&T) -> U) -> Result<String> {
    let summary = StageSummary {
        succeeded: report
            .succeeded
            .iter()
            .map(|(camera, v)| (camera.clone(), f(v)))
            .collect(),
        failed: report
            .failed
            .iter()
            .map(|(camera, err)| (camera.clone(), err.to_string()))
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

#[derive(Debug, Serialize)]
struct IntrinsicSummary {
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    distortion: [f64; 5],
    rms: f64,
    views: usize,
}

fn intrinsic_command(config: &PipelineConfig, store: &ArtifactStore, frames: &Path) -> Result<String> {
    let report = run_intrinsic_stage(config, |camera| {
        DirectoryFrameSource::open(&frames.join(camera.as_str())).map_err(|e| {
            courtcal_core::CalibError::FrameUnavailable {
                index: 0,
                reason: format!("{e:#}"),
            }
        })
    });
    let json = summarize(&report, |c| IntrinsicSummary {
        fx: c.model.k.fx,
        fy: c.model.k.fy,
        cx: c.model.k.cx,
        cy: c.model.k.cy,
        distortion: c.model.dist.coeffs(),
        rms: c.rms,
        views: c.view_count,
    })?;
    println!("{json}");
    store.commit_intrinsics(&report)?;
    Ok(json)
}

fn extrinsic_command(config: &PipelineConfig, store: &ArtifactStore) -> Result<String> {
    let intrinsics = store.load_intrinsics()?;
    let references = store.load_references()?;
    let report = run_extrinsic_stage(config, &intrinsics, &references);
    let json = summarize(&report, |s| {
        let c = s.pose.camera_position();
        serde_json::json!({ "position": [c.x, c.y, c.z], "rms": s.rms })
    })?;
    println!("{json}");
    store.commit_extrinsics(&report)?;
    Ok(json)
}

fn homography_command(config: &PipelineConfig, store: &ArtifactStore) -> Result<String> {
    let references = store.load_references()?;
    let report = run_homography_stage(config, &references);
    let json = summarize(&report, |s| serde_json::json!({ "rms": s.rms }))?;
    println!("{json}");
    store.commit_homographies(&report)?;
    Ok(json)
}

fn map_command(config: &PipelineConfig, store: &ArtifactStore, camera: &CameraId, pixel: Pt2) -> Result<String> {
    let homographies = store.load_homographies(config.world_unit)?;
    let transfer = transfer_point(&homographies, camera, &pixel, config.native_resolution)?;
    let markers = display_markers(&transfer, &config.layout, &config.display_scale())?;
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "transfer": transfer,
        "display": markers,
    }))?)
}

fn evaluate_command(store: &ArtifactStore) -> Result<String> {
    let extrinsics = store.load_extrinsics()?;
    let truth = store.load_ground_truth()?;
    let errors = evaluate_positions(&extrinsics, &truth)?;
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "positions": camera_positions(&extrinsics),
        "errors": errors,
    }))?)
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let config = PipelineConfig::load(&args.config)?;
    let store = ArtifactStore::new(&args.results);

    match args.command {
        Command::Intrinsic { frames } => {
            intrinsic_command(&config, &store, &frames)?;
        }
        Command::Extrinsic => {
            extrinsic_command(&config, &store)?;
        }
        Command::Homography => {
            homography_command(&config, &store)?;
        }
        Command::Map { camera, x, y } => {
            println!("{}", map_command(&config, &store, &camera, Pt2::new(x, y))?);
        }
        Command::Interactive => {
            let homographies = store
                .load_homographies(config.world_unit)
                .context("interactive mapping needs homography.json")?;
            let session = InteractiveSession::new(homographies, config.layout.clone(), config.display_scale());
            let mut surface = LineSurface::new(io::stdin().lock(), io::stdout());
            if session.run(&mut surface)?.is_none() {
                log::info!("session cancelled");
            }
        }
        Command::Evaluate => {
            println!("{}", evaluate_command(&store)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Four floor markings seen by an overhead camera at 5 mm per pixel.
    fn write_references(dir: &Path) {
        fs::write(
            dir.join(ArtifactStore::IMAGE_POINTS),
            r#"{"1": [[100, 100], [1100, 100], [1100, 700], [100, 700], [600, 400]]}"#,
        )
        .unwrap();
        fs::write(
            dir.join(ArtifactStore::WORLD_POINTS),
            r#"{"1": [[500, 500], [5500, 500], [5500, 3500, 0], [500, 3500], [3000, 2000]]}"#,
        )
        .unwrap();
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            cameras: vec!["1".into()],
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn homography_then_map() {
        let dir = tempfile::tempdir().unwrap();
        write_references(dir.path());
        let store = ArtifactStore::new(dir.path());

        homography_command(&config(), &store).unwrap();
        assert!(store.path(ArtifactStore::HOMOGRAPHY).exists());

        let json = map_command(&config(), &store, &"1".into(), Pt2::new(600.0, 400.0)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let world = &value["transfer"]["world"];
        assert!((world[0].as_f64().unwrap() - 3.0).abs() < 1e-6, "{json}");
        assert!((world[1].as_f64().unwrap() - 2.0).abs() < 1e-6, "{json}");
        assert!(value["display"]["markers"]["1"].is_array());
    }

    #[test]
    fn unknown_camera_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_references(dir.path());
        let store = ArtifactStore::new(dir.path());
        homography_command(&config(), &store).unwrap();
        assert!(map_command(&config(), &store, &"9".into(), Pt2::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn args_parse() {
        let args = Args::try_parse_from(["courtcal", "--results", "out", "map", "--camera", "12", "10", "20"]).unwrap();
        assert_eq!(args.results, PathBuf::from("out"));
        match args.command {
            Command::Map { camera, x, y } => {
                assert_eq!(camera, CameraId::from("12"));
                assert_eq!((x, y), (10.0, 20.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
