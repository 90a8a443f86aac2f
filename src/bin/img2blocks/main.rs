// img2blocks - Build an anamorphic block structure from an image
//
// Pipeline:
//   1. Ask the server (RCON) where the player stands and looks
//   2. Load image, resize to target resolution
//   3. Estimate depth from luminance (or MiDaS with --features midas)
//   4. Project pixels, match block colors
//   5. Send setblock commands over a pool of RCON connections
//
// Usage: cargo run --bin img2blocks -- <image> [--catalog PATH] [--config PATH]
//        [--width N] [--height N] [--pose x,y,z,yaw,pitch] [--dry-run]

use std::env;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anamorph_engine::gateway::pool::RconSink;
use anamorph_engine::gateway::rcon::RconClient;
use anamorph_engine::gateway::{EntityPoseQuery, FixedPose, WriterSink};
use anamorph_engine::{ColorCatalog, CommandSink, Config, Pipeline, PoseProvider, Vec3, ViewerPose};
use anyhow::{Context, Result, bail};
use log::info;

const DEFAULT_CATALOG: &str = "database/rgb_values.json";

struct Args {
    image: PathBuf,
    catalog: PathBuf,
    config: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    pose: Option<ViewerPose>,
    dry_run: bool,
}

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {program} <image> [--catalog PATH] [--config PATH] [--width N] [--height N] \
         [--pose x,y,z,yaw,pitch] [--dry-run]"
    );
    std::process::exit(1);
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
    }

    let mut out = Args {
        image: PathBuf::from(&args[1]),
        catalog: PathBuf::from(DEFAULT_CATALOG),
        config: None,
        width: None,
        height: None,
        pose: None,
        dry_run: false,
    };

    let mut i = 2;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--catalog" => { out.catalog = value.context("--catalog needs a path")?.into(); i += 2; }
            "--config" => { out.config = Some(value.context("--config needs a path")?.into()); i += 2; }
            "--width" => { out.width = Some(value.context("--width needs N")?.parse().context("--width")?); i += 2; }
            "--height" => { out.height = Some(value.context("--height needs N")?.parse().context("--height")?); i += 2; }
            "--pose" => { out.pose = Some(parse_pose(value.context("--pose needs x,y,z,yaw,pitch")?)?); i += 2; }
            "--dry-run" => { out.dry_run = true; i += 1; }
            other => bail!("unknown argument '{other}'"),
        }
    }

    Ok(out)
}

/// `x,y,z,yaw,pitch` with y as the eye position
fn parse_pose(s: &str) -> Result<ViewerPose> {
    let v: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("bad pose '{s}'"))?;
    match v.as_slice() {
        &[x, y, z, yaw, pitch] => Ok(ViewerPose::new(Vec3::new(x, y, z), yaw, pitch)),
        _ => bail!("pose needs 5 values, got {}", v.len()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;

    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(w) = args.width {
        config.output_width = w;
    }
    if args.height.is_some() {
        config.output_height = args.height;
    }

    let catalog = ColorCatalog::load(&args.catalog)
        .with_context(|| format!("loading color catalog {}", args.catalog.display()))?;
    info!("loaded {} block colors", catalog.len());

    let mut poses: Box<dyn PoseProvider> = match args.pose {
        Some(pose) => Box::new(FixedPose(pose)),
        None => {
            if config.rcon.password.is_empty() || config.player.is_empty() {
                bail!("rcon.password and player must be set in the config to query the pose");
            }
            info!("connecting to {}:{} to read player pose", config.rcon.host, config.rcon.port);
            let client = RconClient::connect(
                (config.rcon.host.as_str(), config.rcon.port),
                &config.rcon.password,
                Duration::from_millis(config.rcon.timeout_ms),
            )
            .context("rcon connection for pose query")?;
            Box::new(EntityPoseQuery::new(client, config.player.clone()).with_eye_height(config.eye_height))
        }
    };

    let mut sink: Box<dyn CommandSink> = if args.dry_run {
        Box::new(WriterSink::new(io::stdout().lock()))
    } else {
        if config.rcon.password.is_empty() {
            bail!("rcon.password must be set in the config to dispatch (or pass --dry-run)");
        }
        Box::new(RconSink::connect(config.rcon.clone()).context("opening rcon pool")?)
    };

    let started = Instant::now();
    let pipeline = Pipeline::from_config(&catalog, &config);
    let report = pipeline
        .run(poses.as_mut(), &args.image, sink.as_mut())
        .with_context(|| format!("processing {}", args.image.display()))?;

    info!(
        "placed {} blocks ({} failed) from a {}x{} image in {:.1?}",
        report.dispatch.sent,
        report.dispatch.failed,
        report.width,
        report.height,
        started.elapsed()
    );
    Ok(())
}
