//! abc-stream - Play a synthetic Alembic scene through the streaming engine.

use std::env;
use std::sync::Arc;

use alembic_stream::prelude::*;
use anyhow::{bail, Context as _};
use glam::{DMat4, DQuat, DVec3, Vec3};
use serde::Serialize;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Options gathered from the command line.
struct Options {
    config: StreamConfig,
    frames: usize,
    fps: f64,
    scheduler: String,
    json: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: StreamConfig::default(),
            frames: 48,
            fps: 24.0,
            scheduler: "rayon".to_string(),
            json: false,
        }
    }
}

#[derive(Serialize)]
struct FrameStats {
    frame: usize,
    time: f64,
    updated: usize,
    translation: [f64; 3],
    points: usize,
    points_visible: bool,
    bounds_min: [f32; 3],
    bounds_max: [f32; 3],
    width: f32,
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_tracing(level);

    match filtered_args.first().copied() {
        None | Some("h") | Some("help") | Some("-h") | Some("--help") => {
            print_help();
            Ok(())
        }
        Some("config") => {
            println!("{}", StreamConfig::default().to_json()?);
            Ok(())
        }
        Some("p") | Some("play") => {
            let opts = parse_play_args(&filtered_args[1..])?;
            cmd_play(&opts)
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn print_help() {
    println!("abc-stream - Alembic sample streaming demo");
    println!();
    println!("USAGE:");
    println!("    abc-stream [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    p, play   [play options]        Stream a synthetic xform + points scene");
    println!("    config                          Print the default configuration as JSON");
    println!("    h, help                         Show this help");
    println!();
    println!("PLAY OPTIONS:");
    println!("    --config <file>     Load configuration from a JSON file");
    println!("    --frames <n>        Number of frames to play (default 48)");
    println!("    --fps <f>           Playback rate (default 24)");
    println!("    --scheduler <s>     rayon | thread | inline (default rayon)");
    println!("    --sync              Disable async loading");
    println!("    --no-interp         Disable sample interpolation");
    println!("    --motion-scale <f>  Velocity multiplier");
    println!("    --json              Print per-frame stats as JSON");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!();
    println!("NOTES:");
    println!("    - RUST_LOG overrides the verbosity flags");
}

fn parse_play_args(args: &[&str]) -> anyhow::Result<Options> {
    let mut opts = Options::default();
    let mut overrides: Vec<Box<dyn Fn(&mut StreamConfig)>> = Vec::new();
    let mut iter = args.iter().copied();
    while let Some(arg) = iter.next() {
        match arg {
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                opts.config = StreamConfig::load(path)
                    .with_context(|| format!("failed to load config {}", path))?;
            }
            "--frames" => {
                opts.frames = iter.next().context("--frames needs a value")?.parse()?;
            }
            "--fps" => {
                opts.fps = iter.next().context("--fps needs a value")?.parse()?;
                if opts.fps <= 0.0 {
                    bail!("--fps must be positive");
                }
            }
            "--scheduler" => {
                opts.scheduler = iter.next().context("--scheduler needs a value")?.to_string();
            }
            "--motion-scale" => {
                let scale: f32 = iter.next().context("--motion-scale needs a value")?.parse()?;
                overrides.push(Box::new(move |c: &mut StreamConfig| c.vertex_motion_scale = scale));
            }
            "--sync" => overrides.push(Box::new(|c: &mut StreamConfig| c.async_load = false)),
            "--no-interp" => overrides.push(Box::new(|c: &mut StreamConfig| c.interpolate_samples = false)),
            "--json" | "-j" => opts.json = true,
            other => bail!("unknown play option: {}", other),
        }
    }
    // Flags win over the config file regardless of order
    for apply in &overrides {
        apply(&mut opts.config);
    }
    Ok(opts)
}

fn make_scheduler(name: &str) -> anyhow::Result<Arc<dyn AsyncScheduler>> {
    let scheduler: Arc<dyn AsyncScheduler> = match name {
        "rayon" => Arc::new(RayonScheduler::global()),
        "thread" => Arc::new(WorkerThread::spawn()?),
        "inline" => Arc::new(InlineScheduler),
        other => bail!("unknown scheduler: {}", other),
    };
    Ok(scheduler)
}

/// Synthetic scene: a spinning xform on uniform sampling, and a wave of
/// points on jittered acyclic sampling with a blinking visibility track.
fn build_scene(ctx: &Arc<Context>) -> anyhow::Result<StreamPlayer> {
    const XFORM_SAMPLES: usize = 12;
    const POINT_SAMPLES: usize = 10;
    const NUM_POINTS: usize = 64;

    let xform_samples: Vec<Vec<u8>> = (0..XFORM_SAMPLES)
        .map(|i| {
            let t = i as f64;
            let m = DMat4::from_scale_rotation_translation(
                DVec3::ONE,
                DQuat::from_rotation_y(t * 0.25),
                DVec3::new(t, 0.0, -t * 0.5),
            );
            xform_sample_bytes(&m)
        })
        .collect();
    let xform_reader = Arc::new(MemoryProperty::new(
        "/root/spinner/.xform",
        TimeSampling::uniform(1.0 / 6.0, 0.0),
        xform_samples,
    ));
    let xform = Schema::new(Arc::clone(ctx), xform_reader, XformCooker)?;

    let times: Vec<f64> = (0..POINT_SAMPLES)
        .map(|i| i as f64 * 0.2 + if i % 2 == 1 { 0.03 } else { 0.0 })
        .collect();
    let point_ts = TimeSampling::acyclic(times);
    let positions: Vec<Vec<Vec3>> = (0..POINT_SAMPLES)
        .map(|s| {
            (0..NUM_POINTS)
                .map(|p| {
                    let x = p as f32 * 0.1;
                    Vec3::new(x, (x + s as f32 * 0.5).sin(), 0.0)
                })
                .collect()
        })
        .collect();
    let visible: Vec<i8> = (0..POINT_SAMPLES).map(|s| if s % 4 == 3 { 0 } else { 1 }).collect();
    let widths: Vec<f32> = (0..POINT_SAMPLES).map(|s| 0.05 + s as f32 * 0.01).collect();

    let points = Schema::new(
        Arc::clone(ctx),
        Arc::new(MemoryProperty::from_pods("/root/wave/P", point_ts.clone(), &positions)),
        PointsCooker,
    )?
    .with_visibility(Arc::new(MemoryProperty::from_scalars("visible", point_ts.clone(), &visible)))
    .with_property(Arc::new(MemoryProperty::from_scalars("width", point_ts, &widths)))?;

    let mut player = StreamPlayer::new(Arc::clone(ctx));
    player.add_schema(Box::new(xform));
    player.add_schema(Box::new(points));
    Ok(player)
}

fn cmd_play(opts: &Options) -> anyhow::Result<()> {
    let ctx = Context::new(opts.config.clone(), make_scheduler(&opts.scheduler)?);
    let mut player = build_scene(&ctx)?;
    tracing::info!(
        "playing {} frames at {} fps over media {:.3}..{:.3} ({:?})",
        opts.frames,
        opts.fps,
        player.media_start_time(),
        player.media_end_time(),
        opts.config
    );

    let mut all_stats = Vec::with_capacity(opts.frames);
    for frame in 0..opts.frames {
        let time = frame as f64 / opts.fps;
        player.set_current_time(time);
        player.update()?;
        player.update_end()?;

        let stats = frame_stats(&player, frame)?;
        if !opts.json {
            println!(
                "frame {:3}  t={:.3}  updated={}  T=({:.2}, {:.2}, {:.2})  points={}{}",
                stats.frame,
                stats.time,
                stats.updated,
                stats.translation[0],
                stats.translation[1],
                stats.translation[2],
                stats.points,
                if stats.points_visible { "" } else { " (hidden)" },
            );
        }
        all_stats.push(stats);
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&all_stats)?);
    }
    Ok(())
}

fn frame_stats(player: &StreamPlayer, frame: usize) -> anyhow::Result<FrameStats> {
    let xform = player
        .schema_as::<Schema<XformCooker>>(0)
        .context("xform schema missing")?;
    let points = player
        .schema_as::<Schema<PointsCooker>>(1)
        .context("points schema missing")?;

    let translation = xform
        .sample()
        .map(|s| s.payload.translation().to_array())
        .unwrap_or_default();
    let (num_points, visible, bounds) = match points.sample() {
        Some(s) => (s.payload.num_points(), s.visibility, s.payload.bounds),
        None => (0, false, Default::default()),
    };
    let width = match points.property_by_name("width") {
        Some(p) => p.value::<f32>()?,
        None => 0.0,
    };

    Ok(FrameStats {
        frame,
        time: player.start_time() + player.current_time(),
        updated: player.num_updated(),
        translation,
        points: num_points,
        points_visible: visible,
        bounds_min: bounds.min.to_array(),
        bounds_max: bounds.max.to_array(),
        width,
    })
}
