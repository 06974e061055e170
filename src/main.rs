use std::error::Error as StdError;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use mandelscry::{
    export_frames, preview_image, ConfigError, FrameSpec, Scryer, Settings, Subframe,
    TrajectoryPlanner, Viewport,
};

// ------------------------- CLI -------------------------

#[derive(Parser)]
#[command(name = "mandelscry")]
#[command(about = "Find interesting Mandelbrot targets and plan zooms onto them")]
struct Args {
    /// Settings file (.toml / .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `search.max_restarts` from the settings file
    #[arg(long, global = true)]
    max_restarts: Option<u32>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Search for a target and print it as JSON
    Scry {
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the keyframe plan for a target
    Plan {
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long)]
        levels: u32,
        #[arg(long)]
        frames_per_level: Option<u32>,
        /// Include the subframe plan
        #[arg(long)]
        subframes: bool,
    },
    /// Render one viewport to a preview PNG
    Evaluate {
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long)]
        scale: f64,
        #[arg(long, default_value_t = 500)]
        depth: u32,
        #[arg(long, default_value_t = 504)]
        width: u32,
        #[arg(long, default_value_t = 336)]
        height: u32,
        #[arg(long)]
        out: PathBuf,
    },
    /// Search, plan and export a PNG frame sequence
    Render {
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Plan {
    keyframes: Vec<FrameSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subframes: Option<Vec<Subframe>>,
}

fn load_settings(args: &Args) -> Result<Settings, ConfigError> {
    let mut settings = Settings::load_or_default(args.config.as_deref())?;
    if let Some(runs) = args.max_restarts {
        settings.search.max_restarts = runs;
    }
    Ok(settings)
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

// ------------------------- Main -------------------------

fn main() -> Result<(), Box<dyn StdError>> {
    env_logger::init();
    let args = Args::parse();
    let mut settings = load_settings(&args)?;

    match args.cmd {
        Cmd::Scry { seed } => {
            let target = Scryer::new(settings.search.clone(), rng_from(seed)).find_target()?;
            println!("{}", serde_json::to_string_pretty(&target)?);
        }
        Cmd::Plan {
            x,
            y,
            levels,
            frames_per_level,
            subframes,
        } => {
            let planner = TrajectoryPlanner {
                config: settings.trajectory.clone(),
                target_x: x,
                target_y: y,
                level_count: levels,
            };
            let keyframes = planner.keyframes();
            let subframes = if subframes {
                let per_level = frames_per_level.unwrap_or(settings.output.frames_per_level);
                let (w, h) = settings.output.keyframe_size();
                Some(planner.subframes(&keyframes, per_level, w, h)?)
            } else {
                None
            };
            let plan = Plan {
                keyframes,
                subframes,
            };
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Cmd::Evaluate {
            x,
            y,
            scale,
            depth,
            width,
            height,
            out,
        } => {
            let viewport = Viewport::new(x, y, scale, width, height, depth)?;
            let started = Instant::now();
            let grid = settings.render_evaluator().evaluate(&viewport);
            info!(
                "evaluated {}x{} in {:?}, {} bounded",
                width,
                height,
                started.elapsed(),
                grid.bounded_count()
            );
            preview_image(&grid, depth).save(&out)?;
        }
        Cmd::Render { seed, out } => {
            if let Some(out) = out {
                settings.output.out_dir = out;
            }
            let target = Scryer::new(settings.search.clone(), rng_from(seed)).find_target()?;
            info!("target {:?}", target);
            let levels = settings
                .output
                .levels
                .unwrap_or_else(|| target.level.max(1) as u32);
            let planner = TrajectoryPlanner::new(settings.trajectory.clone(), &target, levels);
            let paths = export_frames(
                &planner,
                &settings.output,
                &settings.render_evaluator(),
                &settings.output.out_dir,
            )?;
            println!(
                "{} frames written to {}",
                paths.len(),
                settings.output.out_dir.display()
            );
        }
    }
    Ok(())
}
