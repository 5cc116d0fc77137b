//! Scene inspection CLI: validate a scene description or drive it for a
//! number of ticks, printing per-tick sequencer state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use cadenza::{Blendable as _, SceneDef, StaticClipLibrary, TickContext, TimeRange, build};

#[derive(Parser, Debug)]
#[command(name = "cadenza", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a scene description and report build diagnostics.
    Validate(ValidateArgs),
    /// Drive a scene for a number of ticks and print per-tick state.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Optional clip library JSON (resource -> [{name, range}]).
    #[arg(long)]
    library: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Optional clip library JSON (resource -> [{name, range}]).
    #[arg(long)]
    library: Option<PathBuf>,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// Tick duration in seconds.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,

    /// Emit one JSON object per tick instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(serde::Deserialize)]
struct LibClip {
    name: String,
    range: [f64; 2],
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Run(args) => cmd_run(args),
    }
}

fn load_scene(path: &PathBuf) -> anyhow::Result<SceneDef> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read scene '{}'", path.display()))?;
    SceneDef::from_json(&json).with_context(|| format!("parse scene '{}'", path.display()))
}

fn load_library(path: Option<&PathBuf>) -> anyhow::Result<StaticClipLibrary> {
    let mut lib = StaticClipLibrary::new();
    let Some(path) = path else {
        return Ok(lib);
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read library '{}'", path.display()))?;
    let parsed: BTreeMap<String, Vec<LibClip>> =
        serde_json::from_str(&json).with_context(|| format!("parse library '{}'", path.display()))?;
    for (resource, clips) in parsed {
        for clip in clips {
            let range = TimeRange::new(clip.range[0], clip.range[1])
                .with_context(|| format!("library clip '{}/{}'", resource, clip.name))?;
            lib.add_clip(resource.clone(), clip.name, range);
        }
    }
    Ok(lib)
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let scene = load_scene(&args.in_path)?;
    let library = load_library(args.library.as_ref())?;
    let out = build(&scene, &library)?;

    if out.diagnostics.is_empty() {
        eprintln!(
            "ok: {} clips, {} timelines",
            scene.clips.len(),
            scene.timelines.len()
        );
    } else {
        for d in &out.diagnostics {
            eprintln!("warning: {d}");
        }
        eprintln!("{} element(s) degraded to inert", out.diagnostics.len());
    }
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let scene = load_scene(&args.in_path)?;
    let library = load_library(args.library.as_ref())?;
    let out = build(&scene, &library)?;
    for d in &out.diagnostics {
        eprintln!("warning: {d}");
    }

    let mut sequencer = out.sequencer;
    for i in 0..args.ticks {
        let tick = TickContext::new((i + 1) as f64 * args.dt, args.dt);
        sequencer.evaluate(&tick);

        let current = sequencer.current_clip().map(|c| c.name().to_owned());
        let active: Vec<&str> = sequencer.active_clips().map(|(_, c)| c.name()).collect();
        let externals: BTreeMap<&str, f64> = sequencer
            .externals()
            .iter()
            .map(|slot| (slot.name(), slot.blend_factor(0)))
            .collect();

        if args.json {
            println!(
                "{}",
                serde_json::json!({
                    "tick": i,
                    "time": tick.time,
                    "current": current,
                    "active": active,
                    "externals": externals,
                })
            );
        } else {
            let ext = externals
                .iter()
                .map(|(name, factor)| format!("{name}={factor:.3}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!(
                "t={:8.3} current={} active=[{}] {}",
                tick.time,
                current.as_deref().unwrap_or("-"),
                active.join(", "),
                ext
            );
        }
    }
    Ok(())
}
