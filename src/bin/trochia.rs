use std::{fs::File, io::BufWriter, path::PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "trochia", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available presentation scripts.
    List,
    /// Run a presentation script through the beat scheduler.
    Play(PlayArgs),
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Script name (see `list`).
    #[arg(long)]
    script: String,

    /// Frames per second to sample beats at.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Write the final scene as JSON.
    #[arg(long)]
    dump_scene: Option<PathBuf>,

    /// Print per-run draw-call statistics.
    #[arg(long)]
    stats: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::List => cmd_list(),
        Command::Play(args) => cmd_play(args),
    }
}

fn cmd_list() -> anyhow::Result<()> {
    for name in trochia::script_names() {
        println!("{name}");
    }
    Ok(())
}

fn cmd_play(args: PlayArgs) -> anyhow::Result<()> {
    let Some(script) = trochia::script_by_name(&args.script) else {
        anyhow::bail!(
            "unknown script '{}' (try `trochia list`)",
            args.script
        );
    };

    let fps = trochia::Fps::new(args.fps, 1)?;
    let mut backend = trochia::RecordingBackend::default();
    let typesetter = trochia::MonospaceTypesetter::default();

    let mut stage = trochia::Stage::new(script.canvas(), fps, &mut backend, &typesetter);
    script.run(&mut stage)?;

    let frames = stage.scheduler.clock().0;
    let scene = stage.scene;

    if let Some(path) = &args.dump_scene {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        let f = File::create(path).with_context(|| format!("create '{}'", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(f), &scene)
            .with_context(|| "serialize scene JSON")?;
        eprintln!("wrote {}", path.display());
    }

    if args.stats {
        let mut primitives = 0u64;
        let mut exprs = 0u64;
        for call in &backend.calls {
            match call {
                trochia::DrawCall::Primitive { .. } => primitives += 1,
                trochia::DrawCall::Expr { .. } => exprs += 1,
                trochia::DrawCall::Begin { .. } | trochia::DrawCall::Present => {}
            }
        }
        eprintln!("frames:     {}", backend.frames_presented);
        eprintln!("primitives: {primitives}");
        eprintln!("exprs:      {exprs}");
    }

    eprintln!(
        "played '{}' ({} frames at {} fps, {:.1}s)",
        args.script,
        frames,
        args.fps,
        fps.frames_to_secs(frames)
    );
    Ok(())
}
