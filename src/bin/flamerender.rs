use std::{
    fs::File,
    io::{BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flamerender", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a flame to a PNG.
    Frame(FrameArgs),
    /// Parse and validate a flame without rendering it.
    Validate(ValidateArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input flame JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Worker threads (defaults to the available parallelism).
    #[arg(long)]
    workers: Option<usize>,

    /// Total samples (defaults to sample_density * output pixels).
    #[arg(long)]
    samples: Option<u64>,

    /// Pass seed, for reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// Continue a pass previously written with `--checkpoint-out`.
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Where to write the pass state when it is suspended.
    #[arg(long)]
    checkpoint_out: Option<PathBuf>,

    /// Suspend the pass after this many milliseconds (requires `--checkpoint-out`).
    #[arg(long, requires = "checkpoint_out")]
    suspend_after_ms: Option<u64>,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input flame JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Validate(args) => cmd_validate(args),
    }
}

fn read_flame(path: &Path) -> anyhow::Result<flamerender::Flame> {
    let doc = flamerender::FlameDocument::from_path(path)?;
    let flame = doc
        .build()
        .with_context(|| format!("build flame '{}'", path.display()))?;
    Ok(flame)
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let flame = read_flame(&args.in_path)?;
    eprintln!(
        "ok: {}x{} with {} transforms",
        flame.width,
        flame.height,
        flame.transforms.len()
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let flame = Arc::new(read_flame(&args.in_path)?);

    let handle = match &args.resume {
        Some(path) => {
            let f = File::open(path)
                .with_context(|| format!("open checkpoint '{}'", path.display()))?;
            let suspended = flamerender::SuspendedPass::read_json(BufReader::new(f))?;
            flamerender::RenderCoordinator::resume(Arc::clone(&flame), suspended, None)?
        }
        None => {
            let opts = flamerender::RenderOpts {
                workers: args.workers,
                sample_budget: args.samples,
                seed: args.seed,
                ..Default::default()
            };
            flamerender::RenderCoordinator::start(Arc::clone(&flame), opts)?
        }
    };

    if let (Some(ms), Some(out)) = (args.suspend_after_ms, &args.checkpoint_out) {
        let deadline = Duration::from_millis(ms);
        let step = Duration::from_millis(10);
        let mut waited = Duration::ZERO;
        while waited < deadline && !handle.is_finished() {
            std::thread::sleep(step);
            waited += step;
        }
        if !handle.is_finished() {
            let suspended = handle.suspend()?;
            write_checkpoint(out, &suspended)?;
            write_png(&flame, &suspended.snapshot(), suspended.samples_done(), &args.out)?;
            eprintln!("suspended to {}", out.display());
            return Ok(());
        }
    }

    let report = handle.wait()?;
    if let flamerender::RenderStatus::Failed(msg) = &report.status {
        anyhow::bail!("render failed: {msg}");
    }
    write_png(&flame, &report.raster, report.samples_done, &args.out)?;
    Ok(())
}

fn write_checkpoint(path: &Path, suspended: &flamerender::SuspendedPass) -> anyhow::Result<()> {
    create_parent(path)?;
    let f = File::create(path)
        .with_context(|| format!("create checkpoint '{}'", path.display()))?;
    let mut w = BufWriter::new(f);
    suspended.write_json(&mut w)?;
    w.flush()
        .with_context(|| format!("flush checkpoint '{}'", path.display()))?;
    Ok(())
}

fn write_png(
    flame: &flamerender::Flame,
    raster: &flamerender::Raster,
    samples: u64,
    out: &Path,
) -> anyhow::Result<()> {
    let frame = flamerender::ToneMapper::new(flame).map(raster, samples)?;
    create_parent(out)?;
    image::save_buffer_with_format(
        out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out.display()))?;

    eprintln!("wrote {}", out.display());
    Ok(())
}

fn create_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}
