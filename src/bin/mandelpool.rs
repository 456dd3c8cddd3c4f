use std::{io::Write as _, path::PathBuf, time::Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "mandelpool", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute one image with a single pool configuration and write it as a PNG.
    Render(RenderArgs),
    /// Time every pool variant across iteration caps and thread counts.
    Sweep(SweepArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Image width in pixels.
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Image height in pixels.
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Iteration cap per pixel.
    #[arg(long, default_value_t = 570)]
    max_iter: u32,

    /// Pixels per unit of the complex plane.
    #[arg(long, default_value_t = 150.0)]
    zoom: f64,

    /// Pixel column of the complex origin (defaults to the image center).
    #[arg(long)]
    origin_x: Option<f64>,

    /// Pixel row of the complex origin (defaults to the image center).
    #[arg(long)]
    origin_y: Option<f64>,

    /// Worker pool strategy.
    #[arg(long, value_enum, default_value_t = StrategyChoice::WorkStealing)]
    strategy: StrategyChoice,

    /// Thread count (fixed) or parallelism (work-stealing).
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Number of row bands; defaults to ten per thread.
    #[arg(long)]
    cuts: Option<u32>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct SweepArgs {
    /// JSON sweep plan; the classic 800x600 sweep is used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of timed runs per variant.
    #[arg(long)]
    repeats: Option<u32>,

    /// Write the report as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Append the text report to this file.
    #[arg(long)]
    append: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyChoice {
    Sequential,
    Fixed,
    Elastic,
    WorkStealing,
}

impl From<StrategyChoice> for mandelpool::PoolStrategy {
    fn from(c: StrategyChoice) -> Self {
        match c {
            StrategyChoice::Sequential => mandelpool::PoolStrategy::Sequential,
            StrategyChoice::Fixed => mandelpool::PoolStrategy::Fixed,
            StrategyChoice::Elastic => mandelpool::PoolStrategy::Elastic,
            StrategyChoice::WorkStealing => mandelpool::PoolStrategy::WorkStealing,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Sweep(args) => cmd_sweep(args),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let viewport = mandelpool::Viewport::new(
        args.zoom,
        args.origin_x.unwrap_or(f64::from(args.width) / 2.0),
        args.origin_y.unwrap_or(f64::from(args.height) / 2.0),
    )?;
    let cut_count = args
        .cuts
        .unwrap_or_else(|| u32::try_from(args.threads).unwrap_or(u32::MAX).saturating_mul(10));
    let config = mandelpool::RunConfig {
        max_iter: args.max_iter,
        viewport,
        pool: mandelpool::PoolConfiguration {
            strategy: args.strategy.into(),
            concurrency: args.threads,
            cut_count,
            ..mandelpool::PoolConfiguration::default()
        },
    };

    let t0 = Instant::now();
    let (grid, stats) = mandelpool::run_once_with_stats(args.width, args.height, &config)?;
    let elapsed = t0.elapsed();

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    grid.to_rgb_image()
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!(
        "{strategy}: {tiles} tile(s){fallback}, {ms:.3}ms",
        strategy = stats.strategy,
        tiles = stats.tiles,
        fallback = if stats.fell_back { " (fallback)" } else { "" },
        ms = elapsed.as_secs_f64() * 1000.0,
    );
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_sweep(args: SweepArgs) -> anyhow::Result<()> {
    let mut plan = match &args.config {
        Some(path) => mandelpool::harness::SweepPlan::from_path(path)
            .with_context(|| format!("load sweep plan '{}'", path.display()))?,
        None => mandelpool::harness::SweepPlan::classic(),
    };
    if let Some(repeats) = args.repeats {
        plan.repeats = repeats;
    }

    let mut acc = mandelpool::harness::TimingAccumulator::new();
    let report = mandelpool::harness::run_sweep(&plan, &mut acc)?;
    let text = report.to_text();
    print!("{text}");

    if let Some(path) = &args.json {
        std::fs::write(path, report.to_json_pretty()?)
            .with_context(|| format!("write json report '{}'", path.display()))?;
    }
    if let Some(path) = &args.append {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open report '{}'", path.display()))?;
        f.write_all(text.as_bytes())
            .with_context(|| format!("append report '{}'", path.display()))?;
    }
    Ok(())
}
