use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use serde_json::json;
use sha2::Digest as _;

#[derive(Clone, Debug)]
struct BenchArgs {
    width: u32,
    height: u32,
    max_iter: u32,
    zoom: f64,
    warmup: u32,
    repeats: u32,
    threads: usize,
    cuts: Option<u32>,
    strategies: Vec<mandelpool::PoolStrategy>,
    json_out: Option<PathBuf>,
}

#[derive(Clone, Debug)]
struct StrategyRuns {
    strategy: mandelpool::PoolStrategy,
    tiles: usize,
    digest: String,
    wall: Vec<Duration>,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = parse_args()?;

    if args.width == 0 || args.height == 0 {
        anyhow::bail!("--width/--height must be > 0");
    }
    if args.repeats == 0 {
        anyhow::bail!("--repeats must be >= 1");
    }
    if args.threads == 0 {
        anyhow::bail!("--threads must be >= 1");
    }
    if args.strategies.is_empty() {
        anyhow::bail!("--strategies must name at least one strategy");
    }

    let cut_count = args.cuts.unwrap_or_else(|| {
        u32::try_from(args.threads)
            .unwrap_or(u32::MAX)
            .saturating_mul(10)
    });
    let viewport = mandelpool::Viewport::centered(
        mandelpool::GridSize::new(args.width, args.height)?,
        args.zoom,
    )?;

    eprintln!(
        "bench: {repeats} run(s) ({profile} build), {w}x{h}, max_iter={max_iter}, threads={threads}, cuts={cut_count}",
        repeats = args.repeats,
        profile = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
        w = args.width,
        h = args.height,
        max_iter = args.max_iter,
        threads = args.threads,
    );

    let mut all = Vec::with_capacity(args.strategies.len());
    for &strategy in &args.strategies {
        let config = mandelpool::RunConfig {
            max_iter: args.max_iter,
            viewport,
            pool: mandelpool::PoolConfiguration {
                strategy,
                concurrency: args.threads,
                cut_count,
                ..mandelpool::PoolConfiguration::default()
            },
        };
        all.push(bench_strategy(&args, &config)?);
    }

    report_percentiles(&all);

    let reference = &all[0];
    for runs in &all[1..] {
        if runs.digest != reference.digest {
            anyhow::bail!(
                "grid digest mismatch: {} produced {} but {} produced {}",
                reference.strategy,
                reference.digest,
                runs.strategy,
                runs.digest
            );
        }
    }
    eprintln!("\nall strategies produced grid sha256 {}", reference.digest);

    if let Some(path) = &args.json_out {
        std::fs::write(path, serde_json::to_vec_pretty(&to_json(&args, &all))?)
            .with_context(|| format!("write json '{}'", path.display()))?;
    }
    Ok(())
}

fn bench_strategy(
    args: &BenchArgs,
    config: &mandelpool::RunConfig,
) -> anyhow::Result<StrategyRuns> {
    let strategy = config.pool.strategy;
    for _ in 0..args.warmup {
        mandelpool::run_once(args.width, args.height, config)
            .with_context(|| format!("warmup run ({strategy})"))?;
    }

    let mut out = StrategyRuns {
        strategy,
        tiles: 0,
        digest: String::new(),
        wall: Vec::with_capacity(args.repeats as usize),
    };
    for i in 0..args.repeats {
        let (grid, stats) = mandelpool::run_once_with_stats(args.width, args.height, config)
            .with_context(|| format!("run {i} ({strategy})"))?;
        if i == 0 {
            out.tiles = stats.tiles;
            out.digest = grid_sha256(&grid);
        }
        out.wall.push(stats.elapsed);
    }
    Ok(out)
}

fn grid_sha256(grid: &mandelpool::OutputGrid) -> String {
    let mut h = sha2::Sha256::new();
    for n in grid.counts() {
        h.update(n.to_le_bytes());
    }
    let digest = h.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn parse_args() -> anyhow::Result<BenchArgs> {
    let mut args = std::env::args().skip(1);

    let mut out = BenchArgs {
        width: 800,
        height: 600,
        max_iter: 555,
        zoom: 150.0,
        warmup: 1,
        repeats: 20,
        threads: 10,
        cuts: None,
        strategies: mandelpool::PoolStrategy::ALL.to_vec(),
        json_out: None,
    };

    while let Some(a) = args.next() {
        match a.as_str() {
            "--width" => out.width = parse_u32(args.next(), "--width")?,
            "--height" => out.height = parse_u32(args.next(), "--height")?,
            "--max-iter" => out.max_iter = parse_u32(args.next(), "--max-iter")?,
            "--warmup" => out.warmup = parse_u32(args.next(), "--warmup")?,
            "--repeats" => out.repeats = parse_u32(args.next(), "--repeats")?,
            "--threads" => out.threads = parse_usize(args.next(), "--threads")?,
            "--cuts" => out.cuts = Some(parse_u32(args.next(), "--cuts")?),
            "--zoom" => {
                let v = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --zoom"))?;
                out.zoom = v
                    .parse::<f64>()
                    .with_context(|| format!("parse --zoom value '{v}'"))?;
            }
            "--strategies" => {
                let v = args.next().ok_or_else(|| {
                    anyhow::anyhow!("missing value for --strategies (comma-separated)")
                })?;
                out.strategies = v
                    .split(',')
                    .map(parse_strategy)
                    .collect::<anyhow::Result<Vec<_>>>()?;
            }
            "--json" => {
                out.json_out = Some(PathBuf::from(args.next().ok_or_else(|| {
                    anyhow::anyhow!("missing value for --json (expected a path)")
                })?))
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => anyhow::bail!("unknown arg '{a}' (try --help)"),
        }
    }

    Ok(out)
}

fn print_help() {
    eprintln!(
        r#"mandelpool-bench

Computes one Mandelbrot grid repeatedly per pool strategy, reports p50/p90/p99 wall time,
and checks that every strategy produced the same grid.

Usage:
  cargo run -q --release
  cargo run -q --release -- --max-iter 5550 --threads 60
  cargo run -q --release -- --strategies fixed,work_stealing --repeats 50

Args:
  --width N        (default 800)
  --height N       (default 600)
  --max-iter N     (default 555)
  --zoom F         (default 150; origin is the image center)
  --warmup N       (default 1)
  --repeats N      (default 20)
  --threads N      pool size for fixed/work_stealing (default 10)
  --cuts N         row bands (default threads*10)
  --strategies L   comma-separated: sequential,fixed,elastic,work_stealing (default all)
  --json PATH      also write the summary as JSON
"#
    );
}

fn parse_strategy(s: &str) -> anyhow::Result<mandelpool::PoolStrategy> {
    mandelpool::PoolStrategy::ALL
        .into_iter()
        .find(|k| k.as_str() == s.trim())
        .ok_or_else(|| anyhow::anyhow!("unknown strategy '{s}'"))
}

fn parse_u32(v: Option<String>, flag: &str) -> anyhow::Result<u32> {
    let v = v.ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))?;
    v.parse::<u32>()
        .with_context(|| format!("parse {flag} value '{v}'"))
}

fn parse_usize(v: Option<String>, flag: &str) -> anyhow::Result<usize> {
    let v = v.ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))?;
    v.parse::<usize>()
        .with_context(|| format!("parse {flag} value '{v}'"))
}

fn p(v: &[Duration], p: f64) -> Duration {
    if v.is_empty() {
        return Duration::ZERO;
    }
    let n = v.len();
    let rank = (p * (n as f64)).ceil().clamp(1.0, n as f64) as usize;
    v[rank - 1]
}

fn sorted(v: &[Duration]) -> Vec<Duration> {
    let mut v = v.to_vec();
    v.sort_by_key(|d| d.as_nanos());
    v
}

fn fmt_ms(d: Duration) -> String {
    format!("{:.3}ms", d.as_secs_f64() * 1000.0)
}

fn report_percentiles(all: &[StrategyRuns]) {
    eprintln!("\npercentiles across runs (p50/p90/p99):");
    for runs in all {
        let v = sorted(&runs.wall);
        eprintln!(
            "  {name:14} tiles={tiles:<5} p50={p50:>10}  p90={p90:>10}  p99={p99:>10}",
            name = runs.strategy.as_str(),
            tiles = runs.tiles,
            p50 = fmt_ms(p(&v, 0.50)),
            p90 = fmt_ms(p(&v, 0.90)),
            p99 = fmt_ms(p(&v, 0.99)),
        );
    }
}

fn to_json(args: &BenchArgs, all: &[StrategyRuns]) -> serde_json::Value {
    let strategies = all
        .iter()
        .map(|runs| {
            let v = sorted(&runs.wall);
            json!({
                "strategy": runs.strategy,
                "tiles": runs.tiles,
                "sha256": runs.digest,
                "p50_ms": p(&v, 0.50).as_secs_f64() * 1000.0,
                "p90_ms": p(&v, 0.90).as_secs_f64() * 1000.0,
                "p99_ms": p(&v, 0.99).as_secs_f64() * 1000.0,
            })
        })
        .collect::<Vec<_>>();
    json!({
        "width": args.width,
        "height": args.height,
        "max_iter": args.max_iter,
        "threads": args.threads,
        "repeats": args.repeats,
        "strategies": strategies,
    })
}
