//! Benchmark driver for the `axiom-arbiter` strategies.
//!
//! Runs every selected strategy `--repeats` times over a ring of `--workers`
//! workers and writes one tab-separated record per worker (plus an `ALL`
//! row) to `--output`, or stdout. Progress goes to stderr through `tracing`;
//! set `RUST_LOG` to change the level.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axiom_arbiter::{Audited, Config, ReportWriter, RunReport, Simulation, StrategyKind};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Busy-wait vs ordered-locking contention benchmark
#[derive(Parser, Debug)]
#[command(name = "axiom-arbiter", version, about, long_about = None)]
struct Cli {
    /// Workers (and resources) in the ring
    #[arg(short = 'n', long, default_value_t = 6)]
    workers: usize,

    /// Warmup before measurement starts, in milliseconds
    #[arg(long, default_value_t = 2_000)]
    warmup_ms: u64,

    /// Length of the measurement window, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    measure_ms: u64,

    /// Runs per strategy
    #[arg(short, long, default_value_t = 3)]
    repeats: usize,

    /// Strategy to benchmark
    #[arg(short, long, value_enum, default_value_t = Choice::All)]
    strategy: Choice,

    /// Shortest thinking sleep, in milliseconds
    #[arg(long, default_value_t = 1)]
    think_min_ms: u64,

    /// Longest thinking sleep, in milliseconds
    #[arg(long, default_value_t = 10)]
    think_max_ms: u64,

    /// Shortest eating sleep, in milliseconds
    #[arg(long, default_value_t = 1)]
    eat_min_ms: u64,

    /// Longest eating sleep, in milliseconds
    #[arg(long, default_value_t = 10)]
    eat_max_ms: u64,

    /// Busy-wait polling nap, in microseconds
    #[arg(long, default_value_t = 1_000)]
    poll_us: u64,

    /// How long workers may take to stop after the window closes, in milliseconds
    #[arg(long, default_value_t = 5_000)]
    grace_ms: u64,

    /// Seed for reproducible think/eat timing
    #[arg(long)]
    seed: Option<u64>,

    /// Results file; records go to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Check mutual exclusion on every acquire and fail the run on a violation
    #[arg(long)]
    audit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Choice {
    All,
    BusyWait,
    Ordered,
}

impl Choice {
    fn kinds(self) -> &'static [StrategyKind] {
        match self {
            Choice::All => &StrategyKind::ALL,
            Choice::BusyWait => &[StrategyKind::BusyWait],
            Choice::Ordered => &[StrategyKind::Ordered],
        }
    }
}

impl Cli {
    fn config(&self) -> Config {
        let ms = Duration::from_millis;
        let mut config = Config::default()
            .with_workers(self.workers)
            .with_window(ms(self.warmup_ms), ms(self.measure_ms))
            .with_pacing(
                ms(self.think_min_ms)..=ms(self.think_max_ms),
                ms(self.eat_min_ms)..=ms(self.eat_max_ms),
            )
            .with_poll_interval(Duration::from_micros(self.poll_us))
            .with_grace(ms(self.grace_ms));
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
    }
}

fn run_once(sim: &Simulation, kind: StrategyKind, audit: bool) -> Result<RunReport> {
    if !audit {
        return Ok(sim.run(kind)?);
    }

    let audited = Arc::new(Audited::new(kind.build(sim.ring(), sim.config()), sim.ring()));
    let report = sim.run_with(audited.clone())?;
    if audited.violations() > 0 {
        bail!(
            "{kind}: {} mutual-exclusion violation(s) in {} acquisitions",
            audited.violations(),
            audited.acquisitions()
        );
    }
    info!(strategy = %kind, acquisitions = audited.acquisitions(), "audit clean");
    Ok(report)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let sim = Simulation::new(cli.config()).context("invalid benchmark configuration")?;

    let out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("cannot create results file {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = ReportWriter::new(out);

    info!(
        workers = cli.workers,
        repeats = cli.repeats,
        strategy = ?cli.strategy,
        "starting benchmark"
    );
    for repeat in 1..=cli.repeats {
        for &kind in cli.strategy.kinds() {
            info!(repeat, strategy = %kind, "running");
            let report = run_once(&sim, kind, cli.audit)
                .with_context(|| format!("{kind} run {repeat} failed"))?;

            let starved: Vec<_> = report.summary.starved().collect();
            if !starved.is_empty() {
                warn!(strategy = %kind, ?starved, "workers starved during the window");
            }
            info!(
                strategy = %kind,
                average_ms = %report.summary.overall,
                contention = report.contention,
                "repeat {repeat} done"
            );
            writer
                .write_run(&report)
                .context("failed to write result records")?;
        }
    }

    let lines = writer.lines();
    writer
        .finish()
        .and_then(|mut out| out.flush())
        .context("failed to flush result records")?;
    info!(lines, "benchmark finished");
    Ok(())
}
