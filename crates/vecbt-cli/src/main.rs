use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vecbt_core::{BacktestConfig, BarSeries, ParamSet};
use vecbt_engine::{BacktestEngine, Metric, ResultTable, WalkForwardReport};
use vecbt_strategy::{Strategy, StrategyKind};

type BoxError = Box<dyn std::error::Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Mode {
    /// Compare strategies with their default parameters
    Single,
    /// Full parameter grid search
    Grid,
    /// Grid search on a training prefix, validation on the rest
    WalkForward,
}

#[derive(Parser, Debug)]
#[command(name = "vecbt", about = "Vectorized strategy backtester")]
struct Cli {
    /// Path to CSV bar data (timestamp,open,high,low,close,volume)
    #[arg(long)]
    bars: PathBuf,

    /// Path to TOML config file(s), comma-separated for merge
    #[arg(long)]
    config: Option<String>,

    #[arg(long, value_enum, default_value = "single")]
    mode: Mode,

    /// Strategies to run (comma-separated). Grid modes use the first one.
    #[arg(long)]
    strategy: Option<String>,

    /// Metric to sort grid results by
    #[arg(long)]
    sort_by: Option<String>,

    #[arg(long)]
    train_ratio: Option<f64>,

    #[arg(long)]
    fee_rate: Option<f64>,

    #[arg(long)]
    slippage: Option<f64>,

    #[arg(long)]
    initial_capital: Option<f64>,

    /// Output file path (stdout if not specified)
    #[arg(long)]
    output_file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    meta: OutputMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<ResultTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    walk_forward: Option<WalkForwardReport>,
}

#[derive(Debug, Serialize)]
struct OutputMeta {
    bar_file: String,
    total_bars: usize,
    period: Option<(i64, i64)>,
    mode: Mode,
    strategies: Vec<String>,
    sort_by: Metric,
    fee_rate: f64,
    slippage: f64,
    initial_capital: f64,
    elapsed_ms: u128,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config.logging.level);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "backtest failed");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over the configured level.
fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Layer config files, then `BACKTEST_*` variables, then command-line flags.
fn load_config(cli: &Cli) -> Result<BacktestConfig, BoxError> {
    let mut config = match &cli.config {
        Some(list) => {
            let paths: Vec<PathBuf> = list.split(',').map(|p| PathBuf::from(p.trim())).collect();
            let refs: Vec<&Path> = paths.iter().map(|p| p.as_path()).collect();
            BacktestConfig::from_toml_files(&refs)?
        }
        None => BacktestConfig::default(),
    };
    config.apply_env()?;

    if let Some(v) = cli.fee_rate {
        config.engine.fee_rate = v;
    }
    if let Some(v) = cli.slippage {
        config.engine.slippage = v;
    }
    if let Some(v) = cli.initial_capital {
        config.engine.initial_capital = v;
    }
    if let Some(v) = cli.train_ratio {
        config.walk_forward.train_ratio = v;
    }
    if let Some(v) = &cli.sort_by {
        config.grid.sort_by = v.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli, config: &BacktestConfig) -> Result<(), BoxError> {
    let start = Instant::now();

    info!(path = %cli.bars.display(), "loading bars");
    let bars = BarSeries::from_csv(&cli.bars)?;
    bars.validate()?;
    info!(
        bars = bars.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "bars loaded"
    );

    let engine = BacktestEngine::from_config(&config.engine)?;
    let sort_by: Metric = config.grid.sort_by.parse()?;
    let default_names = match cli.mode {
        Mode::Single => "simple_ema_cross,ema_cross",
        Mode::Grid | Mode::WalkForward => config.grid.strategy.as_str(),
    };
    let kinds = cli
        .strategy
        .as_deref()
        .unwrap_or(default_names)
        .split(',')
        .map(str::parse::<StrategyKind>)
        .collect::<Result<Vec<_>, _>>()?;
    let Some(&primary) = kinds.first() else {
        return Err("no strategy given".into());
    };

    let mut report = OutputReport {
        meta: OutputMeta {
            bar_file: cli.bars.display().to_string(),
            total_bars: bars.len(),
            period: bars.span(),
            mode: cli.mode,
            strategies: kinds.iter().map(|k| k.to_string()).collect(),
            sort_by,
            fee_rate: config.engine.fee_rate,
            slippage: config.engine.slippage,
            initial_capital: config.engine.initial_capital,
            elapsed_ms: 0,
        },
        results: None,
        walk_forward: None,
    };

    match cli.mode {
        Mode::Single => {
            let strategies = kinds
                .iter()
                .map(|k| k.build(&ParamSet::new()))
                .collect::<Result<Vec<Box<dyn Strategy>>, _>>()?;
            let table = engine.compare_strategies(&bars, &strategies);
            report.results = Some(table);
        }
        Mode::Grid => {
            let grid = config.grid.grid();
            let table = engine.grid_search(&bars, &primary, &grid, sort_by);
            report.results = Some(table);
        }
        Mode::WalkForward => {
            let grid = config.grid.grid();
            let wf = engine.walk_forward_sorted(
                &bars,
                &primary,
                &grid,
                config.walk_forward.train_ratio,
                sort_by,
            )?;
            report.walk_forward = Some(wf);
        }
    }

    report.meta.elapsed_ms = start.elapsed().as_millis();
    print_summary(&report);

    let json = serde_json::to_string_pretty(&report)?;
    if let Some(output_path) = &cli.output_file {
        std::fs::write(output_path, &json)?;
        info!(path = %output_path.display(), "results written");
    } else {
        println!("{}", json);
    }
    Ok(())
}

fn print_summary(report: &OutputReport) {
    let meta = &report.meta;
    eprintln!("\n{}", "=".repeat(100));
    eprintln!("Backtest Results ({:?})", meta.mode);
    eprintln!("{}", "=".repeat(100));
    eprintln!(
        "Bars: {} | Fee: {} | Slippage: {} | Capital: {} | Elapsed: {}ms",
        meta.total_bars, meta.fee_rate, meta.slippage, meta.initial_capital, meta.elapsed_ms
    );
    eprintln!("{}", "-".repeat(100));

    if let Some(table) = &report.results {
        if table.is_empty() {
            eprintln!("No strategy produced a result");
        } else {
            eprint!("{}", table);
        }
    }
    if let Some(wf) = &report.walk_forward {
        eprintln!("{}", wf);
    }
    eprintln!("{}", "=".repeat(100));
}
