//! momolab CLI: run, sweep, signal validation and instrument lookup.
//!
//! Commands:
//! - `run`: execute a single backtest from a TOML config file
//! - `sweep`: run a parameter grid (or a seeded sample of it) over the same inputs
//! - `validate-signals`: check a signals file before a run
//! - `instrument`: resolve a trading symbol to its instrument token

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use momolab_core::data::validate_signals;
use momolab_runner::instruments::DEFAULT_EXCHANGE_PRIORITY;
use momolab_runner::metrics::TRAILING_WINDOWS;
use momolab_runner::{
    load_signals, run_from_config, run_sweep, save_artifacts, save_summary, BacktestConfig,
    BacktestResult, InstrumentDirectory, LoadedInputs, ParamGrid, ParamSampler, SweepResults,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "momolab", about = "momolab CLI: momentum portfolio backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for artifacts. Overrides `[output] dir`.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run every configuration of a parameter grid.
    Sweep {
        /// Base TOML config: data paths and default simulation parameters.
        #[arg(long)]
        config: PathBuf,

        /// TOML file with the grid axes.
        #[arg(long)]
        grid: PathBuf,

        /// Draw this many random configs from the grid instead of the full product.
        #[arg(long)]
        samples: Option<usize>,

        /// Seed for `--samples`.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Run configs one at a time instead of on the thread pool.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Output directory for summary.csv. Overrides `[output] dir`.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check a signals file for duplicate symbols, bad ranks and oversized dates.
    ValidateSignals {
        /// Signals CSV (`date, symbol, rank`).
        #[arg(long)]
        signals: PathBuf,

        /// Expected rows per date (top_n + exit_buffer).
        #[arg(long)]
        window: usize,
    },
    /// Look up a symbol in an instrument dump.
    Instrument {
        /// Instrument CSV (`tradingsymbol, instrument_token, exchange, name`).
        #[arg(long)]
        file: PathBuf,

        /// Trading symbol, matched case-insensitively.
        #[arg(long)]
        symbol: String,

        /// Exchanges to search in priority order. Defaults to NSE then BSE.
        #[arg(long = "exchange")]
        exchanges: Vec<String>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => run_cmd(config, output),
        Commands::Sweep {
            config,
            grid,
            samples,
            seed,
            sequential,
            output,
        } => sweep_cmd(config, grid, samples, seed, sequential, output),
        Commands::ValidateSignals { signals, window } => validate_cmd(signals, window),
        Commands::Instrument {
            file,
            symbol,
            exchanges,
        } => instrument_cmd(file, &symbol, &exchanges),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn run_cmd(config_path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let config = BacktestConfig::from_file(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    let result = run_from_config(&config).context("backtest failed")?;
    print_summary(&result);

    let output_dir = output.unwrap_or_else(|| config.output.dir.clone());
    let run_dir = save_artifacts(&result, &output_dir.join(short_id(&result.run_id)))?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn sweep_cmd(
    config_path: PathBuf,
    grid_path: PathBuf,
    samples: Option<usize>,
    seed: u64,
    sequential: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = BacktestConfig::from_file(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    let grid = ParamGrid::from_file(&grid_path)
        .with_context(|| format!("failed to load grid {}", grid_path.display()))?;

    let configs = match samples {
        Some(n) => ParamSampler::new(grid, n, seed).generate_configs(&config.simulation),
        None => grid.generate_configs(&config.simulation),
    };
    if configs.is_empty() {
        bail!("grid produced no valid configurations");
    }

    let inputs = LoadedInputs::load(&config.data).context("failed to load inputs")?;
    let results = run_sweep(&inputs, &configs, !sequential).context("sweep failed")?;
    print_leaderboard(&results, 10);

    let output_dir = output.unwrap_or_else(|| config.output.dir.clone());
    let path = save_summary(&results, &output_dir)?;
    println!("Summary saved to: {}", path.display());

    Ok(())
}

fn validate_cmd(signals: PathBuf, window: usize) -> Result<()> {
    let rows = load_signals(&signals)
        .with_context(|| format!("failed to read signals {}", signals.display()))?;
    let report = validate_signals(&rows, window);

    for warning in &report.warnings {
        println!("WARNING: {warning}");
    }
    for error in &report.errors {
        println!("ERROR: {error}");
    }
    println!(
        "{} rows checked: {} error(s), {} warning(s)",
        rows.len(),
        report.errors.len(),
        report.warnings.len()
    );

    if !report.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}

fn instrument_cmd(file: PathBuf, symbol: &str, exchanges: &[String]) -> Result<()> {
    let directory = InstrumentDirectory::load(&file)
        .with_context(|| format!("failed to load instruments {}", file.display()))?;
    let priority: Vec<&str> = if exchanges.is_empty() {
        DEFAULT_EXCHANGE_PRIORITY.to_vec()
    } else {
        exchanges.iter().map(String::as_str).collect()
    };

    let instrument = directory.find(symbol, &priority)?;
    println!(
        "{} {} {} {}",
        instrument.symbol,
        instrument.exchange,
        instrument.instrument_token,
        instrument.name.as_deref().unwrap_or("")
    );
    Ok(())
}

fn short_id(run_id: &str) -> &str {
    run_id.get(..12).unwrap_or(run_id)
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".into(), |v| format!("{:.2}%", v * 100.0))
}

fn num(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "n/a".into(), |v| format!("{v:.decimals$}"))
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", short_id(&result.run_id));
    match (m.start_date, m.end_date) {
        (Some(start), Some(end)) => println!("Period:         {start} to {end}"),
        _ => println!("Period:         (no trades)"),
    }
    println!("Exposure:       {}", result.config.exposure.label());
    println!("Trades:         {}", m.trade_count);
    println!("Exits:          {}", m.exit_count);
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {}", pct(m.total_return));
    println!("CAGR:           {}", pct(m.cagr));
    println!("Benchmark:      {}", pct(m.benchmark_return));
    println!("Bench CAGR:     {}", pct(m.benchmark_cagr));
    println!("Volatility:     {}", pct(m.annualized_volatility));
    println!("Sharpe:         {}", num(m.sharpe, 3));
    println!("Max Drawdown:   {}", pct(m.max_drawdown));
    println!(
        "Longest DD:     {}",
        m.longest_drawdown_days
            .map_or_else(|| "n/a".into(), |d| format!("{d} days"))
    );
    println!();
    println!("--- Trading ---");
    println!("Avg Turnover:   {}", pct(m.avg_turnover_pct));
    println!("Ann. Turnover:  {}x", num(m.annualized_turnover, 2));
    println!("Cost Drag:      {}", pct(m.cost_drag));
    println!("Avg Holding:    {} days", num(m.avg_holding_days, 1));
    println!("Hit Rate:       {}", pct(m.hit_rate_overall));
    for (q, rate) in m.hit_rate_by_quintile.iter().enumerate() {
        println!("  Quintile {}:    {}", q + 1, pct(*rate));
    }
    println!("Trades / Year:  {}", num(m.trades_per_year, 1));
    println!();
    println!("--- Trailing ---");
    for ((label, _), t) in TRAILING_WINDOWS.iter().zip(&m.trailing_returns) {
        println!("  {:<4} portfolio {:>9}   benchmark {:>9}", label, pct(t.portfolio), pct(t.benchmark));
    }
    if let (Some(best), Some(worst)) = (m.symbol_pnl.first(), m.symbol_pnl.last()) {
        println!("Best symbol:    {} ({:.2})", best.symbol, best.pnl);
        println!("Worst symbol:   {} ({:.2})", worst.symbol, worst.pnl);
    }
    println!();
}

fn print_leaderboard(results: &SweepResults, n: usize) {
    println!();
    println!("=== Sweep: {} runs ===", results.len());
    println!(
        "{:<14} {:>5} {:>6} {:<12} {:>9} {:>9} {:>8}",
        "Run", "TopN", "Buffer", "Exposure", "CAGR", "MaxDD", "Sharpe"
    );
    println!("{}", "-".repeat(69));
    for entry in results.top_n(n) {
        println!(
            "{:<14} {:>5} {:>6} {:<12} {:>9} {:>9} {:>8}",
            short_id(&entry.run_id),
            entry.config.top_n,
            entry.config.exit_buffer,
            entry.config.exposure.label(),
            pct(entry.metrics.cagr),
            pct(entry.metrics.max_drawdown),
            num(entry.metrics.sharpe, 2),
        );
    }
    println!();
}
