//! Tradelab: command-line front end for the backtesting engine
//!
//! Usage:
//!   tradelab catalog                                   List strategies and parameters
//!   tradelab backtest --data bars.json --strategy sma  Run a single backtest
//!   tradelab optimize --data bars.json --strategy all  Grid-search parameters

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use engine::{
    build_strategy, catalog, default_grid, run_all_families, run_optimization, BacktestConfig,
    BacktestEngine, BacktestResult, OptimizationReport, OptimizeProgress, OptimizeRequest,
    OptimizeStatus, ParameterGrid, PriceBar, PriceSeries, StrategyFamily, StrategyParameters,
};
use rust_decimal::Decimal;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "tradelab")]
#[command(about = "Strategy backtesting and parameter optimization", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Starting balance (overrides TRADELAB_INITIAL_BALANCE)
    #[arg(long, global = true)]
    initial_balance: Option<Decimal>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered strategies with their documented parameters
    Catalog,
    /// Backtest one strategy configuration
    Backtest {
        /// JSON file containing an array of price bars
        #[arg(long)]
        data: String,
        /// Strategy id: ma_crossover, rsi_threshold, ema_crossover
        #[arg(short, long)]
        strategy: String,
        /// Parameter override, repeatable (e.g. --param short_period=10)
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Optional JSON export path
        #[arg(long)]
        export: Option<String>,
    },
    /// Grid-search a strategy family's parameters
    Optimize {
        /// JSON file containing an array of price bars
        #[arg(long)]
        data: String,
        /// Strategy id, or "all" for every family's default grid
        #[arg(short, long, default_value = "all")]
        strategy: String,
        /// Grid axis override, repeatable (e.g. --grid short_period=5,10,15)
        #[arg(short, long = "grid")]
        grid: Vec<String>,
        /// Number of top results to show
        #[arg(long, default_value_t = 5)]
        top_n: usize,
        /// Worker threads (overrides TRADELAB_WORKERS)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Optional JSON export path
        #[arg(long)]
        export: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,tradelab=debug")
    } else {
        EnvFilter::new("warn,engine=warn,tradelab=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let config = backtest_config(cli.initial_balance)?;

    match cli.command {
        Commands::Catalog => cmd_catalog(),
        Commands::Backtest {
            data,
            strategy,
            params,
            export,
        } => cmd_backtest(&data, &strategy, &params, export, &config)?,
        Commands::Optimize {
            data,
            strategy,
            grid,
            top_n,
            workers,
            export,
        } => cmd_optimize(&data, &strategy, &grid, top_n, workers, export, config).await?,
    }

    Ok(())
}

// ============================================================================
// Configuration and input
// ============================================================================

fn backtest_config(initial_balance: Option<Decimal>) -> anyhow::Result<BacktestConfig> {
    let mut config = BacktestConfig::default();

    let from_env = match std::env::var("TRADELAB_INITIAL_BALANCE") {
        Ok(raw) => Some(
            Decimal::from_str(raw.trim())
                .with_context(|| format!("Invalid TRADELAB_INITIAL_BALANCE: {}", raw))?,
        ),
        Err(_) => None,
    };
    if let Some(balance) = initial_balance.or(from_env) {
        config.initial_balance = balance;
    }

    config.validate()?;
    Ok(config)
}

fn default_workers() -> usize {
    std::env::var("TRADELAB_WORKERS")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(1)
}

fn load_series(path: &str) -> anyhow::Result<PriceSeries> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read price data from {}", path))?;
    let bars: Vec<PriceBar> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse price bars in {}", path))?;
    let series = PriceSeries::new(bars)?;
    info!(path, bars = series.len(), "Price series loaded");
    Ok(series)
}

/// `name=value`
fn parse_param(raw: &str) -> anyhow::Result<(String, f64)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("Expected name=value, got '{}'", raw);
    };
    let value = value
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid value for {}: '{}'", name, value))?;
    Ok((name.trim().to_string(), value))
}

/// `name=v1,v2,v3`
fn parse_grid_axis(raw: &str) -> anyhow::Result<(String, Vec<f64>)> {
    let Some((name, values)) = raw.split_once('=') else {
        bail!("Expected name=v1,v2,..., got '{}'", raw);
    };
    let values = values
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid grid value for {}: '{}'", name, v))
        })
        .collect::<anyhow::Result<Vec<f64>>>()?;
    Ok((name.trim().to_string(), values))
}

/// Family's default grid with `--grid` axes swapped in
fn build_grid(family: StrategyFamily, overrides: &[String]) -> anyhow::Result<ParameterGrid> {
    let specs = family.parameter_specs();
    let mut grid = default_grid(family);
    for raw in overrides {
        let (name, values) = parse_grid_axis(raw)?;
        if !specs.iter().any(|s| s.name == name) {
            let known: Vec<&str> = specs.iter().map(|s| s.name).collect();
            bail!(
                "{} has no parameter '{}' (expected one of: {})",
                family,
                name,
                known.join(", ")
            );
        }
        grid = grid.axis(name, values);
    }
    Ok(grid)
}

// ============================================================================
// Catalog command
// ============================================================================

fn cmd_catalog() {
    println!("\n=== Tradelab v{} ===", APP_VERSION);
    for entry in catalog() {
        println!("\n{} ({})", entry.name, entry.id);
        println!("  {}", entry.description);
        for p in entry.parameters {
            println!(
                "    {:<14} default {:>6}  range [{}, {}]{}  {}",
                p.name,
                p.default,
                p.min,
                p.max,
                if p.integer { " int" } else { "" },
                p.description
            );
        }
    }
}

// ============================================================================
// Backtest command
// ============================================================================

fn cmd_backtest(
    data: &str,
    strategy: &str,
    params: &[String],
    export: Option<String>,
    config: &BacktestConfig,
) -> anyhow::Result<()> {
    let series = load_series(data)?;
    let family = StrategyFamily::from_str(strategy)?;
    let params = StrategyParameters::from_pairs(
        params
            .iter()
            .map(|p| parse_param(p))
            .collect::<anyhow::Result<Vec<_>>>()?,
    );

    let strategy = build_strategy(family, &params)?;
    let result = BacktestEngine::run(strategy.as_ref(), &series, config)?;

    print_backtest(&result);

    if let Some(export_path) = export {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&export_path, &json)
            .with_context(|| format!("Failed to write {}", export_path))?;
        println!("\nResults exported to {}", export_path);
    }

    Ok(())
}

fn format_time(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn print_backtest(result: &BacktestResult) {
    println!("\n{} ({})", result.strategy_name, result.parameters);
    println!(
        "  Period:        {} → {}",
        format_time(result.start_time),
        format_time(result.end_time)
    );
    println!("  Final value:   {:.2}", result.final_portfolio_value);
    println!("  Total return:  {:.2}%", result.total_return_pct);
    println!("  Total trades:  {}", result.total_trades);
    println!("  Win rate:      {:.2}%", result.win_rate_pct);
    println!("  Sharpe ratio:  {:.3}", result.sharpe_ratio);
    println!("  Max drawdown:  {:.2}%", result.max_drawdown_pct);

    if result.trades.is_empty() {
        return;
    }

    println!(
        "\n  {:<16}  {:<4} {:>12} {:>12} {:>12} {:>12}",
        "Time", "Side", "Price", "Amount", "Balance", "P/L"
    );
    println!("  {}", "-".repeat(74));
    for t in &result.trades {
        let pnl = t
            .profit_loss
            .map(|p| format!("{:.2}", p))
            .unwrap_or_default();
        println!(
            "  {:<16}  {:<4} {:>12.2} {:>12.4} {:>12.2} {:>12}",
            format_time(t.timestamp),
            format!("{:?}", t.action).to_uppercase(),
            t.price,
            t.amount,
            t.balance_after,
            pnl
        );
    }
}

// ============================================================================
// Optimize command
// ============================================================================

#[allow(clippy::too_many_arguments)]
async fn cmd_optimize(
    data: &str,
    strategy: &str,
    grid: &[String],
    top_n: usize,
    workers: Option<usize>,
    export: Option<String>,
    config: BacktestConfig,
) -> anyhow::Result<()> {
    println!("\n=== Tradelab v{} ===", APP_VERSION);

    let series = load_series(data)?;
    let workers = workers.unwrap_or_else(default_workers).max(1);
    let all = strategy.eq_ignore_ascii_case("all");

    let request = if all {
        if !grid.is_empty() {
            bail!("--grid requires a single --strategy");
        }
        None
    } else {
        let family = StrategyFamily::from_str(strategy)?;
        Some(OptimizeRequest {
            grid: Some(build_grid(family, grid)?),
            backtest: config.clone(),
            workers: Some(workers),
            ..OptimizeRequest::new(family)
        })
    };

    println!(
        "Bars: {} | Strategy: {} | Workers: {} | Balance: {}",
        series.len(),
        if all { "all" } else { strategy },
        workers,
        config.initial_balance
    );
    println!("Press Ctrl+C to cancel\n");

    let progress = Arc::new(OptimizeProgress::new());

    let progress_for_ctrlc = progress.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl+C received, requesting cancel...");
        progress_for_ctrlc.cancel();
    });

    // Grid search is CPU-bound; keep it off the async workers
    let progress_clone = progress.clone();
    let handle = tokio::task::spawn_blocking(move || match request {
        Some(request) => run_optimization(&request, &series, &progress_clone).map(|r| vec![r]),
        None => run_all_families(&series, &config, workers, &progress_clone),
    });

    // Progress display loop
    while !handle.is_finished() {
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        if progress.status() != OptimizeStatus::Running {
            continue;
        }

        let completed = progress.completed.load(Ordering::Relaxed);
        let total = progress.total_combinations.load(Ordering::Relaxed);
        let pct = progress.progress_pct();
        let family = progress
            .family()
            .map(|f| f.display_name())
            .unwrap_or_default();

        let bar_len = 30;
        let filled = (pct as usize * bar_len) / 100;
        let bar: String = "=".repeat(filled) + &" ".repeat(bar_len - filled);
        print!(
            "\r  {:<14} [{}] {:.0}% ({}/{})   ",
            family, bar, pct, completed, total
        );
        std::io::stdout().flush().ok();
    }
    println!();

    let reports = handle.await.context("Optimization task failed")??;

    for report in &reports {
        print_report(report, top_n);
    }

    if reports.len() > 1 {
        print_overall_best(&reports);
    }

    if let Some(export_path) = export {
        let json = serde_json::to_string_pretty(&reports)?;
        std::fs::write(&export_path, &json)
            .with_context(|| format!("Failed to write {}", export_path))?;
        println!("\nResults exported to {}", export_path);
    }

    Ok(())
}

fn print_report(report: &OptimizationReport, top_n: usize) {
    println!(
        "\n{}: {} combinations ({} run, {} filtered)",
        report.family, report.total_combinations, report.evaluated, report.skipped
    );
    println!("Top {} Results:", report.results.len().min(top_n));
    println!(
        "  {:>3}  {:<40} {:>9} {:>8} {:>8} {:>8} {:>6}",
        "#", "Parameters", "Return%", "Sharpe", "MaxDD%", "WR%", "Trades"
    );
    println!("  {}", "-".repeat(90));
    for r in report.results.iter().take(top_n) {
        println!(
            "  {:>3}  {:<40} {:>9.2} {:>8.3} {:>8.2} {:>8.1} {:>6}",
            r.rank,
            r.result.parameters.to_string(),
            r.result.total_return_pct,
            r.result.sharpe_ratio,
            r.result.max_drawdown_pct,
            r.result.win_rate_pct,
            r.result.total_trades,
        );
    }
}

fn print_overall_best(reports: &[OptimizationReport]) {
    let best = reports
        .iter()
        .filter_map(|r| r.best.as_ref())
        .fold(None, |acc: Option<&engine::RankedResult>, r| match acc {
            Some(a) if a.result.total_return_pct >= r.result.total_return_pct => Some(a),
            _ => Some(r),
        });

    match best {
        Some(best) => println!(
            "\nBest overall: {} ({}), {:.2}% return",
            best.result.strategy_name, best.result.parameters, best.result.total_return_pct
        ),
        None => println!("\nNo results found."),
    }
}
