//! Automatic parameter optimization for backtesting strategies
//!
//! Runs an exhaustive grid search over one strategy family's parameters
//! against a shared price series, ranks the results by total return, and
//! returns them best-first. Each combination gets a fresh strategy instance
//! and a fresh run state; combinations can run on several worker threads and
//! the ranked output is identical to a sequential run.

use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc, RwLock,
};
use tracing::{debug, info, warn};

use crate::engine::BacktestEngine;
use crate::error::{EngineError, EngineResult};
use crate::params::{ParameterGrid, StrategyParameters};
use crate::series::PriceSeries;
use crate::strategy::{build_strategy, Strategy, StrategyFamily};
use crate::types::{BacktestConfig, BacktestResult};

// ============================================================================
// Types
// ============================================================================

/// Request to run one grid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub family: StrategyFamily,
    /// Values to enumerate; `None` uses the family's default grid
    #[serde(default)]
    pub grid: Option<ParameterGrid>,
    #[serde(default)]
    pub backtest: BacktestConfig,
    /// Number of ranked results to keep; `None` keeps all
    #[serde(default)]
    pub top_n: Option<usize>,
    /// Worker threads; `None` or 0 runs sequentially
    #[serde(default)]
    pub workers: Option<usize>,
}

impl OptimizeRequest {
    pub fn new(family: StrategyFamily) -> Self {
        Self {
            family,
            grid: None,
            backtest: BacktestConfig::default(),
            top_n: None,
            workers: None,
        }
    }
}

/// A backtest result with its 1-based position in the ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub rank: usize,
    #[serde(flatten)]
    pub result: BacktestResult,
}

/// Ranked outcome of one grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub family: StrategyFamily,
    /// Raw size of the grid
    pub total_combinations: usize,
    /// Combinations that were actually backtested
    pub evaluated: usize,
    /// Combinations filtered out before running (e.g. short ≥ long)
    pub skipped: usize,
    pub best: Option<RankedResult>,
    pub results: Vec<RankedResult>,
}

/// Optimization run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeStatus {
    Idle,
    Running,
    Complete,
    Cancelled,
    Error,
}

/// Shared progress tracker between the caller and a running grid search.
///
/// Setting `cancelled` stops the search before its next combination.
pub struct OptimizeProgress {
    status: RwLock<OptimizeStatus>,
    family: RwLock<Option<StrategyFamily>>,
    pub total_combinations: AtomicUsize,
    pub completed: AtomicUsize,
    pub cancelled: AtomicBool,
}

impl OptimizeProgress {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(OptimizeStatus::Idle),
            family: RwLock::new(None),
            total_combinations: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Reset for a new optimization run. Keeps a pending cancellation.
    pub fn reset(&self, family: StrategyFamily, total: usize) {
        self.set_status(OptimizeStatus::Running);
        *self.family.write().unwrap_or_else(|e| e.into_inner()) = Some(family);
        self.total_combinations.store(total, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
    }

    pub fn status(&self) -> OptimizeStatus {
        *self.status.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn family(&self) -> Option<StrategyFamily> {
        *self.family.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: OptimizeStatus) {
        *self.status.write().unwrap_or_else(|e| e.into_inner()) = status;
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Get progress as percentage
    pub fn progress_pct(&self) -> f32 {
        let total = self.total_combinations.load(Ordering::Relaxed);
        let done = self.completed.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            (done as f32 / total as f32) * 100.0
        }
    }

    /// Check if currently running
    pub fn is_running(&self) -> bool {
        matches!(self.status(), OptimizeStatus::Running)
    }
}

impl Default for OptimizeProgress {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Grid Generation
// ============================================================================

/// Largest grid a single search will enumerate
pub const MAX_COMBINATIONS: usize = 1_000_000;

/// Default grid per family
pub fn default_grid(family: StrategyFamily) -> ParameterGrid {
    match family {
        // 4 x 4 = 16 combinations; (20, 20) is filtered, leaving 15
        StrategyFamily::MaCrossover => ParameterGrid::new()
            .axis("short_period", vec![5.0, 10.0, 15.0, 20.0])
            .axis("long_period", vec![20.0, 30.0, 40.0, 50.0]),
        // 3 x 3 x 3 = 27 combinations
        StrategyFamily::RsiThreshold => ParameterGrid::new()
            .axis("period", vec![10.0, 14.0, 21.0])
            .axis("oversold", vec![20.0, 30.0, 35.0])
            .axis("overbought", vec![65.0, 70.0, 80.0]),
        StrategyFamily::EmaCrossover => ParameterGrid::new()
            .axis("fast_period", vec![5.0, 8.0, 12.0])
            .axis("slow_period", vec![21.0, 26.0, 34.0]),
    }
}

/// One valid combination, ready to run
struct RunPlan {
    order_idx: usize,
    strategy: Box<dyn Strategy>,
}

/// Build a fresh strategy per combination; combinations the family rejects
/// are filtered out here rather than failing the search.
fn plan_runs(family: StrategyFamily, combinations: &[StrategyParameters]) -> Vec<RunPlan> {
    combinations
        .iter()
        .enumerate()
        .filter_map(|(order_idx, params)| match build_strategy(family, params) {
            Ok(strategy) => Some(RunPlan { order_idx, strategy }),
            Err(e) => {
                debug!(params = %params, error = %e, "Skipping parameter combination");
                None
            }
        })
        .collect()
}

// ============================================================================
// Execution
// ============================================================================

fn execute_serial(
    plans: &[RunPlan],
    series: &PriceSeries,
    config: &BacktestConfig,
    progress: &OptimizeProgress,
) -> EngineResult<Vec<(usize, BacktestResult)>> {
    let mut out = Vec::with_capacity(plans.len());
    for plan in plans {
        if progress.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let result = BacktestEngine::run(plan.strategy.as_ref(), series, config)?;
        progress.completed.fetch_add(1, Ordering::Relaxed);
        out.push((plan.order_idx, result));
    }
    Ok(out)
}

enum WorkerMessage {
    Entry {
        order_idx: usize,
        result: BacktestResult,
    },
    Fatal(EngineError),
}

fn execute_parallel(
    plans: &[RunPlan],
    workers: usize,
    series: &PriceSeries,
    config: &BacktestConfig,
    progress: &OptimizeProgress,
) -> EngineResult<Vec<(usize, BacktestResult)>> {
    let worker_count = workers.max(1).min(plans.len());
    let next_index = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<WorkerMessage>();

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let tx = tx.clone();
            let next_index = &next_index;
            scope.spawn(move || loop {
                if progress.is_cancelled() {
                    let _ = tx.send(WorkerMessage::Fatal(EngineError::Cancelled));
                    break;
                }

                let plan_idx = next_index.fetch_add(1, Ordering::Relaxed);
                let Some(plan) = plans.get(plan_idx) else {
                    break;
                };

                let message = match BacktestEngine::run(plan.strategy.as_ref(), series, config) {
                    Ok(result) => {
                        progress.completed.fetch_add(1, Ordering::Relaxed);
                        WorkerMessage::Entry {
                            order_idx: plan.order_idx,
                            result,
                        }
                    }
                    Err(e) => WorkerMessage::Fatal(e),
                };
                let fatal = matches!(message, WorkerMessage::Fatal(_));
                if tx.send(message).is_err() || fatal {
                    break;
                }
            });
        }

        drop(tx);

        let mut entries = Vec::with_capacity(plans.len());
        let mut fatal_error: Option<EngineError> = None;
        while let Ok(message) = rx.recv() {
            match message {
                WorkerMessage::Entry { order_idx, result } => entries.push((order_idx, result)),
                WorkerMessage::Fatal(e) => {
                    fatal_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = fatal_error {
            return Err(e);
        }
        entries.sort_by_key(|(order_idx, _)| *order_idx);
        Ok(entries)
    })
}

// ============================================================================
// Main Optimization Runner
// ============================================================================

/// Run the full parameter grid search described by `request`.
pub fn run_optimization(
    request: &OptimizeRequest,
    series: &PriceSeries,
    progress: &OptimizeProgress,
) -> EngineResult<OptimizationReport> {
    request.backtest.validate()?;

    let family = request.family;
    let grid = request
        .grid
        .clone()
        .unwrap_or_else(|| default_grid(family));
    if grid.len() > MAX_COMBINATIONS {
        return Err(EngineError::InvalidConfig(format!(
            "grid has {} combinations, limit is {}",
            grid.len(),
            MAX_COMBINATIONS
        )));
    }
    let combinations = grid.combinations();
    let plans = plan_runs(family, &combinations);
    let skipped = combinations.len() - plans.len();
    let workers = request.workers.unwrap_or(1).max(1);

    progress.reset(family, plans.len());

    info!(
        strategy = %family,
        bars = series.len(),
        combinations = combinations.len(),
        skipped,
        workers,
        "Starting parameter optimization"
    );

    let outcome = if workers > 1 && plans.len() > 1 {
        execute_parallel(&plans, workers, series, &request.backtest, progress)
    } else {
        execute_serial(&plans, series, &request.backtest, progress)
    };

    let results = match outcome {
        Ok(results) => results,
        Err(EngineError::Cancelled) => {
            warn!(strategy = %family, "Optimization cancelled");
            progress.set_status(OptimizeStatus::Cancelled);
            return Err(EngineError::Cancelled);
        }
        Err(e) => {
            progress.set_status(OptimizeStatus::Error);
            return Err(e);
        }
    };

    let evaluated = results.len();
    let ranked = rank_results(results.into_iter().map(|(_, r)| r).collect());
    let best = ranked.first().cloned();

    let mut kept = ranked;
    if let Some(top_n) = request.top_n {
        kept.truncate(top_n);
    }

    if let Some(best) = &best {
        info!(
            rank = 1,
            params = %best.result.parameters,
            total_return_pct = %best.result.total_return_pct,
            trades = best.result.total_trades,
            "Best configuration found"
        );
    }

    progress.set_status(OptimizeStatus::Complete);
    info!(strategy = %family, evaluated, "Optimization complete");

    Ok(OptimizationReport {
        family,
        total_combinations: combinations.len(),
        evaluated,
        skipped,
        best,
        results: kept,
    })
}

/// Sort by total return descending. The sort is stable, so ties keep
/// enumeration order and the first-encountered combination wins.
fn rank_results(mut results: Vec<BacktestResult>) -> Vec<RankedResult> {
    results.sort_by(|a, b| b.total_return_pct.cmp(&a.total_return_pct));
    results
        .into_iter()
        .enumerate()
        .map(|(i, result)| RankedResult { rank: i + 1, result })
        .collect()
}

/// Grid search `family` over `grid` without external progress tracking
pub fn run_grid(
    family: StrategyFamily,
    grid: ParameterGrid,
    series: &PriceSeries,
    config: &BacktestConfig,
) -> EngineResult<OptimizationReport> {
    let request = OptimizeRequest {
        grid: Some(grid),
        backtest: config.clone(),
        ..OptimizeRequest::new(family)
    };
    run_optimization(&request, series, &OptimizeProgress::new())
}

/// Run every registered family's default grid, one report per family
pub fn run_all_families(
    series: &PriceSeries,
    config: &BacktestConfig,
    workers: usize,
    progress: &OptimizeProgress,
) -> EngineResult<Vec<OptimizationReport>> {
    StrategyFamily::all()
        .iter()
        .map(|&family| {
            let request = OptimizeRequest {
                backtest: config.clone(),
                workers: Some(workers),
                ..OptimizeRequest::new(family)
            };
            run_optimization(&request, series, progress)
        })
        .collect()
}
