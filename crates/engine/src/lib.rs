//! Tradelab Engine: backtesting and parameter optimization
//!
//! Deterministic, in-memory simulation of a single-asset, long-only
//! portfolio over an already-materialized price series.
//! Provides:
//! - Strategy registry (SMA crossover, RSI thresholds, EMA crossover)
//! - Bar-by-bar backtest runner with a per-bar mark-to-market curve
//! - Performance metrics (return, Sharpe, max drawdown, win rate)
//! - Grid-search optimizer with optional worker threads and cancellation

pub mod engine;
pub mod error;
pub mod metrics;
pub mod optimizer;
pub mod params;
pub mod series;
pub mod strategy;
pub mod types;

// Re-exports for convenience
pub use engine::BacktestEngine;
pub use error::{EngineError, EngineResult};
pub use metrics::{analyze, PerformanceMetrics};
pub use optimizer::{
    default_grid, run_all_families, run_grid, run_optimization, OptimizationReport,
    OptimizeProgress, OptimizeRequest, OptimizeStatus, RankedResult,
};
pub use params::{GridAxis, ParameterGrid, StrategyParameters};
pub use series::PriceSeries;
pub use strategy::{
    build_strategy, catalog, ParameterSpec, Signal, Strategy, StrategyCatalogEntry,
    StrategyFamily,
};
pub use types::*;
