//! Types for the backtesting engine

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::params::StrategyParameters;

/// A single candlestick (OHLCV). Strategies only read `close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Unix milliseconds, strictly increasing across a series
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Configuration for a backtest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Starting cash balance (default: 10,000)
    pub initial_balance: Decimal,
    /// Fraction of the cash balance invested on each buy (default: 0.95)
    pub invest_fraction: Decimal,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
            invest_fraction: dec!(0.95),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.initial_balance <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig(format!(
                "initial_balance must be positive, got {}",
                self.initial_balance
            )));
        }
        if self.invest_fraction <= Decimal::ZERO || self.invest_fraction > Decimal::ONE {
            return Err(EngineError::InvalidConfig(format!(
                "invest_fraction must be in (0, 1], got {}",
                self.invest_fraction
            )));
        }
        Ok(())
    }
}

/// Side of an executed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// A single trade executed during a backtest. Appended once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: i64,
    pub action: TradeAction,
    pub price: Decimal,
    /// Units of the asset bought or sold
    pub amount: Decimal,
    /// Cash balance after the trade settled
    pub balance_after: Decimal,
    /// Value of the open position after the trade (0 after a sell)
    pub position_value_after: Decimal,
    /// Realized profit/loss, present only on sells
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_loss: Option<Decimal>,
}

/// A point on the mark-to-market value curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub value: Decimal,
}

/// Result of one completed backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub parameters: StrategyParameters,
    pub start_time: i64,
    pub end_time: i64,
    pub initial_balance: Decimal,
    pub final_portfolio_value: Decimal,
    pub total_return_pct: Decimal,
    pub sharpe_ratio: Decimal,
    pub max_drawdown_pct: Decimal,
    pub win_rate_pct: Decimal,
    pub total_trades: u32,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}
