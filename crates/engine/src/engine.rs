//! Bar-by-bar backtesting engine

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::metrics;
use crate::series::PriceSeries;
use crate::strategy::{Signal, Strategy};
use crate::types::*;

/// Portfolio state owned by a single backtest run
struct RunState {
    balance: Decimal,
    /// Units held; zero means flat
    position: Decimal,
    /// Only meaningful while `position > 0`
    entry_price: Decimal,
    trades: Vec<Trade>,
}

impl RunState {
    fn new(initial_balance: Decimal) -> Self {
        Self {
            balance: initial_balance,
            position: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            trades: Vec::new(),
        }
    }

    fn is_flat(&self) -> bool {
        self.position <= Decimal::ZERO
    }

    /// Apply a signal at bar `index`. Buy while holding and sell while flat are no-ops.
    fn apply(
        &mut self,
        signal: Signal,
        index: usize,
        bar: &PriceBar,
        invest_fraction: Decimal,
    ) -> EngineResult<()> {
        let price = bar.close;
        let overflow = || EngineError::Overflow { index };

        match signal {
            Signal::Buy if self.is_flat() => {
                let amount = invest_fraction
                    .checked_mul(self.balance)
                    .and_then(|v| v.checked_div(price))
                    .ok_or_else(overflow)?;
                let cost = amount.checked_mul(price).ok_or_else(overflow)?;
                self.position = amount;
                self.entry_price = price;
                self.balance -= cost;

                debug!(
                    price = %price,
                    amount = %amount,
                    time = bar.timestamp,
                    "Opened LONG position"
                );

                self.trades.push(Trade {
                    timestamp: bar.timestamp,
                    action: TradeAction::Buy,
                    price,
                    amount,
                    balance_after: self.balance,
                    position_value_after: cost,
                    profit_loss: None,
                });
            }
            Signal::Sell if !self.is_flat() => {
                let amount = self.position;
                let proceeds = amount.checked_mul(price).ok_or_else(overflow)?;
                self.balance = self.balance.checked_add(proceeds).ok_or_else(overflow)?;
                let profit_loss = (price - self.entry_price)
                    .checked_mul(amount)
                    .ok_or_else(overflow)?;

                debug!(
                    entry = %self.entry_price,
                    exit = %price,
                    pnl = %profit_loss,
                    "Closed position"
                );

                self.trades.push(Trade {
                    timestamp: bar.timestamp,
                    action: TradeAction::Sell,
                    price,
                    amount,
                    balance_after: self.balance,
                    position_value_after: Decimal::ZERO,
                    profit_loss: Some(profit_loss),
                });

                self.position = Decimal::ZERO;
                self.entry_price = Decimal::ZERO;
            }
            _ => {}
        }
        Ok(())
    }

    fn mark_to_market(&self, index: usize, price: Decimal) -> EngineResult<Decimal> {
        self.position
            .checked_mul(price)
            .and_then(|v| v.checked_add(self.balance))
            .ok_or(EngineError::Overflow { index })
    }
}

/// Backtesting engine that simulates bar-by-bar execution
pub struct BacktestEngine;

impl BacktestEngine {
    /// Replay `strategy` over `series` once, in timestamp order.
    ///
    /// An open position at the end of the series is valued at the last close
    /// but is not closed: `final_portfolio_value` includes it, the trade log
    /// does not.
    pub fn run(
        strategy: &dyn Strategy,
        series: &PriceSeries,
        config: &BacktestConfig,
    ) -> EngineResult<BacktestResult> {
        config.validate()?;

        debug!(
            strategy = strategy.name(),
            params = %strategy.parameters(),
            bars = series.len(),
            balance = %config.initial_balance,
            "Starting backtest"
        );

        let mut state = RunState::new(config.initial_balance);
        let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(series.len());

        for (index, bar) in series.bars().iter().enumerate() {
            let signal = strategy.generate_signal(series, index);
            state.apply(signal, index, bar, config.invest_fraction)?;

            equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                value: state.mark_to_market(index, bar.close)?,
            });
        }

        let final_portfolio_value = equity_curve
            .last()
            .map(|p| p.value)
            .unwrap_or(config.initial_balance);
        let summary = metrics::analyze(
            &state.trades,
            &equity_curve,
            config.initial_balance,
            final_portfolio_value,
        );

        info!(
            strategy = strategy.name(),
            params = %strategy.parameters(),
            trades = state.trades.len(),
            total_return_pct = %summary.total_return_pct,
            max_drawdown_pct = %summary.max_drawdown_pct,
            "Backtest complete"
        );

        Ok(BacktestResult {
            strategy_name: strategy.name().to_string(),
            parameters: strategy.parameters().clone(),
            start_time: series.first().timestamp,
            end_time: series.last().timestamp,
            initial_balance: config.initial_balance,
            final_portfolio_value,
            total_return_pct: summary.total_return_pct,
            sharpe_ratio: summary.sharpe_ratio,
            max_drawdown_pct: summary.max_drawdown_pct,
            win_rate_pct: summary.win_rate_pct,
            total_trades: state.trades.len() as u32,
            trades: state.trades,
            equity_curve,
        })
    }
}
