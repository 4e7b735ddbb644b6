//! Performance metrics for a single backtest run
//!
//! Pure functions of the trade log and the per-bar mark-to-market curve.
//! Degenerate inputs (no trades, zero dispersion) produce defined values,
//! never NaN or infinity.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{EquityPoint, Trade};

/// Summary statistics for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return_pct: Decimal,
    pub sharpe_ratio: Decimal,
    /// Largest peak-to-trough decline, always ≤ 0
    pub max_drawdown_pct: Decimal,
    /// Share of realized trades with positive profit, in [0, 100]
    pub win_rate_pct: Decimal,
}

pub fn analyze(
    trades: &[Trade],
    equity_curve: &[EquityPoint],
    initial_balance: Decimal,
    final_portfolio_value: Decimal,
) -> PerformanceMetrics {
    PerformanceMetrics {
        total_return_pct: total_return_pct(initial_balance, final_portfolio_value),
        sharpe_ratio: sharpe_ratio(trades, initial_balance),
        max_drawdown_pct: max_drawdown_pct(equity_curve),
        win_rate_pct: win_rate_pct(trades),
    }
}

/// Profit/loss of each sell, in trade order
pub fn realized_pnl(trades: &[Trade]) -> impl Iterator<Item = Decimal> + '_ {
    trades.iter().filter_map(|t| t.profit_loss)
}

pub fn total_return_pct(initial_balance: Decimal, final_portfolio_value: Decimal) -> Decimal {
    if initial_balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    // Saturates at the Decimal range for absurdly small principals
    (final_portfolio_value - initial_balance)
        .checked_div(initial_balance)
        .and_then(|r| r.checked_mul(dec!(100)))
        .unwrap_or(if final_portfolio_value > initial_balance {
            Decimal::MAX
        } else {
            Decimal::MIN
        })
}

/// Mean over standard deviation of realized returns (`profit_loss / initial_balance`).
///
/// Unannualized, population standard deviation. Fewer than two realized
/// trades or zero dispersion yield 0.
pub fn sharpe_ratio(trades: &[Trade], initial_balance: Decimal) -> Decimal {
    if initial_balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let returns: Vec<f64> = realized_pnl(trades)
        .map(|pl| {
            pl.to_f64().unwrap_or(0.0) / initial_balance.to_f64().unwrap_or(1.0)
        })
        .collect();

    if returns.len() < 2 {
        return Decimal::ZERO;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return Decimal::ZERO;
    }

    let sharpe = mean / std_dev;
    if !sharpe.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(sharpe).unwrap_or(Decimal::ZERO)
}

/// Minimum of `(value - running_peak) / running_peak`, as a percentage
pub fn max_drawdown_pct(equity_curve: &[EquityPoint]) -> Decimal {
    let mut peak: Option<Decimal> = None;
    let mut worst = Decimal::ZERO;

    for point in equity_curve {
        let current_peak = match peak {
            Some(p) if p >= point.value => p,
            _ => point.value,
        };
        peak = Some(current_peak);

        if current_peak > Decimal::ZERO {
            let drawdown = (point.value - current_peak) / current_peak;
            if drawdown < worst {
                worst = drawdown;
            }
        }
    }

    worst * dec!(100)
}

pub fn win_rate_pct(trades: &[Trade]) -> Decimal {
    let (wins, closed) = realized_pnl(trades).fold((0u32, 0u32), |(wins, closed), pl| {
        (wins + u32::from(pl > Decimal::ZERO), closed + 1)
    });

    if closed == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(wins) / Decimal::from(closed) * dec!(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeAction;

    fn sell(profit_loss: Decimal) -> Trade {
        Trade {
            timestamp: 0,
            action: TradeAction::Sell,
            price: dec!(100),
            amount: dec!(1),
            balance_after: dec!(10000),
            position_value_after: Decimal::ZERO,
            profit_loss: Some(profit_loss),
        }
    }

    fn buy() -> Trade {
        Trade {
            timestamp: 0,
            action: TradeAction::Buy,
            price: dec!(100),
            amount: dec!(1),
            balance_after: dec!(9900),
            position_value_after: dec!(100),
            profit_loss: None,
        }
    }

    fn curve(values: &[Decimal]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| EquityPoint {
                timestamp: i as i64,
                value,
            })
            .collect()
    }

    #[test]
    fn test_realized_pnl_skips_open_legs() {
        let trades = vec![buy(), sell(dec!(50)), buy()];
        let pnl: Vec<Decimal> = realized_pnl(&trades).collect();
        assert_eq!(pnl, vec![dec!(50)]);
    }

    #[test]
    fn test_total_return() {
        assert_eq!(total_return_pct(dec!(10000), dec!(12500)), dec!(25));
        assert_eq!(total_return_pct(dec!(10000), dec!(9000)), dec!(-10));
        assert_eq!(total_return_pct(dec!(10000), dec!(10000)), Decimal::ZERO);
    }

    #[test]
    fn test_sharpe_needs_two_realized_trades() {
        let trades = vec![buy(), sell(dec!(100))];
        assert_eq!(sharpe_ratio(&trades, dec!(10000)), Decimal::ZERO);
    }

    #[test]
    fn test_sharpe_zero_dispersion_is_zero() {
        let trades = vec![buy(), sell(dec!(100)), buy(), sell(dec!(100))];
        assert_eq!(sharpe_ratio(&trades, dec!(10000)), Decimal::ZERO);
    }

    #[test]
    fn test_sharpe_ignores_buys() {
        // Returns 0.03 and 0.01: mean 0.02, population std 0.01
        let trades = vec![buy(), sell(dec!(300)), buy(), sell(dec!(100))];
        let sharpe = sharpe_ratio(&trades, dec!(10000)).to_f64().unwrap();
        assert!((sharpe - 2.0).abs() < 1e-9, "sharpe was {}", sharpe);
    }

    #[test]
    fn test_max_drawdown_uses_running_peak() {
        let values = curve(&[
            dec!(10000),
            dec!(12000),
            dec!(9000),
            dec!(11000),
            dec!(13000),
            dec!(12350),
        ]);
        // Worst: 9000 against a 12000 peak
        assert_eq!(max_drawdown_pct(&values), dec!(-25));
    }

    #[test]
    fn test_max_drawdown_monotonic_curve_is_zero() {
        let values = curve(&[dec!(1), dec!(2), dec!(3)]);
        assert_eq!(max_drawdown_pct(&values), Decimal::ZERO);
        assert_eq!(max_drawdown_pct(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_win_rate() {
        let trades = vec![
            buy(),
            sell(dec!(50)),
            buy(),
            sell(dec!(-20)),
            buy(),
            sell(Decimal::ZERO),
            buy(),
            sell(dec!(10)),
        ];
        assert_eq!(win_rate_pct(&trades), dec!(50));
        assert_eq!(win_rate_pct(&[buy()]), Decimal::ZERO);
    }
}
