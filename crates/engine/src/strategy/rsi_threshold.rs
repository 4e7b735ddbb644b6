use super::{mean, ParameterSpec, Signal, Strategy};
use crate::error::{EngineError, EngineResult};
use crate::params::StrategyParameters;
use crate::series::PriceSeries;

pub(super) const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec {
        name: "period",
        description: "Lookback window for average gains and losses",
        default: 14.0,
        min: 1.0,
        max: 200.0,
        integer: true,
    },
    ParameterSpec {
        name: "oversold",
        description: "Buy when RSI falls below this level",
        default: 30.0,
        min: 0.0,
        max: 100.0,
        integer: false,
    },
    ParameterSpec {
        name: "overbought",
        description: "Sell when RSI rises above this level",
        default: 70.0,
        min: 0.0,
        max: 100.0,
        integer: false,
    },
];

/// RSI oversold/overbought thresholds over a simple-average RSI
pub struct RsiThreshold {
    period: usize,
    oversold: f64,
    overbought: f64,
    parameters: StrategyParameters,
}

impl RsiThreshold {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> EngineResult<Self> {
        if period == 0 {
            return Err(EngineError::InvalidParameter {
                strategy: "RSI Strategy".to_string(),
                name: "period".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if oversold >= overbought {
            return Err(EngineError::InvalidParameter {
                strategy: "RSI Strategy".to_string(),
                name: "oversold".to_string(),
                reason: format!("{} must be below overbought ({})", oversold, overbought),
            });
        }

        Ok(Self {
            period,
            oversold,
            overbought,
            parameters: StrategyParameters::new()
                .with("period", period as f64)
                .with("oversold", oversold)
                .with("overbought", overbought),
        })
    }
}

/// RSI over the last `period` bar-to-bar changes of `prices`.
///
/// Returns 100 when there were no losses in the window.
pub(crate) fn calculate_rsi(prices: &[f64], period: usize) -> f64 {
    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let start = deltas.len().saturating_sub(period);
    let recent = &deltas[start..];

    let gains: Vec<f64> = recent.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = recent.iter().map(|d| (-d).max(0.0)).collect();

    let avg_gain = mean(&gains);
    let avg_loss = mean(&losses);

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

impl Strategy for RsiThreshold {
    fn name(&self) -> &str {
        "RSI Strategy"
    }

    fn parameters(&self) -> &StrategyParameters {
        &self.parameters
    }

    fn generate_signal(&self, series: &PriceSeries, index: usize) -> Signal {
        if index < self.period + 1 {
            return Signal::Hold;
        }

        let rsi = calculate_rsi(series.closes_before(index), self.period);

        if rsi < self.oversold {
            Signal::Buy
        } else if rsi > self.overbought {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}
