use ta::indicators::ExponentialMovingAverage;
use ta::Next;

use super::{crossover_signal, ParameterSpec, Signal, Strategy};
use crate::error::{EngineError, EngineResult};
use crate::params::StrategyParameters;
use crate::series::PriceSeries;

pub(super) const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec {
        name: "fast_period",
        description: "Bars in the fast exponential moving average",
        default: 12.0,
        min: 1.0,
        max: 200.0,
        integer: true,
    },
    ParameterSpec {
        name: "slow_period",
        description: "Bars in the slow exponential moving average",
        default: 26.0,
        min: 2.0,
        max: 500.0,
        integer: true,
    },
];

/// Exponential moving average crossover.
///
/// The EMAs are rebuilt from the first bar on every call, so the signal at
/// `index` is a pure function of `close[0..index)`.
pub struct EmaCrossover {
    fast_period: usize,
    slow_period: usize,
    parameters: StrategyParameters,
}

impl EmaCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> EngineResult<Self> {
        let invalid = |name: &str, reason: String| EngineError::InvalidParameter {
            strategy: "EMA Crossover".to_string(),
            name: name.to_string(),
            reason,
        };

        if fast_period >= slow_period {
            return Err(invalid(
                "fast_period",
                format!("{} must be below slow_period ({})", fast_period, slow_period),
            ));
        }
        ExponentialMovingAverage::new(fast_period)
            .map_err(|e| invalid("fast_period", format!("{:?}", e)))?;
        ExponentialMovingAverage::new(slow_period)
            .map_err(|e| invalid("slow_period", format!("{:?}", e)))?;

        Ok(Self {
            fast_period,
            slow_period,
            parameters: StrategyParameters::new()
                .with("fast_period", fast_period as f64)
                .with("slow_period", slow_period as f64),
        })
    }
}

impl Strategy for EmaCrossover {
    fn name(&self) -> &str {
        "EMA Crossover"
    }

    fn parameters(&self) -> &StrategyParameters {
        &self.parameters
    }

    fn generate_signal(&self, series: &PriceSeries, index: usize) -> Signal {
        if index <= self.slow_period {
            return Signal::Hold;
        }

        // Periods were validated in new()
        let (Ok(mut ema_fast), Ok(mut ema_slow)) = (
            ExponentialMovingAverage::new(self.fast_period),
            ExponentialMovingAverage::new(self.slow_period),
        ) else {
            return Signal::Hold;
        };

        let mut prev = (0.0, 0.0);
        let mut current = (0.0, 0.0);
        for &close in series.closes_before(index) {
            prev = current;
            current = (ema_fast.next(close), ema_slow.next(close));
        }

        crossover_signal(current.0, current.1, prev.0, prev.1)
    }
}
