use super::{crossover_signal, mean, ParameterSpec, Signal, Strategy};
use crate::error::{EngineError, EngineResult};
use crate::params::StrategyParameters;
use crate::series::PriceSeries;

pub(super) const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec {
        name: "short_period",
        description: "Bars in the short simple moving average",
        default: 10.0,
        min: 1.0,
        max: 200.0,
        integer: true,
    },
    ParameterSpec {
        name: "long_period",
        description: "Bars in the long simple moving average",
        default: 30.0,
        min: 2.0,
        max: 500.0,
        integer: true,
    },
];

/// Simple moving average crossover
pub struct MaCrossover {
    short_period: usize,
    long_period: usize,
    parameters: StrategyParameters,
}

impl MaCrossover {
    pub fn new(short_period: usize, long_period: usize) -> EngineResult<Self> {
        if short_period == 0 || short_period >= long_period {
            return Err(EngineError::InvalidParameter {
                strategy: "SMA Crossover".to_string(),
                name: "short_period".to_string(),
                reason: format!(
                    "must be at least 1 and below long_period ({} vs {})",
                    short_period, long_period
                ),
            });
        }

        Ok(Self {
            short_period,
            long_period,
            parameters: StrategyParameters::new()
                .with("short_period", short_period as f64)
                .with("long_period", long_period as f64),
        })
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "SMA Crossover"
    }

    fn parameters(&self) -> &StrategyParameters {
        &self.parameters
    }

    fn generate_signal(&self, series: &PriceSeries, index: usize) -> Signal {
        // The previous-bar long window needs one bar more than the current one
        if index <= self.long_period {
            return Signal::Hold;
        }

        let closes = series.closes_before(index);
        let prev = &closes[..index - 1];

        let short_ma = mean(&closes[index - self.short_period..]);
        let long_ma = mean(&closes[index - self.long_period..]);
        let prev_short_ma = mean(&prev[index - 1 - self.short_period..]);
        let prev_long_ma = mean(&prev[index - 1 - self.long_period..]);

        crossover_signal(short_ma, long_ma, prev_short_ma, prev_long_ma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::make_series;

    #[test]
    fn test_holds_without_enough_history() {
        let strategy = MaCrossover::new(2, 4).unwrap();
        let series = make_series(&[100.0, 90.0, 80.0, 70.0, 200.0, 300.0]);
        for i in 0..=4 {
            assert_eq!(strategy.generate_signal(&series, i), Signal::Hold);
        }
    }

    #[test]
    fn test_golden_and_death_cross_fire_once() {
        let strategy = MaCrossover::new(2, 4).unwrap();
        // Flat, then a jump up (golden cross), then a collapse (death cross)
        let prices = [
            100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 120.0, 120.0, 120.0, 120.0, 120.0, 120.0,
            80.0, 80.0, 80.0, 80.0, 80.0, 80.0,
        ];
        let series = make_series(&prices);

        let signals: Vec<Signal> = (0..series.len())
            .map(|i| strategy.generate_signal(&series, i))
            .collect();

        // The jump lands at bar 6, so the first window that sees it is index 7
        assert_eq!(signals[7], Signal::Buy);
        // The drop lands at bar 12, visible from index 13
        assert_eq!(signals[13], Signal::Sell);
        let non_hold = signals.iter().filter(|s| **s != Signal::Hold).count();
        assert_eq!(non_hold, 2);
    }

    #[test]
    fn test_rejects_short_not_below_long() {
        assert!(MaCrossover::new(20, 20).is_err());
        assert!(MaCrossover::new(0, 20).is_err());
        assert!(MaCrossover::new(5, 20).is_ok());
    }
}
