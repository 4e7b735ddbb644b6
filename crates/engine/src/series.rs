//! Validated, immutable price series

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::types::PriceBar;

/// An ordered, non-empty sequence of bars with strictly increasing timestamps.
///
/// Closes are cached as `f64` once at construction so indicator code can
/// slice them without converting per call. The series is never mutated after
/// construction, so it can be shared by reference across optimizer workers.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
    closes: Vec<f64>,
}

impl PriceSeries {
    pub fn new(bars: Vec<PriceBar>) -> EngineResult<Self> {
        if bars.is_empty() {
            return Err(EngineError::EmptySeries);
        }

        for (index, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(EngineError::NonIncreasingTimestamp {
                    index: index + 1,
                    previous: pair[0].timestamp,
                    current: pair[1].timestamp,
                });
            }
        }

        if let Some(index) = bars.iter().position(|b| b.close <= Decimal::ZERO) {
            return Err(EngineError::InvalidPrice { index });
        }

        let closes = bars
            .iter()
            .map(|b| b.close.to_f64().unwrap_or(0.0))
            .collect();

        Ok(Self { bars, closes })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn first(&self) -> &PriceBar {
        &self.bars[0]
    }

    pub fn last(&self) -> &PriceBar {
        &self.bars[self.bars.len() - 1]
    }

    /// Closes of bars `[0, index)`: everything a strategy may see at `index`.
    pub fn closes_before(&self, index: usize) -> &[f64] {
        &self.closes[..index.min(self.closes.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(timestamp: i64, close: Decimal) -> PriceBar {
        PriceBar {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
        }
    }

    #[test]
    fn test_rejects_empty_series() {
        assert_eq!(PriceSeries::new(vec![]).unwrap_err(), EngineError::EmptySeries);
    }

    #[test]
    fn test_rejects_duplicate_timestamps() {
        let err = PriceSeries::new(vec![bar(0, dec!(1)), bar(60, dec!(1)), bar(60, dec!(2))])
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::NonIncreasingTimestamp {
                index: 2,
                previous: 60,
                current: 60,
            }
        );
    }

    #[test]
    fn test_rejects_non_positive_close() {
        let err = PriceSeries::new(vec![bar(0, dec!(1)), bar(1, Decimal::ZERO)]).unwrap_err();
        assert_eq!(err, EngineError::InvalidPrice { index: 1 });
    }

    #[test]
    fn test_closes_before_excludes_current_bar() {
        let series =
            PriceSeries::new(vec![bar(0, dec!(1)), bar(1, dec!(2)), bar(2, dec!(3))]).unwrap();
        assert_eq!(series.closes_before(0), &[] as &[f64]);
        assert_eq!(series.closes_before(2), &[1.0, 2.0]);
        assert_eq!(series.closes_before(10), &[1.0, 2.0, 3.0]);
        assert_eq!(series.last().close, dec!(3));
    }
}
