//! Strategy contract and registry
//!
//! A strategy answers one question: given the bars strictly before `index`,
//! should the portfolio buy, sell, or hold at `index`? Strategies are built
//! through [`build_strategy`] from a [`StrategyFamily`] and a parameter set,
//! so the runner and optimizer never name a concrete strategy type.

mod ema_crossover;
mod ma_crossover;
mod rsi_threshold;

pub use ema_crossover::EmaCrossover;
pub use ma_crossover::MaCrossover;
pub use rsi_threshold::RsiThreshold;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};
use crate::params::StrategyParameters;
use crate::series::PriceSeries;

// ============================================================================
// Core contract
// ============================================================================

/// Trading decision for one bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Buy => write!(f, "buy"),
            Signal::Sell => write!(f, "sell"),
            Signal::Hold => write!(f, "hold"),
        }
    }
}

/// Stateless signal generator.
///
/// `generate_signal(series, index)` must only read bars `[0, index)`.
/// Implementations hold no per-run state, which is what lets one instance be
/// shared across threads.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;
    fn parameters(&self) -> &StrategyParameters;
    fn generate_signal(&self, series: &PriceSeries, index: usize) -> Signal;
}

// ============================================================================
// Registry
// ============================================================================

/// Closed set of strategy families known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyFamily {
    MaCrossover,
    RsiThreshold,
    EmaCrossover,
}

impl StrategyFamily {
    pub fn all() -> &'static [StrategyFamily] {
        &[Self::MaCrossover, Self::RsiThreshold, Self::EmaCrossover]
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::MaCrossover => "ma_crossover",
            Self::RsiThreshold => "rsi_threshold",
            Self::EmaCrossover => "ema_crossover",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MaCrossover => "SMA Crossover",
            Self::RsiThreshold => "RSI Strategy",
            Self::EmaCrossover => "EMA Crossover",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::MaCrossover => {
                "Buy when the short SMA crosses above the long SMA, sell when it crosses below"
            }
            Self::RsiThreshold => "Buy when RSI drops below oversold, sell when it rises above overbought",
            Self::EmaCrossover => {
                "Buy when the fast EMA crosses above the slow EMA, sell when it crosses below"
            }
        }
    }

    pub fn parameter_specs(&self) -> &'static [ParameterSpec] {
        match self {
            Self::MaCrossover => ma_crossover::PARAMETERS,
            Self::RsiThreshold => rsi_threshold::PARAMETERS,
            Self::EmaCrossover => ema_crossover::PARAMETERS,
        }
    }

    /// Fill in defaults and range-check `params` against this family's specs.
    pub fn resolve(&self, params: &StrategyParameters) -> EngineResult<StrategyParameters> {
        let specs = self.parameter_specs();

        if let Some((name, _)) = params
            .iter()
            .find(|(name, _)| !specs.iter().any(|s| s.name == *name))
        {
            return Err(EngineError::InvalidParameter {
                strategy: self.display_name().to_string(),
                name: name.to_string(),
                reason: "not recognized".to_string(),
            });
        }

        let mut resolved = StrategyParameters::new();
        for spec in specs {
            let value = params.get(spec.name).unwrap_or(spec.default);
            spec.check(self.display_name(), value)?;
            resolved = resolved.with(spec.name, value);
        }
        Ok(resolved)
    }
}

impl std::fmt::Display for StrategyFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for StrategyFamily {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ma_crossover" | "sma_crossover" | "sma" => Ok(Self::MaCrossover),
            "rsi_threshold" | "rsi_oversold" | "rsi" => Ok(Self::RsiThreshold),
            "ema_crossover" | "ema" => Ok(Self::EmaCrossover),
            _ => Err(EngineError::UnknownStrategy(s.to_string())),
        }
    }
}

/// A named, documented, range-checked strategy parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    /// Whether the value must be a whole number (window lengths)
    pub integer: bool,
}

impl ParameterSpec {
    fn check(&self, strategy: &str, value: f64) -> EngineResult<()> {
        let invalid = |reason: String| EngineError::InvalidParameter {
            strategy: strategy.to_string(),
            name: self.name.to_string(),
            reason,
        };

        if !value.is_finite() {
            return Err(invalid(format!("{} is not a finite number", value)));
        }
        if value < self.min || value > self.max {
            return Err(invalid(format!(
                "{} is outside [{}, {}]",
                value, self.min, self.max
            )));
        }
        if self.integer && value.fract() != 0.0 {
            return Err(invalid(format!("{} must be a whole number", value)));
        }
        Ok(())
    }
}

/// Catalog entry describing one strategy family
#[derive(Debug, Clone, Serialize)]
pub struct StrategyCatalogEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ParameterSpec],
}

/// Every registered strategy family with its documented parameters
pub fn catalog() -> Vec<StrategyCatalogEntry> {
    StrategyFamily::all()
        .iter()
        .map(|family| StrategyCatalogEntry {
            id: family.id(),
            name: family.display_name(),
            description: family.description(),
            parameters: family.parameter_specs(),
        })
        .collect()
}

/// Build a fresh strategy instance for `family` from `params`.
///
/// Missing parameters take their documented default. Contradictory
/// combinations (e.g. short period not below long period) are rejected with
/// [`EngineError::InvalidParameter`].
pub fn build_strategy(
    family: StrategyFamily,
    params: &StrategyParameters,
) -> EngineResult<Box<dyn Strategy>> {
    let resolved = family.resolve(params)?;
    // resolve() guarantees every declared key is present
    let get = |name: &str| resolved.get(name).unwrap_or_default();

    let strategy: Box<dyn Strategy> = match family {
        StrategyFamily::MaCrossover => Box::new(MaCrossover::new(
            get("short_period") as usize,
            get("long_period") as usize,
        )?),
        StrategyFamily::RsiThreshold => Box::new(RsiThreshold::new(
            get("period") as usize,
            get("oversold"),
            get("overbought"),
        )?),
        StrategyFamily::EmaCrossover => Box::new(EmaCrossover::new(
            get("fast_period") as usize,
            get("slow_period") as usize,
        )?),
    };
    Ok(strategy)
}

// ============================================================================
// Helpers shared by the variants
// ============================================================================

/// Plain window mean. `ta`'s streaming SMA only yields the latest window, and
/// crossovers need the current and previous windows at the same index.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Golden cross → Buy, death cross → Sell
pub(crate) fn crossover_signal(fast: f64, slow: f64, prev_fast: f64, prev_slow: f64) -> Signal {
    if fast > slow && prev_fast <= prev_slow {
        Signal::Buy
    } else if fast < slow && prev_fast >= prev_slow {
        Signal::Sell
    } else {
        Signal::Hold
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_round_trips_through_id() {
        for family in StrategyFamily::all() {
            assert_eq!(family.id().parse::<StrategyFamily>().unwrap(), *family);
        }
        assert_eq!("SMA".parse::<StrategyFamily>().unwrap(), StrategyFamily::MaCrossover);
        assert!(matches!(
            "bollinger".parse::<StrategyFamily>(),
            Err(EngineError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let resolved = StrategyFamily::RsiThreshold
            .resolve(&StrategyParameters::new().with("period", 21.0))
            .unwrap();
        assert_eq!(resolved.get("period"), Some(21.0));
        assert_eq!(resolved.get("oversold"), Some(30.0));
        assert_eq!(resolved.get("overbought"), Some(70.0));
    }

    #[test]
    fn test_resolve_rejects_unknown_and_out_of_range() {
        let unknown = StrategyFamily::MaCrossover
            .resolve(&StrategyParameters::new().with("stop_loss", 5.0));
        assert!(matches!(unknown, Err(EngineError::InvalidParameter { .. })));

        let fractional = StrategyFamily::MaCrossover
            .resolve(&StrategyParameters::new().with("short_period", 2.5));
        assert!(fractional.is_err());

        let negative = StrategyFamily::RsiThreshold
            .resolve(&StrategyParameters::new().with("oversold", -1.0));
        assert!(negative.is_err());
    }

    #[test]
    fn test_build_strategy_rejects_contradictory_periods() {
        let params = StrategyParameters::new()
            .with("short_period", 30.0)
            .with("long_period", 30.0);
        assert!(build_strategy(StrategyFamily::MaCrossover, &params).is_err());
    }

    #[test]
    fn test_build_strategy_records_resolved_parameters() {
        let strategy =
            build_strategy(StrategyFamily::MaCrossover, &StrategyParameters::new()).unwrap();
        assert_eq!(strategy.name(), "SMA Crossover");
        assert_eq!(strategy.parameters().get("short_period"), Some(10.0));
        assert_eq!(strategy.parameters().get("long_period"), Some(30.0));
    }

    #[test]
    fn test_catalog_lists_every_family() {
        let entries = catalog();
        assert_eq!(entries.len(), StrategyFamily::all().len());
        assert!(entries.iter().all(|e| !e.parameters.is_empty()));
    }

    #[test]
    fn test_crossover_signal() {
        assert_eq!(crossover_signal(2.0, 1.0, 1.0, 1.0), Signal::Buy);
        assert_eq!(crossover_signal(1.0, 2.0, 1.0, 1.0), Signal::Sell);
        assert_eq!(crossover_signal(2.0, 1.0, 2.0, 1.0), Signal::Hold);
        assert_eq!(crossover_signal(1.0, 1.0, 0.0, 2.0), Signal::Hold);
    }
}
