//! Strategy parameters and parameter grids

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable name → value mapping fixed when a strategy is constructed.
///
/// Keys are kept sorted so two parameter sets with the same entries compare
/// and serialize identically regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParameters(BTreeMap<String, f64>);

impl StrategyParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builder-style insert; consumes and returns a new set.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for StrategyParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// One named dimension of a grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub name: String,
    pub values: Vec<f64>,
}

/// Caller-supplied enumeration of parameter values for one strategy family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub axes: Vec<GridAxis>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an axis. Axis order determines enumeration order.
    pub fn axis(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        let name = name.into();
        match self.axes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.values = values,
            None => self.axes.push(GridAxis { name, values }),
        }
        self
    }

    /// Raw size of the Cartesian product, before any filtering.
    /// Saturates at `usize::MAX`.
    pub fn len(&self) -> usize {
        self.axes
            .iter()
            .fold(1usize, |acc, a| acc.saturating_mul(a.values.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product, first axis outermost. Deterministic for a given grid.
    pub fn combinations(&self) -> Vec<StrategyParameters> {
        let mut out = vec![StrategyParameters::new()];
        for axis in &self.axes {
            let mut next = Vec::with_capacity(out.len() * axis.values.len());
            for base in &out {
                for &value in &axis.values {
                    next.push(base.clone().with(axis.name.clone(), value));
                }
            }
            out = next;
        }
        out
    }
}
