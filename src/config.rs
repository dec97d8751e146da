//! Study and trial configuration with fail-fast validation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{RaschSimError, Result};

/// True generating parameters for one side of the model (items or persons).
///
/// `Auto` obliges the simulator to draw its own values and return them, so
/// downstream coverage accounting always has ground truth to compare against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrueParams {
    Manual(Vec<f64>),
    Auto,
}

impl TrueParams {
    /// Check a manual vector against the expected count.
    pub fn validate(&self, what: &'static str, expected: usize) -> Result<()> {
        if let TrueParams::Manual(values) = self {
            if values.len() != expected {
                return Err(RaschSimError::LengthMismatch {
                    what,
                    expected,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }
}

/// Configuration of a single simulate-and-fit trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialConfig {
    pub n_persons: usize,
    pub k_items: usize,
    pub diffs: TrueParams,
    pub abilities: TrueParams,
}

impl TrialConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_persons == 0 {
            return Err(RaschSimError::InvalidCount { what: "n_persons" });
        }
        if self.k_items == 0 {
            return Err(RaschSimError::InvalidCount { what: "k_items" });
        }
        self.diffs.validate("item difficulties", self.k_items)?;
        self.abilities.validate("person abilities", self.n_persons)?;
        Ok(())
    }
}

/// Configuration of a whole simulation study.
///
/// `seed` is the study-level base seed; trial `t` derives its own generator
/// from `seed + t`, which keeps trials statistically independent while making
/// the whole study reproducible. `misspecified_items` is only consulted by the
/// fit-diagnostics study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    pub n_trials: usize,
    pub trial: TrialConfig,
    pub misspecified_items: Vec<usize>,
    pub seed: u64,
}

impl StudyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_trials == 0 {
            return Err(RaschSimError::InvalidCount { what: "n_trials" });
        }
        self.trial.validate()?;
        let mut seen = HashSet::new();
        for &index in &self.misspecified_items {
            if index >= self.trial.k_items {
                return Err(RaschSimError::ItemIndexOutOfRange {
                    index,
                    k_items: self.trial.k_items,
                });
            }
            if !seen.insert(index) {
                return Err(RaschSimError::DuplicateItemIndex { index });
            }
        }
        Ok(())
    }
}
