//! Single simulate-and-fit trials for coverage and fit-diagnostics studies.

use ndarray::Array2;
use rand::prelude::*;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::config::TrialConfig;
use crate::error::{RaschSimError, Result};
use crate::estimation::Estimator;
use crate::simulation::Simulator;

/// z-quantile of the 95% Wald interval.
const WALD_Z: f64 = 1.96;

/// Corruption draws come from their own stream, so columns the corruption does
/// not touch stay byte-identical to an uncorrupted simulation under the same
/// seed.
const CORRUPTION_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

/// One coverage trial's output, item-ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub estimates: Vec<f64>,
    pub ses: Vec<f64>,
    /// Whether each item's 95% Wald interval contains its true difficulty.
    pub covered: Vec<bool>,
}

/// One fit-diagnostics trial's output: extremal fit mean-squares across items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitStatRow {
    pub min_infit_ms: f64,
    pub min_outfit_ms: f64,
    pub max_infit_ms: f64,
    pub max_outfit_ms: f64,
}

/// Run one simulate-and-fit coverage trial.
///
/// Simulates a dataset under the configured truth, fits the estimator, and
/// flags per item whether the 95% Wald interval around the estimate contains
/// the realized true difficulty. Pure function of `(inputs, seed)`; safe to
/// execute in any worker.
pub fn run_trial<S, E>(
    simulator: &S,
    estimator: &E,
    cfg: &TrialConfig,
    seed: u64,
) -> Result<TrialResult>
where
    S: Simulator + ?Sized,
    E: Estimator + ?Sized,
{
    cfg.validate()?;

    let data = simulator.simulate(cfg.k_items, cfg.n_persons, &cfg.diffs, &cfg.abilities, seed)?;
    let stats = estimator.fit(&data.scores)?;
    if stats.len() != cfg.k_items {
        return Err(RaschSimError::LengthMismatch {
            what: "item estimates",
            expected: cfg.k_items,
            actual: stats.len(),
        });
    }

    let mut estimates = Vec::with_capacity(cfg.k_items);
    let mut ses = Vec::with_capacity(cfg.k_items);
    let mut covered = Vec::with_capacity(cfg.k_items);

    for (item, truth) in stats.iter().zip(&data.diffs) {
        let lower = item.difficulty - WALD_Z * item.se;
        let upper = item.difficulty + WALD_Z * item.se;
        estimates.push(item.difficulty);
        ses.push(item.se);
        covered.push(lower < *truth && upper > *truth);
    }

    Ok(TrialResult {
        estimates,
        ses,
        covered,
    })
}

/// Run one fit-diagnostics trial, optionally corrupting listed items.
///
/// Each index in `misspecified` has its entire response column overwritten
/// with independent random binary draws after simulation, severing any
/// relation to the generating ability/difficulty structure; all other columns
/// are left untouched. With an empty list this is an uncorrupted trial.
pub fn run_fit_trial<S, E>(
    simulator: &S,
    estimator: &E,
    cfg: &TrialConfig,
    misspecified: &[usize],
    seed: u64,
) -> Result<FitStatRow>
where
    S: Simulator + ?Sized,
    E: Estimator + ?Sized,
{
    cfg.validate()?;
    for &index in misspecified {
        if index >= cfg.k_items {
            return Err(RaschSimError::ItemIndexOutOfRange {
                index,
                k_items: cfg.k_items,
            });
        }
    }

    let mut data =
        simulator.simulate(cfg.k_items, cfg.n_persons, &cfg.diffs, &cfg.abilities, seed)?;
    corrupt_items(&mut data.scores, misspecified, seed);

    let stats = estimator.fit(&data.scores)?;

    let mut row = FitStatRow {
        min_infit_ms: f64::INFINITY,
        min_outfit_ms: f64::INFINITY,
        max_infit_ms: f64::NEG_INFINITY,
        max_outfit_ms: f64::NEG_INFINITY,
    };
    for item in &stats {
        row.min_infit_ms = row.min_infit_ms.min(item.infit_ms);
        row.min_outfit_ms = row.min_outfit_ms.min(item.outfit_ms);
        row.max_infit_ms = row.max_infit_ms.max(item.infit_ms);
        row.max_outfit_ms = row.max_outfit_ms.max(item.outfit_ms);
    }

    Ok(row)
}

fn corrupt_items(scores: &mut Array2<i32>, items: &[usize], seed: u64) {
    if items.is_empty() {
        return;
    }
    let mut rng = Pcg64::seed_from_u64(seed ^ CORRUPTION_STREAM);
    for &j in items {
        for cell in scores.column_mut(j).iter_mut() {
            *cell = rng.random_range(0..2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrueParams;
    use crate::estimation::{ItemStats, MmlEstimator};
    use crate::simulation::{SimulatedData, SlmSimulator};

    struct FixedEstimator {
        stats: Vec<ItemStats>,
    }

    impl Estimator for FixedEstimator {
        fn fit(&self, _scores: &Array2<i32>) -> Result<Vec<ItemStats>> {
            Ok(self.stats.clone())
        }
    }

    struct FixedSimulator {
        diffs: Vec<f64>,
    }

    impl Simulator for FixedSimulator {
        fn simulate(
            &self,
            k_items: usize,
            n_persons: usize,
            _diffs: &TrueParams,
            _abilities: &TrueParams,
            _seed: u64,
        ) -> Result<SimulatedData> {
            Ok(SimulatedData {
                scores: Array2::zeros((n_persons, k_items)),
                diffs: self.diffs.clone(),
                abilities: vec![0.0; n_persons],
            })
        }
    }

    fn cfg(n_persons: usize, k_items: usize) -> TrialConfig {
        TrialConfig {
            n_persons,
            k_items,
            diffs: TrueParams::Auto,
            abilities: TrueParams::Auto,
        }
    }

    #[test]
    fn coverage_flags_follow_the_wald_interval() {
        let simulator = FixedSimulator {
            diffs: vec![0.05, 0.5, -0.15],
        };
        let estimator = FixedEstimator {
            stats: vec![
                ItemStats { difficulty: 0.0, se: 0.1, infit_ms: 1.0, outfit_ms: 1.0 };
                3
            ],
        };
        let result = run_trial(&simulator, &estimator, &cfg(10, 3), 0).unwrap();
        // interval is (-0.196, 0.196)
        assert_eq!(result.covered, vec![true, false, true]);
        assert_eq!(result.estimates, vec![0.0; 3]);
        assert_eq!(result.ses, vec![0.1; 3]);
    }

    #[test]
    fn result_vectors_match_item_count() {
        let result = run_trial(&SlmSimulator, &MmlEstimator::default(), &cfg(250, 4), 5).unwrap();
        assert_eq!(result.estimates.len(), 4);
        assert_eq!(result.ses.len(), 4);
        assert_eq!(result.covered.len(), 4);
        assert!(result.ses.iter().all(|&se| se > 0.0));
    }

    #[test]
    fn estimator_length_contract_is_enforced() {
        let estimator = FixedEstimator {
            stats: vec![ItemStats { difficulty: 0.0, se: 0.1, infit_ms: 1.0, outfit_ms: 1.0 }],
        };
        assert!(matches!(
            run_trial(&SlmSimulator, &estimator, &cfg(10, 3), 0),
            Err(RaschSimError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn corruption_touches_only_listed_columns() {
        let sim = SlmSimulator;
        let clean = sim
            .simulate(6, 150, &TrueParams::Auto, &TrueParams::Auto, 77)
            .unwrap();
        let mut corrupted = clean.scores.clone();
        corrupt_items(&mut corrupted, &[1, 4], 77);

        for j in [0, 2, 3, 5] {
            assert_eq!(corrupted.column(j), clean.scores.column(j), "column {j}");
        }
        assert_ne!(corrupted.column(1), clean.scores.column(1));
        assert_ne!(corrupted.column(4), clean.scores.column(4));
        assert!(corrupted.iter().all(|&s| s == 0 || s == 1));
    }

    #[test]
    fn empty_misspecification_is_an_uncorrupted_trial() {
        let estimator = MmlEstimator::default();
        let row = run_fit_trial(&SlmSimulator, &estimator, &cfg(300, 5), &[], 31).unwrap();

        let data = SlmSimulator
            .simulate(5, 300, &TrueParams::Auto, &TrueParams::Auto, 31)
            .unwrap();
        let stats = estimator.fit(&data.scores).unwrap();
        let expected_max = stats.iter().map(|s| s.outfit_ms).fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(row.max_outfit_ms, expected_max);
        assert!(row.min_infit_ms <= row.max_infit_ms);
        assert!(row.min_outfit_ms <= row.max_outfit_ms);
    }

    #[test]
    fn out_of_range_misspecified_index_is_rejected() {
        assert!(matches!(
            run_fit_trial(&SlmSimulator, &MmlEstimator::default(), &cfg(50, 3), &[3], 0),
            Err(RaschSimError::ItemIndexOutOfRange { index: 3, k_items: 3 })
        ));
    }
}
