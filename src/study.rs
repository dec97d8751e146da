//! Study-level aggregation: parallel trial dispatch and result reduction.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::config::StudyConfig;
use crate::error::Result;
use crate::estimation::Estimator;
use crate::simulation::Simulator;
use crate::trial::{run_fit_trial, run_trial, FitStatRow, TrialResult};
use crate::utils::{column_means, column_sds};

/// Reduction over all coverage trials of a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySummary {
    pub n_trials: usize,
    /// Per-item mean of the difficulty estimates across trials.
    pub mean_estimate: Vec<f64>,
    /// Per-item sample standard deviation of the estimates across trials
    /// (empirical sampling variability).
    pub sd_estimate: Vec<f64>,
    /// Per-item mean of the reported standard errors.
    pub mean_se: Vec<f64>,
    /// Per-item fraction of trials whose 95% interval covered the truth.
    pub coverage: Vec<f64>,
}

/// Run `n_trials` independent coverage trials in parallel and reduce them.
///
/// Trial `t` uses seed `cfg.seed + t`, so trials draw from independent random
/// streams while the study as a whole is reproducible. Any trial failure
/// aborts the study; no partial summary is returned.
pub fn run_coverage_study<S: Simulator, E: Estimator>(
    simulator: &S,
    estimator: &E,
    cfg: &StudyConfig,
) -> Result<StudySummary> {
    cfg.validate()?;
    let started = Instant::now();
    info!(
        n_trials = cfg.n_trials,
        n_persons = cfg.trial.n_persons,
        k_items = cfg.trial.k_items,
        "running coverage study"
    );

    let results: Vec<TrialResult> = (0..cfg.n_trials)
        .into_par_iter()
        .map(|t| run_trial(simulator, estimator, &cfg.trial, cfg.seed + t as u64))
        .collect::<Result<Vec<_>>>()?;

    let summary = summarize_trials(&results);
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "coverage study complete"
    );
    Ok(summary)
}

/// Run `n_trials` independent fit-diagnostics trials in parallel.
///
/// The reduction is a plain concatenation in trial order; downstream analysis
/// interprets the distribution of extremal fit statistics.
pub fn run_fit_study<S: Simulator, E: Estimator>(
    simulator: &S,
    estimator: &E,
    cfg: &StudyConfig,
) -> Result<Vec<FitStatRow>> {
    cfg.validate()?;
    let started = Instant::now();
    info!(
        n_trials = cfg.n_trials,
        n_persons = cfg.trial.n_persons,
        k_items = cfg.trial.k_items,
        misspecified = cfg.misspecified_items.len(),
        "running fit study"
    );

    let rows: Vec<FitStatRow> = (0..cfg.n_trials)
        .into_par_iter()
        .map(|t| {
            run_fit_trial(
                simulator,
                estimator,
                &cfg.trial,
                &cfg.misspecified_items,
                cfg.seed + t as u64,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "fit study complete"
    );
    Ok(rows)
}

/// Reduce a set of trial results into study-level statistics.
///
/// The reduction is commutative: elementwise mean, sample standard deviation,
/// and coverage rate depend only on the multiset of results, not on the order
/// trials finished in. All results must carry the same item count.
pub fn summarize_trials(results: &[TrialResult]) -> StudySummary {
    let n_trials = results.len();
    let k_items = results.first().map_or(0, |r| r.estimates.len());

    let mut estimates = Array2::zeros((n_trials, k_items));
    let mut ses = Array2::zeros((n_trials, k_items));
    let mut coverage_counts = vec![0usize; k_items];

    for (t, result) in results.iter().enumerate() {
        for j in 0..k_items {
            estimates[[t, j]] = result.estimates[j];
            ses[[t, j]] = result.ses[j];
            if result.covered[j] {
                coverage_counts[j] += 1;
            }
        }
    }

    StudySummary {
        n_trials,
        mean_estimate: column_means(&estimates.view()),
        sd_estimate: column_sds(&estimates.view()),
        mean_se: column_means(&ses.view()),
        coverage: coverage_counts
            .iter()
            .map(|&c| c as f64 / n_trials as f64)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TrialConfig, TrueParams};
    use crate::error::RaschSimError;
    use crate::estimation::ItemStats;
    use crate::simulation::SlmSimulator;

    fn result(estimates: Vec<f64>, ses: Vec<f64>, covered: Vec<bool>) -> TrialResult {
        TrialResult {
            estimates,
            ses,
            covered,
        }
    }

    #[test]
    fn summary_is_invariant_under_trial_order() {
        // Dyadic values keep the floating-point sums exact under reordering.
        let results = vec![
            result(vec![0.5, 1.0], vec![0.25, 0.5], vec![true, false]),
            result(vec![1.5, 2.0], vec![0.75, 0.25], vec![true, true]),
            result(vec![-0.5, 0.25], vec![0.5, 0.5], vec![false, true]),
            result(vec![2.5, -1.25], vec![0.25, 0.75], vec![true, true]),
        ];

        let forward = summarize_trials(&results);
        let mut reversed = results.clone();
        reversed.reverse();
        let mut rotated = results.clone();
        rotated.rotate_left(2);

        assert_eq!(forward, summarize_trials(&reversed));
        assert_eq!(forward, summarize_trials(&rotated));
        assert_eq!(forward.n_trials, 4);
        assert_eq!(forward.mean_estimate, vec![1.0, 0.5]);
        assert_eq!(forward.coverage, vec![0.75, 0.75]);
        assert!(forward.coverage.iter().all(|&c| (0.0..=1.0).contains(&c)));
    }

    #[test]
    fn single_trial_summary_has_zero_spread() {
        let summary = summarize_trials(&[result(vec![1.0], vec![0.5], vec![true])]);
        assert_eq!(summary.mean_estimate, vec![1.0]);
        assert_eq!(summary.sd_estimate, vec![0.0]);
        assert_eq!(summary.coverage, vec![1.0]);
    }

    struct FailingEstimator;

    impl Estimator for FailingEstimator {
        fn fit(&self, _scores: &Array2<i32>) -> Result<Vec<ItemStats>> {
            Err(RaschSimError::NonConvergence { iterations: 1 })
        }
    }

    #[test]
    fn any_trial_failure_aborts_the_study() {
        let cfg = StudyConfig {
            n_trials: 8,
            trial: TrialConfig {
                n_persons: 20,
                k_items: 3,
                diffs: TrueParams::Auto,
                abilities: TrueParams::Auto,
            },
            misspecified_items: vec![],
            seed: 1,
        };
        assert!(matches!(
            run_coverage_study(&SlmSimulator, &FailingEstimator, &cfg),
            Err(RaschSimError::NonConvergence { .. })
        ));
        assert!(run_fit_study(&SlmSimulator, &FailingEstimator, &cfg).is_err());
    }

    #[test]
    fn invalid_config_fails_before_any_work() {
        let cfg = StudyConfig {
            n_trials: 0,
            trial: TrialConfig {
                n_persons: 20,
                k_items: 3,
                diffs: TrueParams::Auto,
                abilities: TrueParams::Auto,
            },
            misspecified_items: vec![],
            seed: 1,
        };
        assert!(matches!(
            run_coverage_study(&SlmSimulator, &FailingEstimator, &cfg),
            Err(RaschSimError::InvalidCount { what: "n_trials" })
        ));
    }
}
