//! Rasch item parameter estimation (marginal maximum likelihood via EM).

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RaschSimError, Result};
use crate::utils::{gauss_hermite_quadrature, log_sigmoid, logsumexp, sigmoid, EPSILON};

/// Per-item estimation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    pub difficulty: f64,
    /// Asymptotic standard error of the difficulty estimate.
    pub se: f64,
    /// Information-weighted mean-square fit statistic, expected near 1.0.
    pub infit_ms: f64,
    /// Unweighted mean-square fit statistic, expected near 1.0.
    pub outfit_ms: f64,
}

/// Capability interface for item parameter estimation.
///
/// Implementations must be deterministic functions of the dataset and must
/// return one entry per item, in column order.
pub trait Estimator: Sync {
    fn fit(&self, scores: &Array2<i32>) -> Result<Vec<ItemStats>>;
}

/// Marginal-maximum-likelihood estimator for the dichotomous Rasch model.
///
/// Ability is integrated out over a standard-normal prior on Gauss-Hermite
/// quadrature; the M-step is a Newton update of each item difficulty. Standard
/// errors come from the expected Fisher information accumulated over the
/// posterior ability distribution, and fit mean-squares from squared
/// standardized residuals at the EAP ability estimates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MmlEstimator {
    pub n_quadpts: usize,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for MmlEstimator {
    fn default() -> Self {
        Self {
            n_quadpts: 15,
            max_iter: 200,
            tol: 1e-6,
        }
    }
}

impl Estimator for MmlEstimator {
    fn fit(&self, scores: &Array2<i32>) -> Result<Vec<ItemStats>> {
        let n_persons = scores.nrows();
        let n_items = scores.ncols();
        if n_persons == 0 {
            return Err(RaschSimError::InvalidCount { what: "n_persons" });
        }
        if n_items == 0 {
            return Err(RaschSimError::InvalidCount { what: "k_items" });
        }

        for j in 0..n_items {
            let first = scores[[0, j]];
            if scores.column(j).iter().all(|&r| r == first) {
                warn!(item = j, value = first, "response column is constant");
                return Err(RaschSimError::DegenerateItem { item: j });
            }
        }

        let (quad_points, quad_weights) = gauss_hermite_quadrature(self.n_quadpts);

        // Start from the logit of each item's proportion correct.
        let mut difficulty: Vec<f64> = (0..n_items)
            .map(|j| {
                let p = scores.column(j).iter().map(|&r| r as f64).sum::<f64>()
                    / n_persons as f64;
                let p = p.clamp(0.01, 0.99);
                ((1.0 - p) / p).ln()
            })
            .collect();

        let view = scores.view();
        let mut posterior: Vec<Vec<f64>> = Vec::new();
        let mut prev_ll = f64::NEG_INFINITY;
        let mut converged = false;

        for iteration in 0..self.max_iter {
            let (post, log_marginals) = e_step(&view, &quad_points, &quad_weights, &difficulty);
            posterior = post;

            let current_ll: f64 = log_marginals.iter().sum();
            debug!(iteration, log_likelihood = current_ll, "em iteration");

            if (current_ll - prev_ll).abs() < self.tol {
                converged = true;
                break;
            }
            prev_ll = current_ll;

            m_step(&view, &posterior, &quad_points, &mut difficulty);
        }

        if !converged {
            return Err(RaschSimError::NonConvergence {
                iterations: self.max_iter,
            });
        }

        let n_quad = quad_points.len();
        let posterior_mass: Vec<f64> = (0..n_quad)
            .map(|q| posterior.iter().map(|p| p[q]).sum())
            .collect();

        let ses: Vec<f64> = (0..n_items)
            .map(|j| {
                let information: f64 = (0..n_quad)
                    .map(|q| {
                        let p = sigmoid(quad_points[q] - difficulty[j]);
                        posterior_mass[q] * p * (1.0 - p)
                    })
                    .sum();
                1.0 / information.sqrt()
            })
            .collect();

        let theta: Vec<f64> = posterior
            .iter()
            .map(|post| {
                post.iter()
                    .zip(quad_points.iter())
                    .map(|(&w, &t)| w * t)
                    .sum()
            })
            .collect();

        let fit = fit_mean_squares(&view, &theta, &difficulty);

        Ok((0..n_items)
            .map(|j| ItemStats {
                difficulty: difficulty[j],
                se: ses[j],
                infit_ms: fit[j].0,
                outfit_ms: fit[j].1,
            })
            .collect())
    }
}

/// Posterior ability weights per person over the quadrature grid, plus each
/// person's marginal log-likelihood.
fn e_step(
    responses: &ArrayView2<i32>,
    quad_points: &[f64],
    quad_weights: &[f64],
    difficulty: &[f64],
) -> (Vec<Vec<f64>>, Vec<f64>) {
    let n_persons = responses.nrows();
    let n_items = responses.ncols();
    let n_quad = quad_points.len();

    let log_weights: Vec<f64> = quad_weights.iter().map(|&w| (w + EPSILON).ln()).collect();

    let results: Vec<(Vec<f64>, f64)> = (0..n_persons)
        .into_par_iter()
        .map(|i| {
            let mut log_joint = vec![0.0; n_quad];

            for q in 0..n_quad {
                let theta = quad_points[q];
                let mut ll = 0.0;

                for j in 0..n_items {
                    let z = theta - difficulty[j];
                    if responses[[i, j]] == 1 {
                        ll += log_sigmoid(z);
                    } else {
                        ll += log_sigmoid(-z);
                    }
                }

                log_joint[q] = ll + log_weights[q];
            }

            let log_marginal = logsumexp(&log_joint);
            let posterior: Vec<f64> = log_joint
                .iter()
                .map(|&lj| (lj - log_marginal).exp())
                .collect();

            (posterior, log_marginal)
        })
        .collect();

    let posterior: Vec<Vec<f64>> = results.iter().map(|(p, _)| p.clone()).collect();
    let log_marginals: Vec<f64> = results.iter().map(|(_, m)| *m).collect();

    (posterior, log_marginals)
}

/// Newton update of each item difficulty against the expected counts.
fn m_step(
    responses: &ArrayView2<i32>,
    posterior: &[Vec<f64>],
    quad_points: &[f64],
    difficulty: &mut [f64],
) {
    let n_persons = responses.nrows();
    let n_items = responses.ncols();
    let n_quad = quad_points.len();

    let new_difficulty: Vec<f64> = (0..n_items)
        .into_par_iter()
        .map(|j| {
            let mut r_k = vec![0.0; n_quad];
            let mut n_k = vec![0.0; n_quad];

            for i in 0..n_persons {
                let resp = responses[[i, j]];
                for q in 0..n_quad {
                    let w = posterior[i][q];
                    n_k[q] += w;
                    if resp == 1 {
                        r_k[q] += w;
                    }
                }
            }

            let mut b = difficulty[j];
            for _ in 0..10 {
                let mut grad = 0.0;
                let mut information = 0.0;
                for q in 0..n_quad {
                    let p = sigmoid(quad_points[q] - b);
                    grad += n_k[q] * p - r_k[q];
                    information += n_k[q] * p * (1.0 - p);
                }
                if information < EPSILON {
                    break;
                }
                let step = grad / information;
                b += step;
                if step.abs() < 1e-8 {
                    break;
                }
            }
            b
        })
        .collect();

    difficulty.copy_from_slice(&new_difficulty);
}

/// Item `(infit, outfit)` mean-squares from squared standardized residuals.
fn fit_mean_squares(
    responses: &ArrayView2<i32>,
    theta: &[f64],
    difficulty: &[f64],
) -> Vec<(f64, f64)> {
    let n_persons = responses.nrows();
    let n_items = responses.ncols();

    let z_sq_var: Vec<Vec<(f64, f64)>> = (0..n_persons)
        .into_par_iter()
        .map(|i| {
            let theta_i = theta[i];
            (0..n_items)
                .map(|j| {
                    let p = sigmoid(theta_i - difficulty[j]);
                    let var = p * (1.0 - p);
                    let raw_resid = responses[[i, j]] as f64 - p;
                    ((raw_resid * raw_resid) / (var + EPSILON), var)
                })
                .collect()
        })
        .collect();

    (0..n_items)
        .map(|j| {
            let mut sum_z_sq = 0.0;
            let mut sum_z_sq_var = 0.0;
            let mut sum_var = 0.0;

            for person_data in &z_sq_var {
                let (z_sq, var) = person_data[j];
                sum_z_sq += z_sq;
                sum_z_sq_var += z_sq * var;
                sum_var += var;
            }

            let outfit = sum_z_sq / n_persons as f64;
            let infit = if sum_var > EPSILON {
                sum_z_sq_var / sum_var
            } else {
                f64::NAN
            };

            (infit, outfit)
        })
        .collect()
}
