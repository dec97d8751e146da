//! Monte-Carlo simulation harness for Rasch model estimators.
//!
//! This crate repeatedly simulates synthetic response data from known item and
//! person parameters, fits an estimator to each simulated dataset, and
//! aggregates estimation error and confidence-interval coverage across many
//! parallel trials. It provides:
//! - Coverage studies: per-item mean estimate, empirical sampling variability,
//!   mean reported standard error, and 95%-interval coverage rate
//! - Fit-diagnostics studies: extremal infit/outfit mean-squares per trial,
//!   with optional deliberate item misspecification
//! - A dichotomous Rasch simulator and a marginal-maximum-likelihood estimator
//!   behind capability traits, so either can be swapped out
//! - Data preparation: partial-credit composition of dichotomous items and
//!   threshold dichotomization of continuous columns

pub mod config;
pub mod dataset;
pub mod error;
pub mod estimation;
pub mod pcm;
pub mod simulation;
pub mod study;
pub mod trial;
pub mod utils;

pub use config::{StudyConfig, TrialConfig, TrueParams};
pub use dataset::{response_frequencies, Dataset};
pub use error::{RaschSimError, Result};
pub use estimation::{Estimator, ItemStats, MmlEstimator};
pub use pcm::{compose_polytomous, simulate_pcm, Grouping};
pub use simulation::{person_scores, SimulatedData, Simulator, SlmSimulator};
pub use study::{run_coverage_study, run_fit_study, summarize_trials, StudySummary};
pub use trial::{run_fit_trial, run_trial, FitStatRow, TrialResult};
