//! Shared numerical helpers (link function, quadrature, column statistics).

pub const EPSILON: f64 = 1e-10;

/// Numerically stable logistic function.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let exp_x = x.exp();
        exp_x / (1.0 + exp_x)
    }
}

/// Numerically stable log of the logistic function.
#[inline]
pub fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

#[inline]
pub fn logsumexp(arr: &[f64]) -> f64 {
    if arr.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = arr.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    let sum: f64 = arr.iter().map(|x| (x - max_val).exp()).sum();
    max_val + sum.ln()
}

/// Gauss-Hermite quadrature nodes and normalized weights for integrating
/// against a standard-normal ability prior.
pub fn gauss_hermite_quadrature(n: usize) -> (Vec<f64>, Vec<f64>) {
    match n {
        11 => {
            let nodes = vec![
                -3.66847, -2.78329, -2.02594, -1.32656, -0.65681, 0.0, 0.65681, 1.32656, 2.02594,
                2.78329, 3.66847,
            ];
            let weights = vec![
                0.00001, 0.00076, 0.01526, 0.13548, 0.53134, 0.94531, 0.53134, 0.13548, 0.01526,
                0.00076, 0.00001,
            ];
            let sum: f64 = weights.iter().sum();
            let weights: Vec<f64> = weights.iter().map(|&w| w / sum).collect();
            (nodes, weights)
        }
        15 => {
            let nodes = vec![
                -4.49999, -3.66995, -2.96716, -2.32573, -1.71999, -1.13612, -0.56506, 0.0, 0.56506,
                1.13612, 1.71999, 2.32573, 2.96716, 3.66995, 4.49999,
            ];
            let weights = vec![
                1.5e-09, 1.5e-06, 3.9e-04, 0.00494, 0.03204, 0.11094, 0.21181, 0.22418, 0.21181,
                0.11094, 0.03204, 0.00494, 3.9e-04, 1.5e-06, 1.5e-09,
            ];
            let sum: f64 = weights.iter().sum();
            let weights: Vec<f64> = weights.iter().map(|&w| w / sum).collect();
            (nodes, weights)
        }
        _ => {
            // Evenly spaced fallback over [-4, 4] with normal density weights.
            let mut nodes = Vec::with_capacity(n);
            let mut weights = Vec::with_capacity(n);
            let step = 8.0 / (n - 1) as f64;
            for i in 0..n {
                let x = -4.0 + i as f64 * step;
                nodes.push(x);
                weights.push((-x * x / 2.0).exp());
            }
            let sum: f64 = weights.iter().sum();
            let weights: Vec<f64> = weights.iter().map(|&w| w / sum).collect();
            (nodes, weights)
        }
    }
}

/// Column-wise mean of a trials-by-items table.
pub fn column_means(table: &ndarray::ArrayView2<f64>) -> Vec<f64> {
    let n_rows = table.nrows();
    (0..table.ncols())
        .map(|j| table.column(j).sum() / n_rows as f64)
        .collect()
}

/// Column-wise sample standard deviation (ddof = 1) of a trials-by-items table.
pub fn column_sds(table: &ndarray::ArrayView2<f64>) -> Vec<f64> {
    let n_rows = table.nrows();
    (0..table.ncols())
        .map(|j| {
            let col = table.column(j);
            let mean = col.sum() / n_rows as f64;
            let ss: f64 = col.iter().map(|x| (x - mean).powi(2)).sum();
            (ss / (n_rows - 1).max(1) as f64).sqrt()
        })
        .collect()
}
