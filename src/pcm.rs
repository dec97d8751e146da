//! Partial-credit composition: aggregating dichotomous items into polytomous scores.

use ndarray::Array2;

use crate::config::TrueParams;
use crate::dataset::Dataset;
use crate::error::{RaschSimError, Result};
use crate::simulation::Simulator;

/// Strategy for grouping dichotomous columns into polytomous items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
    /// Contiguous groups of `m` columns, formed by integer-dividing the column
    /// index by `m`. A short final group is allowed and simply sums fewer
    /// columns.
    FixedSize(usize),
    /// Explicit column-index groups. Groups may overlap, be non-contiguous,
    /// and vary in size.
    Explicit(Vec<Vec<usize>>),
}

impl Grouping {
    fn resolve(&self, k_items: usize) -> Result<Vec<Vec<usize>>> {
        match self {
            Grouping::FixedSize(m) => {
                if *m == 0 {
                    return Err(RaschSimError::InvalidCount { what: "group size" });
                }
                let n_groups = k_items.div_ceil(*m);
                Ok((0..n_groups)
                    .map(|g| (g * m..((g + 1) * m).min(k_items)).collect())
                    .collect())
            }
            Grouping::Explicit(groups) => {
                for (g, group) in groups.iter().enumerate() {
                    if group.is_empty() {
                        return Err(RaschSimError::EmptyGroup { group: g });
                    }
                    for &index in group {
                        if index >= k_items {
                            return Err(RaschSimError::ItemIndexOutOfRange { index, k_items });
                        }
                    }
                }
                Ok(groups.clone())
            }
        }
    }
}

/// Aggregate groups of dichotomous columns into polytomous item scores.
///
/// Each output column is the row-wise sum of its group's 0/1 values, giving an
/// ordinal score bounded by the group size. Output columns are renamed
/// `Item_1..Item_g` in group order; row count and person alignment are
/// preserved.
pub fn compose_polytomous(data: &Dataset, grouping: &Grouping) -> Result<Dataset> {
    let groups = grouping.resolve(data.n_cols())?;
    let n_rows = data.n_rows();
    let values = data.values();

    let mut out = Array2::zeros((n_rows, groups.len()));
    for (g, group) in groups.iter().enumerate() {
        for i in 0..n_rows {
            out[[i, g]] = group.iter().map(|&j| values[[i, j]]).sum();
        }
    }

    let names = (1..=groups.len()).map(|g| format!("Item_{g}")).collect();
    Dataset::new(names, out)
}

/// Simulate a partial-credit dataset by composing a fresh dichotomous
/// simulation. One-call convenience over [`compose_polytomous`].
pub fn simulate_pcm<S: Simulator + ?Sized>(
    simulator: &S,
    k_items: usize,
    n_persons: usize,
    diffs: &TrueParams,
    abilities: &TrueParams,
    grouping: &Grouping,
    seed: u64,
) -> Result<Dataset> {
    let data = simulator.simulate(k_items, n_persons, diffs, abilities, seed)?;
    compose_polytomous(&Dataset::from_scores(&data.scores), grouping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn binary(values: Array2<f64>) -> Dataset {
        Dataset::new(
            (1..=values.ncols()).map(|j| format!("Item_{j}")).collect(),
            values,
        )
        .unwrap()
    }

    #[test]
    fn fixed_size_one_is_the_identity() {
        let data = binary(array![[0.0, 1.0, 1.0], [1.0, 0.0, 1.0]]);
        let out = compose_polytomous(&data, &Grouping::FixedSize(1)).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn fixed_size_sums_contiguous_groups() {
        let data = binary(array![
            [1.0, 1.0, 0.0, 1.0],
            [0.0, 0.0, 1.0, 1.0],
            [1.0, 0.0, 0.0, 0.0]
        ]);
        let out = compose_polytomous(&data, &Grouping::FixedSize(2)).unwrap();
        assert_eq!(out.names(), ["Item_1".to_string(), "Item_2".to_string()]);
        assert_eq!(out.values(), &array![[2.0, 1.0], [0.0, 2.0], [1.0, 0.0]]);
    }

    #[test]
    fn short_final_group_sums_fewer_columns() {
        let data = binary(array![[1.0, 1.0, 1.0], [0.0, 1.0, 0.0]]);
        let out = compose_polytomous(&data, &Grouping::FixedSize(2)).unwrap();
        assert_eq!(out.n_cols(), 2);
        assert_eq!(out.values(), &array![[2.0, 1.0], [1.0, 0.0]]);
    }

    #[test]
    fn explicit_groups_may_overlap_and_reorder() {
        let data = binary(array![[1.0, 0.0, 1.0], [0.0, 1.0, 1.0]]);
        let grouping = Grouping::Explicit(vec![vec![2, 0], vec![1], vec![0, 1, 2]]);
        let out = compose_polytomous(&data, &grouping).unwrap();
        assert_eq!(
            out.names(),
            ["Item_1".to_string(), "Item_2".to_string(), "Item_3".to_string()]
        );
        assert_eq!(out.values(), &array![[2.0, 0.0, 2.0], [1.0, 1.0, 2.0]]);
    }

    #[test]
    fn explicit_groups_are_validated() {
        let data = binary(array![[1.0, 0.0], [0.0, 1.0]]);
        assert!(matches!(
            compose_polytomous(&data, &Grouping::Explicit(vec![vec![]])),
            Err(RaschSimError::EmptyGroup { group: 0 })
        ));
        assert!(matches!(
            compose_polytomous(&data, &Grouping::Explicit(vec![vec![0, 2]])),
            Err(RaschSimError::ItemIndexOutOfRange { index: 2, k_items: 2 })
        ));
        assert!(matches!(
            compose_polytomous(&data, &Grouping::FixedSize(0)),
            Err(RaschSimError::InvalidCount { .. })
        ));
    }

    proptest! {
        #[test]
        fn cells_equal_group_sums_and_stay_bounded(
            rows in prop::collection::vec(prop::collection::vec(0i32..2, 10), 1..15),
            m in 1usize..11,
        ) {
            let flat: Vec<f64> = rows.iter().flatten().map(|&v| v as f64).collect();
            let values = Array2::from_shape_vec((rows.len(), 10), flat).unwrap();
            let data = binary(values.clone());
            let out = compose_polytomous(&data, &Grouping::FixedSize(m)).unwrap();

            prop_assert_eq!(out.n_rows(), data.n_rows());
            prop_assert_eq!(out.n_cols(), 10usize.div_ceil(m));
            for i in 0..out.n_rows() {
                for g in 0..out.n_cols() {
                    let expected: f64 = (g * m..((g + 1) * m).min(10))
                        .map(|j| values[[i, j]])
                        .sum();
                    prop_assert_eq!(out.values()[[i, g]], expected);
                    prop_assert!((0.0..=m as f64).contains(&out.values()[[i, g]]));
                }
            }
        }
    }
}
