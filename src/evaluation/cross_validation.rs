//! Stratified k-fold cross-validation
//!
//! Folds are stratified by class so each fold keeps roughly the dataset's
//! class proportions, and the shuffle is seeded so repeated runs over the
//! same data produce the same folds.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::classifiers::Algorithm;
use crate::dataset::Dataset;
use crate::error::{ModelyardError, Result};
use crate::evaluation::{argmax, ConfusionMatrix};

/// Train/test row indices for one fold.
#[derive(Debug, Clone)]
pub struct CvSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Assign each labeled row to one of `n_splits` folds, round-robin within
/// each class after a seeded shuffle.
pub fn stratified_k_fold(y: &[usize], n_splits: usize, seed: u64) -> Result<Vec<CvSplit>> {
    if n_splits < 2 {
        return Err(ModelyardError::Validation(format!(
            "cross-validation needs at least 2 folds, got {}",
            n_splits
        )));
    }
    if y.len() < n_splits {
        return Err(ModelyardError::Validation(format!(
            "cannot split {} rows into {} folds",
            y.len(),
            n_splits
        )));
    }

    let n_classes = y.iter().copied().max().map_or(0, |m| m + 1);
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &label) in y.iter().enumerate() {
        by_class[label].push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut fold_of = vec![0usize; y.len()];
    for indices in &mut by_class {
        indices.shuffle(&mut rng);
        for (pos, &row) in indices.iter().enumerate() {
            fold_of[row] = pos % n_splits;
        }
    }

    let splits = (0..n_splits)
        .map(|fold| {
            let mut train = Vec::new();
            let mut test = Vec::new();
            for (row, &f) in fold_of.iter().enumerate() {
                if f == fold {
                    test.push(row);
                } else {
                    train.push(row);
                }
            }
            CvSplit { train, test }
        })
        .collect();
    Ok(splits)
}

/// Fit a fresh classifier per fold and pool actual/predicted pairs into a
/// single confusion matrix over all held-out rows.
pub fn cross_validate(
    algorithm: Algorithm,
    data: &Dataset,
    folds: usize,
    seed: u64,
) -> Result<ConfusionMatrix> {
    let labels = data.schema().class_labels()?;
    let class_index = data.schema().class_index();

    // Only rows with a class value participate.
    let mut rows = Vec::new();
    let mut y = Vec::new();
    for r in 0..data.n_rows() {
        let v = data.row(r)[class_index];
        if v.is_nan() {
            continue;
        }
        rows.push(r);
        y.push(v as usize);
    }

    let mut matrix = ConfusionMatrix::new(labels.to_vec());
    for (fold, split) in stratified_k_fold(&y, folds, seed)?.iter().enumerate() {
        if split.test.is_empty() || split.train.is_empty() {
            continue;
        }
        let train_rows: Vec<usize> = split.train.iter().map(|&i| rows[i]).collect();
        let train_data = data.subset(&train_rows);

        let mut model = algorithm.build();
        model.fit(&train_data)?;

        for &i in &split.test {
            let dist = model.predict_distribution(data.feature_row(rows[i]).view())?;
            let predicted = argmax(dist.as_slice().unwrap_or(&[]));
            matrix.record(y[i], predicted);
        }
        debug!(fold, tested = split.test.len(), "cross-validation fold done");
    }

    if matrix.total() == 0 {
        return Err(ModelyardError::Dataset(
            "cross-validation produced no predictions".to_string(),
        ));
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDescriptor, AttributeSchema};
    use ndarray::Array2;

    fn two_class_dataset(n: usize) -> Dataset {
        let schema = AttributeSchema::new(
            "toy",
            vec![
                AttributeDescriptor::numeric("x", 0),
                AttributeDescriptor::categorical("y", 1, vec!["neg".into(), "pos".into()]),
            ],
            None,
        )
        .unwrap();
        let rows = Array2::from_shape_fn((n, 2), |(r, c)| {
            let label = (r % 2) as f64;
            if c == 0 {
                label * 10.0 + (r as f64) * 0.01
            } else {
                label
            }
        });
        Dataset::new(schema, rows).unwrap()
    }

    #[test]
    fn test_folds_partition_rows() {
        let y: Vec<usize> = (0..20).map(|i| i % 2).collect();
        let splits = stratified_k_fold(&y, 5, 1).unwrap();
        assert_eq!(splits.len(), 5);
        let mut seen = vec![false; 20];
        for split in &splits {
            assert_eq!(split.train.len() + split.test.len(), 20);
            for &i in &split.test {
                assert!(!seen[i]);
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_stratification_balances_classes() {
        let y: Vec<usize> = (0..30).map(|i| i % 2).collect();
        for split in stratified_k_fold(&y, 5, 7).unwrap() {
            let pos = split.test.iter().filter(|&&i| y[i] == 1).count();
            assert_eq!(pos, split.test.len() - pos);
        }
    }

    #[test]
    fn test_seed_reproducibility() {
        let y: Vec<usize> = (0..24).map(|i| i % 3).collect();
        let a = stratified_k_fold(&y, 4, 42).unwrap();
        let b = stratified_k_fold(&y, 4, 42).unwrap();
        for (sa, sb) in a.iter().zip(&b) {
            assert_eq!(sa.test, sb.test);
        }
    }

    #[test]
    fn test_rejects_too_few_rows() {
        assert!(stratified_k_fold(&[0, 1], 5, 1).is_err());
        assert!(stratified_k_fold(&[0, 1, 0], 1, 1).is_err());
    }

    #[test]
    fn test_cross_validate_separable() {
        let data = two_class_dataset(20);
        let matrix = cross_validate(Algorithm::DecisionTree, &data, 5, 1).unwrap();
        assert_eq!(matrix.total(), 20);
        assert!(matrix.accuracy_pct() > 90.0);
    }
}
