//! Random forest classifier.
//!
//! Each tree is grown on a bootstrap sample of the training rows with a
//! random feature subset considered at every split. Prediction averages the
//! trees' class probabilities and picks the most probable class (ties go to
//! the lower class index).
//!
//! Trees are fitted on a thread pool. Every tree's seed is drawn up front from
//! the forest seed, and results are stored by tree index, so the fitted
//! forest does not depend on the worker count or on scheduling.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, mpsc};
use threadpool::ThreadPool;

use super::MlError;
use super::sampling::{DEFAULT_SEED, seeded_rng};
use super::tree::{DecisionTree, TreeParams};
use crate::model::{FEATURE_COUNT, FeatureRow};

/// Forest hyper-parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    /// Features examined per split; `None` means `floor(sqrt(FEATURE_COUNT))`.
    pub max_features: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
    /// Worker threads; 0 uses the machine's available parallelism.
    pub workers: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 10,
            max_features: None,
            min_samples_split: 2,
            seed: DEFAULT_SEED,
            workers: 0,
        }
    }
}

impl ForestParams {
    fn tree_params(&self) -> TreeParams {
        let max_features = self
            .max_features
            .unwrap_or_else(|| (FEATURE_COUNT as f64).sqrt().floor() as usize)
            .clamp(1, FEATURE_COUNT);
        TreeParams {
            max_depth: self.max_depth,
            max_features,
            min_samples_split: self.min_samples_split.max(2),
        }
    }

    fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub n_classes: usize,
    pub trees: Vec<DecisionTree>,
    /// Mean decrease in impurity per feature, normalized to sum to 1.
    pub feature_importances: Vec<f64>,
}

fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

impl RandomForest {
    pub fn fit(
        rows: &[FeatureRow],
        labels: &[usize],
        n_classes: usize,
        params: &ForestParams,
    ) -> Result<Self, MlError> {
        if rows.is_empty() {
            return Err(MlError::EmptyTrainingSet);
        }
        if rows.len() != labels.len() {
            return Err(MlError::LabelCountMismatch {
                rows: rows.len(),
                labels: labels.len(),
            });
        }
        if let Some(&label) = labels.iter().find(|&&l| l >= n_classes) {
            return Err(MlError::LabelOutOfRange { label, n_classes });
        }
        if params.n_trees == 0 {
            return Err(MlError::InvalidParameter("n_trees must be at least 1".to_string()));
        }

        let tree_params = params.tree_params();
        let mut master = seeded_rng(params.seed);
        let tree_seeds: Vec<u64> = (0..params.n_trees).map(|_| master.next_u64()).collect();

        let rows = Arc::new(rows.to_vec());
        let labels = Arc::new(labels.to_vec());
        let pool = ThreadPool::new(params.worker_count().min(params.n_trees));
        let (tx, rx) = mpsc::channel();

        for (index, seed) in tree_seeds.into_iter().enumerate() {
            let tx = tx.clone();
            let rows = Arc::clone(&rows);
            let labels = Arc::clone(&labels);
            pool.execute(move || {
                let mut rng = seeded_rng(seed);
                let n = rows.len();
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let fitted = DecisionTree::fit(&rows, &labels, bootstrap, n_classes, tree_params, &mut rng);
                let _ = tx.send((index, fitted));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<(DecisionTree, [f64; FEATURE_COUNT])>> = vec![None; params.n_trees];
        for (index, fitted) in rx.iter() {
            slots[index] = Some(fitted);
        }
        pool.join();

        let mut trees = Vec::with_capacity(params.n_trees);
        let mut importances = vec![0.0; FEATURE_COUNT];
        for (index, slot) in slots.into_iter().enumerate() {
            let (tree, mut tree_importances) = slot.ok_or(MlError::WorkerFailed { tree: index })?;
            normalize(&mut tree_importances);
            for (total, value) in importances.iter_mut().zip(tree_importances) {
                *total += value;
            }
            trees.push(tree);
        }
        for total in importances.iter_mut() {
            *total /= params.n_trees as f64;
        }
        normalize(&mut importances);

        Ok(Self {
            n_features: FEATURE_COUNT,
            n_classes,
            trees,
            feature_importances: importances,
        })
    }

    /// Mean class probabilities across all trees.
    pub fn predict_proba(&self, row: &FeatureRow) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (total, p) in proba.iter_mut().zip(tree.predict_proba(row)) {
                *total += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        for p in proba.iter_mut() {
            *p /= n;
        }
        proba
    }

    /// Most probable class index for one row.
    pub fn predict(&self, row: &FeatureRow) -> usize {
        let proba = self.predict_proba(row);
        let mut best = 0;
        for (class, &p) in proba.iter().enumerate() {
            if p > proba[best] {
                best = class;
            }
        }
        best
    }

    pub fn predict_batch(&self, rows: &[FeatureRow]) -> Vec<usize> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    /// Fraction of rows whose predicted class equals the label.
    pub fn score(&self, rows: &[FeatureRow], labels: &[usize]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let correct = self
            .predict_batch(rows)
            .iter()
            .zip(labels)
            .filter(|(predicted, label)| predicted == label)
            .count();
        correct as f64 / rows.len() as f64
    }

    /// Fails if the forest is empty, was fitted on a different feature count,
    /// or contains a structurally invalid tree.
    pub fn check_shape(&self, n_classes: usize) -> Result<(), MlError> {
        if self.n_features != FEATURE_COUNT || self.feature_importances.len() != FEATURE_COUNT {
            return Err(MlError::DimensionMismatch {
                expected: FEATURE_COUNT,
                found: self.n_features,
            });
        }
        if self.trees.is_empty() {
            return Err(MlError::InvalidParameter("forest has no trees".to_string()));
        }
        if self.n_classes != n_classes {
            return Err(MlError::InvalidParameter(format!(
                "forest has {} classes, expected {}",
                self.n_classes, n_classes
            )));
        }
        if let Some(index) = self
            .trees
            .iter()
            .position(|t| t.n_classes != n_classes || !t.is_well_formed())
        {
            return Err(MlError::InvalidParameter(format!("tree {} is malformed", index)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::tree::Node;

    /// Two well-separated clusters on feature 0 and feature 5.
    fn clustered() -> (Vec<FeatureRow>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let jitter = (i % 5) as f64 * 0.1;
            rows.push([1.0 + jitter, 0.0, 0.0, 0.0, 0.0, 2.0 + jitter]);
            labels.push(0);
            rows.push([9.0 + jitter, 0.0, 0.0, 0.0, 0.0, 20.0 + jitter]);
            labels.push(1);
        }
        (rows, labels)
    }

    fn small_params(workers: usize) -> ForestParams {
        ForestParams {
            n_trees: 16,
            workers,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_default_params_match_training_configuration() {
        let params = ForestParams::default();
        assert_eq!(params.n_trees, 200);
        assert_eq!(params.max_depth, 10);
        assert_eq!(params.seed, 42);
        assert_eq!(params.tree_params().max_features, 2);
    }

    #[test]
    fn test_forest_learns_separable_clusters() {
        let (rows, labels) = clustered();
        let forest = RandomForest::fit(&rows, &labels, 2, &small_params(2)).unwrap();

        assert_eq!(forest.trees.len(), 16);
        assert_eq!(forest.score(&rows, &labels), 1.0);
        assert_eq!(forest.predict(&[0.5, 0.0, 0.0, 0.0, 0.0, 1.0]), 0);
        assert_eq!(forest.predict(&[12.0, 0.0, 0.0, 0.0, 0.0, 30.0]), 1);
    }

    #[test]
    fn test_importances_favour_informative_features() {
        let (rows, labels) = clustered();
        let forest = RandomForest::fit(&rows, &labels, 2, &small_params(2)).unwrap();

        let sum: f64 = forest.feature_importances.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        for constant in 1..5 {
            assert_eq!(forest.feature_importances[constant], 0.0);
        }
    }

    #[test]
    fn test_fit_is_independent_of_worker_count() {
        let (rows, labels) = clustered();
        let single = RandomForest::fit(&rows, &labels, 2, &small_params(1)).unwrap();
        let many = RandomForest::fit(&rows, &labels, 2, &small_params(4)).unwrap();
        assert_eq!(single, many);
    }

    #[test]
    fn test_different_seeds_give_different_forests() {
        let (rows, labels) = clustered();
        let a = RandomForest::fit(&rows, &labels, 2, &small_params(2)).unwrap();
        let b = RandomForest::fit(&rows, &labels, 2, &ForestParams { seed: 7, ..small_params(2) }).unwrap();
        assert_ne!(a.trees, b.trees);
    }

    #[test]
    fn test_predict_ties_go_to_lower_class() {
        let forest = RandomForest {
            n_features: FEATURE_COUNT,
            n_classes: 2,
            trees: vec![DecisionTree {
                nodes: vec![Node::Leaf { proba: vec![0.5, 0.5] }],
                n_classes: 2,
            }],
            feature_importances: vec![0.0; FEATURE_COUNT],
        };
        assert_eq!(forest.predict(&[0.0; FEATURE_COUNT]), 0);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let (rows, labels) = clustered();
        assert_eq!(
            RandomForest::fit(&[], &[], 2, &small_params(1)),
            Err(MlError::EmptyTrainingSet)
        );
        assert_eq!(
            RandomForest::fit(&rows, &labels[..3], 2, &small_params(1)),
            Err(MlError::LabelCountMismatch { rows: 80, labels: 3 })
        );
        assert_eq!(
            RandomForest::fit(&rows, &labels, 1, &small_params(1)),
            Err(MlError::LabelOutOfRange { label: 1, n_classes: 1 })
        );
    }

    #[test]
    fn test_check_shape() {
        let (rows, labels) = clustered();
        let forest = RandomForest::fit(&rows, &labels, 2, &small_params(2)).unwrap();
        assert!(forest.check_shape(2).is_ok());
        assert!(forest.check_shape(4).is_err());
    }
}
