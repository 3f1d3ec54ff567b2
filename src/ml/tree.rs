//! CART classification tree.
//!
//! Nodes are stored in a flat arena; `Split` children are indices into it and
//! node 0 is the root. At each node a random subset of features is searched
//! for the threshold minimising weighted Gini impurity of the two children.
//! Samples with `x[feature] <= threshold` go left.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::model::{FEATURE_COUNT, FeatureRow};

/// Values closer than this are treated as equal when placing thresholds.
const FEATURE_THRESHOLD: f64 = 1e-7;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// Maximum depth; the root is depth 0.
    pub max_depth: usize,
    /// Number of non-constant features examined per split.
    pub max_features: usize,
    /// Nodes with fewer samples become leaves.
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class probabilities of the training samples that reached the leaf.
    Leaf { proba: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
    pub n_classes: usize,
}

/// Best split found at a node.
struct Candidate {
    feature: usize,
    threshold: f64,
    /// Sum of child Gini impurities weighted by child sample counts.
    weighted_child_impurity: f64,
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

struct Builder<'a, R: Rng> {
    rows: &'a [FeatureRow],
    labels: &'a [usize],
    n_classes: usize,
    params: TreeParams,
    rng: &'a mut R,
    nodes: Vec<Node>,
    importances: [f64; FEATURE_COUNT],
}

impl<'a, R: Rng> Builder<'a, R> {
    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &s in samples {
            counts[self.labels[s]] += 1;
        }
        counts
    }

    fn leaf(&mut self, counts: &[usize], total: usize) -> usize {
        let proba = counts.iter().map(|&c| c as f64 / total as f64).collect();
        self.nodes.push(Node::Leaf { proba });
        self.nodes.len() - 1
    }

    fn build(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let total = samples.len();
        let counts = self.class_counts(&samples);
        let impurity = gini(&counts, total);

        if depth >= self.params.max_depth || total < self.params.min_samples_split || impurity <= 0.0 {
            return self.leaf(&counts, total);
        }

        let Some(best) = self.find_split(&samples) else {
            return self.leaf(&counts, total);
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| self.rows[s][best.feature] <= best.threshold);

        self.importances[best.feature] += total as f64 * impurity - best.weighted_child_impurity;

        // Reserve this node's slot before the children are appended.
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { proba: Vec::new() });
        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    fn find_split(&mut self, samples: &[usize]) -> Option<Candidate> {
        let mut features: Vec<usize> = (0..FEATURE_COUNT).collect();
        features.shuffle(&mut *self.rng);

        let mut best: Option<Candidate> = None;
        let mut visited = 0;

        for feature in features {
            if visited >= self.params.max_features {
                break;
            }

            let mut sorted: Vec<(f64, usize)> = samples
                .iter()
                .map(|&s| (self.rows[s][feature], self.labels[s]))
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let (lo, hi) = (sorted[0].0, sorted[sorted.len() - 1].0);
            if hi <= lo + FEATURE_THRESHOLD {
                // Constant features do not count toward max_features.
                continue;
            }
            visited += 1;

            if let Some(candidate) = self.best_threshold(feature, &sorted) {
                let better = best
                    .as_ref()
                    .is_none_or(|b| candidate.weighted_child_impurity < b.weighted_child_impurity);
                if better {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn best_threshold(&self, feature: usize, sorted: &[(f64, usize)]) -> Option<Candidate> {
        let total = sorted.len();
        let mut right = vec![0usize; self.n_classes];
        for &(_, label) in sorted {
            right[label] += 1;
        }
        let mut left = vec![0usize; self.n_classes];

        let mut best: Option<Candidate> = None;
        for pos in 0..total - 1 {
            let (value, label) = sorted[pos];
            left[label] += 1;
            right[label] -= 1;

            let next = sorted[pos + 1].0;
            if next <= value + FEATURE_THRESHOLD {
                continue;
            }

            let n_left = pos + 1;
            let n_right = total - n_left;
            let weighted = n_left as f64 * gini(&left, n_left) + n_right as f64 * gini(&right, n_right);

            if best.as_ref().is_none_or(|b| weighted < b.weighted_child_impurity) {
                let mut threshold = value / 2.0 + next / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = value;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    weighted_child_impurity: weighted,
                });
            }
        }

        best
    }
}

impl DecisionTree {
    /// Grows a tree on the rows named by `samples` (duplicates allowed, as
    /// produced by bootstrapping).
    ///
    /// Returns the tree and its unnormalized impurity-decrease importance per
    /// feature. Callers must ensure `samples` is non-empty and labels are
    /// below `n_classes`.
    pub fn fit<R: Rng>(
        rows: &[FeatureRow],
        labels: &[usize],
        samples: Vec<usize>,
        n_classes: usize,
        params: TreeParams,
        rng: &mut R,
    ) -> (Self, [f64; FEATURE_COUNT]) {
        let mut builder = Builder {
            rows,
            labels,
            n_classes,
            params,
            rng,
            nodes: Vec::new(),
            importances: [0.0; FEATURE_COUNT],
        };
        builder.build(samples, 0);

        let tree = DecisionTree {
            nodes: builder.nodes,
            n_classes,
        };
        (tree, builder.importances)
    }

    /// Class probabilities for one row.
    pub fn predict_proba(&self, row: &FeatureRow) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Split { feature, threshold, left, right } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { proba } => return proba,
            }
        }
    }

    /// Depth of the deepest leaf (a single-leaf tree has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    /// Checks that every child index is in bounds, every split feature exists
    /// and every leaf has one probability per class.
    pub fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(id, node)| match node {
                Node::Split { feature, left, right, .. } => {
                    *feature < FEATURE_COUNT
                        && *left > id
                        && *right > id
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                }
                Node::Leaf { proba } => proba.len() == self.n_classes,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::sampling::seeded_rng;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            max_features: FEATURE_COUNT,
            min_samples_split: 2,
        }
    }

    fn row(x: f64) -> FeatureRow {
        [x, 0.0, 0.0, 0.0, 0.0, 0.0]
    }

    #[test]
    fn test_gini_of_pure_and_even_nodes() {
        assert_eq!(gini(&[4, 0], 4), 0.0);
        assert_eq!(gini(&[2, 2], 4), 0.5);
        assert_eq!(gini(&[], 0), 0.0);
    }

    #[test]
    fn test_single_split_separates_classes() {
        let rows: Vec<FeatureRow> = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0].iter().map(|&x| row(x)).collect();
        let labels = vec![0, 0, 0, 1, 1, 1];
        let (tree, importances) =
            DecisionTree::fit(&rows, &labels, (0..6).collect(), 2, params(10), &mut seeded_rng(1));

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        match &tree.nodes[0] {
            Node::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 6.5);
            }
            other => panic!("expected split at root, got {:?}", other),
        }
        assert_eq!(tree.predict_proba(&row(0.0)), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(&row(50.0)), &[0.0, 1.0]);

        // Root impurity 0.5 * 6 samples, children pure.
        assert_eq!(importances[0], 3.0);
        assert!(importances[1..].iter().all(|&i| i == 0.0));
    }

    #[test]
    fn test_max_depth_is_respected() {
        let rows: Vec<FeatureRow> = (0..64).map(|i| row(i as f64)).collect();
        let labels: Vec<usize> = (0..64).map(|i| i % 2).collect();
        let (tree, _) = DecisionTree::fit(&rows, &labels, (0..64).collect(), 2, params(3), &mut seeded_rng(1));
        assert!(tree.depth() <= 3);
        assert!(tree.is_well_formed());
    }

    #[test]
    fn test_constant_features_produce_a_leaf() {
        let rows = vec![row(1.0); 4];
        let labels = vec![0, 1, 0, 1];
        let (tree, _) = DecisionTree::fit(&rows, &labels, (0..4).collect(), 2, params(10), &mut seeded_rng(1));
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.predict_proba(&row(1.0)), &[0.5, 0.5]);
    }

    #[test]
    fn test_duplicate_samples_weight_the_leaf() {
        let rows = vec![row(1.0), row(1.0)];
        let labels = vec![0, 1];
        // Sample 1 drawn three times by the bootstrap
        let (tree, _) = DecisionTree::fit(&rows, &labels, vec![0, 1, 1, 1], 2, params(10), &mut seeded_rng(1));
        assert_eq!(tree.predict_proba(&row(1.0)), &[0.25, 0.75]);
    }

    #[test]
    fn test_malformed_tree_is_detected() {
        let tree = DecisionTree {
            nodes: vec![Node::Split { feature: 0, threshold: 1.0, left: 1, right: 5 }],
            n_classes: 2,
        };
        assert!(!tree.is_well_formed());
    }
}
