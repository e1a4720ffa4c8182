//! Random forest classifier backend
//!
//! Trees are persisted in the same column layout scikit-learn exposes on a
//! fitted estimator's `tree_` attribute, with `value` squeezed to
//! `(n_nodes, n_classes)`. Evaluation follows the same rules so an exported
//! forest reproduces the training library's probabilities:
//! - inputs are rounded to f32 before each threshold comparison
//! - `x <= threshold` descends left
//! - each leaf's class weights are normalized (an all-zero leaf stays zero)
//! - the forest distribution is the mean over trees

use crate::classifier::{argmax, Classifier};
use flutevision_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Marker used in `children_left` / `children_right` for leaves
pub const TREE_LEAF: i64 = -1;

/// Serialized random forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestSpec {
    /// One entry per estimator
    pub trees: Vec<TreeSpec>,
}

/// Serialized decision tree in column layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSpec {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        proba: Vec<f64>,
    },
}

/// A validated decision tree
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Validate a serialized tree against the expected class and feature counts
    pub fn from_spec(spec: &TreeSpec, n_classes: usize, n_features: usize) -> Result<Self> {
        let n_nodes = spec.children_left.len();
        if n_nodes == 0 {
            return Err(Error::classifier("tree has no nodes"));
        }
        if spec.children_right.len() != n_nodes
            || spec.feature.len() != n_nodes
            || spec.threshold.len() != n_nodes
            || spec.value.len() != n_nodes
        {
            return Err(Error::classifier(format!(
                "tree arrays disagree on node count (expected {})",
                n_nodes
            )));
        }

        let mut nodes = Vec::with_capacity(n_nodes);
        for i in 0..n_nodes {
            let left = spec.children_left[i];
            let right = spec.children_right[i];

            if left == TREE_LEAF {
                let row = &spec.value[i];
                if row.len() != n_classes {
                    return Err(Error::classifier(format!(
                        "leaf {} has {} class weights, expected {}",
                        i,
                        row.len(),
                        n_classes
                    )));
                }
                nodes.push(Node::Leaf {
                    proba: normalize(row),
                });
                continue;
            }

            let child = |c: i64| -> Result<usize> {
                // Children always come after their parent, which rules out cycles.
                match usize::try_from(c) {
                    Ok(c) if c > i && c < n_nodes => Ok(c),
                    _ => Err(Error::classifier(format!(
                        "node {} has invalid child index {}",
                        i, c
                    ))),
                }
            };
            let feature = match usize::try_from(spec.feature[i]) {
                Ok(f) if f < n_features => f,
                _ => {
                    return Err(Error::classifier(format!(
                        "node {} splits on feature {} outside 0..{}",
                        i, spec.feature[i], n_features
                    )))
                }
            };

            nodes.push(Node::Split {
                feature,
                threshold: spec.threshold[i],
                left: child(left)?,
                right: child(right)?,
            });
        }

        Ok(Self { nodes })
    }

    /// Normalized class weights of the leaf reached by `features`
    pub fn leaf_distribution(&self, features: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = features[*feature] as f32 as f64;
                    index = if x <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn normalize(row: &[f64]) -> Vec<f64> {
    let total: f64 = row.iter().sum();
    if total == 0.0 {
        return row.to_vec();
    }
    row.iter().map(|w| w / total).collect()
}

/// Ensemble of decision trees averaged into a class distribution
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    /// Build a forest from its serialized form
    pub fn from_spec(spec: &ForestSpec, n_classes: usize, n_features: usize) -> Result<Self> {
        if spec.trees.is_empty() {
            return Err(Error::classifier("random forest has no trees"));
        }
        if n_classes == 0 {
            return Err(Error::classifier("random forest needs at least one class"));
        }

        let trees = spec
            .trees
            .iter()
            .enumerate()
            .map(|(i, tree)| {
                DecisionTree::from_spec(tree, n_classes, n_features)
                    .map_err(|e| Error::classifier(format!("tree {}: {}", i, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            trees,
            n_classes,
            n_features,
        })
    }

    /// Number of trees
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn check_input(&self, features: &[f64]) -> Result<()> {
        if features.len() != self.n_features {
            return Err(Error::classifier(format!(
                "random forest expects {} features, got {}",
                self.n_features,
                features.len()
            )));
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn class_count(&self) -> usize {
        self.n_classes
    }

    fn feature_count(&self) -> usize {
        self.n_features
    }

    fn predict_index(&self, features: &[f64]) -> Result<usize> {
        let distribution = self.predict_distribution(features)?;
        argmax(&distribution).ok_or_else(|| Error::classifier("empty class distribution"))
    }

    fn predict_distribution(&self, features: &[f64]) -> Result<Vec<f64>> {
        self.check_input(features)?;

        let mut totals = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (total, p) in totals.iter_mut().zip(tree.leaf_distribution(features)) {
                *total += p;
            }
        }

        let n_trees = self.trees.len() as f64;
        Ok(totals.into_iter().map(|t| t / n_trees).collect())
    }
}
