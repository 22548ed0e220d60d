//! Random-forest classifier exported from the training pipeline as JSON.
//!
//! Every tree is a flat array of nodes rooted at index 0. A split sends a
//! sample to `left` when `features[feature] <= threshold` and to `right`
//! otherwise; a leaf holds the fraction of eligible training samples that
//! reached it. The forest predicts 1 when the mean leaf value exceeds 0.5.

use crate::eligibility::{Classifier, FeatureVector, ModelError, FEATURE_COUNT};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug)]
pub struct ForestModel {
    trees: Vec<Tree>,
}

#[derive(Deserialize, Debug)]
struct Tree {
    nodes: Vec<Node>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        eligible: f64,
    },
}

impl ForestModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let model: ForestModel = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".to_owned()));
        }
        for (tree_index, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|message| ModelError::Invalid(format!("tree {}: {}", tree_index, message)))?;
        }
        Ok(())
    }
}

impl Tree {
    // Children must point forward so every walk ends at a leaf.
    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("no nodes".to_owned());
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Split {
                    feature,
                    left,
                    right,
                    threshold,
                } => {
                    if feature >= FEATURE_COUNT {
                        return Err(format!("node {} splits on unknown feature {}", index, feature));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", index));
                    }
                    for child in [left, right] {
                        if child <= index || child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", index, child));
                        }
                    }
                }
                Node::Leaf { eligible } => {
                    if !(0.0..=1.0).contains(&eligible) {
                        return Err(format!("leaf {} value {} outside [0, 1]", index, eligible));
                    }
                }
            }
        }
        Ok(())
    }

    fn eligible_fraction(&self, features: &FeatureVector) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[feature] <= threshold {
                        left
                    } else {
                        right
                    }
                }
                Node::Leaf { eligible } => return eligible,
            }
        }
    }
}

impl Classifier for ForestModel {
    fn predict(&self, features: &FeatureVector) -> Result<u8, ModelError> {
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.eligible_fraction(features))
            .sum();
        Ok(if total / self.trees.len() as f64 > 0.5 { 1 } else { 0 })
    }
}
