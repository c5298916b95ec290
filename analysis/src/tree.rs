use serde::{Deserialize, Serialize};
use thiserror::Error;

/// records indexed by a single leaf filter unless configured otherwise
pub const DEFAULT_LEAF_CAPACITY: u64 = 100_000;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelError {
    #[error("leaf capacity must be at least 1")]
    ZeroLeafCapacity,
    #[error("fan-out ratio {ratio} never collapses {leaves} leaves into a single root")]
    DegenerateFanout { ratio: u32, leaves: u64 },
}

/// Node count of every level of a complete fan-out tree, leaf level first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeShape {
    pub levels: Vec<u64>,
}

impl TreeShape {
    /// total number of filter nodes over all levels
    pub fn total(&self) -> u64 {
        self.levels.iter().sum()
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn leaves(&self) -> u64 {
        self.levels.first().copied().unwrap_or(1)
    }
}

/// Build the reference tree bottom-up
///
/// The leaf level holds `ceil(records / leaf_capacity)` nodes, every further level
/// `ceil(previous / fanout_ratio)` until a single root remains. A tree of at most one leaf is
/// a single node.
pub fn tree_shape(
    record_count: u64,
    fanout_ratio: u32,
    leaf_capacity: u64,
) -> Result<TreeShape, ModelError> {
    if leaf_capacity == 0 {
        return Err(ModelError::ZeroLeafCapacity);
    }

    let leaves = record_count.div_ceil(leaf_capacity);
    if leaves <= 1 {
        return Ok(TreeShape { levels: vec![1] });
    }
    if fanout_ratio < 2 {
        return Err(ModelError::DegenerateFanout {
            ratio: fanout_ratio,
            leaves,
        });
    }

    let mut levels = vec![leaves];
    let mut current = leaves;
    while current > 1 {
        current = current.div_ceil(u64::from(fanout_ratio));
        levels.push(current);
    }

    Ok(TreeShape { levels })
}

/// expected number of filter nodes of a tree over `record_count` records
pub fn theoretical_node_count(
    record_count: u64,
    fanout_ratio: u32,
    leaf_capacity: u64,
) -> Result<u64, ModelError> {
    tree_shape(record_count, fanout_ratio, leaf_capacity).map(|shape| shape.total())
}

/// Parameters of the reference model shared by all derived metrics of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeModel {
    #[serde(default = "default_leaf_capacity")]
    pub leaf_capacity: u64,
}

impl Default for TreeModel {
    fn default() -> Self {
        Self {
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
        }
    }
}

impl TreeModel {
    pub fn new(leaf_capacity: u64) -> Self {
        Self { leaf_capacity }
    }

    pub fn shape(&self, record_count: u64, fanout_ratio: u32) -> Result<TreeShape, ModelError> {
        tree_shape(record_count, fanout_ratio, self.leaf_capacity)
    }

    pub fn node_count(&self, record_count: u64, fanout_ratio: u32) -> Result<u64, ModelError> {
        theoretical_node_count(record_count, fanout_ratio, self.leaf_capacity)
    }
}

fn default_leaf_capacity() -> u64 {
    DEFAULT_LEAF_CAPACITY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(records: u64, ratio: u32) -> u64 {
        theoretical_node_count(records, ratio, DEFAULT_LEAF_CAPACITY).unwrap()
    }

    #[test]
    fn single_leaf() {
        assert_eq!(count(0, 10), 1);
        assert_eq!(count(1, 10), 1);
        assert_eq!(count(99_999, 10), 1);
        assert_eq!(count(100_000, 10), 1);
    }

    #[test]
    fn ceiling_boundaries() {
        // one past a full leaf opens a second leaf and a root
        assert_eq!(count(100_001, 10), 3);
        assert_eq!(count(199_999, 10), 3);
        assert_eq!(count(200_000, 10), 3);
        assert_eq!(count(200_001, 10), 4);
    }

    #[test]
    fn reference_trees() {
        assert_eq!(count(1_000_000, 10), 11);
        assert_eq!(count(2_500_000, 10), 29);
        assert_eq!(
            tree_shape(2_500_000, 10, DEFAULT_LEAF_CAPACITY).unwrap().levels,
            vec![25, 3, 1]
        );
        // 1000 leaves, 500, 250, 125, 63, 32, 16, 8, 4, 2, 1
        assert_eq!(count(100_000_000, 2), 2_001);
    }

    #[test]
    fn custom_leaf_capacity() {
        let model = TreeModel::new(1_000);
        let shape = model.shape(10_000, 4).unwrap();

        assert_eq!(shape.levels, vec![10, 3, 1]);
        assert_eq!(shape.depth(), 3);
        assert_eq!(shape.leaves(), 10);
        assert_eq!(model.node_count(10_000, 4), Ok(14));
    }

    #[test]
    fn invalid_parameters() {
        assert_eq!(
            theoretical_node_count(10, 10, 0),
            Err(ModelError::ZeroLeafCapacity)
        );
        assert_eq!(
            theoretical_node_count(1_000_000, 1, DEFAULT_LEAF_CAPACITY),
            Err(ModelError::DegenerateFanout {
                ratio: 1,
                leaves: 10
            })
        );
        // a ratio of one is fine as long as there is nothing to collapse
        assert_eq!(theoretical_node_count(10, 1, DEFAULT_LEAF_CAPACITY), Ok(1));
    }
}
