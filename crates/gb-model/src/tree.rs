//! Least-squares regression trees fitted to boosting residuals.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Nodes whose target variance is at or below this are treated as pure.
const IMPURITY_EPS: f64 = 1e-12;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
        /// Reduction in total squared error achieved by this split.
        improvement: f64,
    },
}

/// A fitted regression tree. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

/// Rows that ended up in one terminal region, keyed by node id.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalRegion {
    pub node: usize,
    pub rows: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    improvement: f64,
}

impl RegressionTree {
    /// Grow a tree on `rows` of `features` against `targets` (indexed by row).
    ///
    /// Leaves carry the mean target of their rows; callers that want a
    /// different leaf estimate overwrite it through [`set_leaf_value`].
    ///
    /// [`set_leaf_value`]: RegressionTree::set_leaf_value
    pub fn fit(
        features: ArrayView2<f64>,
        targets: &[f64],
        rows: Vec<usize>,
        params: &TreeParams,
    ) -> (Self, Vec<TerminalRegion>) {
        let mut tree = Self {
            nodes: Vec::new(),
            n_features: features.ncols(),
        };
        let mut regions = Vec::new();
        let root = tree.push_leaf(&rows, targets);
        let mut stack = vec![(root, rows, 0usize)];
        let mut order = Vec::new();

        while let Some((id, rows, depth)) = stack.pop() {
            let n = rows.len();
            let splittable = depth < params.max_depth
                && n >= params.min_samples_split
                && n >= 2 * params.min_samples_leaf
                && impurity(&rows, targets) > IMPURITY_EPS;

            let best = if splittable {
                best_split(features, targets, &rows, params.min_samples_leaf, &mut order)
            } else {
                None
            };

            match best {
                Some(split) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                        .iter()
                        .partition(|&&r| features[[r, split.feature]] <= split.threshold);
                    let left = tree.push_leaf(&left_rows, targets);
                    let right = tree.push_leaf(&right_rows, targets);
                    tree.nodes[id] = Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left,
                        right,
                        n_samples: n,
                        improvement: split.improvement,
                    };
                    stack.push((right, right_rows, depth + 1));
                    stack.push((left, left_rows, depth + 1));
                }
                None => regions.push(TerminalRegion { node: id, rows }),
            }
        }

        (tree, regions)
    }

    fn push_leaf(&mut self, rows: &[usize], targets: &[f64]) -> usize {
        let value = if rows.is_empty() {
            0.0
        } else {
            rows.iter().map(|&r| targets[r]).sum::<f64>() / rows.len() as f64
        };
        self.nodes.push(Node::Leaf {
            value,
            n_samples: rows.len(),
        });
        self.nodes.len() - 1
    }

    /// Overwrite the value of a leaf. Split nodes are left untouched.
    pub fn set_leaf_value(&mut self, node: usize, new_value: f64) {
        if let Some(Node::Leaf { value, .. }) = self.nodes.get_mut(node) {
            *value = new_value;
        }
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    /// Total improvement per feature, normalized to sum to one.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut importances = vec![0.0; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                improvement,
                ..
            } = node
            {
                importances[*feature] += improvement;
            }
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        importances
    }
}

/// Variance of the targets on `rows` (mean squared deviation).
fn impurity(rows: &[usize], targets: &[f64]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let n = rows.len() as f64;
    let mean = rows.iter().map(|&r| targets[r]).sum::<f64>() / n;
    rows.iter().map(|&r| (targets[r] - mean).powi(2)).sum::<f64>() / n
}

fn best_split(
    features: ArrayView2<f64>,
    targets: &[f64],
    rows: &[usize],
    min_samples_leaf: usize,
    order: &mut Vec<usize>,
) -> Option<SplitCandidate> {
    let n = rows.len();
    let total_sum: f64 = rows.iter().map(|&r| targets[r]).sum();
    let mut best: Option<SplitCandidate> = None;

    for feature in 0..features.ncols() {
        order.clear();
        order.extend_from_slice(rows);
        order.sort_by(|&a, &b| features[[a, feature]].total_cmp(&features[[b, feature]]));

        let mut left_sum = 0.0;
        for k in 1..n {
            left_sum += targets[order[k - 1]];
            let n_left = k;
            let n_right = n - k;
            if n_left < min_samples_leaf {
                continue;
            }
            if n_right < min_samples_leaf {
                break;
            }
            let lo = features[[order[k - 1], feature]];
            let hi = features[[order[k], feature]];
            if lo >= hi {
                continue;
            }

            let mean_left = left_sum / n_left as f64;
            let mean_right = (total_sum - left_sum) / n_right as f64;
            let improvement =
                (n_left * n_right) as f64 / n as f64 * (mean_left - mean_right).powi(2);

            if best.map_or(true, |b| improvement > b.improvement) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi || !threshold.is_finite() {
                    threshold = lo;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    improvement,
                });
            }
        }
    }

    // A split that leaves the squared error unchanged is not a split.
    best.filter(|b| b.improvement > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn step_data() -> (Array2<f64>, Vec<f64>) {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0], [5.0, 5.0], [6.0, 5.0]];
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn finds_the_step_threshold() {
        let (x, y) = step_data();
        let params = TreeParams {
            max_depth: 1,
            ..Default::default()
        };
        let (tree, regions) = RegressionTree::fit(x.view(), &y, (0..6).collect(), &params);
        match &tree.nodes()[0] {
            Node::Split {
                feature, threshold, ..
            } => {
                assert_eq!(*feature, 0);
                assert!((threshold - 3.5).abs() < 1e-12);
            }
            other => panic!("expected split at root, got {other:?}"),
        }
        assert_eq!(regions.len(), 2);
        assert_eq!(tree.predict_row(x.row(0)), 0.0);
        assert_eq!(tree.predict_row(x.row(5)), 1.0);
    }

    #[test]
    fn max_depth_zero_is_a_stump_leaf() {
        let (x, y) = step_data();
        let params = TreeParams {
            max_depth: 0,
            ..Default::default()
        };
        let (tree, regions) = RegressionTree::fit(x.view(), &y, (0..6).collect(), &params);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(regions[0].rows.len(), 6);
        assert!((tree.predict_row(x.row(0)) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn min_samples_leaf_moves_the_threshold() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = vec![0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let params = TreeParams {
            max_depth: 1,
            min_samples_split: 2,
            min_samples_leaf: 2,
        };
        let (_, regions) = RegressionTree::fit(x.view(), &y, (0..6).collect(), &params);
        assert!(regions.iter().all(|r| r.rows.len() >= 2));
    }

    #[test]
    fn min_samples_split_blocks_small_nodes() {
        let (x, y) = step_data();
        let params = TreeParams {
            max_depth: 5,
            min_samples_split: 7,
            min_samples_leaf: 1,
        };
        let (tree, _) = RegressionTree::fit(x.view(), &y, (0..6).collect(), &params);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn pure_nodes_are_not_split() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = vec![0.7, 0.7, 0.7];
        let (tree, _) = RegressionTree::fit(x.view(), &y, vec![0, 1, 2], &TreeParams::default());
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn zero_gain_split_is_rejected() {
        // Both sides of x=1.5 have mean 0.5, so splitting gains nothing.
        let x = array![[1.0], [1.0], [2.0], [2.0]];
        let y = vec![0.0, 1.0, 0.0, 1.0];
        let (tree, regions) =
            RegressionTree::fit(x.view(), &y, vec![0, 1, 2, 3], &TreeParams::default());
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].rows.len(), 4);
    }

    #[test]
    fn constant_feature_never_splits() {
        let (x, y) = step_data();
        let only_constant = x.column(1).to_owned().insert_axis(ndarray::Axis(1));
        let (tree, _) =
            RegressionTree::fit(only_constant.view(), &y, (0..6).collect(), &TreeParams::default());
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn leaf_values_can_be_overwritten() {
        let (x, y) = step_data();
        let (mut tree, regions) =
            RegressionTree::fit(x.view(), &y, (0..6).collect(), &TreeParams::default());
        for region in &regions {
            tree.set_leaf_value(region.node, 42.0);
        }
        assert_eq!(tree.predict_row(x.row(2)), 42.0);
    }

    #[test]
    fn importances_concentrate_on_informative_feature() {
        let (x, y) = step_data();
        let (tree, _) = RegressionTree::fit(x.view(), &y, (0..6).collect(), &TreeParams::default());
        let imp = tree.feature_importances();
        assert_eq!(imp, vec![1.0, 0.0]);
    }

    #[test]
    fn fits_on_a_row_subset() {
        let (x, y) = step_data();
        let (tree, regions) = RegressionTree::fit(x.view(), &y, vec![0, 5], &TreeParams::default());
        let covered: usize = regions.iter().map(|r| r.rows.len()).sum();
        assert_eq!(covered, 2);
        assert_eq!(tree.predict_row(x.row(4)), 1.0);
    }
}
