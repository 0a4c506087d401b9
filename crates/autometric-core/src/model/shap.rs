//! Exact path-dependent TreeSHAP
//!
//! Computes Shapley values for a single tree in polynomial time by tracking,
//! along each root-to-leaf path, the proportion of feature subsets that flow
//! down that path. Missing features are integrated out using the node covers,
//! so the values satisfy local accuracy: the tree's expected value plus the
//! sum of attributions equals the tree's prediction.

use crate::features::FeatureVector;

use super::tree::{Node, Tree};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// None for the root sentinel
    feature: Option<usize>,
    /// Fraction of "feature absent" subsets flowing down this path
    zero_fraction: f64,
    /// 1.0 when the row follows this path, 0.0 otherwise
    one_fraction: f64,
    /// Permutation weight
    pweight: f64,
}

/// Accumulate one tree's attributions into `phi`
pub(super) fn tree_shap(tree: &Tree, row: &FeatureVector, phi: &mut [f64]) {
    recurse(tree, row, phi, 0, Vec::new(), 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    row: &FeatureVector,
    phi: &mut [f64],
    node_idx: usize,
    mut path: Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    extend_path(&mut path, zero_fraction, one_fraction, feature);

    match &tree.nodes[node_idx] {
        Node::Leaf { value, .. } => {
            for i in 1..path.len() {
                let weight = unwound_path_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += weight * (el.one_fraction - el.zero_fraction) * value;
                }
            }
        }
        Node::Split {
            feature: split_feature,
            condition,
            left,
            right,
            default_left,
            cover,
        } => {
            let hot = Tree::next_node(
                condition,
                row.get(*split_feature),
                *left,
                *right,
                *default_left,
            );
            let cold = if hot == *left { *right } else { *left };
            let hot_zero_fraction = tree.nodes[hot].cover() / cover;
            let cold_zero_fraction = tree.nodes[cold].cover() / cover;

            let mut incoming_zero_fraction = 1.0;
            let mut incoming_one_fraction = 1.0;

            // A feature seen earlier on the path is undone and re-entered
            if let Some(path_index) = path
                .iter()
                .position(|el| el.feature == Some(*split_feature))
            {
                incoming_zero_fraction = path[path_index].zero_fraction;
                incoming_one_fraction = path[path_index].one_fraction;
                unwind_path(&mut path, path_index);
            }

            recurse(
                tree,
                row,
                phi,
                hot,
                path.clone(),
                hot_zero_fraction * incoming_zero_fraction,
                incoming_one_fraction,
                Some(*split_feature),
            );
            recurse(
                tree,
                row,
                phi,
                cold,
                path,
                cold_zero_fraction * incoming_zero_fraction,
                0.0,
                Some(*split_feature),
            );
        }
    }
}

fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, path_index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion =
                tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    // Weights stay in place; only the feature bookkeeping shifts down
    for i in path_index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

fn unwound_path_sum(path: &[PathElement], path_index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (depth - i) as f64 / denom;
        } else if zero_fraction != 0.0 {
            total += path[i].pweight / zero_fraction / ((depth - i) as f64 / denom);
        }
    }
    total
}
