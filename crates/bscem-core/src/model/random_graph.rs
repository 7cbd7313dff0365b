//! Random bipartite graphs with prescribed degree sequences.
//!
//! Implements the sequential algorithm of M. Bayati, J. H. Kim and
//! A. Saberi, "A Sequential Algorithm for Generating Random Graphs"
//! (Algorithmica 58(4), 2010), which samples approximately uniformly from
//! the simple graphs with the given degrees. Used to lay out which workers
//! judge which questions in simulated crowd experiments.
//!
//! Candidate edge `(l, r)` is drawn with weight
//!
//! ```text
//! w(l, r) = needed_l · needed_r · (1 − d_l·d_r / 4m)
//! ```
//!
//! where `needed` counts the edges a node still lacks, `d` is its target
//! degree and `m` the total number of edges. Negative weights count as zero
//! and no edge is drawn twice. The sampler can paint itself into a corner;
//! it then restarts, up to [`MAX_ATTEMPTS`] times.

use rand::Rng;

use crate::engine::errors::ModelError;

/// Restarts allowed before giving up.
pub const MAX_ATTEMPTS: usize = 100;

/// An edge as `(left index, right index)`.
pub type Edge = (usize, usize);

/// Samples a bipartite graph where left node `i` has degree `left[i]` and
/// right node `j` has degree `right[j]`.
pub fn random_bipartite_graph<R: Rng + ?Sized>(
    left: &[usize],
    right: &[usize],
    rng: &mut R,
) -> Result<Vec<Edge>, ModelError> {
    let total_left: usize = left.iter().sum();
    let total_right: usize = right.iter().sum();
    if total_left == 0 && total_right == 0 {
        return Err(ModelError::ZeroDegree);
    }
    if total_left != total_right {
        return Err(ModelError::DegreeMismatch {
            left: total_left,
            right: total_right,
        });
    }

    for _attempt in 1..=MAX_ATTEMPTS {
        if let Some(edges) = sample_once(left, right, total_left, rng) {
            return Ok(edges);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("Random bipartite graph attempt {} got stuck, restarting", _attempt);
    }
    Err(ModelError::NoRandomGraph {
        attempts: MAX_ATTEMPTS,
    })
}

/// One pass of the sequential sampler; `None` when no candidate edge is left
/// before every degree is met.
fn sample_once<R: Rng + ?Sized>(
    left: &[usize],
    right: &[usize],
    num_edges: usize,
    rng: &mut R,
) -> Option<Vec<Edge>> {
    let mut left_needed = left.to_vec();
    let mut right_needed = right.to_vec();
    let mut has_edge = vec![false; left.len() * right.len()];
    let mut edges = Vec::with_capacity(num_edges);
    let four_m = 4.0 * num_edges as f64;

    let weight = |l: usize, r: usize, left_needed: &[usize], right_needed: &[usize]| -> f64 {
        let w = (left_needed[l] * right_needed[r]) as f64
            * (1.0 - (left[l] * right[r]) as f64 / four_m);
        w.max(0.0)
    };

    for _ in 0..num_edges {
        let mut total_weight = 0.0;
        for l in 0..left.len() {
            for r in 0..right.len() {
                if !has_edge[l * right.len() + r] {
                    total_weight += weight(l, r, &left_needed, &right_needed);
                }
            }
        }
        if total_weight <= 0.0 {
            return None;
        }

        let mut remaining = rng.gen::<f64>() * total_weight;
        let mut chosen = None;
        'select: for l in 0..left.len() {
            for r in 0..right.len() {
                if has_edge[l * right.len() + r] {
                    continue;
                }
                let w = weight(l, r, &left_needed, &right_needed);
                if w <= 0.0 {
                    continue;
                }
                chosen = Some((l, r));
                remaining -= w;
                if remaining <= 0.0 {
                    break 'select;
                }
            }
        }

        // Rounding can leave `remaining` a hair above zero; the last positive
        // candidate is then the draw.
        let (l, r) = chosen?;
        has_edge[l * right.len() + r] = true;
        left_needed[l] -= 1;
        right_needed[r] -= 1;
        edges.push((l, r));
    }
    Some(edges)
}
