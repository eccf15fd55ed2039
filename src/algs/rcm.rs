//! Reverse Cuthill-McKee (RCM) reordering of a rank's dual graph.
//!
//! Level-synchronous formulation (Azad et al.): each BFS frontier is
//! labelled in one go, and the next frontier is sorted by
//! `(parent label, degree, index)`. Every connected component is started
//! from its own pseudo-peripheral root, components taken in order of their
//! smallest cell index.
//!
//! The ordering only improves locality; nothing downstream depends on it.

use crate::topology::adjacency::AdjacencyList;

/// Compute an RCM ordering of `graph`.
///
/// Returns `remap` with `remap[old] = new`, a permutation of
/// `0..graph.num_nodes()`.
pub fn reorder_rcm(graph: &AdjacencyList<usize>) -> Vec<usize> {
    let n = graph.num_nodes();
    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut next_label = 0usize;

    for start in 0..n {
        if labels[start].is_some() {
            continue;
        }
        // 1. pseudo-peripheral root of this component
        let root = find_pseudo_peripheral_root(graph, start);
        labels[root] = Some(next_label);
        next_label += 1;

        // 2. level-synchronous Cuthill-McKee
        let mut frontier = vec![root];
        while !frontier.is_empty() {
            // (parent label, degree, v) for unlabelled neighbours, min parent label wins
            let mut candidates: Vec<(usize, usize, usize)> = Vec::new();
            for &u in &frontier {
                let lu = labels[u].unwrap_or(usize::MAX);
                for &v in graph.links(u) {
                    if labels[v].is_none() {
                        candidates.push((lu, graph.num_links(v), v));
                    }
                }
            }
            candidates.sort_unstable();
            let mut next = Vec::with_capacity(candidates.len());
            for (_, _, v) in candidates {
                if labels[v].is_none() {
                    labels[v] = Some(next_label);
                    next_label += 1;
                    next.push(v);
                }
            }
            frontier = next;
        }
    }

    // 3. reverse
    labels
        .into_iter()
        .map(|l| n - 1 - l.unwrap_or(0))
        .collect()
}

/// BFS level structure rooted at `root`; returns the levels.
fn level_structure(graph: &AdjacencyList<usize>, root: usize, seen: &mut [bool]) -> Vec<Vec<usize>> {
    seen.fill(false);
    seen[root] = true;
    let mut levels = vec![vec![root]];
    loop {
        let mut next = Vec::new();
        if let Some(last) = levels.last() {
            for &u in last {
                for &v in graph.links(u) {
                    if !seen[v] {
                        seen[v] = true;
                        next.push(v);
                    }
                }
            }
        }
        if next.is_empty() {
            break;
        }
        levels.push(next);
    }
    levels
}

/// Pseudo-peripheral root of the component containing `start`: repeatedly
/// restart from a minimum-degree node of the deepest level until the
/// eccentricity stops growing.
pub fn find_pseudo_peripheral_root(graph: &AdjacencyList<usize>, start: usize) -> usize {
    let mut seen = vec![false; graph.num_nodes()];
    let mut r = start;
    let mut depth = 0;
    loop {
        let levels = level_structure(graph, r, &mut seen);
        let Some(last) = levels.last() else {
            return r;
        };
        let candidate = last
            .iter()
            .copied()
            .min_by_key(|&v| (graph.num_links(v), v))
            .unwrap_or(r);
        if levels.len() <= depth {
            return r;
        }
        depth = levels.len();
        r = candidate;
    }
}
