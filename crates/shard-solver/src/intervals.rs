// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Interval reduction: bounding the number of memory-budget terms.
//!
//! Each node's buffer is live over an interval of execution steps; a
//! naive encoding adds one budget constraint per step. This utility
//! collapses steps with identical live sets and, when the count still
//! exceeds `max_groups`, merges adjacent groups (taking the union, a
//! conservative over-approximation that can only tighten the budget,
//! never loosen it).

/// Reduces per-node `(start, end)` liveness intervals to at most
/// `max_groups` groups of simultaneously-live node indices.
///
/// Returns an empty vector for empty input. `max_groups` of zero is
/// treated as one.
pub fn reduce_intervals(intervals: &[(usize, usize)], max_groups: usize) -> Vec<Vec<usize>> {
    if intervals.is_empty() {
        return Vec::new();
    }
    let max_groups = max_groups.max(1);
    let horizon = intervals.iter().map(|&(_, e)| e).max().unwrap_or(0);

    // Live set per step.
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for t in 0..=horizon {
        let live: Vec<usize> = intervals
            .iter()
            .enumerate()
            .filter(|(_, &(s, e))| s <= t && t <= e)
            .map(|(i, _)| i)
            .collect();
        if live.is_empty() {
            continue;
        }
        if groups.last() != Some(&live) {
            groups.push(live);
        }
    }

    // Merge adjacent groups until within bound.
    while groups.len() > max_groups {
        // Merge the adjacent pair with the smallest combined size to keep
        // the over-approximation tight.
        let mut best = 0;
        let mut best_size = usize::MAX;
        for i in 0..groups.len() - 1 {
            let size = union_size(&groups[i], &groups[i + 1]);
            if size < best_size {
                best_size = size;
                best = i;
            }
        }
        let right = groups.remove(best + 1);
        let merged = union(&groups[best], &right);
        groups[best] = merged;
    }

    tracing::debug!(
        "reduced {} intervals to {} liveness group(s)",
        intervals.len(),
        groups.len(),
    );
    groups
}

fn union(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = a.to_vec();
    for &x in b {
        if !out.contains(&x) {
            out.push(x);
        }
    }
    out.sort_unstable();
    out
}

fn union_size(a: &[usize], b: &[usize]) -> usize {
    a.len() + b.iter().filter(|x| !a.contains(x)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_live_sets() {
        // Node 0 live [0,2], node 1 live [1,1], node 2 live [2,3].
        let groups = reduce_intervals(&[(0, 2), (1, 1), (2, 3)], 10);
        assert_eq!(groups, vec![vec![0], vec![0, 1], vec![0, 2], vec![2]]);
    }

    #[test]
    fn test_identical_adjacent_steps_collapse() {
        let groups = reduce_intervals(&[(0, 3), (0, 3)], 10);
        assert_eq!(groups, vec![vec![0, 1]]);
    }

    #[test]
    fn test_merging_respects_bound() {
        let groups = reduce_intervals(&[(0, 2), (1, 1), (2, 3)], 2);
        assert_eq!(groups.len(), 2);
        // Every node still appears in some group.
        let all: Vec<usize> = groups.iter().flatten().copied().collect();
        for n in 0..3 {
            assert!(all.contains(&n), "node {n} lost during merging");
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(reduce_intervals(&[], 4).is_empty());
    }

    #[test]
    fn test_single_group_bound() {
        let groups = reduce_intervals(&[(0, 0), (1, 1), (2, 2)], 1);
        assert_eq!(groups, vec![vec![0, 1, 2]]);
    }
}
