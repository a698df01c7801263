use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, SegmentationError};
use crate::graph::flow::FlowNetwork;

/// Cooperative cancellation flag for long solves.
///
/// Cloned tokens share one flag; tripping any clone cancels the solve at the
/// next phase boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl FlowNetwork {
    /// Compute the maximum flow by repeated level-graph construction and
    /// blocking-flow saturation (Dinic's algorithm).
    ///
    /// The cancellation token, when present, is polled between phases; a
    /// tripped token surfaces as [`SegmentationError::Cancelled`] and leaves
    /// the network in a consistent (but unfinished) flow state.
    pub fn max_flow(&mut self, cancel: Option<&CancelToken>) -> Result<i64> {
        let mut total = 0i64;
        let mut level = vec![-1i32; self.node_count()];
        let mut phases = 0u32;

        loop {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(SegmentationError::Cancelled);
                }
            }
            if !self.assign_levels(&mut level) {
                break;
            }
            phases += 1;

            // Per-node cursors persist for the whole phase: an arc found
            // saturated or level-incompatible is never revisited.
            let mut cursor = vec![0usize; self.node_count()];
            loop {
                let pushed = self.push_flow(self.source(), i64::MAX, &level, &mut cursor);
                if pushed == 0 {
                    break;
                }
                total += pushed;
            }
        }

        tracing::debug!("max flow {} after {} phases", total, phases);
        Ok(total)
    }

    /// BFS from the source over positive-residual arcs, labelling each
    /// reachable node with its distance. Returns whether the sink was
    /// reached; if not, the current flow is maximal.
    fn assign_levels(&self, level: &mut [i32]) -> bool {
        level.fill(-1);
        level[self.source()] = 0;

        let mut queue = VecDeque::new();
        queue.push_back(self.source());

        while let Some(node) = queue.pop_front() {
            for edge in self.edges(node) {
                if edge.residual() > 0 && level[edge.to] < 0 {
                    level[edge.to] = level[node] + 1;
                    queue.push_back(edge.to);
                }
            }
        }
        level[self.sink()] >= 0
    }

    /// DFS one augmenting path through the level graph, bounded by `limit`,
    /// following only arcs that descend exactly one level.
    fn push_flow(&mut self, node: usize, limit: i64, level: &[i32], cursor: &mut [usize]) -> i64 {
        if node == self.sink() {
            return limit;
        }

        while cursor[node] < self.edges(node).len() {
            let index = cursor[node];
            let (to, residual) = {
                let edge = &self.edges(node)[index];
                (edge.to, edge.residual())
            };

            if residual > 0 && level[to] == level[node] + 1 {
                let pushed = self.push_flow(to, limit.min(residual), level, cursor);
                if pushed > 0 {
                    self.augment(node, index, pushed);
                    return pushed;
                }
            }
            cursor[node] += 1;
        }
        0
    }

    /// Nodes reachable from the source through positive-residual arcs.
    ///
    /// On a terminated network this is exactly the source side of the
    /// minimum cut. Read-only, so calling it twice gives the same set.
    pub fn source_side(&self) -> Vec<bool> {
        let mut visited = vec![false; self.node_count()];
        visited[self.source()] = true;

        let mut queue = VecDeque::new();
        queue.push_back(self.source());

        while let Some(node) = queue.pop_front() {
            for edge in self.edges(node) {
                if edge.residual() > 0 && !visited[edge.to] {
                    visited[edge.to] = true;
                    queue.push_back(edge.to);
                }
            }
        }
        visited
    }

    /// Total capacity of arcs crossing from `side` to its complement.
    pub fn cut_capacity(&self, side: &[bool]) -> i64 {
        let mut capacity = 0;
        for node in 0..self.node_count() {
            if !side[node] {
                continue;
            }
            for edge in self.edges(node) {
                if !side[edge.to] {
                    capacity += edge.capacity;
                }
            }
        }
        capacity
    }
}
