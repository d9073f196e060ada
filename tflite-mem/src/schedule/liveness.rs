//! Live tensor sets along a fixed operator order.

use std::collections::HashSet;

use serde::Serialize;

use crate::ir::graph::{Graph, OperatorId, TensorId};

/// Steps during which a tensor has to be resident, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lifetime {
    pub first_used_at: usize,
    pub last_used_at: usize,
}

impl Lifetime {
    pub fn contains(&self, step: usize) -> bool {
        self.first_used_at <= step && step <= self.last_used_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleStep {
    pub operator: OperatorId,
    pub live: Vec<TensorId>,
    pub bytes: u64,
}

/// Lifetime of every tensor when operators run in `order`.
///
/// A tensor becomes live when its producer runs (step 0 for inputs and
/// constants) and dies after its last reader. Subgraph outputs and tensors
/// nobody reads stay live through the final step.
pub fn lifetimes(graph: &Graph, order: &[OperatorId]) -> Vec<Lifetime> {
    let mut position = vec![None; graph.operators.len()];
    for (step, &op) in order.iter().enumerate() {
        if let Some(slot) = position.get_mut(op) {
            *slot = Some(step);
        }
    }
    let outputs: HashSet<TensorId> = graph.outputs.iter().copied().collect();

    graph
        .tensors
        .iter()
        .map(|tensor| {
            let first_used_at = tensor.producer.and_then(|op| position[op]).unwrap_or(0);
            let last_read = tensor.consumers.iter().filter_map(|op| position[*op]).max();
            let last_used_at = match last_read {
                Some(last) if !outputs.contains(&tensor.id) => last,
                _ => order.len().saturating_sub(1),
            };
            Lifetime {
                first_used_at,
                last_used_at,
            }
        })
        .collect()
}

/// Live set and its footprint while each operator of `order` runs.
pub fn live_sets_for(graph: &Graph, order: &[OperatorId]) -> Vec<ScheduleStep> {
    let lifetimes = lifetimes(graph, order);
    order
        .iter()
        .enumerate()
        .map(|(step, &operator)| {
            let live: Vec<TensorId> = lifetimes
                .iter()
                .enumerate()
                .filter(|(_, l)| l.contains(step))
                .map(|(t, _)| t)
                .collect();
            let bytes = graph.size_of(&live);
            ScheduleStep {
                operator,
                live,
                bytes,
            }
        })
        .collect()
}

pub fn peak_bytes(steps: &[ScheduleStep]) -> u64 {
    steps.iter().map(|s| s.bytes).max().unwrap_or(0)
}
