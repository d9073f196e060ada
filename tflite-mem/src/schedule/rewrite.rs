//! Applies an operator order to the serialized model and the graph.

use crate::error::{Error, Result};
use crate::ir::graph::{Graph, OperatorId};
use crate::parse::tflite::ModelView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// The model already runs in the requested order; nothing was written.
    AlreadyOptimal,
    /// `moved` operators changed position.
    Reordered { moved: usize },
}

/// Check that `order` lists every operator exactly once and that each one
/// comes after the producers of all its inputs.
pub fn validate_order(graph: &Graph, order: &[OperatorId]) -> Result<()> {
    let n = graph.operators.len();
    if order.len() != n {
        return Err(Error::invariant(format!(
            "order has {} operators, graph has {n}",
            order.len()
        )));
    }
    let mut position = vec![None; n];
    for (step, &op) in order.iter().enumerate() {
        let Some(slot) = position.get_mut(op) else {
            return Err(Error::invariant(format!("no operator {op}")));
        };
        if slot.replace(step).is_some() {
            return Err(Error::invariant(format!("operator {op} appears twice")));
        }
    }

    for (step, &op) in order.iter().enumerate() {
        for &input in &graph.operator(op).inputs {
            let Some(producer) = graph.tensor(input).producer else {
                continue;
            };
            if position[producer].map_or(true, |p| p >= step) {
                return Err(Error::invariant(format!(
                    "operator {op} at step {step} reads tensor {input} before operator {producer} produces it"
                )));
            }
        }
    }
    Ok(())
}

/// Reorder the model so operators run in `order`.
///
/// Both the byte buffer and the graph are left untouched unless `order` is a
/// valid schedule.
pub fn apply(view: &mut ModelView, graph: &mut Graph, order: &[OperatorId]) -> Result<RewriteOutcome> {
    validate_order(graph, order)?;
    if view.operator_count() != order.len() {
        return Err(Error::invariant(format!(
            "model has {} operators, graph has {}",
            view.operator_count(),
            order.len()
        )));
    }
    if order == graph.execution_order() {
        return Ok(RewriteOutcome::AlreadyOptimal);
    }

    let mut new_positions = vec![0; order.len()];
    for (q, &op) in order.iter().enumerate() {
        new_positions[graph.operator(op).position] = q;
    }
    let moved = new_positions
        .iter()
        .enumerate()
        .filter(|(p, q)| p != *q)
        .count();

    view.patch_operator_order(&new_positions)?;
    graph.renumber(order);
    log::info!("reordered {moved} of {} operators", order.len());
    Ok(RewriteOutcome::Reordered { moved })
}
