//! TFLite to graph IR lowering pass.
//!
//! Walks subgraph 0 of a decoded model once and produces the tensor/operator
//! graph: producer/consumer edges, tensor kinds and memoized ancestor sets.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use super::schema::TensorType;
use super::view::ModelView;
use crate::error::{Error, Result};
use crate::ir::graph::{DType, Graph, Operator, OperatorId, Tensor, TensorId, TensorKind};

/// TFLite marks an omitted optional input with index -1.
const OPTIONAL_INPUT: i32 = -1;

/// Build the dataflow graph of subgraph 0.
pub fn build_graph(view: &ModelView) -> Result<Graph> {
    let model = view.model()?;
    let subgraph = view.subgraph()?;
    let opcodes = model.operator_codes();
    let opcode_count = opcodes.map_or(0, |c| c.len());
    let tflite_tensors = subgraph
        .tensors()
        .ok_or_else(|| Error::malformed("no tensors in subgraph"))?;
    let tflite_operators = subgraph
        .operators()
        .ok_or_else(|| Error::malformed("no operators in subgraph"))?;

    let tensor_count = tflite_tensors.len();
    let tensor_index = |raw: i32, what: &str| -> Result<TensorId> {
        usize::try_from(raw)
            .ok()
            .filter(|i| *i < tensor_count)
            .ok_or_else(|| {
                Error::structure(format!(
                    "{what} references tensor {raw}, subgraph has {tensor_count}"
                ))
            })
    };

    let inputs: Vec<TensorId> = subgraph
        .inputs()
        .map(|v| {
            v.iter()
                .map(|i| tensor_index(i, "subgraph input"))
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?
        .unwrap_or_default();
    let outputs: Vec<TensorId> = subgraph
        .outputs()
        .map(|v| {
            v.iter()
                .map(|i| tensor_index(i, "subgraph output"))
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?
        .unwrap_or_default();

    let mut tensors: Vec<Tensor> = Vec::with_capacity(tensor_count);
    // Every working set is a subset of all tensors, so a bounded total keeps
    // the scheduler's sums in range.
    let mut total_bytes: u64 = 0;
    for id in 0..tensor_count {
        let tensor = tflite_tensors.get(id);
        let name = tensor.name().unwrap_or_default().to_string();
        let shape = tensor
            .shape()
            .map(|s| {
                s.iter()
                    .map(|d| {
                        usize::try_from(d).map_err(|_| {
                            Error::structure(format!("tensor {id} ({name}) has dimension {d}"))
                        })
                    })
                    .collect::<Result<Vec<usize>>>()
            })
            .transpose()?
            .unwrap_or_default();
        let dtype = convert_dtype(tensor.type_()).ok_or_else(|| {
            Error::structure(format!(
                "tensor {id} ({name}) has unsupported type {:?}",
                tensor.type_()
            ))
        })?;

        let bytes = tensor_bytes(&shape, dtype).ok_or_else(|| {
            Error::structure(format!(
                "tensor {id} ({name}) with shape {shape:?} does not fit in 64-bit byte counts"
            ))
        })?;
        total_bytes = total_bytes.checked_add(bytes).ok_or_else(|| {
            Error::structure(format!(
                "tensor sizes overflow 64-bit byte counts at tensor {id} ({name})"
            ))
        })?;

        tensors.push(Tensor {
            id,
            name,
            shape,
            dtype,
            bytes,
            buffer: tensor.buffer(),
            // classified once all producers are known
            kind: TensorKind::Intermediate,
            producer: None,
            consumers: Vec::new(),
            ancestors: OnceLock::new(),
        });
    }

    let mut operators: Vec<Operator> = Vec::with_capacity(tflite_operators.len());
    for id in 0..tflite_operators.len() {
        let op = tflite_operators.get(id);

        let opcode_index = op.opcode_index() as usize;
        let opcode = match opcodes.filter(|_| opcode_index < opcode_count) {
            Some(codes) => codes.get(opcode_index).resolved_builtin_code(),
            None => {
                return Err(Error::structure(format!(
                    "operator {id} uses opcode {opcode_index}, model has {opcode_count}"
                )))
            }
        };

        let mut op_inputs = Vec::new();
        for raw in op.inputs().iter().flat_map(|v| v.iter()) {
            if raw == OPTIONAL_INPUT {
                continue;
            }
            op_inputs.push(tensor_index(raw, &format!("operator {id} input"))?);
        }
        if op_inputs.is_empty() {
            return Err(Error::structure(format!(
                "operator {id} ({opcode:?}) has no inputs"
            )));
        }

        let op_outputs = op.outputs().map(|v| v.len()).unwrap_or(0);
        if op_outputs > 1 {
            return Err(Error::structure(format!(
                "operator {id} ({opcode:?}) declares {op_outputs} outputs, at most one is supported"
            )));
        }
        let output = match op.outputs().filter(|v| v.len() == 1) {
            Some(v) => Some(tensor_index(v.get(0), &format!("operator {id} output"))?),
            None => None,
        };

        if let Some(out) = output {
            if let Some(other) = tensors[out].producer {
                return Err(Error::structure(format!(
                    "tensor {out} is produced by both operator {other} and operator {id}"
                )));
            }
            tensors[out].producer = Some(id);
        }
        let mut seen = HashSet::with_capacity(op_inputs.len());
        for &input in &op_inputs {
            if seen.insert(input) {
                tensors[input].consumers.push(id);
            }
        }

        operators.push(Operator {
            id,
            position: id,
            opcode,
            inputs: op_inputs,
            output,
        });
    }

    let declared_inputs: HashSet<TensorId> = inputs.iter().copied().collect();
    let declared_outputs: HashSet<TensorId> = outputs.iter().copied().collect();
    for tensor in &mut tensors {
        tensor.kind = if declared_inputs.contains(&tensor.id) {
            TensorKind::Input
        } else if tensor.producer.is_none() {
            TensorKind::Constant
        } else if declared_outputs.contains(&tensor.id) {
            TensorKind::Output
        } else {
            TensorKind::Intermediate
        };
    }

    // Outputs first: that populates everything reachable from them.
    for root in outputs.iter().copied().chain(0..tensor_count) {
        compute_ancestors(&tensors, &operators, root)?;
    }

    let execution_order = (0..operators.len()).collect();
    log::debug!(
        "built graph: {} tensors, {} operators, {} inputs, {} outputs",
        tensors.len(),
        operators.len(),
        inputs.len(),
        outputs.len()
    );

    Ok(Graph {
        tensors,
        operators,
        inputs,
        outputs,
        execution_order,
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Memoized post-order walk from `root` towards the graph inputs, with an
/// explicit stack so deep chains cannot overflow. Meeting a tensor that is
/// still in progress means the graph has a cycle.
fn compute_ancestors(tensors: &[Tensor], operators: &[Operator], root: TensorId) -> Result<()> {
    if tensors[root].ancestors.get().is_some() {
        return Ok(());
    }

    let cycle = |t: TensorId, op: Option<OperatorId>| {
        Error::structure(format!(
            "cycle detected through tensor {t} ({}) produced by operator {op:?}",
            tensors[t].name
        ))
    };

    let mut marks = vec![Mark::Unvisited; tensors.len()];
    let mut stack = vec![(root, false)];
    while let Some((t, expanded)) = stack.pop() {
        if expanded {
            let mut set = BTreeSet::new();
            for &input in producer_inputs(tensors, operators, t) {
                set.insert(input);
                if let Some(upstream) = tensors[input].ancestors.get() {
                    set.extend(upstream.iter().copied());
                }
            }
            // A tensor reached twice in one walk is finished only once.
            let _ = tensors[t].ancestors.set(set);
            marks[t] = Mark::Done;
            continue;
        }

        if tensors[t].ancestors.get().is_some() {
            marks[t] = Mark::Done;
            continue;
        }
        match marks[t] {
            Mark::Done => continue,
            Mark::InProgress => return Err(cycle(t, tensors[t].producer)),
            Mark::Unvisited => {}
        }
        marks[t] = Mark::InProgress;
        stack.push((t, true));
        for &input in producer_inputs(tensors, operators, t) {
            match marks[input] {
                Mark::InProgress => return Err(cycle(input, tensors[input].producer)),
                Mark::Unvisited if tensors[input].ancestors.get().is_none() => {
                    stack.push((input, false))
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn producer_inputs<'a>(tensors: &[Tensor], operators: &'a [Operator], t: TensorId) -> &'a [TensorId] {
    match tensors[t].producer {
        Some(op) => &operators[op].inputs,
        None => &[],
    }
}

/// Convert TFLite tensor type to our DType
fn tensor_bytes(shape: &[usize], dtype: DType) -> Option<u64> {
    shape
        .iter()
        .try_fold(dtype.size_of() as u64, |acc, &d| acc.checked_mul(d as u64))
}

fn convert_dtype(t: TensorType) -> Option<DType> {
    Some(match t {
        TensorType::FLOAT32 => DType::F32,
        TensorType::FLOAT16 => DType::F16,
        TensorType::FLOAT64 => DType::F64,
        TensorType::INT64 => DType::I64,
        TensorType::INT32 => DType::I32,
        TensorType::INT16 => DType::I16,
        TensorType::INT8 => DType::I8,
        TensorType::UINT64 => DType::U64,
        TensorType::UINT32 => DType::U32,
        TensorType::UINT16 => DType::U16,
        TensorType::UINT8 => DType::U8,
        TensorType::BOOL => DType::Bool,
        _ => return None,
    })
}
