//! Tensor/operator dataflow graph.
//!
//! Arena + index: the `Graph` owns both arenas, and edges are plain ids in
//! either direction.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use serde::Serialize;

use crate::parse::tflite::BuiltinOperator;

/// Index into the serialized tensor table.
pub type TensorId = usize;

/// Stable arena handle of an operator. Equal to its serialized position at
/// load time; unlike [`Operator::position`] it never changes afterwards.
pub type OperatorId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DType {
    F32,
    F16,
    F64,
    I64,
    I32,
    I16,
    I8,
    U64,
    U32,
    U16,
    U8,
    Bool,
}

impl DType {
    /// Width of one element in bytes.
    pub const fn size_of(self) -> usize {
        match self {
            DType::U8 | DType::I8 | DType::Bool => 1,
            DType::F16 | DType::I16 | DType::U16 => 2,
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F64 | DType::I64 | DType::U64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TensorKind {
    /// Graph input - provided by caller, counts toward working memory
    Input,
    /// Graph output - returned to caller
    Output,
    /// Weights/biases - no producer, bytes live in the model file
    Constant,
    /// Intermediate activation
    Intermediate,
}

#[derive(Debug, Clone)]
pub struct Tensor {
    pub id: TensorId,
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
    /// Shape product times element width, checked when the graph is built.
    pub bytes: u64,
    /// Index into the model's buffer pool.
    pub buffer: u32,
    pub kind: TensorKind,
    pub producer: Option<OperatorId>,
    pub consumers: Vec<OperatorId>,
    /// Tensors transitively required to produce this one.
    pub(crate) ancestors: OnceLock<BTreeSet<TensorId>>,
}

impl Tensor {
    pub fn is_constant(&self) -> bool {
        self.kind == TensorKind::Constant
    }

    /// Bytes this tensor occupies in working memory; constants are free.
    pub fn size(&self) -> u64 {
        if self.is_constant() {
            return 0;
        }
        self.bytes
    }
}

#[derive(Debug, Clone)]
pub struct Operator {
    pub id: OperatorId,
    /// Current slot in the serialized execution order.
    pub position: usize,
    pub opcode: BuiltinOperator,
    pub inputs: Vec<TensorId>,
    pub output: Option<TensorId>,
}

#[derive(Debug, Clone)]
pub struct Graph {
    pub tensors: Vec<Tensor>,
    pub operators: Vec<Operator>,
    pub inputs: Vec<TensorId>,
    pub outputs: Vec<TensorId>,
    /// Operator ids sorted by `position`.
    pub(crate) execution_order: Vec<OperatorId>,
}

impl Graph {
    pub fn tensor(&self, id: TensorId) -> &Tensor {
        &self.tensors[id]
    }

    pub fn operator(&self, id: OperatorId) -> &Operator {
        &self.operators[id]
    }

    /// Operators in their current serialized order.
    pub fn execution_order(&self) -> &[OperatorId] {
        &self.execution_order
    }

    pub fn producer(&self, tensor: TensorId) -> Option<&Operator> {
        self.tensors[tensor].producer.map(|op| &self.operators[op])
    }

    /// Ancestor set of `tensor`. Populated by the graph builder for every
    /// tensor; an unpopulated entry reads as empty.
    pub fn ancestors(&self, tensor: TensorId) -> &BTreeSet<TensorId> {
        static EMPTY: BTreeSet<TensorId> = BTreeSet::new();
        self.tensors[tensor].ancestors.get().unwrap_or(&EMPTY)
    }

    pub fn size_of<'a>(&self, tensors: impl IntoIterator<Item = &'a TensorId>) -> u64 {
        tensors
            .into_iter()
            .fold(0u64, |acc, t| acc.saturating_add(self.tensors[*t].size()))
    }

    /// Renumber operators to follow `order` (a permutation of operator ids)
    /// without touching tensors, edges or ancestor sets.
    pub(crate) fn renumber(&mut self, order: &[OperatorId]) {
        for (position, &op) in order.iter().enumerate() {
            self.operators[op].position = position;
        }
        let operators = &self.operators;
        self.execution_order.sort_by_key(|op| operators[*op].position);
    }
}
