//! Core graph types.

pub mod graph;

pub use graph::{DType, Graph, Operator, OperatorId, Tensor, TensorId, TensorKind};
