//! TFLite flatbuffer decoding and lowering to the graph IR.

pub mod lowering;
pub mod schema;
pub mod view;

pub use lowering::build_graph;
pub use schema::{BuiltinOperator, TensorType};
pub use view::ModelView;
