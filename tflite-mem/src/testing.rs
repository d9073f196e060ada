//! Synthesizes small `.tflite` flatbuffers for tests.

use flatbuffers::FlatBufferBuilder;

use crate::parse::tflite::schema::{
    Buffer, BufferArgs, BuiltinOperator, Model, ModelArgs, Operator, OperatorArgs, OperatorCode,
    OperatorCodeArgs, SubGraph, SubGraphArgs, Tensor, TensorArgs, TensorType, MODEL_IDENTIFIER,
    SCHEMA_VERSION,
};

#[derive(Debug, Clone, Copy)]
pub(crate) struct TensorSpec {
    pub type_: TensorType,
}

impl TensorSpec {
    pub fn u8() -> Self {
        Self {
            type_: TensorType::UINT8,
        }
    }

    pub fn i8() -> Self {
        Self {
            type_: TensorType::INT8,
        }
    }

    pub fn f32() -> Self {
        Self {
            type_: TensorType::FLOAT32,
        }
    }
}

struct FixtureTensor {
    name: String,
    shape: Vec<i32>,
    type_: TensorType,
    buffer: u32,
}

struct FixtureOp {
    opcode_index: u32,
    inputs: Vec<i32>,
    outputs: Vec<i32>,
}

/// Builder for a single-subgraph model. Tensor handles are the raw `i32`
/// indices the format uses.
pub(crate) struct ModelFixture {
    pub version: u32,
    tensors: Vec<FixtureTensor>,
    buffers: Vec<Vec<u8>>,
    opcodes: Vec<BuiltinOperator>,
    operators: Vec<FixtureOp>,
    inputs: Vec<i32>,
    outputs: Vec<i32>,
}

impl ModelFixture {
    pub fn new() -> Self {
        Self {
            version: SCHEMA_VERSION,
            tensors: Vec::new(),
            // buffer 0 is the conventional empty sentinel
            buffers: vec![Vec::new()],
            opcodes: Vec::new(),
            operators: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn tensor(&mut self, name: &str, shape: &[i32], spec: TensorSpec) -> i32 {
        self.tensors.push(FixtureTensor {
            name: name.to_string(),
            shape: shape.to_vec(),
            type_: spec.type_,
            buffer: 0,
        });
        (self.tensors.len() - 1) as i32
    }

    pub fn input(&mut self, name: &str, shape: &[i32], spec: TensorSpec) -> i32 {
        let id = self.tensor(name, shape, spec);
        self.inputs.push(id);
        id
    }

    pub fn constant(&mut self, name: &str, shape: &[i32], spec: TensorSpec, data: Vec<u8>) -> i32 {
        let id = self.tensor(name, shape, spec);
        self.buffers.push(data);
        self.tensors[id as usize].buffer = (self.buffers.len() - 1) as u32;
        id
    }

    pub fn output(&mut self, tensor: i32) {
        self.outputs.push(tensor);
    }

    pub fn buffer_of(&self, tensor: i32) -> u32 {
        self.tensors[tensor as usize].buffer
    }

    pub fn op(&mut self, opcode: BuiltinOperator, inputs: &[i32], output: Option<i32>) -> usize {
        self.op_raw(opcode, inputs.to_vec(), output.into_iter().collect())
    }

    /// Like [`op`](Self::op) but with unchecked output arity.
    pub fn op_raw(&mut self, opcode: BuiltinOperator, inputs: Vec<i32>, outputs: Vec<i32>) -> usize {
        let opcode_index = match self.opcodes.iter().position(|c| *c == opcode) {
            Some(i) => i,
            None => {
                self.opcodes.push(opcode);
                self.opcodes.len() - 1
            }
        };
        self.op_with_opcode_index(opcode_index as u32, inputs, outputs)
    }

    pub fn op_with_opcode_index(&mut self, opcode_index: u32, inputs: Vec<i32>, outputs: Vec<i32>) -> usize {
        self.operators.push(FixtureOp {
            opcode_index,
            inputs,
            outputs,
        });
        self.operators.len() - 1
    }

    pub fn build(&self) -> Vec<u8> {
        let mut fbb = FlatBufferBuilder::new();

        let mut buffers = Vec::with_capacity(self.buffers.len());
        for data in &self.buffers {
            let data = if data.is_empty() {
                None
            } else {
                Some(fbb.create_vector(&data[..]))
            };
            buffers.push(Buffer::create(&mut fbb, &BufferArgs { data }));
        }
        let buffers = fbb.create_vector(&buffers[..]);

        let mut codes = Vec::with_capacity(self.opcodes.len());
        for code in &self.opcodes {
            let deprecated_builtin_code = code.0.min(127) as i8;
            codes.push(OperatorCode::create(
                &mut fbb,
                &OperatorCodeArgs {
                    deprecated_builtin_code,
                    version: 1,
                    builtin_code: *code,
                },
            ));
        }
        let codes = fbb.create_vector(&codes[..]);

        let mut tensors = Vec::with_capacity(self.tensors.len());
        for t in &self.tensors {
            let shape = fbb.create_vector(&t.shape[..]);
            let name = fbb.create_string(&t.name);
            tensors.push(Tensor::create(
                &mut fbb,
                &TensorArgs {
                    shape: Some(shape),
                    type_: t.type_,
                    buffer: t.buffer,
                    name: Some(name),
                },
            ));
        }
        let tensors = fbb.create_vector(&tensors[..]);

        let mut operators = Vec::with_capacity(self.operators.len());
        for op in &self.operators {
            let inputs = fbb.create_vector(&op.inputs[..]);
            let outputs = fbb.create_vector(&op.outputs[..]);
            operators.push(Operator::create(
                &mut fbb,
                &OperatorArgs {
                    opcode_index: op.opcode_index,
                    inputs: Some(inputs),
                    outputs: Some(outputs),
                },
            ));
        }
        let operators = fbb.create_vector(&operators[..]);

        let inputs = fbb.create_vector(&self.inputs[..]);
        let outputs = fbb.create_vector(&self.outputs[..]);
        let name = fbb.create_string("main");
        let subgraph = SubGraph::create(
            &mut fbb,
            &SubGraphArgs {
                tensors: Some(tensors),
                inputs: Some(inputs),
                outputs: Some(outputs),
                operators: Some(operators),
                name: Some(name),
            },
        );
        let subgraphs = fbb.create_vector(&[subgraph]);
        let description = fbb.create_string("tflite-mem fixture");

        let model = Model::create(
            &mut fbb,
            &ModelArgs {
                version: self.version,
                operator_codes: Some(codes),
                subgraphs: Some(subgraphs),
                description: Some(description),
                buffers: Some(buffers),
            },
        );
        fbb.finish(model, Some(MODEL_IDENTIFIER));
        fbb.finished_data().to_vec()
    }
}

/// `x (100 B, input) -> op1 -> y (30 B) -> op2 -> z (10 B, output)`
pub(crate) fn chain_fixture() -> ModelFixture {
    let mut fixture = ModelFixture::new();
    let x = fixture.input("x", &[1, 100], TensorSpec::u8());
    let y = fixture.tensor("y", &[1, 30], TensorSpec::u8());
    let z = fixture.tensor("z", &[1, 10], TensorSpec::u8());
    fixture.op(BuiltinOperator::CONV_2D, &[x], Some(y));
    fixture.op(BuiltinOperator::FULLY_CONNECTED, &[y], Some(z));
    fixture.output(z);
    fixture
}

pub(crate) fn chain_model() -> Vec<u8> {
    chain_fixture().build()
}

/// Shared input feeding two branches that join:
///
/// ```text
/// x (100 B) -> op0 -> a (10 B) --\
///           -> op1 -> b (10 B) ---> op2 -> c (10 B, output)
/// ```
pub(crate) fn diamond_model() -> Vec<u8> {
    let mut fixture = ModelFixture::new();
    let x = fixture.input("x", &[100], TensorSpec::u8());
    let a = fixture.tensor("a", &[10], TensorSpec::u8());
    let b = fixture.tensor("b", &[10], TensorSpec::u8());
    let c = fixture.tensor("c", &[10], TensorSpec::u8());
    fixture.op(BuiltinOperator::CONV_2D, &[x], Some(a));
    fixture.op(BuiltinOperator::CONV_2D, &[x], Some(b));
    fixture.op(BuiltinOperator::ADD, &[a, b], Some(c));
    fixture.output(c);
    fixture.build()
}

/// A model whose serialized order is valid but wasteful: both branches are
/// started before either is reduced, so `big` and `small` are live together.
///
/// ```text
/// x (10 B) -> op0 -> big (200 B) -> op2 -> big_out (5 B) --\
///          -> op1 -> small (50 B) -> op3 -> small_out (5 B) --> op4 -> y (5 B)
/// ```
pub(crate) fn branchy_model() -> Vec<u8> {
    let mut fixture = ModelFixture::new();
    let x = fixture.input("x", &[10], TensorSpec::u8());
    let big = fixture.tensor("big", &[200], TensorSpec::u8());
    let big_out = fixture.tensor("big_out", &[5], TensorSpec::u8());
    let small = fixture.tensor("small", &[50], TensorSpec::u8());
    let small_out = fixture.tensor("small_out", &[5], TensorSpec::u8());
    let y = fixture.tensor("y", &[5], TensorSpec::u8());
    fixture.op(BuiltinOperator::CONV_2D, &[x], Some(big));
    fixture.op(BuiltinOperator::CONV_2D, &[x], Some(small));
    fixture.op(BuiltinOperator::MAX_POOL_2D, &[big], Some(big_out));
    fixture.op(BuiltinOperator::MAX_POOL_2D, &[small], Some(small_out));
    fixture.op(BuiltinOperator::CONCATENATION, &[big_out, small_out], Some(y));
    fixture.output(y);
    fixture.build()
}

/// Random DAG description used by property tests: for each operator, its
/// output size and a list of raw picks among the tensors available so far.
#[derive(Debug, Clone)]
pub(crate) struct DagSpec {
    pub input_sizes: Vec<i32>,
    pub ops: Vec<(i32, Vec<usize>)>,
}

impl DagSpec {
    /// Serialize the DAG. Every operator output that nothing consumes is
    /// declared a subgraph output, so no operator is dead.
    pub fn build(&self) -> Vec<u8> {
        let mut fixture = ModelFixture::new();
        let mut available: Vec<i32> = self
            .input_sizes
            .iter()
            .enumerate()
            .map(|(i, size)| fixture.input(&format!("in{i}"), &[*size], TensorSpec::u8()))
            .collect();
        available.push(fixture.constant("w", &[64], TensorSpec::u8(), vec![7; 64]));

        let mut consumed = vec![false; self.ops.len()];
        let mut outputs = Vec::with_capacity(self.ops.len());
        for (i, (size, picks)) in self.ops.iter().enumerate() {
            let mut inputs: Vec<i32> = picks
                .iter()
                .map(|p| available[p % available.len()])
                .collect();
            inputs.sort_unstable();
            inputs.dedup();

            for t in &inputs {
                if let Some(producer) = outputs.iter().position(|o| o == t) {
                    consumed[producer] = true;
                }
            }
            let out = fixture.tensor(&format!("t{i}"), &[*size], TensorSpec::u8());
            fixture.op(BuiltinOperator::CONV_2D, &inputs, Some(out));
            outputs.push(out);
            available.push(out);
        }
        for (out, used) in outputs.iter().zip(&consumed) {
            if !used {
                fixture.output(*out);
            }
        }
        fixture.build()
    }
}
