//! Hand-maintained subset of the TFLite FlatBuffers schema.
//!
//! Mirrors the shape of `flatc --rust` output for the handful of tables this
//! crate reads (and, for fixtures, writes). Slot numbers follow
//! `tensorflow/lite/schema/schema.fbs`; fields not listed here are skipped by
//! the verifier and never touched.

use std::fmt;

use flatbuffers::{
    FlatBufferBuilder, Follow, ForwardsUOffset, InvalidFlatbuffer, Table, VOffsetT, Vector,
    Verifiable, Verifier, WIPOffset,
};

/// File identifier written by the TFLite converter.
pub const MODEL_IDENTIFIER: &str = "TFL3";

/// The only schema version this crate understands.
pub const SCHEMA_VERSION: u32 = 3;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct TensorType(pub i8);

#[allow(non_upper_case_globals)]
impl TensorType {
    pub const FLOAT32: Self = Self(0);
    pub const FLOAT16: Self = Self(1);
    pub const INT32: Self = Self(2);
    pub const UINT8: Self = Self(3);
    pub const INT64: Self = Self(4);
    pub const STRING: Self = Self(5);
    pub const BOOL: Self = Self(6);
    pub const INT16: Self = Self(7);
    pub const COMPLEX64: Self = Self(8);
    pub const INT8: Self = Self(9);
    pub const FLOAT64: Self = Self(10);
    pub const COMPLEX128: Self = Self(11);
    pub const UINT64: Self = Self(12);
    pub const RESOURCE: Self = Self(13);
    pub const VARIANT: Self = Self(14);
    pub const UINT32: Self = Self(15);
    pub const UINT16: Self = Self(16);
    pub const INT4: Self = Self(17);

    pub fn variant_name(self) -> Option<&'static str> {
        Some(match self {
            Self::FLOAT32 => "FLOAT32",
            Self::FLOAT16 => "FLOAT16",
            Self::INT32 => "INT32",
            Self::UINT8 => "UINT8",
            Self::INT64 => "INT64",
            Self::STRING => "STRING",
            Self::BOOL => "BOOL",
            Self::INT16 => "INT16",
            Self::COMPLEX64 => "COMPLEX64",
            Self::INT8 => "INT8",
            Self::FLOAT64 => "FLOAT64",
            Self::COMPLEX128 => "COMPLEX128",
            Self::UINT64 => "UINT64",
            Self::RESOURCE => "RESOURCE",
            Self::VARIANT => "VARIANT",
            Self::UINT32 => "UINT32",
            Self::UINT16 => "UINT16",
            Self::INT4 => "INT4",
            _ => return None,
        })
    }
}

impl fmt::Debug for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.variant_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "<UNKNOWN {}>", self.0),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct BuiltinOperator(pub i32);

#[allow(non_upper_case_globals)]
impl BuiltinOperator {
    pub const ADD: Self = Self(0);
    pub const AVERAGE_POOL_2D: Self = Self(1);
    pub const CONCATENATION: Self = Self(2);
    pub const CONV_2D: Self = Self(3);
    pub const DEPTHWISE_CONV_2D: Self = Self(4);
    pub const DEPTH_TO_SPACE: Self = Self(5);
    pub const DEQUANTIZE: Self = Self(6);
    pub const EMBEDDING_LOOKUP: Self = Self(7);
    pub const FLOOR: Self = Self(8);
    pub const FULLY_CONNECTED: Self = Self(9);
    pub const HASHTABLE_LOOKUP: Self = Self(10);
    pub const L2_NORMALIZATION: Self = Self(11);
    pub const L2_POOL_2D: Self = Self(12);
    pub const LOCAL_RESPONSE_NORMALIZATION: Self = Self(13);
    pub const LOGISTIC: Self = Self(14);
    pub const LSH_PROJECTION: Self = Self(15);
    pub const LSTM: Self = Self(16);
    pub const MAX_POOL_2D: Self = Self(17);
    pub const MUL: Self = Self(18);
    pub const RELU: Self = Self(19);
    pub const RELU_N1_TO_1: Self = Self(20);
    pub const RELU6: Self = Self(21);
    pub const RESHAPE: Self = Self(22);
    pub const RESIZE_BILINEAR: Self = Self(23);
    pub const RNN: Self = Self(24);
    pub const SOFTMAX: Self = Self(25);
    pub const SPACE_TO_DEPTH: Self = Self(26);
    pub const SVDF: Self = Self(27);
    pub const TANH: Self = Self(28);
    pub const CONCAT_EMBEDDINGS: Self = Self(29);
    pub const SKIP_GRAM: Self = Self(30);
    pub const CALL: Self = Self(31);
    pub const CUSTOM: Self = Self(32);
    pub const EMBEDDING_LOOKUP_SPARSE: Self = Self(33);
    pub const PAD: Self = Self(34);
    pub const UNIDIRECTIONAL_SEQUENCE_RNN: Self = Self(35);
    pub const GATHER: Self = Self(36);
    pub const BATCH_TO_SPACE_ND: Self = Self(37);
    pub const SPACE_TO_BATCH_ND: Self = Self(38);
    pub const TRANSPOSE: Self = Self(39);
    pub const MEAN: Self = Self(40);
    pub const SUB: Self = Self(41);
    pub const DIV: Self = Self(42);
    pub const SQUEEZE: Self = Self(43);
    pub const UNIDIRECTIONAL_SEQUENCE_LSTM: Self = Self(44);
    pub const STRIDED_SLICE: Self = Self(45);
    pub const QUANTIZE: Self = Self(114);
    pub const HARD_SWISH: Self = Self(117);

    pub fn variant_name(self) -> Option<&'static str> {
        Some(match self {
            Self::ADD => "ADD",
            Self::AVERAGE_POOL_2D => "AVERAGE_POOL_2D",
            Self::CONCATENATION => "CONCATENATION",
            Self::CONV_2D => "CONV_2D",
            Self::DEPTHWISE_CONV_2D => "DEPTHWISE_CONV_2D",
            Self::DEPTH_TO_SPACE => "DEPTH_TO_SPACE",
            Self::DEQUANTIZE => "DEQUANTIZE",
            Self::EMBEDDING_LOOKUP => "EMBEDDING_LOOKUP",
            Self::FLOOR => "FLOOR",
            Self::FULLY_CONNECTED => "FULLY_CONNECTED",
            Self::HASHTABLE_LOOKUP => "HASHTABLE_LOOKUP",
            Self::L2_NORMALIZATION => "L2_NORMALIZATION",
            Self::L2_POOL_2D => "L2_POOL_2D",
            Self::LOCAL_RESPONSE_NORMALIZATION => "LOCAL_RESPONSE_NORMALIZATION",
            Self::LOGISTIC => "LOGISTIC",
            Self::LSH_PROJECTION => "LSH_PROJECTION",
            Self::LSTM => "LSTM",
            Self::MAX_POOL_2D => "MAX_POOL_2D",
            Self::MUL => "MUL",
            Self::RELU => "RELU",
            Self::RELU_N1_TO_1 => "RELU_N1_TO_1",
            Self::RELU6 => "RELU6",
            Self::RESHAPE => "RESHAPE",
            Self::RESIZE_BILINEAR => "RESIZE_BILINEAR",
            Self::RNN => "RNN",
            Self::SOFTMAX => "SOFTMAX",
            Self::SPACE_TO_DEPTH => "SPACE_TO_DEPTH",
            Self::SVDF => "SVDF",
            Self::TANH => "TANH",
            Self::CONCAT_EMBEDDINGS => "CONCAT_EMBEDDINGS",
            Self::SKIP_GRAM => "SKIP_GRAM",
            Self::CALL => "CALL",
            Self::CUSTOM => "CUSTOM",
            Self::EMBEDDING_LOOKUP_SPARSE => "EMBEDDING_LOOKUP_SPARSE",
            Self::PAD => "PAD",
            Self::UNIDIRECTIONAL_SEQUENCE_RNN => "UNIDIRECTIONAL_SEQUENCE_RNN",
            Self::GATHER => "GATHER",
            Self::BATCH_TO_SPACE_ND => "BATCH_TO_SPACE_ND",
            Self::SPACE_TO_BATCH_ND => "SPACE_TO_BATCH_ND",
            Self::TRANSPOSE => "TRANSPOSE",
            Self::MEAN => "MEAN",
            Self::SUB => "SUB",
            Self::DIV => "DIV",
            Self::SQUEEZE => "SQUEEZE",
            Self::UNIDIRECTIONAL_SEQUENCE_LSTM => "UNIDIRECTIONAL_SEQUENCE_LSTM",
            Self::STRIDED_SLICE => "STRIDED_SLICE",
            Self::QUANTIZE => "QUANTIZE",
            Self::HARD_SWISH => "HARD_SWISH",
            _ => return None,
        })
    }
}

impl fmt::Debug for BuiltinOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.variant_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "<BUILTIN {}>", self.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

macro_rules! table {
    ($name:ident) => {
        #[derive(Copy, Clone)]
        pub struct $name<'a> {
            pub _tab: Table<'a>,
        }

        impl<'a> Follow<'a> for $name<'a> {
            type Inner = $name<'a>;

            #[inline]
            unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
                Self {
                    _tab: Table::new(buf, loc),
                }
            }
        }
    };
}

table!(Model);
table!(OperatorCode);
table!(SubGraph);
table!(Tensor);
table!(Operator);
table!(Buffer);

// All accessors below read from tables reached through `root_as_model`,
// which has already run the verifier over every field declared here.

impl<'a> Model<'a> {
    pub const VT_VERSION: VOffsetT = 4;
    pub const VT_OPERATOR_CODES: VOffsetT = 6;
    pub const VT_SUBGRAPHS: VOffsetT = 8;
    pub const VT_DESCRIPTION: VOffsetT = 10;
    pub const VT_BUFFERS: VOffsetT = 12;

    #[inline]
    pub fn version(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_VERSION, Some(0)) }.unwrap_or(0)
    }

    #[inline]
    pub fn operator_codes(&self) -> Option<Vector<'a, ForwardsUOffset<OperatorCode<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<OperatorCode>>>>(
                    Self::VT_OPERATOR_CODES,
                    None,
                )
        }
    }

    #[inline]
    pub fn subgraphs(&self) -> Option<Vector<'a, ForwardsUOffset<SubGraph<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<SubGraph>>>>(
                    Self::VT_SUBGRAPHS,
                    None,
                )
        }
    }

    #[inline]
    pub fn description(&self) -> Option<&'a str> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<&str>>(Self::VT_DESCRIPTION, None)
        }
    }

    #[inline]
    pub fn buffers(&self) -> Option<Vector<'a, ForwardsUOffset<Buffer<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<Buffer>>>>(
                    Self::VT_BUFFERS,
                    None,
                )
        }
    }
}

impl Verifiable for Model<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u32>("version", Self::VT_VERSION, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<OperatorCode>>>>(
                "operator_codes",
                Self::VT_OPERATOR_CODES,
                false,
            )?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<SubGraph>>>>(
                "subgraphs",
                Self::VT_SUBGRAPHS,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("description", Self::VT_DESCRIPTION, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<Buffer>>>>(
                "buffers",
                Self::VT_BUFFERS,
                false,
            )?
            .finish();
        Ok(())
    }
}

impl<'a> OperatorCode<'a> {
    pub const VT_DEPRECATED_BUILTIN_CODE: VOffsetT = 4;
    pub const VT_CUSTOM_CODE: VOffsetT = 6;
    pub const VT_VERSION: VOffsetT = 8;
    pub const VT_BUILTIN_CODE: VOffsetT = 10;

    #[inline]
    pub fn deprecated_builtin_code(&self) -> i8 {
        unsafe {
            self._tab
                .get::<i8>(Self::VT_DEPRECATED_BUILTIN_CODE, Some(0))
        }
        .unwrap_or(0)
    }

    #[inline]
    pub fn custom_code(&self) -> Option<&'a str> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<&str>>(Self::VT_CUSTOM_CODE, None)
        }
    }

    #[inline]
    pub fn version(&self) -> i32 {
        unsafe { self._tab.get::<i32>(Self::VT_VERSION, Some(1)) }.unwrap_or(1)
    }

    #[inline]
    pub fn builtin_code(&self) -> BuiltinOperator {
        BuiltinOperator(unsafe { self._tab.get::<i32>(Self::VT_BUILTIN_CODE, Some(0)) }.unwrap_or(0))
    }

    /// Operator kind, reconciling the pre-2.4 byte field with the int field
    /// the way the TFLite runtime does.
    pub fn resolved_builtin_code(&self) -> BuiltinOperator {
        let deprecated = BuiltinOperator(i32::from(self.deprecated_builtin_code()));
        deprecated.max(self.builtin_code())
    }
}

impl Verifiable for OperatorCode<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<i8>(
                "deprecated_builtin_code",
                Self::VT_DEPRECATED_BUILTIN_CODE,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("custom_code", Self::VT_CUSTOM_CODE, false)?
            .visit_field::<i32>("version", Self::VT_VERSION, false)?
            .visit_field::<i32>("builtin_code", Self::VT_BUILTIN_CODE, false)?
            .finish();
        Ok(())
    }
}

impl<'a> SubGraph<'a> {
    pub const VT_TENSORS: VOffsetT = 4;
    pub const VT_INPUTS: VOffsetT = 6;
    pub const VT_OUTPUTS: VOffsetT = 8;
    pub const VT_OPERATORS: VOffsetT = 10;
    pub const VT_NAME: VOffsetT = 12;

    #[inline]
    pub fn tensors(&self) -> Option<Vector<'a, ForwardsUOffset<Tensor<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<Tensor>>>>(Self::VT_TENSORS, None)
        }
    }

    #[inline]
    pub fn inputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_INPUTS, None)
        }
    }

    #[inline]
    pub fn outputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_OUTPUTS, None)
        }
    }

    /// The operator order table: one forward offset per operator, in
    /// execution order.
    #[inline]
    pub fn operators(&self) -> Option<Vector<'a, ForwardsUOffset<Operator<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<Operator>>>>(
                    Self::VT_OPERATORS,
                    None,
                )
        }
    }

    #[inline]
    pub fn name(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_NAME, None) }
    }
}

impl Verifiable for SubGraph<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<Tensor>>>>(
                "tensors",
                Self::VT_TENSORS,
                false,
            )?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("inputs", Self::VT_INPUTS, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("outputs", Self::VT_OUTPUTS, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<Operator>>>>(
                "operators",
                Self::VT_OPERATORS,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("name", Self::VT_NAME, false)?
            .finish();
        Ok(())
    }
}

impl<'a> Tensor<'a> {
    pub const VT_SHAPE: VOffsetT = 4;
    pub const VT_TYPE_: VOffsetT = 6;
    pub const VT_BUFFER: VOffsetT = 8;
    pub const VT_NAME: VOffsetT = 10;

    #[inline]
    pub fn shape(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_SHAPE, None)
        }
    }

    #[inline]
    pub fn type_(&self) -> TensorType {
        TensorType(unsafe { self._tab.get::<i8>(Self::VT_TYPE_, Some(0)) }.unwrap_or(0))
    }

    #[inline]
    pub fn buffer(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_BUFFER, Some(0)) }.unwrap_or(0)
    }

    #[inline]
    pub fn name(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_NAME, None) }
    }
}

impl Verifiable for Tensor<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("shape", Self::VT_SHAPE, false)?
            .visit_field::<i8>("type_", Self::VT_TYPE_, false)?
            .visit_field::<u32>("buffer", Self::VT_BUFFER, false)?
            .visit_field::<ForwardsUOffset<&str>>("name", Self::VT_NAME, false)?
            .finish();
        Ok(())
    }
}

impl<'a> Operator<'a> {
    pub const VT_OPCODE_INDEX: VOffsetT = 4;
    pub const VT_INPUTS: VOffsetT = 6;
    pub const VT_OUTPUTS: VOffsetT = 8;

    #[inline]
    pub fn opcode_index(&self) -> u32 {
        unsafe { self._tab.get::<u32>(Self::VT_OPCODE_INDEX, Some(0)) }.unwrap_or(0)
    }

    #[inline]
    pub fn inputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_INPUTS, None)
        }
    }

    #[inline]
    pub fn outputs(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_OUTPUTS, None)
        }
    }
}

impl Verifiable for Operator<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u32>("opcode_index", Self::VT_OPCODE_INDEX, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("inputs", Self::VT_INPUTS, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("outputs", Self::VT_OUTPUTS, false)?
            .finish();
        Ok(())
    }
}

impl<'a> Buffer<'a> {
    pub const VT_DATA: VOffsetT = 4;

    #[inline]
    pub fn data(&self) -> Option<Vector<'a, u8>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, u8>>>(Self::VT_DATA, None)
        }
    }
}

impl Verifiable for Buffer<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, u8>>>("data", Self::VT_DATA, false)?
            .finish();
        Ok(())
    }
}

/// Verify `buf` and return its root `Model` table.
#[inline]
pub fn root_as_model(buf: &[u8]) -> Result<Model<'_>, InvalidFlatbuffer> {
    flatbuffers::root::<Model>(buf)
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ModelArgs<'a> {
    pub version: u32,
    pub operator_codes: Option<WIPOffset<Vector<'a, ForwardsUOffset<OperatorCode<'a>>>>>,
    pub subgraphs: Option<WIPOffset<Vector<'a, ForwardsUOffset<SubGraph<'a>>>>>,
    pub description: Option<WIPOffset<&'a str>>,
    pub buffers: Option<WIPOffset<Vector<'a, ForwardsUOffset<Buffer<'a>>>>>,
}

impl<'a> Model<'a> {
    pub fn create<'bldr: 'args, 'args: 'mut_bldr, 'mut_bldr>(
        fbb: &'mut_bldr mut FlatBufferBuilder<'bldr>,
        args: &'args ModelArgs<'args>,
    ) -> WIPOffset<Model<'bldr>> {
        let start = fbb.start_table();
        if let Some(x) = args.buffers {
            fbb.push_slot_always::<WIPOffset<_>>(Model::VT_BUFFERS, x);
        }
        if let Some(x) = args.description {
            fbb.push_slot_always::<WIPOffset<_>>(Model::VT_DESCRIPTION, x);
        }
        if let Some(x) = args.subgraphs {
            fbb.push_slot_always::<WIPOffset<_>>(Model::VT_SUBGRAPHS, x);
        }
        if let Some(x) = args.operator_codes {
            fbb.push_slot_always::<WIPOffset<_>>(Model::VT_OPERATOR_CODES, x);
        }
        fbb.push_slot::<u32>(Model::VT_VERSION, args.version, 0);
        let o = fbb.end_table(start);
        WIPOffset::new(o.value())
    }
}

pub struct OperatorCodeArgs {
    pub deprecated_builtin_code: i8,
    pub version: i32,
    pub builtin_code: BuiltinOperator,
}

impl Default for OperatorCodeArgs {
    fn default() -> Self {
        Self {
            deprecated_builtin_code: 0,
            version: 1,
            builtin_code: BuiltinOperator::ADD,
        }
    }
}

impl<'a> OperatorCode<'a> {
    pub fn create<'bldr: 'mut_bldr, 'mut_bldr>(
        fbb: &'mut_bldr mut FlatBufferBuilder<'bldr>,
        args: &OperatorCodeArgs,
    ) -> WIPOffset<OperatorCode<'bldr>> {
        let start = fbb.start_table();
        fbb.push_slot::<i32>(OperatorCode::VT_BUILTIN_CODE, args.builtin_code.0, 0);
        fbb.push_slot::<i32>(OperatorCode::VT_VERSION, args.version, 1);
        fbb.push_slot::<i8>(
            OperatorCode::VT_DEPRECATED_BUILTIN_CODE,
            args.deprecated_builtin_code,
            0,
        );
        let o = fbb.end_table(start);
        WIPOffset::new(o.value())
    }
}

#[derive(Default)]
pub struct SubGraphArgs<'a> {
    pub tensors: Option<WIPOffset<Vector<'a, ForwardsUOffset<Tensor<'a>>>>>,
    pub inputs: Option<WIPOffset<Vector<'a, i32>>>,
    pub outputs: Option<WIPOffset<Vector<'a, i32>>>,
    pub operators: Option<WIPOffset<Vector<'a, ForwardsUOffset<Operator<'a>>>>>,
    pub name: Option<WIPOffset<&'a str>>,
}

impl<'a> SubGraph<'a> {
    pub fn create<'bldr: 'args, 'args: 'mut_bldr, 'mut_bldr>(
        fbb: &'mut_bldr mut FlatBufferBuilder<'bldr>,
        args: &'args SubGraphArgs<'args>,
    ) -> WIPOffset<SubGraph<'bldr>> {
        let start = fbb.start_table();
        if let Some(x) = args.name {
            fbb.push_slot_always::<WIPOffset<_>>(SubGraph::VT_NAME, x);
        }
        if let Some(x) = args.operators {
            fbb.push_slot_always::<WIPOffset<_>>(SubGraph::VT_OPERATORS, x);
        }
        if let Some(x) = args.outputs {
            fbb.push_slot_always::<WIPOffset<_>>(SubGraph::VT_OUTPUTS, x);
        }
        if let Some(x) = args.inputs {
            fbb.push_slot_always::<WIPOffset<_>>(SubGraph::VT_INPUTS, x);
        }
        if let Some(x) = args.tensors {
            fbb.push_slot_always::<WIPOffset<_>>(SubGraph::VT_TENSORS, x);
        }
        let o = fbb.end_table(start);
        WIPOffset::new(o.value())
    }
}

#[derive(Default)]
pub struct TensorArgs<'a> {
    pub shape: Option<WIPOffset<Vector<'a, i32>>>,
    pub type_: TensorType,
    pub buffer: u32,
    pub name: Option<WIPOffset<&'a str>>,
}

impl<'a> Tensor<'a> {
    pub fn create<'bldr: 'args, 'args: 'mut_bldr, 'mut_bldr>(
        fbb: &'mut_bldr mut FlatBufferBuilder<'bldr>,
        args: &'args TensorArgs<'args>,
    ) -> WIPOffset<Tensor<'bldr>> {
        let start = fbb.start_table();
        if let Some(x) = args.name {
            fbb.push_slot_always::<WIPOffset<_>>(Tensor::VT_NAME, x);
        }
        fbb.push_slot::<u32>(Tensor::VT_BUFFER, args.buffer, 0);
        if let Some(x) = args.shape {
            fbb.push_slot_always::<WIPOffset<_>>(Tensor::VT_SHAPE, x);
        }
        fbb.push_slot::<i8>(Tensor::VT_TYPE_, args.type_.0, 0);
        let o = fbb.end_table(start);
        WIPOffset::new(o.value())
    }
}

#[derive(Default)]
pub struct OperatorArgs<'a> {
    pub opcode_index: u32,
    pub inputs: Option<WIPOffset<Vector<'a, i32>>>,
    pub outputs: Option<WIPOffset<Vector<'a, i32>>>,
}

impl<'a> Operator<'a> {
    pub fn create<'bldr: 'args, 'args: 'mut_bldr, 'mut_bldr>(
        fbb: &'mut_bldr mut FlatBufferBuilder<'bldr>,
        args: &'args OperatorArgs<'args>,
    ) -> WIPOffset<Operator<'bldr>> {
        let start = fbb.start_table();
        if let Some(x) = args.outputs {
            fbb.push_slot_always::<WIPOffset<_>>(Operator::VT_OUTPUTS, x);
        }
        if let Some(x) = args.inputs {
            fbb.push_slot_always::<WIPOffset<_>>(Operator::VT_INPUTS, x);
        }
        fbb.push_slot::<u32>(Operator::VT_OPCODE_INDEX, args.opcode_index, 0);
        let o = fbb.end_table(start);
        WIPOffset::new(o.value())
    }
}

#[derive(Default)]
pub struct BufferArgs<'a> {
    pub data: Option<WIPOffset<Vector<'a, u8>>>,
}

impl<'a> Buffer<'a> {
    pub fn create<'bldr: 'args, 'args: 'mut_bldr, 'mut_bldr>(
        fbb: &'mut_bldr mut FlatBufferBuilder<'bldr>,
        args: &'args BufferArgs<'args>,
    ) -> WIPOffset<Buffer<'bldr>> {
        let start = fbb.start_table();
        if let Some(x) = args.data {
            fbb.push_slot_always::<WIPOffset<_>>(Buffer::VT_DATA, x);
        }
        let o = fbb.end_table(start);
        WIPOffset::new(o.value())
    }
}
