//! Zero-copy view over a serialized TFLite model.
//!
//! All byte-level knowledge of the format lives here: the graph builder reads
//! through the FlatBuffers accessors, and the rewriter only ever calls
//! [`ModelView::patch_operator_order`].

use std::ops::Range;

use super::schema::{root_as_model, Model, SubGraph, MODEL_IDENTIFIER, SCHEMA_VERSION};
use crate::error::{Error, Result};

/// Width of one slot in the operator order table.
const SLOT_SIZE: usize = 4;

/// A decoded model: owns the bytes, remembers where the mutable parts are.
#[derive(Debug, Clone)]
pub struct ModelView {
    model_data: Vec<u8>,
    /// Absolute offset of the first operator slot in `model_data`.
    operator_table: usize,
    operator_count: usize,
    /// Absolute location of each buffer's payload, `None` when empty.
    buffer_locations: Vec<Option<Range<usize>>>,
}

impl ModelView {
    /// Verify `model_data` and record the layout of subgraph 0.
    pub fn decode(model_data: Vec<u8>) -> Result<Self> {
        let (operator_table, operator_count, buffer_locations) = {
            let model = root_as_model(&model_data)
                .map_err(|e| Error::malformed(format!("failed to parse TFLite model: {e}")))?;

            if model_data.len() < 8
                || !flatbuffers::buffer_has_identifier(&model_data, MODEL_IDENTIFIER, false)
            {
                log::warn!("model has no {MODEL_IDENTIFIER} file identifier");
            }
            if model.version() != SCHEMA_VERSION {
                return Err(Error::malformed(format!(
                    "unsupported schema version {} (expected {SCHEMA_VERSION})",
                    model.version()
                )));
            }

            let subgraphs = model
                .subgraphs()
                .ok_or_else(|| Error::malformed("no subgraphs in model"))?;
            if subgraphs.len() == 0 {
                return Err(Error::malformed("model has no subgraph 0"));
            }
            if subgraphs.len() > 1 {
                log::warn!(
                    "model has {} subgraphs; only subgraph 0 is analysed",
                    subgraphs.len()
                );
            }

            let subgraph = subgraphs.get(0);
            subgraph
                .tensors()
                .ok_or_else(|| Error::malformed("no tensors in subgraph"))?;
            let operators = subgraph
                .operators()
                .ok_or_else(|| Error::malformed("no operators in subgraph"))?;
            let operator_table = locate(&model_data, operators.bytes())
                .ok_or_else(|| Error::malformed("operator table lies outside the model buffer"))?;

            (operator_table, operators.len(), buffer_locations(&model_data, &model))
        };

        log::debug!(
            "decoded model: {} bytes, {} operators, operator table at {:#x}",
            model_data.len(),
            operator_count,
            operator_table
        );

        Ok(Self {
            model_data,
            operator_table,
            operator_count,
            buffer_locations,
        })
    }

    /// Root table accessor. The bytes were verified in [`decode`](Self::decode)
    /// and patching only permutes forward offsets, so this cannot fail in
    /// practice; it still reports instead of panicking.
    pub fn model(&self) -> Result<Model<'_>> {
        root_as_model(&self.model_data)
            .map_err(|e| Error::malformed(format!("failed to parse TFLite model: {e}")))
    }

    /// Subgraph 0, the only one this crate analyses.
    pub fn subgraph(&self) -> Result<SubGraph<'_>> {
        self.model()?
            .subgraphs()
            .filter(|s| s.len() > 0)
            .map(|s| s.get(0))
            .ok_or_else(|| Error::malformed("model has no subgraph 0"))
    }

    pub fn operator_count(&self) -> usize {
        self.operator_count
    }

    /// Raw contents of the operator order table, one relative offset per
    /// operator in execution order.
    pub fn operator_order_table(&self) -> Vec<u32> {
        self.model_data[self.table_range()]
            .chunks_exact(SLOT_SIZE)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    /// Move the operator at old position `p` to position `new_positions[p]`.
    ///
    /// Slots hold offsets relative to their own position, so a slot moving
    /// from `p` to `q` is compensated by `4 * (p - q)`. Nothing outside the
    /// operator table is written, and nothing at all is written unless
    /// `new_positions` is a bijection over `0..operator_count`.
    pub fn patch_operator_order(&mut self, new_positions: &[usize]) -> Result<()> {
        let n = self.operator_count;
        if new_positions.len() != n {
            return Err(Error::invariant(format!(
                "permutation has {} entries, model has {n} operators",
                new_positions.len()
            )));
        }
        let mut taken = vec![false; n];
        for &q in new_positions {
            if q >= n || std::mem::replace(&mut taken[q], true) {
                return Err(Error::invariant(format!(
                    "position {q} is out of range or assigned twice"
                )));
            }
        }

        let old = self.operator_order_table();
        let mut patched = vec![0u32; n];
        for (p, &q) in new_positions.iter().enumerate() {
            let shift = SLOT_SIZE as i64 * (p as i64 - q as i64);
            let value = i64::from(old[p]) + shift;
            patched[q] = u32::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| {
                    Error::malformed(format!(
                        "operator {p} cannot move to slot {q}: offset {value} is not a forward offset"
                    ))
                })?;
        }

        let table = self.table_range();
        for (slot, value) in self.model_data[table]
            .chunks_exact_mut(SLOT_SIZE)
            .zip(patched)
        {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_locations.len()
    }

    /// Payload of buffer `index`, if it carries inline data.
    pub fn buffer_data(&self, index: usize) -> Option<&[u8]> {
        let range = self.buffer_locations.get(index)?.clone()?;
        Some(&self.model_data[range])
    }

    /// Mutable payload of buffer `index`. Overwriting it never changes the
    /// payload length, so the rest of the layout stays valid.
    pub fn buffer_data_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let range = self.buffer_locations.get(index)?.clone()?;
        Some(&mut self.model_data[range])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.model_data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.model_data
    }

    fn table_range(&self) -> Range<usize> {
        self.operator_table..self.operator_table + SLOT_SIZE * self.operator_count
    }
}

/// Absolute offset of `part` inside `model_data`, by pointer arithmetic.
/// FlatBuffers hands out sub-slices of the original buffer.
fn locate(model_data: &[u8], part: &[u8]) -> Option<usize> {
    let base = model_data.as_ptr() as usize;
    let ptr = part.as_ptr() as usize;
    if ptr < base || ptr + part.len() > base + model_data.len() {
        return None;
    }
    Some(ptr - base)
}

fn buffer_locations(model_data: &[u8], model: &Model) -> Vec<Option<Range<usize>>> {
    let Some(buffers) = model.buffers() else {
        return Vec::new();
    };
    buffers
        .iter()
        .map(|buffer| {
            let data = buffer.data()?.bytes();
            if data.is_empty() {
                return None;
            }
            let offset = locate(model_data, data)?;
            Some(offset..offset + data.len())
        })
        .collect()
}
