//! Code-book weight clustering.
//!
//! Simulates code-book quantization: every weight of a layer is replaced by
//! the nearest of `k` shared values, written straight into the model's weight
//! buffers so the file layout is unchanged.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::ir::graph::{DType, Graph};
use crate::parse::tflite::{BuiltinOperator, ModelView};

const MAX_ITERATIONS: usize = 100;

/// Operators whose second input is a weight tensor.
const PARAMETRISED: [BuiltinOperator; 3] = [
    BuiltinOperator::CONV_2D,
    BuiltinOperator::FULLY_CONNECTED,
    BuiltinOperator::DEPTHWISE_CONV_2D,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Index into `centroids` for every input value.
    pub assignments: Vec<usize>,
    /// Ascending cluster centres.
    pub centroids: Vec<f64>,
}

impl Clustering {
    pub fn value_of(&self, index: usize) -> f64 {
        self.centroids[self.assignments[index]]
    }
}

/// Deterministic 1-D k-means (Lloyd's algorithm). Centres start at evenly
/// spaced quantiles of the distinct values, so the result depends only on
/// the input. Produces at most `k` centroids, fewer when there are fewer
/// distinct values.
pub fn cluster(values: &[f64], k: usize) -> Clustering {
    let mut distinct: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();

    let k = k.min(distinct.len());
    if k == 0 {
        return Clustering {
            assignments: vec![0; values.len()],
            centroids: if values.is_empty() { Vec::new() } else { vec![0.0] },
        };
    }

    let mut centroids: Vec<f64> = (0..k)
        .map(|i| {
            let at = if k == 1 {
                distinct.len() / 2
            } else {
                i * (distinct.len() - 1) / (k - 1)
            };
            distinct[at]
        })
        .collect();
    let mut assignments = assign(values, &centroids);

    for _ in 0..MAX_ITERATIONS {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (v, &c) in values.iter().zip(&assignments) {
            if v.is_finite() {
                sums[c] += v;
                counts[c] += 1;
            }
        }
        for c in 0..k {
            // an empty cluster keeps its centre
            if counts[c] > 0 {
                centroids[c] = sums[c] / counts[c] as f64;
            }
        }
        let next = assign(values, &centroids);
        if next == assignments {
            break;
        }
        assignments = next;
    }

    Clustering {
        assignments,
        centroids,
    }
}

fn assign(values: &[f64], centroids: &[f64]) -> Vec<usize> {
    values
        .iter()
        .map(|v| {
            let mut best = 0;
            for (c, centre) in centroids.iter().enumerate() {
                if (v - centre).abs() < (v - centroids[best]).abs() {
                    best = c;
                }
            }
            best
        })
        .collect()
}

/// Cluster the weights of every convolution and fully connected layer into
/// `k` values, in place. Only 1-byte weight types are rewritten; other
/// weight buffers are skipped with a warning. Returns the number of buffers
/// rewritten.
pub fn cluster_weights(view: &mut ModelView, graph: &Graph, k: usize) -> Result<usize> {
    let weights: BTreeSet<usize> = graph
        .operators
        .iter()
        .filter(|op| PARAMETRISED.contains(&op.opcode))
        .filter_map(|op| op.inputs.get(1))
        .filter(|t| graph.tensor(**t).is_constant())
        .copied()
        .collect();

    log::info!("clustering weights into {k} clusters");
    let mut seen = BTreeSet::new();
    let mut rewritten = 0;
    for t in weights {
        let tensor = graph.tensor(t);
        let buffer = tensor.buffer as usize;
        if !seen.insert(buffer) {
            continue;
        }
        let Some(data) = view.buffer_data_mut(buffer) else {
            log::debug!("weight tensor {} ({}) has no inline data", t, tensor.name);
            continue;
        };

        match tensor.dtype {
            DType::U8 => {
                let values: Vec<f64> = data.iter().map(|b| f64::from(*b)).collect();
                let clustering = cluster(&values, k);
                for (i, byte) in data.iter_mut().enumerate() {
                    *byte = clustering.value_of(i).round().clamp(0.0, 255.0) as u8;
                }
            }
            DType::I8 => {
                let values: Vec<f64> = data.iter().map(|b| f64::from(*b as i8)).collect();
                let clustering = cluster(&values, k);
                for (i, byte) in data.iter_mut().enumerate() {
                    *byte = clustering.value_of(i).round().clamp(-128.0, 127.0) as i8 as u8;
                }
            }
            other => {
                log::warn!(
                    "skipping weight tensor {} ({}): {:?} weights are not clustered",
                    t,
                    tensor.name,
                    other
                );
                continue;
            }
        }
        rewritten += 1;
    }
    Ok(rewritten)
}
