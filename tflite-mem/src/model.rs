//! A `.tflite` model held in memory together with its lazily built graph.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::ir::graph::Graph;
use crate::parse::tflite::{build_graph, ModelView};
use crate::quantize;
use crate::report::Report;
use crate::schedule::{
    self, live_sets_for, peak_bytes, RewriteOutcome, Schedule, ScheduleStep, SchedulerConfig,
};

pub struct TfliteModel {
    view: ModelView,
    config: SchedulerConfig,
    graph: Option<Graph>,
    /// Minimum-peak schedule. Stays valid across rewrites: the search only
    /// depends on tensors and edges, never on operator positions.
    optimal: Option<Schedule>,
}

impl TfliteModel {
    pub fn from_bytes(model_data: Vec<u8>) -> Result<Self> {
        Ok(Self {
            view: ModelView::decode(model_data)?,
            config: SchedulerConfig::default(),
            graph: None,
            optimal: None,
        })
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("loading {}", path.display());
        Self::from_bytes(fs::read(path)?)
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self.optimal = None;
        self
    }

    pub fn graph(&mut self) -> Result<&Graph> {
        let (_, graph) = self.parts()?;
        Ok(&*graph)
    }

    /// Live tensors and footprint at each step of the current order.
    pub fn execution_schedule(&mut self) -> Result<Vec<ScheduleStep>> {
        let graph = self.graph()?;
        Ok(live_sets_for(graph, graph.execution_order()))
    }

    /// Peak working memory of the current order.
    pub fn current_peak(&mut self) -> Result<u64> {
        Ok(peak_bytes(&self.execution_schedule()?))
    }

    /// Minimum achievable peak and an order attaining it; computed once.
    pub fn peak_memory_usage(&mut self) -> Result<&Schedule> {
        let optimal = match self.optimal.take() {
            Some(optimal) => optimal,
            None => {
                let config = self.config.clone();
                schedule::schedule(self.parts()?.1, &config)?
            }
        };
        Ok(self.optimal.insert(optimal))
    }

    /// Reorder operators to the minimum-peak order, in place.
    pub fn optimize_memory(&mut self) -> Result<RewriteOutcome> {
        let optimal = self.peak_memory_usage()?.clone();
        let (view, graph) = self.parts()?;
        let order = optimal.full_order(graph);
        let outcome = schedule::apply(view, graph, &order)?;
        match outcome {
            RewriteOutcome::AlreadyOptimal => {
                log::info!("the model already has optimal operator order")
            }
            RewriteOutcome::Reordered { moved } => log::info!(
                "moved {moved} operators, peak is now {} bytes",
                optimal.peak_bytes
            ),
        }
        Ok(outcome)
    }

    /// Cluster 1-byte weights into `k` shared values.
    pub fn cluster_weights(&mut self, k: usize) -> Result<usize> {
        let (view, graph) = self.parts()?;
        quantize::cluster_weights(view, graph, k)
    }

    /// Analysis of the current order, with the optimum when it is known.
    pub fn report(&mut self) -> Result<Report> {
        let optimal = self.optimal.clone();
        Ok(Report::new(self.parts()?.1, optimal.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.view.as_bytes()
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.view.as_bytes())?;
        log::info!("wrote {}", path.display());
        Ok(())
    }

    fn parts(&mut self) -> Result<(&mut ModelView, &mut Graph)> {
        let graph = match self.graph.take() {
            Some(graph) => graph,
            None => build_graph(&self.view)?,
        };
        Ok((&mut self.view, self.graph.insert(graph)))
    }
}
