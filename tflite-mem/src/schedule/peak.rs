//! Exact minimum-peak-memory operator ordering.
//!
//! Works backwards from the subgraph outputs: a frontier is the set of tensors
//! still required, and one step un-applies the operator producing a frontier
//! tensor, replacing it with that operator's inputs. Frontiers are memoized by
//! their sorted tensor ids, so every distinct frontier is solved once.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::ir::graph::{Graph, OperatorId, TensorId};

/// How producer-less tensors (graph inputs, constants) are charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SourceAccounting {
    /// Sources stay in the frontier until the search bottoms out, so each is
    /// counted once for as long as anything still reads it.
    #[default]
    Persistent,
    /// Sources are split off the frontier and their size is added on top of
    /// the rest of the search. A source shared by two branches is charged
    /// again every time it re-enters.
    Additive,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    pub source_accounting: SourceAccounting,
    /// Give up once this many frontier states have been expanded.
    pub max_states: Option<usize>,
}

/// Result of the search: the minimum peak and one order attaining it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub peak_bytes: u64,
    /// Every operator that contributes to a subgraph output, producers first.
    pub order: Vec<OperatorId>,
}

impl Schedule {
    /// `order` followed by the operators it does not mention (dead ones), in
    /// their current relative order. Always a permutation of all operators.
    pub fn full_order(&self, graph: &Graph) -> Vec<OperatorId> {
        let scheduled: HashSet<OperatorId> = self.order.iter().copied().collect();
        let mut order = self.order.clone();
        order.extend(
            graph
                .execution_order()
                .iter()
                .copied()
                .filter(|op| !scheduled.contains(op)),
        );
        order
    }
}

type Frontier = Box<[TensorId]>;

#[derive(Debug)]
enum Step {
    /// Nothing left to un-apply.
    Done,
    /// Sources were split off; continue with the produced remainder.
    Sources { rest: Frontier },
    /// Un-apply `op`, leaving frontier `next`.
    Unapply { op: OperatorId, next: Frontier },
}

#[derive(Debug)]
struct Entry {
    peak: u64,
    step: Step,
}

enum Task {
    Expand(Frontier),
    /// All successors of the frontier are solved; pick the best one.
    Resolve(Frontier, Successors),
}

enum Successors {
    /// Additive accounting: the frontier minus its sources.
    Split(Frontier),
    Moves(Vec<Move>),
}

struct Move {
    op: OperatorId,
    next: Frontier,
    /// Bytes live while `op` runs.
    local: u64,
}

/// Compute the minimum peak working memory needed to produce `graph.outputs`.
pub fn schedule(graph: &Graph, config: &SchedulerConfig) -> Result<Schedule> {
    let mut search = Search {
        graph,
        config,
        memo: HashMap::new(),
        expanded: 0,
    };
    let root = frontier(graph.outputs.iter().copied());
    search.run(root.clone())?;

    let peak_bytes = search.peak(&root)?;
    let mut order = Vec::new();
    let mut key = root;
    loop {
        let entry = search
            .memo
            .get(&key)
            .ok_or_else(|| Error::invariant("frontier missing from memo during reconstruction"))?;
        match &entry.step {
            Step::Done => break,
            Step::Sources { rest } => key = rest.clone(),
            Step::Unapply { op, next } => {
                order.push(*op);
                key = next.clone();
            }
        }
    }
    // un-applied last first
    order.reverse();

    log::info!(
        "minimum peak {} bytes over {} operators ({} frontier states)",
        peak_bytes,
        order.len(),
        search.memo.len()
    );
    Ok(Schedule { peak_bytes, order })
}

struct Search<'g> {
    graph: &'g Graph,
    config: &'g SchedulerConfig,
    memo: HashMap<Frontier, Entry>,
    expanded: usize,
}

impl Search<'_> {
    fn run(&mut self, root: Frontier) -> Result<()> {
        let mut stack = vec![Task::Expand(root)];
        while let Some(task) = stack.pop() {
            match task {
                Task::Expand(key) => {
                    if self.memo.contains_key(&key) {
                        continue;
                    }
                    self.expanded += 1;
                    if let Some(limit) = self.config.max_states {
                        if self.expanded > limit {
                            return Err(Error::SearchBudgetExceeded { limit });
                        }
                    }
                    if self.expanded % 100_000 == 0 {
                        log::debug!("expanded {} frontier states", self.expanded);
                    }

                    if let Some(entry) = self.terminal(&key) {
                        self.memo.insert(key, entry);
                        continue;
                    }
                    let successors = self.successors(&key)?;
                    let pending: Vec<Frontier> = match &successors {
                        Successors::Split(rest) => vec![rest.clone()],
                        Successors::Moves(moves) => moves.iter().map(|m| m.next.clone()).collect(),
                    };
                    let pending: Vec<Frontier> = pending
                        .into_iter()
                        .filter(|next| !self.memo.contains_key(next))
                        .collect();
                    stack.push(Task::Resolve(key, successors));
                    stack.extend(pending.into_iter().map(Task::Expand));
                }
                Task::Resolve(key, successors) => {
                    let entry = self.resolve(&key, successors)?;
                    self.memo.insert(key, entry);
                }
            }
        }
        Ok(())
    }

    fn is_source(&self, t: TensorId) -> bool {
        self.graph.tensor(t).producer.is_none()
    }

    /// Frontiers holding nothing left to un-apply. Under either accounting
    /// a frontier of sources costs exactly their total size.
    fn terminal(&self, key: &[TensorId]) -> Option<Entry> {
        key.iter().all(|t| self.is_source(*t)).then(|| Entry {
            peak: self.graph.size_of(key),
            step: Step::Done,
        })
    }

    fn successors(&self, key: &[TensorId]) -> Result<Successors> {
        if self.config.source_accounting == SourceAccounting::Additive
            && key.iter().any(|t| self.is_source(*t))
        {
            let rest = frontier(key.iter().copied().filter(|t| !self.is_source(*t)));
            return Ok(Successors::Split(rest));
        }

        let mut moves = Vec::new();
        for &t in key {
            let Some(op) = self.graph.tensor(t).producer else {
                continue;
            };
            let blocked = key
                .iter()
                .any(|&other| other != t && self.graph.ancestors(other).contains(&t));
            if blocked {
                continue;
            }
            let inputs = &self.graph.operator(op).inputs;
            let next = frontier(
                key.iter()
                    .copied()
                    .filter(|other| *other != t)
                    .chain(inputs.iter().copied()),
            );
            let local = self
                .graph
                .size_of(next.iter())
                .saturating_add(self.graph.tensor(t).size());
            moves.push(Move { op, next, local });
        }
        if moves.is_empty() {
            return Err(Error::invariant(format!(
                "no tensor in frontier {key:?} can be un-applied"
            )));
        }
        Ok(Successors::Moves(moves))
    }

    fn peak(&self, key: &[TensorId]) -> Result<u64> {
        self.memo
            .get(key)
            .map(|e| e.peak)
            .ok_or_else(|| Error::invariant(format!("frontier {key:?} was never solved")))
    }

    fn resolve(&self, key: &[TensorId], successors: Successors) -> Result<Entry> {
        let moves = match successors {
            Successors::Split(rest) => {
                let sources = self
                    .graph
                    .size_of(key.iter().filter(|t| self.is_source(**t)));
                return Ok(Entry {
                    peak: sources.saturating_add(self.peak(&rest)?),
                    step: Step::Sources { rest },
                });
            }
            Successors::Moves(moves) => moves,
        };

        let mut best: Option<(u64, Move)> = None;
        for m in moves {
            let cost = self.peak(&m.next)?.max(m.local);
            // strict: ties keep the lowest tensor id
            if best.as_ref().map_or(true, |(b, _)| cost < *b) {
                best = Some((cost, m));
            }
        }
        let (peak, m) = best.ok_or_else(|| Error::invariant("frontier has no moves"))?;
        Ok(Entry {
            peak,
            step: Step::Unapply {
                op: m.op,
                next: m.next,
            },
        })
    }
}

fn frontier(tensors: impl IntoIterator<Item = TensorId>) -> Frontier {
    let mut v: Vec<TensorId> = tensors.into_iter().collect();
    v.sort_unstable();
    v.dedup();
    v.into_boxed_slice()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::tflite::{build_graph, BuiltinOperator, ModelView};
    use crate::schedule::liveness::{live_sets_for, peak_bytes};
    use crate::schedule::rewrite::validate_order;
    use crate::testing::{branchy_model, chain_model, diamond_model, DagSpec, ModelFixture, TensorSpec};
    use proptest::prelude::*;

    fn graph(bytes: Vec<u8>) -> Graph {
        build_graph(&ModelView::decode(bytes).unwrap()).unwrap()
    }

    fn additive() -> SchedulerConfig {
        SchedulerConfig {
            source_accounting: SourceAccounting::Additive,
            ..Default::default()
        }
    }

    #[test]
    fn chain_peak_is_input_plus_first_activation() {
        let g = graph(chain_model());
        let schedule = schedule(&g, &SchedulerConfig::default()).unwrap();
        assert_eq!(schedule.peak_bytes, 130);
        assert_eq!(schedule.order, vec![0, 1]);

        let literal = super::schedule(&g, &additive()).unwrap();
        assert_eq!(literal, schedule);
    }

    #[test]
    fn constants_contribute_nothing() {
        let mut fixture = ModelFixture::new();
        let x = fixture.input("x", &[100], TensorSpec::u8());
        let w = fixture.constant("w", &[500], TensorSpec::u8(), vec![1; 500]);
        let y = fixture.tensor("y", &[30], TensorSpec::u8());
        let z = fixture.tensor("z", &[10], TensorSpec::u8());
        fixture.op(BuiltinOperator::CONV_2D, &[x, w], Some(y));
        fixture.op(BuiltinOperator::FULLY_CONNECTED, &[y, w], Some(z));
        fixture.output(z);
        let g = graph(fixture.build());

        let schedule = schedule(&g, &SchedulerConfig::default()).unwrap();
        assert_eq!(schedule.peak_bytes, 130);
        let literal = super::schedule(&g, &additive()).unwrap();
        assert_eq!(literal.peak_bytes, 130);
    }

    #[test]
    fn diamond_characterizes_source_accounting() {
        let g = graph(diamond_model());
        let original = peak_bytes(&live_sets_for(&g, g.execution_order()));
        assert_eq!(original, 120);

        let persistent = schedule(&g, &SchedulerConfig::default()).unwrap();
        assert_eq!(persistent.peak_bytes, 120);
        assert_eq!(persistent.order.len(), 3);
        validate_order(&g, &persistent.order).unwrap();

        // the shared input is charged once per branch
        let literal = schedule(&g, &additive()).unwrap();
        assert_eq!(literal.peak_bytes, 210);
        assert!(literal.peak_bytes > original);
    }

    #[test]
    fn branchy_model_finishes_one_branch_before_starting_the_other() {
        let g = graph(branchy_model());
        let original = peak_bytes(&live_sets_for(&g, g.execution_order()));
        assert_eq!(original, 260);

        let schedule = schedule(&g, &SchedulerConfig::default()).unwrap();
        // x stays live until the big branch starts: 10 + 5 + 200
        assert_eq!(schedule.peak_bytes, 215);
        assert_eq!(schedule.order, vec![1, 3, 0, 2, 4]);
        validate_order(&g, &schedule.order).unwrap();
        assert_eq!(
            peak_bytes(&live_sets_for(&g, &schedule.order)),
            schedule.peak_bytes
        );
    }

    #[test]
    fn dead_operators_are_appended() {
        let mut fixture = ModelFixture::new();
        let x = fixture.input("x", &[8], TensorSpec::u8());
        let dead = fixture.tensor("dead", &[64], TensorSpec::u8());
        let y = fixture.tensor("y", &[4], TensorSpec::u8());
        fixture.op(BuiltinOperator::RELU, &[x], Some(dead));
        fixture.op(BuiltinOperator::RELU, &[x], Some(y));
        fixture.output(y);
        let g = graph(fixture.build());

        let schedule = schedule(&g, &SchedulerConfig::default()).unwrap();
        assert_eq!(schedule.order, vec![1]);
        assert_eq!(schedule.full_order(&g), vec![1, 0]);
        validate_order(&g, &schedule.full_order(&g)).unwrap();
    }

    #[test]
    fn near_limit_tensors_are_scheduled_exactly() {
        // three tensors of just under 2^62 bytes each: any two still fit
        let quarter = [i32::MAX, i32::MAX];
        let mut fixture = ModelFixture::new();
        let x = fixture.input("x", &quarter, TensorSpec::u8());
        let y = fixture.tensor("y", &quarter, TensorSpec::u8());
        let z = fixture.tensor("z", &quarter, TensorSpec::u8());
        fixture.op(BuiltinOperator::RELU, &[x], Some(y));
        fixture.op(BuiltinOperator::RELU, &[y], Some(z));
        fixture.output(z);
        let g = graph(fixture.build());
        let size = (i32::MAX as u64) * (i32::MAX as u64);

        let schedule = schedule(&g, &SchedulerConfig::default()).unwrap();
        assert_eq!(schedule.peak_bytes, 2 * size);
        assert_eq!(schedule.order, vec![0, 1]);
    }

    #[test]
    fn tiny_budget_is_reported() {
        let g = graph(diamond_model());
        let config = SchedulerConfig {
            max_states: Some(1),
            ..Default::default()
        };
        let err = schedule(&g, &config).unwrap_err();
        assert!(matches!(err, Error::SearchBudgetExceeded { limit: 1 }), "{err}");
    }

    fn dag() -> impl Strategy<Value = DagSpec> {
        (
            prop::collection::vec(1..64i32, 1..3),
            prop::collection::vec(
                (1..128i32, prop::collection::vec(0..32usize, 1..3)),
                1..8,
            ),
        )
            .prop_map(|(input_sizes, ops)| DagSpec { input_sizes, ops })
    }

    fn accounting() -> impl Strategy<Value = SourceAccounting> {
        prop_oneof![
            Just(SourceAccounting::Persistent),
            Just(SourceAccounting::Additive),
        ]
    }

    proptest! {
        #[test]
        fn order_is_a_valid_permutation(spec in dag(), source_accounting in accounting()) {
            let g = graph(spec.build());
            let config = SchedulerConfig {
                source_accounting,
                ..Default::default()
            };
            let schedule = schedule(&g, &config).unwrap();

            let mut sorted = schedule.order.clone();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, (0..g.operators.len()).collect::<Vec<_>>());
            prop_assert!(validate_order(&g, &schedule.order).is_ok());
        }

        #[test]
        fn never_worse_than_serialized_order(spec in dag()) {
            let g = graph(spec.build());
            let schedule = schedule(&g, &SchedulerConfig::default()).unwrap();
            let original = peak_bytes(&live_sets_for(&g, g.execution_order()));
            prop_assert!(schedule.peak_bytes <= original);
        }

        #[test]
        fn claimed_peak_matches_liveness(spec in dag()) {
            let g = graph(spec.build());
            let schedule = schedule(&g, &SchedulerConfig::default()).unwrap();
            // unread inputs are live at every step but never enter a frontier
            let unread: u64 = g
                .inputs
                .iter()
                .filter(|t| g.tensor(**t).consumers.is_empty())
                .map(|t| g.tensor(*t).size())
                .sum();
            let replayed = peak_bytes(&live_sets_for(&g, &schedule.order));
            prop_assert_eq!(replayed, schedule.peak_bytes + unread);
        }
    }
}
