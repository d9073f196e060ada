//! Model analysis report: tensor details and the execution schedule.
//!
//! Rendered as aligned text tables, as two CSV files or as one JSON document.

use std::borrow::Cow;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::ir::graph::{DType, Graph, OperatorId, TensorId, TensorKind};
use crate::schedule::{lifetimes, live_sets_for, peak_bytes, Schedule};

pub const TENSOR_DETAILS_CSV: &str = "tensor_details.csv";
pub const EXECUTION_SCHEDULE_CSV: &str = "execution_schedule_info.csv";

const MAX_NAME_CHARS: usize = 80;

/// One tensor that occupies working memory (constants are left out).
#[derive(Debug, Clone, Serialize)]
pub struct TensorRow {
    pub id: TensorId,
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub kind: TensorKind,
    pub size_bytes: u64,
    pub first_used_at: usize,
    pub last_used_at: usize,
}

/// One operator in the current execution order.
#[derive(Debug, Clone, Serialize)]
pub struct StepRow {
    pub step: usize,
    pub operator: OperatorId,
    pub opcode: String,
    /// Output tensor name, or the opcode when the operator has no output.
    pub name: String,
    /// Non-empty tensors resident while the operator runs.
    pub working_set: Vec<TensorId>,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub tensors: Vec<TensorRow>,
    pub schedule: Vec<StepRow>,
    pub current_peak_bytes: u64,
    pub optimal: Option<Schedule>,
}

impl Report {
    /// Analyse `graph` in its current execution order.
    pub fn new(graph: &Graph, optimal: Option<&Schedule>) -> Self {
        let order = graph.execution_order();
        let lifetimes = lifetimes(graph, order);
        let tensors = graph
            .tensors
            .iter()
            .filter(|t| t.size() != 0)
            .map(|t| TensorRow {
                id: t.id,
                name: t.name.clone(),
                shape: t.shape.clone(),
                dtype: t.dtype,
                kind: t.kind,
                size_bytes: t.size(),
                first_used_at: lifetimes[t.id].first_used_at,
                last_used_at: lifetimes[t.id].last_used_at,
            })
            .collect();

        let steps = live_sets_for(graph, order);
        let current_peak_bytes = peak_bytes(&steps);
        let schedule = steps
            .into_iter()
            .enumerate()
            .map(|(step, s)| {
                let op = graph.operator(s.operator);
                let opcode = op
                    .opcode
                    .variant_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{:?}", op.opcode));
                let name = match op.output {
                    Some(t) => graph.tensor(t).name.clone(),
                    None => opcode.clone(),
                };
                StepRow {
                    step,
                    operator: s.operator,
                    opcode,
                    name,
                    working_set: s
                        .live
                        .into_iter()
                        .filter(|t| graph.tensor(*t).size() != 0)
                        .collect(),
                    bytes: s.bytes,
                }
            })
            .collect();

        Report {
            tensors,
            schedule,
            current_peak_bytes,
            optimal: optimal.cloned(),
        }
    }

    /// Write `tensor_details.csv` and `execution_schedule_info.csv` into `dir`.
    pub fn write_csv(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let mut w = BufWriter::new(File::create(dir.join(TENSOR_DETAILS_CSV))?);
        writeln!(w, "Id,Name,Shape,Size,FirstUsedAt,LastUsedAt")?;
        for t in &self.tensors {
            writeln!(
                w,
                "{},{},{},{},{},{}",
                t.id,
                csv_field(&t.name),
                join(&t.shape, " "),
                t.size_bytes,
                t.first_used_at,
                t.last_used_at
            )?;
        }
        w.flush()?;

        let mut w = BufWriter::new(File::create(dir.join(EXECUTION_SCHEDULE_CSV))?);
        writeln!(w, "Operator,Working set,Memory use")?;
        for s in &self.schedule {
            writeln!(
                w,
                "{},{},{}",
                csv_field(&s.name),
                join(&s.working_set, " "),
                s.bytes
            )?;
        }
        w.flush()?;

        log::info!("wrote analysis CSVs to {}", dir.display());
        Ok(())
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut w, self)?;
        w.flush()?;
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tensors = Table::new(&[
            ("Id", Align::Right),
            ("Tensor", Align::Left),
            ("Shape", Align::Left),
            ("Size in RAM (B)", Align::Right),
        ]);
        for t in &self.tensors {
            tensors.row(vec![
                t.id.to_string(),
                shorten(&t.name).into_owned(),
                format!("({})", join(&t.shape, ", ")),
                thousands(t.size_bytes),
            ]);
        }
        writeln!(f, "Tensor information (weights excluded):")?;
        writeln!(f, "{tensors}")?;

        let mut schedule = Table::new(&[
            ("Operator (output name)", Align::Left),
            ("Tensors in memory (IDs)", Align::Left),
            ("Memory use (B)", Align::Right),
        ]);
        for s in &self.schedule {
            schedule.row(vec![
                shorten(&s.name).into_owned(),
                format!("[{}]", join(&s.working_set, ", ")),
                thousands(s.bytes),
            ]);
        }
        writeln!(f, "Operator execution schedule:")?;
        writeln!(f, "{schedule}")?;
        writeln!(
            f,
            "Current peak memory usage: {} B",
            thousands(self.current_peak_bytes)
        )?;
        if let Some(optimal) = &self.optimal {
            writeln!(
                f,
                "Optimal peak memory usage: {} B",
                thousands(optimal.peak_bytes)
            )?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

struct Table {
    columns: Vec<(&'static str, Align)>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(columns: &[(&'static str, Align)]) -> Self {
        Table {
            columns: columns.to_vec(),
            rows: Vec::new(),
        }
    }

    fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, (header, _))| {
                self.rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|c| c.chars().count())
                    .chain([header.chars().count()])
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let rule = {
            let mut s = String::from("+");
            for w in &widths {
                s.push_str(&"-".repeat(w + 2));
                s.push('+');
            }
            s
        };

        writeln!(f, "{rule}")?;
        write!(f, "|")?;
        for ((header, _), w) in self.columns.iter().zip(widths.iter().copied()) {
            write!(f, " {header:^w$} |")?;
        }
        writeln!(f)?;
        writeln!(f, "{rule}")?;
        for row in &self.rows {
            write!(f, "|")?;
            for (((_, align), w), cell) in self.columns.iter().zip(widths.iter().copied()).zip(row) {
                match align {
                    Align::Left => write!(f, " {cell:<w$} |")?,
                    Align::Right => write!(f, " {cell:>w$} |")?,
                }
            }
            writeln!(f)?;
        }
        write!(f, "{rule}")
    }
}

/// Keep long tensor names readable: `head...tail`.
fn shorten(name: &str) -> Cow<'_, str> {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= MAX_NAME_CHARS {
        return Cow::Borrowed(name);
    }
    let keep = MAX_NAME_CHARS - 3;
    let left = keep / 2;
    let right = keep - left;
    let head: String = chars[..left].iter().collect();
    let tail: String = chars[chars.len() - right..].iter().collect();
    Cow::Owned(format!("{head}...{tail}"))
}

fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn join<T: ToString>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::tflite::{build_graph, BuiltinOperator, ModelView};
    use crate::schedule::{schedule, SchedulerConfig};
    use crate::testing::{chain_model, ModelFixture, TensorSpec};

    fn chain_report() -> Report {
        let graph = build_graph(&ModelView::decode(chain_model()).unwrap()).unwrap();
        let optimal = schedule(&graph, &SchedulerConfig::default()).unwrap();
        Report::new(&graph, Some(&optimal))
    }

    #[test]
    fn rows_follow_the_execution_order() {
        let report = chain_report();
        assert_eq!(report.tensors.len(), 3);
        assert_eq!(report.tensors[1].name, "y");
        assert_eq!(report.tensors[1].first_used_at, 0);
        assert_eq!(report.tensors[1].last_used_at, 1);
        assert_eq!(report.schedule[0].name, "y");
        assert_eq!(report.schedule[0].opcode, "CONV_2D");
        assert_eq!(report.schedule[0].working_set, vec![0, 1]);
        assert_eq!(report.current_peak_bytes, 130);
    }

    #[test]
    fn weights_are_left_out() {
        let mut fixture = ModelFixture::new();
        let x = fixture.input("x", &[4], TensorSpec::u8());
        let w = fixture.constant("w", &[4], TensorSpec::u8(), vec![1; 4]);
        let y = fixture.tensor("y", &[4], TensorSpec::u8());
        fixture.op(BuiltinOperator::FULLY_CONNECTED, &[x, w], Some(y));
        fixture.output(y);
        let graph = build_graph(&ModelView::decode(fixture.build()).unwrap()).unwrap();

        let report = Report::new(&graph, None);
        assert!(report.tensors.iter().all(|t| t.id != w as usize));
        assert_eq!(report.schedule[0].working_set, vec![x as usize, y as usize]);
    }

    #[test]
    fn text_rendering() {
        let text = chain_report().to_string();
        assert!(text.contains("Tensor information (weights excluded):"));
        assert!(text.contains("| [0, 1]"));
        assert!(text.contains("Current peak memory usage: 130 B"));
        assert!(text.contains("Optimal peak memory usage: 130 B"));
    }

    #[test]
    fn optimum_is_omitted_until_searched() {
        let graph = build_graph(&ModelView::decode(chain_model()).unwrap()).unwrap();
        let text = Report::new(&graph, None).to_string();
        assert!(text.contains("Current peak memory usage: 130 B"));
        assert!(!text.contains("Optimal"));
    }

    #[test]
    fn csv_files() {
        let dir = tempfile::tempdir().unwrap();
        chain_report().write_csv(dir.path()).unwrap();

        let details = fs::read_to_string(dir.path().join(TENSOR_DETAILS_CSV)).unwrap();
        let mut lines = details.lines();
        assert_eq!(lines.next(), Some("Id,Name,Shape,Size,FirstUsedAt,LastUsedAt"));
        assert_eq!(lines.next(), Some("0,x,1 100,100,0,0"));
        assert_eq!(lines.next(), Some("1,y,1 30,30,0,1"));
        // the output stays live through the last step, not past it
        assert_eq!(lines.next(), Some("2,z,1 10,10,1,1"));

        let schedule = fs::read_to_string(dir.path().join(EXECUTION_SCHEDULE_CSV)).unwrap();
        assert_eq!(
            schedule.lines().collect::<Vec<_>>(),
            vec!["Operator,Working set,Memory use", "y,0 1,130", "z,1 2,40"]
        );
    }

    #[test]
    fn json_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        chain_report().write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["current_peak_bytes"], 130);
        assert_eq!(value["optimal"]["order"], serde_json::json!([0, 1]));
        assert_eq!(value["tensors"][0]["kind"], "Input");
    }

    #[test]
    fn helpers() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1_234_567), "1,234,567");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("plain"), "plain");
        let long = "n".repeat(100);
        assert_eq!(shorten(&long).chars().count(), MAX_NAME_CHARS);
    }
}
