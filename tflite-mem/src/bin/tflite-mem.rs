//! `tflite-mem`: inspect and minimize the peak working memory of a TFLite model.
//!
//! Usage:
//!   tflite-mem -i model.tflite
//!   tflite-mem -i model.tflite --optimize -o optimized.tflite

use std::path::PathBuf;
use std::process;

use tflite_mem::{RewriteOutcome, SchedulerConfig, SourceAccounting, TfliteModel};

const USAGE: &str = "Usage: tflite-mem -i <model.tflite> [-o <out.tflite>] [--optimize] [--peak] \
[--csv <dir>] [--json <file>] [--clusters <n>] [--max-states <n>] [--additive-sources]";

#[derive(Default)]
struct Options {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    optimize: bool,
    peak: bool,
    csv_dir: Option<PathBuf>,
    json_file: Option<PathBuf>,
    clusters: usize,
    config: SchedulerConfig,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_args(&args);

    if let Err(err) = run(options) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn print_usage() {
    eprintln!("tflite-mem: peak memory analysis for TFLite models");
    eprintln!();
    eprintln!("{USAGE}");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -i, --input <FILE>     Model to analyse");
    eprintln!("  -o, --output <FILE>    Write the (optimized/clustered) model here");
    eprintln!("  --optimize             Reorder operators to minimize peak memory");
    eprintln!("  --peak                 Report the minimum achievable peak without reordering");
    eprintln!("  --csv <DIR>            Write tensor_details.csv and execution_schedule_info.csv");
    eprintln!("  --json <FILE>          Write the analysis as JSON");
    eprintln!("  --clusters <N>         Cluster weights into N values (code-book simulation)");
    eprintln!("  --max-states <N>       Give up after N search states");
    eprintln!("  --additive-sources     Charge shared inputs once per branch");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG=info    Show progress");
    eprintln!("  RUST_LOG=debug   Show decoder and search details");
}

fn parse_args(args: &[String]) -> Options {
    let mut options = Options::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-i" | "--input" => {
                i += 1;
                options.input = Some(PathBuf::from(value(args, i, "-i requires a model path")));
            }
            "-o" | "--output" => {
                i += 1;
                options.output = Some(PathBuf::from(value(args, i, "-o requires a file path")));
            }
            "--optimize" => options.optimize = true,
            "--peak" => options.peak = true,
            "--csv" => {
                i += 1;
                options.csv_dir = Some(PathBuf::from(value(args, i, "--csv requires a directory")));
            }
            "--json" => {
                i += 1;
                options.json_file = Some(PathBuf::from(value(args, i, "--json requires a file path")));
            }
            "--clusters" => {
                i += 1;
                options.clusters = number(args, i, "--clusters requires a number of clusters");
            }
            "--max-states" => {
                i += 1;
                options.config.max_states =
                    Some(number(args, i, "--max-states requires a number of states"));
            }
            "--additive-sources" => {
                options.config.source_accounting = SourceAccounting::Additive;
            }
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            other => {
                eprintln!("unexpected argument: {other}");
                eprintln!("{USAGE}");
                process::exit(1);
            }
        }
        i += 1;
    }
    options
}

fn value<'a>(args: &'a [String], i: usize, missing: &str) -> &'a str {
    args.get(i).map(String::as_str).unwrap_or_else(|| {
        eprintln!("{missing}");
        process::exit(1);
    })
}

fn number(args: &[String], i: usize, missing: &str) -> usize {
    args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
        eprintln!("{missing}");
        process::exit(1);
    })
}

fn run(options: Options) -> tflite_mem::Result<()> {
    let input = options.input.unwrap_or_else(|| {
        eprintln!("error: -i <model.tflite> is required");
        eprintln!("{USAGE}");
        process::exit(1);
    });

    let mut model = TfliteModel::load_from_file(&input)?.with_config(options.config);

    if options.clusters > 0 {
        let rewritten = model.cluster_weights(options.clusters)?;
        eprintln!(
            "Clustered {rewritten} weight buffers into {} values",
            options.clusters
        );
    }

    if options.optimize {
        match model.optimize_memory()? {
            RewriteOutcome::AlreadyOptimal => {
                eprintln!("The model already has optimal operator order.")
            }
            RewriteOutcome::Reordered { moved } => eprintln!("Reordered {moved} operators."),
        }
    } else if options.peak {
        model.peak_memory_usage()?;
    }

    let report = model.report()?;
    if let Some(dir) = &options.csv_dir {
        report.write_csv(dir)?;
    }
    if let Some(file) = &options.json_file {
        report.write_json(file)?;
    }
    if options.csv_dir.is_none() && options.json_file.is_none() {
        print!("{report}");
    }

    if let Some(output) = &options.output {
        model.write_to_file(output)?;
        eprintln!("Wrote {}", output.display());
    }
    Ok(())
}
