//! Sprig CLI
//!
//! Thin host around the engine crates: parse a script file, show its
//! tree, or run it under a step budget.

use std::process::ExitCode;

use sprig_eval::{EnvTarget, ExecState, StepResult};
use sprig_ir::{Program, Value};
use sprig_parse::{dump, parse, to_source};

const DEFAULT_BUDGET: usize = 10_000_000;

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::FAILURE;
    }

    match args[1].as_str() {
        "run" => {
            if args.len() < 3 {
                eprintln!("Usage: sprigc run <file.sprig> [--budget=N]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --budget=N    Stop after N reductions (default {DEFAULT_BUDGET})");
                return ExitCode::FAILURE;
            }
            let mut budget = DEFAULT_BUDGET;
            let mut path = None;
            for arg in args.iter().skip(2) {
                if let Some(n) = arg.strip_prefix("--budget=") {
                    match n.parse() {
                        Ok(n) => budget = n,
                        Err(_) => {
                            eprintln!("error: invalid budget `{n}`");
                            return ExitCode::FAILURE;
                        }
                    }
                } else if !arg.starts_with('-') && path.is_none() {
                    path = Some(arg.as_str());
                }
            }
            let Some(path) = path else {
                eprintln!("error: missing file path");
                return ExitCode::FAILURE;
            };
            run_file(path, budget)
        }
        "parse" => {
            if args.len() < 3 {
                eprintln!("Usage: sprigc parse <file.sprig>");
                return ExitCode::FAILURE;
            }
            with_program(&args[2], |program| {
                println!("{}", to_source(program));
                ExitCode::SUCCESS
            })
        }
        "dump" => {
            if args.len() < 3 {
                eprintln!("Usage: sprigc dump <file.sprig>");
                return ExitCode::FAILURE;
            }
            with_program(&args[2], |program| {
                print!("{}", dump(program));
                ExitCode::SUCCESS
            })
        }
        other => {
            eprintln!("error: unknown command `{other}`");
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!("Sprig scripting engine");
    eprintln!();
    eprintln!("Usage: sprigc <command> [arguments]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  run <file.sprig> [--budget=N]   Run a script");
    eprintln!("  parse <file.sprig>              Parse and re-emit normalized source");
    eprintln!("  dump <file.sprig>               Parse and print the node tree");
}

fn with_program(path: &str, f: impl FnOnce(&Program) -> ExitCode) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read `{path}`: {e}");
            return ExitCode::FAILURE;
        }
    };
    match parse(&source) {
        Ok(program) => f(&program),
        Err(e) => {
            eprintln!("error: {path}: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_file(path: &str, budget: usize) -> ExitCode {
    with_program(path, |program| {
        let mut exec = match ExecState::new(program, EnvTarget::Local) {
            Ok(exec) => exec,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        };
        match exec.run(program, budget) {
            StepResult::Done(value) => {
                println!("{}", render(program, value));
                ExitCode::SUCCESS
            }
            StepResult::Continue => {
                eprintln!("error: step budget ({budget}) exhausted");
                ExitCode::FAILURE
            }
            StepResult::Error(e) => {
                eprintln!("error: {path}: {e}");
                ExitCode::FAILURE
            }
        }
    })
}

fn render(program: &Program, value: Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Str(s) => program.text(s).to_owned(),
        other => format!("#<{}>", other.kind()),
    }
}

/// Enable with `RUST_LOG=sprig_parse=trace` or `RUST_LOG=sprig_eval=debug`.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}
