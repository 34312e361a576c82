use std::{env, fs, path::Path, process::ExitCode, time::Instant};

use facetrans::{DesugarOptions, NoopTracer, RewriteTracer, StatsTracer, StderrTracer, desugar_source_traced};

const USAGE: &str = "usage: facetrans [--config FILE] [--whole-module] [--emit-import] [--trace] [--stats] FILE";

/// Command line flags. File options are loaded first, flags override them.
#[derive(Debug, Default)]
struct CliArgs {
    file: String,
    config: Option<String>,
    whole_module: bool,
    emit_import: bool,
    trace: bool,
    stats: bool,
}

fn main() -> ExitCode {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {err}\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let mut options = match &args.config {
        Some(path) => match DesugarOptions::load(Path::new(path)) {
            Ok(options) => options,
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => DesugarOptions::default(),
    };
    if args.whole_module {
        options.marker = None;
    }
    if args.emit_import {
        options.emit_import = true;
    }

    let code = match read_file(&args.file) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if args.stats {
        let mut tracer = StatsTracer::new();
        let exit = run(&code, &options, &mut tracer);
        eprintln!("{}", tracer.report());
        exit
    } else if args.trace {
        run(&code, &options, &mut StderrTracer::new())
    } else {
        run(&code, &options, &mut NoopTracer)
    }
}

fn run<Tr: RewriteTracer>(code: &str, options: &DesugarOptions, tracer: &mut Tr) -> ExitCode {
    let start = Instant::now();
    match desugar_source_traced(code, options, tracer) {
        Ok(desugared) => {
            print!("{desugared}");
            let elapsed = start.elapsed();
            eprintln!("desugared in {elapsed:?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();
    let mut file = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => match args.next() {
                Some(path) => cli.config = Some(path),
                None => return Err("--config requires a file".to_owned()),
            },
            "--whole-module" => cli.whole_module = true,
            "--emit-import" => cli.emit_import = true,
            "--trace" => cli.trace = true,
            "--stats" => cli.stats = true,
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag}")),
            _ if file.is_some() => return Err(format!("unexpected argument {arg}")),
            _ => file = Some(arg),
        }
    }
    cli.file = file.ok_or_else(|| "missing input file".to_owned())?;
    Ok(cli)
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("cannot read {file_path}: {err}"));
        }
    }
    fs::read_to_string(file_path).map_err(|err| format!("cannot read {file_path}: {err}"))
}
