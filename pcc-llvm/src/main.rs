use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use log::info;

use pcc::errors::pretty::format_compile_error;
use pcc_llvm::{CompileError, Compiler};

/// Compile line-oriented pseudocode to LLVM IR
#[derive(Parser)]
#[command(name = "pcc")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Pseudocode source file
    #[arg(long, default_value = "code.pc")]
    filename: PathBuf,

    /// Where to write the textual IR
    #[arg(long, default_value = "output.ll")]
    output: PathBuf,

    /// Target triple (defaults to the host)
    #[arg(long)]
    target: Option<String>,

    /// Print the IR to stdout instead of writing the output file
    #[arg(long)]
    emit_ir: bool,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    let level = match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    };
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.format_timestamp(None).init();
}

fn run(cli: &Cli) -> Result<(), String> {
    let raw = fs::read_to_string(&cli.filename)
        .map_err(|err| format!("error: cannot read {}: {}", cli.filename.display(), err))?;
    let source = pcc::preprocess(&raw);
    let label = cli.filename.display().to_string();

    let mut compiler = Compiler::new().with_module_name(cli.output.display().to_string());
    if let Some(target) = &cli.target {
        compiler = compiler.with_target(target);
    }

    let module = compiler
        .compile_named(&source, &label)
        .map_err(|err| match err {
            CompileError::Frontend(err) => format_compile_error(&label, &source, &err),
            other => format!("error: {}", other),
        })?;
    let text = module.to_string();

    if cli.emit_ir {
        print!("{}", text);
        return Ok(());
    }

    // Only reached once generation succeeded, so no partial file is left behind.
    fs::write(&cli.output, text)
        .map_err(|err| format!("error: cannot write {}: {}", cli.output.display(), err))?;
    info!("wrote {}", cli.output.display());
    Ok(())
}
