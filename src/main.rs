use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::builder::TypedValueParser;
use log::{LevelFilter, Log, Metadata, Record};

use nirvana::diagnostic::{Diagnostic, ansi::AnsiRenderer, json, registry};
use nirvana::vm::{self, CompileOptions, Vm, chunk::MAX_REGISTERS};

#[derive(Parser, Debug)]
#[command(name = "nirvana", version, about = "Compile and run JSON AST programs on a register VM")]
struct Cli {
    /// Program file holding a JSON-serialized AST
    #[arg(required_unless_present_any = ["explain", "list_codes"])]
    program: Option<PathBuf>,

    /// Print the compiled bytecode listing before running
    #[arg(long)]
    disasm: bool,

    /// Compile only
    #[arg(long)]
    no_run: bool,

    /// Register ceiling for the compiler
    #[arg(long, value_name = "N", default_value_t = MAX_REGISTERS,
          value_parser = clap::value_parser!(u16).range(1..=MAX_REGISTERS as i64).map(usize::from))]
    max_registers: usize,

    /// Emit diagnostics as one-line JSON
    #[arg(long)]
    json: bool,

    /// Explain an error code, e.g. NVM-C003
    #[arg(long, value_name = "CODE", conflicts_with = "program")]
    explain: Option<String>,

    /// List every diagnostic code with a one-line summary
    #[arg(long, conflicts_with_all = ["program", "explain"])]
    list_codes: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ── stderr logger ────────────────────────────────────────────────────

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(std::io::stderr(), "[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

// ── driver ───────────────────────────────────────────────────────────

fn report(d: &Diagnostic, as_json: bool) {
    if as_json {
        eprintln!("{}", json::render(d));
    } else {
        let renderer = AnsiRenderer { use_color: std::io::stderr().is_terminal() };
        eprint!("{}", renderer.render(d));
    }
}

fn explain(code: &str) -> ExitCode {
    match registry::lookup(code) {
        Some(entry) => {
            print!("{}", entry.long);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("unknown error code: {code}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli, path: &std::path::Path) -> Result<(), nirvana::Error> {
    let program = nirvana::load_program(path)?;
    let options = CompileOptions { max_registers: cli.max_registers };
    let (chunk, warnings) = vm::compile_with_warnings(&program, &options)?;
    for warning in &warnings {
        report(&Diagnostic::from(warning), cli.json);
    }

    if cli.disasm {
        print!("{}", vm::disassemble(&chunk));
    }
    if cli.no_run {
        return Ok(());
    }

    let mut machine = Vm::new(&chunk);
    machine.run()?;
    log::debug!("halted at pc {} with {} globals", machine.pc(), machine.globals().len());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(code) = &cli.explain {
        return explain(code);
    }
    if cli.list_codes {
        print!("{}", registry::listing());
        return ExitCode::SUCCESS;
    }
    let Some(path) = cli.program.as_deref() else {
        return ExitCode::FAILURE;
    };

    match execute(&cli, path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&Diagnostic::from(&e), cli.json);
            ExitCode::FAILURE
        }
    }
}
