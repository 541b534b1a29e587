// A small imperative language with nested scopes. Programs are checked by a static
// analyser, which builds the scopes and type checks every statement, and are then
// run by a tree-walking interpreter.

mod analyzer;
mod error;
mod interpreter;
mod parse;
mod surface;
mod symbol;
mod util;


use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process,
};

use analyzer::Analyzer;
use anyhow::Context;
use clap::Parser;
use codespan_reporting::{
    diagnostic::{Diagnostic, Label},
    files::SimpleFile,
    term::{
        self,
        termcolor::{ColorChoice, StandardStream, WriteColor},
    },
};
use error::Error;
use interpreter::Interpreter;
use symbol::ScopedSymbolTable;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// The program to run.
    path: PathBuf,

    /// Print every scoped symbol table built while analysing the program.
    #[arg(long)]
    tables: bool,

    /// Only analyse the program, without running it.
    #[arg(long)]
    check: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let code = fs::read_to_string(&cli.path)
        .with_context(|| format!("could not read {}", cli.path.display()))?;

    if cli.tables || cli.check {
        match analyse(&code) {
            Ok(tables) => {
                if cli.tables {
                    print_tables(&tables, io::stdout().lock())?;
                }
            }
            Err(e) => {
                report(&cli.path, &code, &e, &mut StandardStream::stderr(ColorChoice::Auto))?;
                process::exit(1);
            }
        }

        if cli.check {
            return Ok(());
        }
    }

    if let Err(e) = run(&code, io::stdin().lock(), io::stdout().lock()) {
        io::stdout().flush()?;
        report(&cli.path, &code, &e, &mut StandardStream::stderr(ColorChoice::Auto))?;
        process::exit(1);
    }

    Ok(())
}

// Parse and analyse a program, returning the scoped symbol tables it produced.
fn analyse(code: &str) -> Result<Vec<ScopedSymbolTable>, Error> {
    let program = parse::parse(code)?;

    Ok(Analyzer::new(&program).build()?.tables)
}

// every table in creation order, separated by blank lines
fn print_tables(tables: &[ScopedSymbolTable], mut output: impl Write) -> io::Result<()> {
    for table in tables {
        writeln!(output, "{table}")?;
    }

    Ok(())
}

// Parse, analyse and run a program, reading from `input` and printing to `output`.
fn run(code: &str, input: impl BufRead, output: impl Write) -> Result<(), Error> {
    let program = parse::parse(code)?;

    Interpreter::new(&program, input, output).interpret()
}

// render an error against the source it came from
fn report(path: &Path, code: &str, error: &Error, writer: &mut dyn WriteColor) -> anyhow::Result<()> {
    let config = term::Config::default();

    let file = SimpleFile::new(path.display().to_string(), code);
    let diagnostic = Diagnostic::error()
        .with_message(error.to_string())
        .with_labels(vec![Label::primary((), error.location().range())]);

    term::emit(writer, &config, &file, &diagnostic)?;

    Ok(())
}
