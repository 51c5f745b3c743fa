//! Drives source text through the whole pipeline:
//! scan → parse → resolve → interpret.
//!
//! Static errors from any front‑end stage stop the run before anything
//! executes.  A [`Session`] keeps one interpreter alive, so definitions
//! from earlier runs (REPL lines) stay visible to later ones.

use std::io::Write;

use log::{debug, info};

use crate::error::{Diagnostics, LoxError};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner;
use crate::stmt::Stmt;
use crate::token::Token;

/// Outcome of a single [`Session::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    /// Lex, parse or resolve errors; nothing was executed.
    StaticError,
    /// Execution started and stopped at a runtime error.
    RuntimeError,
}

impl RunStatus {
    /// Process exit code for a batch run.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::StaticError => 65,
            RunStatus::RuntimeError => 70,
        }
    }
}

pub struct Session {
    interpreter: Interpreter,
    diagnostics: Diagnostics,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session printing to stdout.
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// A session whose `print` output goes to `output`.
    pub fn with_output<W: Write + 'static>(output: W) -> Self {
        Self {
            interpreter: Interpreter::with_output(output),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Errors reported by the most recent run.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Drain the errors of the most recent run.
    pub fn take_errors(&mut self) -> Vec<LoxError> {
        self.diagnostics.take()
    }

    /// Run one chunk of source.  Diagnostics from any previous run are
    /// cleared first.
    pub fn run(&mut self, source: &str) -> RunStatus {
        self.diagnostics.reset();

        let tokens: Vec<Token> = scanner::scan(source, &mut self.diagnostics);
        let statements: Vec<Stmt> = Parser::new(tokens).parse(&mut self.diagnostics);

        if self.diagnostics.had_error() {
            info!("Stopping before resolution: syntax errors");
            return RunStatus::StaticError;
        }

        Resolver::new(&mut self.interpreter).resolve(&statements, &mut self.diagnostics);

        if self.diagnostics.had_error() {
            info!("Stopping before execution: resolution errors");
            return RunStatus::StaticError;
        }

        debug!("Executing {} statement(s)", statements.len());

        match self.interpreter.interpret(&statements) {
            Ok(()) => RunStatus::Ok,
            Err(e) => {
                self.diagnostics.report(e);
                RunStatus::RuntimeError
            }
        }
    }
}
