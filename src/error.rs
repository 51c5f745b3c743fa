//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic inter‑operation
//! with `anyhow`, while still preserving rich diagnostic detail.
//!
//! The module **does not** print diagnostics itself; [`Diagnostics`] only
//! collects them so the caller decides where they go.

use std::io;
use thiserror::Error;

use log::info;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        line: usize,
        /// `" at end"` or `" at '<lexeme>'"`.
        location: String,
    },

    /// Static‑analysis or resolution failure (e.g. early‑binding errors).
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        line: usize,
        location: String,
    },

    /// Runtime evaluation error, tied to the token that triggered it.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// `" at end"` for the EOF token, `" at 'lexeme'"` for everything else.
fn location_of(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            line: token.line,
            location: location_of(token),
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            line: token.line,
            location: location_of(token),
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", token.line, message);

        LoxError::Runtime {
            message,
            line: token.line,
        }
    }

    /// Bare message without the line decoration.
    pub fn message(&self) -> String {
        match self {
            LoxError::Lex { message, .. }
            | LoxError::Parse { message, .. }
            | LoxError::Resolve { message, .. }
            | LoxError::Runtime { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Lex, parse and resolve errors: anything caught before execution.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            LoxError::Lex { .. } | LoxError::Parse { .. } | LoxError::Resolve { .. }
        )
    }

    /// Conventional sysexits code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoxError::Lex { .. } | LoxError::Parse { .. } | LoxError::Resolve { .. } => 65,
            LoxError::Runtime { .. } => 70,
            LoxError::Io(_) | LoxError::Utf8(_) => 74,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

/// Run context threaded through every pipeline stage: the errors reported
/// so far plus the flags a driver needs to decide whether to continue.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<LoxError>,
    had_error: bool,
    had_runtime_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error and raise the matching flag.
    pub fn report(&mut self, error: LoxError) {
        info!("Reporting diagnostic: {}", error);

        if error.is_static() {
            self.had_error = true;
        } else {
            self.had_runtime_error = true;
        }

        self.errors.push(error);
    }

    /// Any lex, parse or resolve error so far.
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn errors(&self) -> &[LoxError] {
        &self.errors
    }

    /// Drain the collected errors, leaving the flags untouched.
    pub fn take(&mut self) -> Vec<LoxError> {
        std::mem::take(&mut self.errors)
    }

    /// Forget everything; used between REPL lines.
    pub fn reset(&mut self) {
        self.errors.clear();
        self.had_error = false;
        self.had_runtime_error = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(token_type: TokenType, lexeme: &str) -> Token {
        Token::new(token_type, lexeme, 3)
    }

    #[test]
    fn parse_error_mentions_lexeme() {
        let err = LoxError::parse(&token(TokenType::IDENTIFIER, "foo"), "Expect ';'.");

        assert_eq!(err.to_string(), "[line 3] Error at 'foo': Expect ';'.");
    }

    #[test]
    fn parse_error_at_end() {
        let err = LoxError::parse(&token(TokenType::EOF, ""), "Expect expression.");

        assert_eq!(err.to_string(), "[line 3] Error at end: Expect expression.");
    }

    #[test]
    fn runtime_error_format_and_code() {
        let err = LoxError::runtime(&token(TokenType::MINUS, "-"), "Operand must be a number.");

        assert_eq!(err.to_string(), "Operand must be a number.\n[line 3]");
        assert_eq!(err.exit_code(), 70);
        assert!(!err.is_static());
    }

    #[test]
    fn unreadable_source_maps_to_io_code() {
        let invalid = String::from_utf8(vec![b'p', 0xff]).unwrap_err();
        let err = LoxError::from(invalid);

        assert!(matches!(err, LoxError::Utf8(_)));
        assert_eq!(err.exit_code(), 74);
        assert!(!err.is_static());
    }

    #[test]
    fn diagnostics_track_kinds_separately() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report(LoxError::lex(1, "Unexpected character: #"));

        assert!(diagnostics.had_error());
        assert!(!diagnostics.had_runtime_error());
        assert_eq!(diagnostics.errors().len(), 1);

        diagnostics.reset();
        assert!(!diagnostics.had_error());
        assert!(diagnostics.errors().is_empty());
    }
}
