//! Centralised error hierarchy for the interpreter.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) must convert their
//! internal failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic inter-operation
//! with `anyhow`, while still preserving rich diagnostic detail.
//!
//! The module **does not** print diagnostics itself

use std::fmt;
use std::io;

use log::info;
use thiserror::Error;

/// Canonical error type used throughout the interpreter.
///
/// Every diagnostic variant renders as `[line N] at '<lex>' <msg>`, where
/// `<lex>` is the offending token text.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] at '{lexeme}' {message}")]
    Lex {
        /// Human-readable description.
        message: String,

        /// Offending source text.
        lexeme: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] at '{lexeme}' {message}")]
    Parse {
        message: String,
        lexeme: String,
        line: usize,
    },

    /// Static-analysis or resolution failure (e.g. early-binding errors).
    #[error("[line {line}] at '{lexeme}' {message}")]
    Resolve {
        message: String,
        lexeme: String,
        line: usize,
    },

    /// Runtime evaluation error, carrying the offending token and a snapshot
    /// of the call stack at the point of failure.
    #[error("{0}")]
    Runtime(RuntimeError),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF-8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<L: Into<String>, S: Into<String>>(line: usize, lexeme: L, msg: S) -> Self {
        let lexeme: String = lexeme.into();
        let message: String = msg.into();

        info!(
            "Creating Lex error: line={}, lexeme={}, msg={}",
            line, lexeme, message
        );

        LoxError::Lex {
            message,
            lexeme,
            line,
        }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<L: Into<String>, S: Into<String>>(line: usize, lexeme: L, msg: S) -> Self {
        let lexeme: String = lexeme.into();
        let message: String = msg.into();

        info!(
            "Creating Parse error: line={}, lexeme={}, msg={}",
            line, lexeme, message
        );

        LoxError::Parse {
            message,
            lexeme,
            line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<L: Into<String>, S: Into<String>>(line: usize, lexeme: L, msg: S) -> Self {
        let lexeme: String = lexeme.into();
        let message: String = msg.into();

        info!(
            "Creating Resolve error: line={}, lexeme={}, msg={}",
            line, lexeme, message
        );

        LoxError::Resolve {
            message,
            lexeme,
            line,
        }
    }
}

/// One frame of the interpreter call stack: the callable's display form plus
/// the line of its call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub name: String,
    pub line: usize,
}

/// A runtime failure.  `stack` holds the callables that were active when the
/// error was raised, innermost last (rendered innermost first).
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub lexeme: String,
    pub line: usize,
    pub message: String,
    pub stack: Vec<StackFrame>,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[line {}] at '{}' {}",
            self.line, self.lexeme, self.message
        )?;

        for frame in self.stack.iter().rev() {
            write!(f, "\n  [line {}] in {}", frame.line, frame.name)?;
        }

        Ok(())
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
