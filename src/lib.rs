//! Logo language core: a parser and tree-walking interpreter for a
//! UCBLogo-flavored Logo dialect.
//!
//! The crate provides first-class lists, two independent scope chains
//! (procedures and variables), user-defined procedures (`to … end`), infix
//! arithmetic with precedence climbing, template iteration (`apply`,
//! `invoke`, `foreach`, `map`), and cooperative pause/resume/interrupt
//! driven by the host from any thread.
//!
//! ```
//! use logolang::Interpreter;
//!
//! let mut interp = Interpreter::new();
//! interp.on_print(|s| println!("{s}"));
//! interp.execute("to sq :n output :n * :n end  print sq 7").unwrap();
//! ```
//!
//! Embedders register side-effecting builtins (turtle graphics, printing)
//! into the procedure scope without touching interpreter internals:
//!
//! ```
//! use logolang::{Interpreter, Value};
//!
//! let mut interp = Interpreter::new();
//! interp.register_builtin("beep", 1, |args: &[Value]| {
//!     println!("beep x{}", args[0]);
//!     Ok(None)
//! });
//! interp.execute("repeat 3 [ beep 1 ]").unwrap();
//! ```
//!
//! ## Modules
//!
//! - `list`: cons-list value model and list builder
//! - `scope`: scope chains, bindings, and activation records
//! - `parser`: source text → program list with per-node source spans
//! - `builtins`: the builtin procedure registry
//! - `interpreter`: the recursive-descent evaluator and host facade
//! - `control`: the pause/resume/interrupt control surface

use std::fmt;

/// Maximum call depth during evaluation. Recursive Logo procedures consume
/// host stack frames, so runaway recursion is reported as an error instead
/// of aborting the process.
pub const MAX_EVAL_DEPTH: usize = 256;

/// Error types for the interpreter.
///
/// Errors are fatal to the current `execute` call and propagate to the host
/// unchanged. There is no Logo-level catch construct.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed source or program shape: unterminated lists or definitions,
    /// unexpected `)`, extra instructions after a value, invalid tokens in
    /// expression position.
    Syntax {
        message: String,
        /// Snippet of the input near the offending token, when known.
        context: Option<String>,
    },
    /// A variable name with no value in the variable scope chain.
    UnboundVariable(String),
    /// A procedure name with no binding in the procedure scope chain.
    UnboundProcedure(String),
    /// Argument type mismatch in a builtin.
    Type(String),
    /// Too few inputs collected for a call.
    Arity {
        proc: String,
        expected: usize,
        got: usize,
    },
    /// Evaluation failure that is not a type or arity problem: depth limit,
    /// template misuse, or a failure propagated from a host builtin.
    Eval(String),
    /// The host requested a break; in-flight work was abandoned.
    Interrupted,
    /// `execute` was called while another program was running.
    AlreadyRunning,
}

impl Error {
    /// Create a syntax error with no source context.
    pub fn syntax(message: impl Into<String>) -> Self {
        Error::Syntax {
            message: message.into(),
            context: None,
        }
    }

    /// Create a syntax error with a context snippet extracted from the input
    /// around `offset`.
    pub fn syntax_at(message: impl Into<String>, input: &str, offset: usize) -> Self {
        const MAX_CONTEXT: usize = 60;

        let context_start = offset.saturating_sub(20);
        let snippet: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display = String::new();
        if context_start > 0 {
            display.push_str("[...]");
        }
        display.push_str(&snippet);
        if context_start + snippet.chars().count() < input.chars().count() {
            display.push_str("[...]");
        }
        let display = display.replace('\n', "\\n").replace('\r', "");

        Error::Syntax {
            message: message.into(),
            context: Some(display),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Syntax { message, context } => {
                write!(f, "Syntax error: {message}")?;
                if let Some(context) = context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnboundVariable(name) => write!(f, "I don't know anything about :{name}"),
            Error::UnboundProcedure(name) => write!(f, "I don't know how to {name}"),
            Error::Type(msg) => write!(f, "Type error: {msg}"),
            Error::Arity {
                proc,
                expected,
                got,
            } => write!(
                f,
                "Not enough inputs to {proc}: expected {expected}, got {got}"
            ),
            Error::Eval(msg) => write!(f, "Evaluation error: {msg}"),
            Error::Interrupted => write!(f, "Break requested"),
            Error::AlreadyRunning => write!(f, "Interpreter is already running a program"),
        }
    }
}

impl std::error::Error for Error {}

pub mod builtins;
pub mod control;
pub mod interpreter;
pub mod list;
pub mod parser;
pub mod scope;

pub use control::ControlHandle;
pub use interpreter::{Interpreter, Procedure};
pub use list::{List, ListBuilder, Value};
pub use parser::NodeSource;
pub use scope::{Binding, Context, Scope};
