//! XPath 1.0.
//!
//! Expressions are parsed with a pest grammar into an [`Expr`] tree, then evaluated against a [`Document`]. All 13
//! axes are supported (the namespace axis is always empty), as is the whole core function library. Variables parse,
//! but nothing binds them.

mod ast;
mod eval;
mod functions;
mod parser;
mod value;

pub use ast::*;
pub use parser::{parse, XPathSyntaxError};
pub use value::{format_number, Value};

use crate::html::{Document, NodeId};

/// An expression that parsed, but could not be evaluated.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum XPathError {
    #[error("unknown function: {name}()")]
    UnknownFunction { name: String },

    #[error("wrong number of arguments to {function}(): {found}")]
    ArgumentCount { function: &'static str, found: usize },

    #[error("expected a node-set for {role}")]
    NotANodeSet { role: &'static str },

    #[error("variable ${name} is not bound")]
    UnboundVariable { name: String },
}

/// Evaluates `expr` with `context` as the context node.
pub fn evaluate(doc: &Document, context: NodeId, expr: &Expr) -> Result<Value, XPathError> {
    eval::Evaluator::new(doc).eval(expr, &eval::Context::new(context))
}
