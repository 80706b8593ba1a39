//! # Expression Engine
//!
//! Parses Access expressions (default values, validation rules, calculated
//! columns) once into an immutable tree and evaluates them any number of
//! times.
//!
//! ## Module Structure
//!
//! - `lexer`: tokens, phf keyword table
//! - `parser`: Pratt parser, operator precedence, validator shorthand
//! - `ast`: `Node` and `Identifier`, rendering
//! - `eval`: operator semantics, numeric promotion, three-valued logic
//! - `like`: `Like` pattern matcher
//! - `context`: `EvalContext`, `IdentifierResolver`, `RandomContext`
//!
//! ## Usage
//!
//! ```ignore
//! let parse_ctx = ParseContext::default();
//! let rule = Expression::parse(ExpressionKind::FieldValidator, ">= 0 And < 100", None, &parse_ctx)?;
//!
//! let mut ctx = EvalContext::default();
//! ctx.set_this_value(Some(Value::Long(42)));
//! assert!(rule.eval_validator(&mut ctx)?);
//! ```
//!
//! ## Result Types
//!
//! Default values and calculated expressions may declare a result type;
//! the final value is converted to it. Validators always produce a boolean
//! and a Null outcome counts as passing, the way Access treats rules on
//! empty fields.

mod ast;
mod context;
mod eval;
mod lexer;
mod like;
mod parser;

pub use ast::{BinaryOp, Identifier, Node, UnaryOp};
pub use context::{EvalContext, IdentifierResolver, RandomContext};
pub use like::LikePattern;

pub(crate) use ast::render_literal;
pub(crate) use eval::compare_text;
pub(crate) use like::fold_char;

use std::fmt;
use std::sync::Arc;

use hashbrown::HashSet;
use tracing::trace;

use crate::config::LocaleContext;
use crate::error::EvalError;
use crate::functions::{FunctionLookup, FunctionRegistry};
use crate::types::{Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    DefaultValue,
    FieldValidator,
    RecordValidator,
    Expression,
}

impl ExpressionKind {
    pub fn is_validator(self) -> bool {
        matches!(
            self,
            ExpressionKind::FieldValidator | ExpressionKind::RecordValidator
        )
    }
}

/// Functions visible to the parser. Defaults to the built-in library.
#[derive(Clone)]
pub struct ParseContext {
    functions: Arc<dyn FunctionLookup>,
}

impl fmt::Debug for ParseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseContext").finish_non_exhaustive()
    }
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::new(Arc::new(FunctionRegistry::builtin()))
    }
}

impl ParseContext {
    pub fn new(functions: Arc<dyn FunctionLookup>) -> Self {
        Self { functions }
    }

    pub fn functions(&self) -> &Arc<dyn FunctionLookup> {
        &self.functions
    }
}

#[derive(Debug, Clone)]
pub struct Expression {
    kind: ExpressionKind,
    raw: String,
    root: Node,
    result_type: Option<ValueType>,
}

impl Expression {
    pub fn parse(
        kind: ExpressionKind,
        text: &str,
        result_type: Option<ValueType>,
        ctx: &ParseContext,
    ) -> Result<Self, EvalError> {
        let root = parser::Parser::new(text, kind, ctx.functions.as_ref()).parse()?;
        trace!(?kind, expr = text, "parsed expression");
        Ok(Self {
            kind,
            raw: text.to_string(),
            root,
            result_type,
        })
    }

    pub fn kind(&self) -> ExpressionKind {
        self.kind
    }

    /// The text the expression was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn result_type(&self) -> Option<ValueType> {
        self.result_type
    }

    pub fn eval(&self, ctx: &mut EvalContext<'_>) -> Result<Value, EvalError> {
        let saved = ctx.swap_result_type(self.result_type);
        let result = eval::eval(&self.root, ctx);
        ctx.swap_result_type(saved);
        let value = result?;

        if self.kind.is_validator() {
            return Ok(if value.is_null() {
                Value::Null
            } else {
                Value::from_bool(value.as_bool())
            });
        }
        match self.result_type {
            Some(target) => value.coerce_to(target, ctx.locale()),
            None => Ok(value),
        }
    }

    /// Evaluates a rule; a Null outcome passes.
    pub fn eval_validator(&self, ctx: &mut EvalContext<'_>) -> Result<bool, EvalError> {
        let value = self.eval(ctx)?;
        Ok(value.is_null() || value.as_bool())
    }

    /// No identifiers and only pure functions: the value can be cached.
    pub fn is_constant(&self) -> bool {
        self.root.is_constant()
    }

    pub fn collect_identifiers(&self, out: &mut HashSet<Identifier>) {
        self.root.walk(&mut |node| {
            if let Node::Identifier(id) = node {
                out.insert(id.clone());
            }
        });
    }

    /// Whether the expression reads `identifier` (compared ignoring case).
    pub fn references(&self, identifier: &Identifier) -> bool {
        let mut found = false;
        self.root.walk(&mut |node| {
            if let Node::Identifier(id) = node {
                found |= id.matches(identifier);
            }
        });
        found
    }

    pub fn to_debug_string(&self) -> String {
        let mut out = String::new();
        self.root.render_debug(&mut out);
        out
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.root.render(&mut out);
        f.write_str(&out)
    }
}

/// Parses and evaluates a constant expression in one step.
pub fn eval_constant(text: &str, locale: &LocaleContext) -> Result<Value, EvalError> {
    let expr = Expression::parse(ExpressionKind::Expression, text, None, &ParseContext::default())?;
    let mut ctx = EvalContext::new(locale.clone());
    expr.eval(&mut ctx)
}
