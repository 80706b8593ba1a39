//! # Built-in Functions
//!
//! The function library of the expression engine, organized by category.
//!
//! ## Module Structure
//!
//! - `flow`: `IIf`, `Nz`, `Choose`, `Switch` and the type inspection functions
//! - `conversion`: `CInt`-style conversions, `Hex`/`Oct`/`Str`/`Val`, `Format*`
//! - `numeric`: math functions, `Round`, `Rnd`
//! - `string`: text functions and their `$` aliases
//! - `datetime`: clock, date construction, `DateAdd`/`DateDiff`/`DatePart`
//! - `financial`: annuity and depreciation functions
//!
//! ## Dispatch
//!
//! Functions are resolved by name when an expression is parsed, through a
//! [`FunctionLookup`]. [`FunctionRegistry::builtin`] builds a fresh table
//! holding every built-in; callers wanting custom functions either register
//! them into their own registry or wrap another lookup as a fallback. There
//! is no process-wide registry.
//!
//! ## Null Handling
//!
//! Unless a function is built with [`Function::handles_nulls`], a Null
//! argument short-circuits the call and the result is Null.
//!
//! ## Errors
//!
//! Arity is checked before dispatch. Any error raised by the body is wrapped
//! in [`EvalError::Function`] carrying the rendered call, e.g.
//! `Left("abc", -1)`.

mod conversion;
mod datetime;
mod financial;
mod flow;
mod numeric;
mod string;

use std::fmt;
use std::sync::Arc;

use eyre::{bail, Result};
use hashbrown::HashMap;

use crate::config::LocaleContext;
use crate::error::EvalError;
use crate::expr::{render_literal, EvalContext};
use crate::types::Value;

/// Upper arity bound for variadic functions.
pub const VARIADIC: usize = usize::MAX;

pub type FunctionBody =
    dyn Fn(&mut EvalContext<'_>, &[Value]) -> Result<Value, EvalError> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPolicy {
    /// Any Null argument makes the result Null without running the body.
    Propagate,
    /// The body sees Null arguments.
    Handle,
}

#[derive(Clone)]
pub struct Function {
    name: String,
    min_args: usize,
    max_args: usize,
    pure: bool,
    null_policy: NullPolicy,
    body: Arc<FunctionBody>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("pure", &self.pure)
            .field("null_policy", &self.null_policy)
            .finish_non_exhaustive()
    }
}

impl Function {
    pub fn new<F>(name: &str, min_args: usize, max_args: usize, body: F) -> Self
    where
        F: Fn(&mut EvalContext<'_>, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        debug_assert!(min_args <= max_args, "bad arity for {}", name);
        Self {
            name: name.to_string(),
            min_args,
            max_args,
            pure: true,
            null_policy: NullPolicy::Propagate,
            body: Arc::new(body),
        }
    }

    /// Marks the function as reading state outside its arguments (clock,
    /// random numbers); expressions calling it are never constant.
    pub fn impure(mut self) -> Self {
        self.pure = false;
        self
    }

    pub fn handles_nulls(mut self) -> Self {
        self.null_policy = NullPolicy::Handle;
        self
    }

    /// Same body under another name.
    pub fn alias(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_args(&self) -> usize {
        self.min_args
    }

    pub fn max_args(&self) -> usize {
        self.max_args
    }

    pub fn is_pure(&self) -> bool {
        self.pure
    }

    pub fn null_policy(&self) -> NullPolicy {
        self.null_policy
    }

    pub fn call(&self, ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
        if args.len() < self.min_args || args.len() > self.max_args {
            return Err(EvalError::Arity {
                name: self.name.clone(),
                expected: self.expected_arity(),
                actual: args.len(),
            });
        }
        if self.null_policy == NullPolicy::Propagate && args.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        (self.body)(ctx, args).map_err(|source| EvalError::Function {
            call: self.signature(args),
            source: Box::new(source),
        })
    }

    fn expected_arity(&self) -> String {
        if self.min_args == self.max_args {
            self.min_args.to_string()
        } else if self.max_args == VARIADIC {
            format!("at least {}", self.min_args)
        } else {
            format!("{} to {}", self.min_args, self.max_args)
        }
    }

    fn signature(&self, args: &[Value]) -> String {
        let mut out = String::with_capacity(self.name.len() + 2 + args.len() * 8);
        out.push_str(&self.name);
        out.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            render_literal(arg, &mut out);
        }
        out.push(')');
        out
    }
}

/// Resolves function names for the parser. Names compare ignoring case.
pub trait FunctionLookup: Send + Sync {
    fn get_function(&self, name: &str) -> Option<Arc<Function>>;
}

#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<Function>>,
    fallback: Option<Arc<dyn FunctionLookup>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        flow::register(&mut registry);
        conversion::register(&mut registry);
        numeric::register(&mut registry);
        string::register(&mut registry);
        datetime::register(&mut registry);
        financial::register(&mut registry);
        registry
    }

    /// Names not found in this registry are looked up in `fallback`.
    pub fn with_fallback(mut self, fallback: Arc<dyn FunctionLookup>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Adds a function. Registering a name twice is an error; a registry
    /// used as a fallback is not consulted for duplicates.
    pub fn register(&mut self, function: Function) -> Result<()> {
        let key = function.name.to_ascii_uppercase();
        if self.functions.contains_key(&key) {
            bail!("function '{}' is already registered", function.name);
        }
        self.functions.insert(key, Arc::new(function));
        Ok(())
    }

    pub(crate) fn add_builtin(&mut self, function: Function) {
        let key = function.name.to_ascii_uppercase();
        let previous = self.functions.insert(key, Arc::new(function));
        assert!(previous.is_none(), "duplicate built-in function");
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.values().map(|f| f.name())
    }
}

impl FunctionLookup for FunctionRegistry {
    fn get_function(&self, name: &str) -> Option<Arc<Function>> {
        match self.functions.get(&name.to_ascii_uppercase()) {
            Some(f) => Some(Arc::clone(f)),
            None => self.fallback.as_ref()?.get_function(name),
        }
    }
}

/// Optional argument: `None` when absent.
fn opt(args: &[Value], i: usize) -> Option<&Value> {
    args.get(i)
}

fn arg_long(args: &[Value], i: usize, locale: &LocaleContext) -> Result<i32, EvalError> {
    args.get(i)
        .ok_or_else(|| EvalError::invalid("missing argument"))?
        .as_long(locale)
}

fn arg_double(args: &[Value], i: usize, locale: &LocaleContext) -> Result<f64, EvalError> {
    args.get(i)
        .ok_or_else(|| EvalError::invalid("missing argument"))?
        .as_double(locale)
}

/// Optional Long argument; absent or Null gives `default`.
fn opt_long(
    args: &[Value],
    i: usize,
    default: i32,
    locale: &LocaleContext,
) -> Result<i32, EvalError> {
    match args.get(i) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v.as_long(locale),
    }
}

fn opt_double(
    args: &[Value],
    i: usize,
    default: f64,
    locale: &LocaleContext,
) -> Result<f64, EvalError> {
    match args.get(i) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v.as_double(locale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double_it(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
        Ok(Value::Long(args[0].as_long(ctx.locale())? * 2))
    }

    #[test]
    fn lookup_ignores_case() {
        let registry = FunctionRegistry::builtin();
        assert!(registry.get_function("left").is_some());
        assert!(registry.get_function("LEFT$").is_some());
        assert_eq!(registry.get_function("uCaSe").unwrap().name(), "UCase");
        assert!(registry.get_function("NoSuchFunction").is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = FunctionRegistry::new();
        registry
            .register(Function::new("Twice", 1, 1, double_it))
            .unwrap();
        assert!(registry
            .register(Function::new("TWICE", 1, 1, double_it))
            .is_err());
    }

    #[test]
    fn fallback_supplies_builtins() {
        let mut custom = FunctionRegistry::new()
            .with_fallback(Arc::new(FunctionRegistry::builtin()));
        custom
            .register(Function::new("Twice", 1, 1, double_it))
            .unwrap();
        assert!(custom.get_function("twice").is_some());
        assert!(custom.get_function("Abs").is_some());
        assert_eq!(custom.len(), 1);
    }

    #[test]
    fn arity_is_checked_before_dispatch() {
        let f = Function::new("Twice", 1, 1, double_it);
        let mut ctx = EvalContext::default();
        let err = f.call(&mut ctx, &[]).unwrap_err();
        assert!(matches!(err, EvalError::Arity { actual: 0, .. }));
        assert_eq!(f.call(&mut ctx, &[Value::Long(4)]).unwrap(), Value::Long(8));
    }

    #[test]
    fn null_policy() {
        let mut ctx = EvalContext::default();
        let propagating = Function::new("Twice", 1, 1, double_it);
        assert_eq!(propagating.call(&mut ctx, &[Value::Null]).unwrap(), Value::Null);

        let handling = Function::new("Twice", 1, 1, double_it).handles_nulls();
        assert!(handling.call(&mut ctx, &[Value::Null]).is_err());
    }

    #[test]
    fn failures_carry_the_call() {
        let f = Function::new("Twice", 1, 1, double_it);
        let mut ctx = EvalContext::default();
        let err = f.call(&mut ctx, &[Value::string("abc")]).unwrap_err();
        match err {
            EvalError::Function { call, source } => {
                assert_eq!(call, "Twice(\"abc\")");
                assert!(source.is_coercion());
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
