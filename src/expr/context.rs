//! # Evaluation Context
//!
//! State threaded through one or more evaluations: the locale, the random
//! number state behind `Rnd`, the value under validation, and the sources
//! identifiers are resolved from.
//!
//! Identifiers resolve against explicit bindings first, then against the
//! optional [`IdentifierResolver`]. A context is reused across rows by
//! rebinding; nothing in it is tied to a particular expression.
//!
//! ## Rnd Semantics
//!
//! | Seed argument  | Result                                                  |
//! |----------------|---------------------------------------------------------|
//! | none, > 0      | next number of the sequence for that seed               |
//! | < 0            | the same number every call for a given seed             |
//! | 0              | the most recently generated number                      |

use std::fmt;

use chrono::{Local, NaiveDateTime};
use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::ast::Identifier;
use crate::config::LocaleContext;
use crate::cursor::Row;
use crate::error::EvalError;
use crate::types::{Value, ValueType};

/// Supplies values for identifiers that have no explicit binding.
pub trait IdentifierResolver: fmt::Debug {
    /// `Ok(None)` when the identifier is unknown to this resolver.
    fn resolve(&self, identifier: &Identifier) -> Result<Option<Value>, EvalError>;
}

/// A cursor row resolves its own column names.
impl IdentifierResolver for Row {
    fn resolve(&self, identifier: &Identifier) -> Result<Option<Value>, EvalError> {
        if identifier.property().is_some() {
            return Ok(None);
        }
        match self.get(identifier.object()) {
            Some(v) => v.to_value().map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug)]
enum RandomSource {
    Sequence(StdRng),
    Fixed(f32),
}

#[derive(Debug)]
pub struct RandomContext {
    default: Option<StdRng>,
    base_seed: Option<u64>,
    seeded: HashMap<u64, RandomSource>,
    last: Option<f32>,
}

impl Default for RandomContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomContext {
    pub fn new() -> Self {
        Self {
            default: None,
            base_seed: None,
            seeded: HashMap::new(),
            last: None,
        }
    }

    /// Unseeded `Rnd()` calls follow a reproducible sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            base_seed: Some(seed),
            ..Self::new()
        }
    }

    pub fn next(&mut self, seed: Option<f64>) -> f32 {
        let value = match seed {
            None => self.next_default(),
            Some(s) if s == 0.0 => match self.last {
                Some(last) => last,
                None => self.next_default(),
            },
            Some(s) => {
                let key = s.to_bits();
                let source = self.seeded.entry(key).or_insert_with(|| {
                    let mut rng = StdRng::seed_from_u64(key);
                    if s < 0.0 {
                        RandomSource::Fixed(rng.random::<f32>())
                    } else {
                        RandomSource::Sequence(rng)
                    }
                });
                match source {
                    RandomSource::Sequence(rng) => rng.random::<f32>(),
                    RandomSource::Fixed(v) => *v,
                }
            }
        };
        self.last = Some(value);
        value
    }

    fn next_default(&mut self) -> f32 {
        let base_seed = self.base_seed;
        self.default
            .get_or_insert_with(|| match base_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            })
            .random::<f32>()
    }
}

pub struct EvalContext<'a> {
    locale: LocaleContext,
    random: RandomContext,
    this_value: Option<Value>,
    result_type: Option<ValueType>,
    resolver: Option<&'a dyn IdentifierResolver>,
    bindings: HashMap<String, Value>,
    now: Option<NaiveDateTime>,
}

impl fmt::Debug for EvalContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalContext")
            .field("this_value", &self.this_value)
            .field("result_type", &self.result_type)
            .field("resolver", &self.resolver)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

impl Default for EvalContext<'_> {
    fn default() -> Self {
        Self::new(LocaleContext::default())
    }
}

impl<'a> EvalContext<'a> {
    pub fn new(locale: LocaleContext) -> Self {
        Self {
            locale,
            random: RandomContext::new(),
            this_value: None,
            result_type: None,
            resolver: None,
            bindings: HashMap::new(),
            now: None,
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn IdentifierResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_random(mut self, random: RandomContext) -> Self {
        self.random = random;
        self
    }

    /// Pins the clock read by `Date`, `Time`, `Now` and `Timer`.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn set_resolver(&mut self, resolver: Option<&'a dyn IdentifierResolver>) {
        self.resolver = resolver;
    }

    pub fn locale(&self) -> &LocaleContext {
        &self.locale
    }

    pub fn random(&mut self) -> &mut RandomContext {
        &mut self.random
    }

    pub fn this_value(&self) -> Option<&Value> {
        self.this_value.as_ref()
    }

    /// Sets the value a field validation rule is checked against.
    pub fn set_this_value(&mut self, value: Option<Value>) {
        self.this_value = value;
    }

    /// Declared result type of the expression being evaluated.
    pub fn result_type(&self) -> Option<ValueType> {
        self.result_type
    }

    pub(crate) fn swap_result_type(&mut self, result_type: Option<ValueType>) -> Option<ValueType> {
        std::mem::replace(&mut self.result_type, result_type)
    }

    /// Binds `name` (matched case-insensitively against the rendered
    /// identifier without brackets) to a value.
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) {
        self.bindings.insert(name.to_ascii_uppercase(), value.into());
    }

    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(|| Local::now().naive_local())
    }

    pub fn identifier_value(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        if let Some(v) = self.bindings.get(&binding_key(identifier)) {
            return Ok(v.clone());
        }
        if let Some(resolver) = self.resolver {
            if let Some(v) = resolver.resolve(identifier)? {
                return Ok(v);
            }
        }
        Err(EvalError::UnresolvedIdentifier(identifier.to_string()))
    }
}

fn binding_key(identifier: &Identifier) -> String {
    let mut key = String::new();
    if let Some(c) = identifier.collection() {
        key.push_str(c);
        key.push('.');
    }
    key.push_str(identifier.object());
    if let Some(p) = identifier.property() {
        key.push('.');
        key.push_str(p);
    }
    key.to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::RowId;
    use crate::types::OwnedValue;

    #[test]
    fn positive_seeds_continue_a_sequence() {
        let mut a = RandomContext::new();
        let mut b = RandomContext::new();
        let first = a.next(Some(7.0));
        assert_eq!(first, b.next(Some(7.0)));
        assert_eq!(a.next(Some(7.0)), b.next(Some(7.0)));
        assert!((0.0..1.0).contains(&first));
    }

    #[test]
    fn negative_seed_repeats_and_zero_replays_last() {
        let mut r = RandomContext::with_seed(1);
        let fixed = r.next(Some(-3.0));
        assert_eq!(r.next(Some(-3.0)), fixed);

        let v = r.next(None);
        assert_eq!(r.next(Some(0.0)), v);
        assert_eq!(r.next(Some(0.0)), v);
    }

    #[test]
    fn unseeded_sequence_is_reproducible_with_base_seed() {
        let mut a = RandomContext::with_seed(42);
        let mut b = RandomContext::with_seed(42);
        let xs: Vec<f32> = (0..3).map(|_| a.next(None)).collect();
        let ys: Vec<f32> = (0..3).map(|_| b.next(None)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn bindings_win_over_resolver() {
        let row = Row::new(
            RowId::new(1, 0),
            vec!["Qty".into(), "Price".into()],
            vec![OwnedValue::Long(3), OwnedValue::Double(1.5)],
        );
        let mut ctx = EvalContext::default().with_resolver(&row);
        assert_eq!(
            ctx.identifier_value(&Identifier::new("qty")).unwrap(),
            Value::Long(3)
        );
        ctx.bind("Qty", 10);
        assert_eq!(
            ctx.identifier_value(&Identifier::new("QTY")).unwrap(),
            Value::Long(10)
        );
        assert!(matches!(
            ctx.identifier_value(&Identifier::new("Missing")),
            Err(EvalError::UnresolvedIdentifier(_))
        ));
    }
}
