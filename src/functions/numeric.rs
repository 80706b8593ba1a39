//! Math functions. `Abs`, `Fix`, `Int` and `Round` keep the numeric type of
//! their argument; the trigonometric and exponential functions return
//! Double. `Round` rounds half to even.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use super::{arg_double, opt_long, Function, FunctionRegistry};
use crate::error::EvalError;
use crate::expr::EvalContext;
use crate::types::Value;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_builtin(Function::new("Abs", 1, 1, abs));
    registry.add_builtin(Function::new("Atn", 1, 1, |ctx, args| unary_double(ctx, args, f64::atan)));
    registry.add_builtin(Function::new("Cos", 1, 1, |ctx, args| unary_double(ctx, args, f64::cos)));
    registry.add_builtin(Function::new("Exp", 1, 1, |ctx, args| unary_double(ctx, args, f64::exp)));
    registry.add_builtin(Function::new("Fix", 1, 1, fix));
    registry.add_builtin(Function::new("Int", 1, 1, int));
    registry.add_builtin(Function::new("Log", 1, 1, log));
    registry.add_builtin(Function::new("Rnd", 0, 1, rnd).impure());
    registry.add_builtin(Function::new("Round", 1, 2, round));
    registry.add_builtin(Function::new("Sgn", 1, 1, sgn));
    registry.add_builtin(Function::new("Sin", 1, 1, |ctx, args| unary_double(ctx, args, f64::sin)));
    registry.add_builtin(Function::new("Sqr", 1, 1, sqr));
    registry.add_builtin(Function::new("Tan", 1, 1, |ctx, args| unary_double(ctx, args, f64::tan)));
}

fn unary_double(
    ctx: &mut EvalContext<'_>,
    args: &[Value],
    f: fn(f64) -> f64,
) -> Result<Value, EvalError> {
    Value::double(f(arg_double(args, 0, ctx.locale())?))
}

fn abs(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(match args[0].to_numeric(ctx.locale())? {
        Value::Long(l) => match l.checked_abs() {
            Some(a) => Value::Long(a),
            None => Value::Double((l as f64).abs()),
        },
        Value::Double(d) => Value::Double(d.abs()),
        Value::BigDecimal(d) => Value::BigDecimal(d.abs()),
        other => other,
    })
}

/// Truncates toward zero.
fn fix(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(match args[0].to_numeric(ctx.locale())? {
        Value::Double(d) => Value::Double(d.trunc()),
        Value::BigDecimal(d) => Value::BigDecimal(d.trunc()),
        other => other,
    })
}

/// Rounds toward negative infinity.
fn int(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(match args[0].to_numeric(ctx.locale())? {
        Value::Double(d) => Value::Double(d.floor()),
        Value::BigDecimal(d) => Value::BigDecimal(d.floor()),
        other => other,
    })
}

fn log(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let d = arg_double(args, 0, ctx.locale())?;
    if d <= 0.0 {
        return Err(EvalError::invalid("Log of a non-positive number"));
    }
    Value::double(d.ln())
}

fn sqr(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let d = arg_double(args, 0, ctx.locale())?;
    if d < 0.0 {
        return Err(EvalError::invalid("Sqr of a negative number"));
    }
    Value::double(d.sqrt())
}

fn rnd(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let seed = match args.first() {
        Some(v) => Some(v.as_double(ctx.locale())?),
        None => None,
    };
    let r = ctx.random().next(seed);
    Ok(Value::Double(r as f64))
}

fn round(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let digits = opt_long(args, 1, 0, ctx.locale())?;
    let digits = u32::try_from(digits)
        .map_err(|_| EvalError::invalid(format!("invalid number of digits {}", digits)))?;

    Ok(match args[0].to_numeric(ctx.locale())? {
        Value::Double(d) => Value::Double(round_double(d, digits)),
        Value::BigDecimal(d) => Value::BigDecimal(
            d.round_dp_with_strategy(digits, RoundingStrategy::MidpointNearestEven),
        ),
        other => other,
    })
}

/// Rounds through the shortest decimal form of `d` so that `Round(2.675, 2)`
/// sees 2.675 rather than its binary approximation.
fn round_double(d: f64, digits: u32) -> f64 {
    let Some(dec) = Decimal::from_f64(d) else {
        return d;
    };
    dec.round_dp_with_strategy(digits, RoundingStrategy::MidpointNearestEven)
        .to_f64()
        .unwrap_or(d)
}

fn sgn(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let sign = match args[0].to_numeric(ctx.locale())? {
        Value::Long(l) => l.signum(),
        Value::BigDecimal(d) if d.is_zero() => 0,
        Value::BigDecimal(d) if d.is_sign_negative() => -1,
        Value::BigDecimal(_) => 1,
        other => {
            let d = other.as_double(ctx.locale())?;
            if d > 0.0 {
                1
            } else if d < 0.0 {
                -1
            } else {
                0
            }
        }
    };
    Ok(Value::Long(sign))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::RandomContext;

    fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let registry = FunctionRegistry::builtin();
        let mut ctx = EvalContext::default();
        registry.functions[&name.to_ascii_uppercase()].call(&mut ctx, args)
    }

    #[test]
    fn round_half_to_even() {
        let r = |d: f64| call("Round", &[Value::Double(d), Value::Long(0)]).unwrap();
        assert_eq!(r(2.5), Value::Double(2.0));
        assert_eq!(r(3.5), Value::Double(4.0));
        assert_eq!(r(-2.5), Value::Double(-2.0));
        assert_eq!(
            call("Round", &[Value::Double(2.675), Value::Long(2)]).unwrap(),
            Value::Double(2.68)
        );
        assert!(call("Round", &[Value::Double(1.0), Value::Long(-1)]).is_err());
    }

    #[test]
    fn abs_keeps_type_and_propagates_null() {
        assert_eq!(call("Abs", &[Value::Long(-3)]).unwrap(), Value::Long(3));
        assert_eq!(
            call("Abs", &[Value::Long(i32::MIN)]).unwrap(),
            Value::Double(2147483648.0)
        );
        assert_eq!(call("Abs", &[Value::Null]).unwrap(), Value::Null);
        assert_eq!(call("Abs", &[Value::string("-1.5")]).unwrap(), Value::Double(1.5));
    }

    #[test]
    fn fix_and_int_differ_on_negatives() {
        assert_eq!(call("Fix", &[Value::Double(-8.4)]).unwrap(), Value::Double(-8.0));
        assert_eq!(call("Int", &[Value::Double(-8.4)]).unwrap(), Value::Double(-9.0));
        assert_eq!(call("Int", &[Value::Long(7)]).unwrap(), Value::Long(7));
    }

    #[test]
    fn domain_errors() {
        assert!(call("Log", &[Value::Long(0)]).is_err());
        assert!(call("Sqr", &[Value::Long(-4)]).is_err());
        assert_eq!(call("Sqr", &[Value::Long(9)]).unwrap(), Value::Double(3.0));
        assert_eq!(call("Sgn", &[Value::Double(-0.1)]).unwrap(), Value::Long(-1));
    }

    #[test]
    fn rnd_uses_context_state() {
        let registry = FunctionRegistry::builtin();
        let rnd = &registry.functions["RND"];
        assert!(!rnd.is_pure());

        let mut ctx = EvalContext::default().with_random(RandomContext::with_seed(9));
        let first = rnd.call(&mut ctx, &[]).unwrap();
        assert_eq!(rnd.call(&mut ctx, &[Value::Long(0)]).unwrap(), first);
        let fixed = rnd.call(&mut ctx, &[Value::Long(-2)]).unwrap();
        assert_eq!(rnd.call(&mut ctx, &[Value::Long(-2)]).unwrap(), fixed);
    }
}
