//! Program flow and inspection: `IIf`, `Nz`, `Choose`, `Switch`, `IsNull`,
//! `IsNumeric`, `IsDate`, `TypeName`, `VarType`.
//!
//! Every function here sees Null arguments. Arguments are evaluated before
//! the call, so both branches of `IIf` always run.

use super::{Function, FunctionRegistry, VARIADIC};
use crate::error::EvalError;
use crate::expr::EvalContext;
use crate::types::{parse_number, Value};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_builtin(Function::new("IIf", 3, 3, iif).handles_nulls());
    registry.add_builtin(Function::new("Nz", 1, 2, nz).handles_nulls());
    registry.add_builtin(Function::new("Choose", 2, VARIADIC, choose).handles_nulls());
    registry.add_builtin(Function::new("Switch", 2, VARIADIC, switch).handles_nulls());
    registry.add_builtin(Function::new("IsNull", 1, 1, is_null).handles_nulls());
    registry.add_builtin(Function::new("IsNumeric", 1, 1, is_numeric).handles_nulls());
    registry.add_builtin(Function::new("IsDate", 1, 1, is_date).handles_nulls());
    registry.add_builtin(Function::new("TypeName", 1, 1, type_name).handles_nulls());
    registry.add_builtin(Function::new("VarType", 1, 1, var_type).handles_nulls());
}

fn iif(_ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(if args[0].as_bool() {
        args[1].clone()
    } else {
        args[2].clone()
    })
}

/// Without a replacement, Null becomes 0 when the expression declares a
/// numeric result and "" otherwise.
fn nz(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    if !args[0].is_null() {
        return Ok(args[0].clone());
    }
    if let Some(replacement) = args.get(1) {
        return Ok(replacement.clone());
    }
    Ok(match ctx.result_type() {
        Some(t) if t.is_numeric() => Value::Long(0),
        _ => Value::string(""),
    })
}

fn choose(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    if args[0].is_null() {
        return Ok(Value::Null);
    }
    let index = args[0].as_double(ctx.locale())?.trunc();
    let choices = &args[1..];
    if index < 1.0 || index > choices.len() as f64 {
        return Ok(Value::Null);
    }
    Ok(choices[index as usize - 1].clone())
}

fn switch(_ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() % 2 != 0 {
        return Err(EvalError::invalid(
            "Switch expects condition/value pairs",
        ));
    }
    Ok(args
        .chunks_exact(2)
        .find(|pair| pair[0].as_bool())
        .map(|pair| pair[1].clone())
        .unwrap_or(Value::Null))
}

fn is_null(_ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::from_bool(args[0].is_null()))
}

fn is_numeric(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let numeric = match &args[0] {
        Value::Long(_) | Value::Double(_) | Value::BigDecimal(_) => true,
        Value::String(s) => parse_number(s, ctx.locale().numeric()).is_some(),
        _ => false,
    };
    Ok(Value::from_bool(numeric))
}

fn is_date(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let date = match &args[0] {
        Value::Date(_) | Value::Time(_) | Value::DateTime(_) => true,
        v @ Value::String(_) => v.as_date_time(ctx.locale()).is_ok(),
        _ => false,
    };
    Ok(Value::from_bool(date))
}

fn type_name(_ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::string(args[0].value_type().type_name()))
}

fn var_type(_ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Long(args[0].value_type().var_type()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    fn call(name: &str, args: &[Value]) -> Value {
        let registry = FunctionRegistry::builtin();
        let mut ctx = EvalContext::default();
        registry.functions[&name.to_ascii_uppercase()]
            .call(&mut ctx, args)
            .unwrap()
    }

    #[test]
    fn iif_picks_a_branch() {
        assert_eq!(
            call("IIf", &[Value::TRUE, Value::Long(1), Value::Long(2)]),
            Value::Long(1)
        );
        assert_eq!(
            call("IIf", &[Value::Null, Value::Long(1), Value::Long(2)]),
            Value::Long(2)
        );
    }

    #[test]
    fn nz_uses_declared_result_type() {
        let registry = FunctionRegistry::builtin();
        let nz = &registry.functions["NZ"];
        let mut ctx = EvalContext::default();
        assert_eq!(nz.call(&mut ctx, &[Value::Null]).unwrap(), Value::string(""));
        assert_eq!(
            nz.call(&mut ctx, &[Value::Null, Value::Long(5)]).unwrap(),
            Value::Long(5)
        );
        ctx.swap_result_type(Some(ValueType::Double));
        assert_eq!(nz.call(&mut ctx, &[Value::Null]).unwrap(), Value::Long(0));
        assert_eq!(
            nz.call(&mut ctx, &[Value::string("x")]).unwrap(),
            Value::string("x")
        );
    }

    #[test]
    fn choose_and_switch() {
        let abc = [
            Value::Double(2.7),
            Value::string("a"),
            Value::string("b"),
            Value::string("c"),
        ];
        assert_eq!(call("Choose", &abc), Value::string("b"));
        assert_eq!(
            call("Choose", &[Value::Long(9), Value::string("a")]),
            Value::Null
        );
        assert_eq!(
            call(
                "Switch",
                &[Value::FALSE, Value::Long(1), Value::TRUE, Value::Long(2)]
            ),
            Value::Long(2)
        );
        assert_eq!(call("Switch", &[Value::FALSE, Value::Long(1)]), Value::Null);
    }

    #[test]
    fn inspection() {
        assert_eq!(call("IsNull", &[Value::Null]), Value::TRUE);
        assert_eq!(call("IsNumeric", &[Value::string("1.5")]), Value::TRUE);
        assert_eq!(call("IsNumeric", &[Value::string("x1")]), Value::FALSE);
        assert_eq!(call("IsDate", &[Value::string("2/29/2024")]), Value::TRUE);
        assert_eq!(call("IsDate", &[Value::string("2/30/2024")]), Value::FALSE);
        assert_eq!(call("TypeName", &[Value::Double(1.0)]), Value::string("Double"));
        assert_eq!(call("VarType", &[Value::string("")]), Value::Long(8));
    }
}
