//! Annuity and depreciation functions.
//!
//! Cash paid out is negative, cash received positive. The optional `type`
//! argument is 0 when payments fall due at the end of each period and 1 at
//! the beginning.

use super::{arg_double, opt_double, Function, FunctionRegistry};
use crate::error::EvalError;
use crate::expr::EvalContext;
use crate::types::Value;

const RATE_MAX_ITERATIONS: usize = 40;
const RATE_TOLERANCE: f64 = 1e-7;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_builtin(Function::new("NPer", 3, 5, nper));
    registry.add_builtin(Function::new("FV", 3, 5, fv));
    registry.add_builtin(Function::new("PV", 3, 5, pv));
    registry.add_builtin(Function::new("Pmt", 3, 5, pmt));
    registry.add_builtin(Function::new("IPmt", 4, 6, ipmt));
    registry.add_builtin(Function::new("PPmt", 4, 6, ppmt));
    registry.add_builtin(Function::new("Rate", 3, 6, rate));
    registry.add_builtin(Function::new("DDB", 4, 5, ddb));
    registry.add_builtin(Function::new("SLN", 3, 3, sln));
    registry.add_builtin(Function::new("SYD", 4, 4, syd));
}

fn due_at_start(args: &[Value], i: usize, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
    Ok(opt_double(args, i, 0.0, ctx.locale())? != 0.0)
}

fn calc_fv(rate: f64, nper: f64, pmt: f64, pv: f64, begin: bool) -> f64 {
    if rate == 0.0 {
        return -(pv + pmt * nper);
    }
    let growth = (1.0 + rate).powf(nper);
    let timing = if begin { 1.0 + rate } else { 1.0 };
    -(pv * growth + pmt * timing * (growth - 1.0) / rate)
}

fn calc_pmt(rate: f64, nper: f64, pv: f64, fv: f64, begin: bool) -> Result<f64, EvalError> {
    if nper == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    if rate == 0.0 {
        return Ok(-(pv + fv) / nper);
    }
    let growth = (1.0 + rate).powf(nper);
    let timing = if begin { 1.0 + rate } else { 1.0 };
    Ok(-(fv + pv * growth) * rate / (timing * (growth - 1.0)))
}

fn calc_ipmt(
    rate: f64,
    per: f64,
    nper: f64,
    pv: f64,
    fv: f64,
    begin: bool,
) -> Result<f64, EvalError> {
    if per < 1.0 || per > nper {
        return Err(EvalError::invalid(format!("invalid period {}", per)));
    }
    let pmt = calc_pmt(rate, nper, pv, fv, begin)?;
    let interest = if per == 1.0 {
        if begin {
            0.0
        } else {
            -pv
        }
    } else if begin {
        calc_fv(rate, per - 2.0, pmt, pv, true) - pmt
    } else {
        calc_fv(rate, per - 1.0, pmt, pv, false)
    };
    Ok(interest * rate)
}

fn fv(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let rate = arg_double(args, 0, locale)?;
    let nper = arg_double(args, 1, locale)?;
    let pmt = arg_double(args, 2, locale)?;
    let pv = opt_double(args, 3, 0.0, locale)?;
    let begin = due_at_start(args, 4, ctx)?;
    Value::double(calc_fv(rate, nper, pmt, pv, begin))
}

fn pv(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let rate = arg_double(args, 0, locale)?;
    let nper = arg_double(args, 1, locale)?;
    let pmt = arg_double(args, 2, locale)?;
    let fv = opt_double(args, 3, 0.0, locale)?;
    let begin = due_at_start(args, 4, ctx)?;
    if rate == 0.0 {
        return Value::double(-(fv + pmt * nper));
    }
    let growth = (1.0 + rate).powf(nper);
    let timing = if begin { 1.0 + rate } else { 1.0 };
    Value::double(-(fv + pmt * timing * (growth - 1.0) / rate) / growth)
}

fn pmt(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let rate = arg_double(args, 0, locale)?;
    let nper = arg_double(args, 1, locale)?;
    let pv = arg_double(args, 2, locale)?;
    let fv = opt_double(args, 3, 0.0, locale)?;
    let begin = due_at_start(args, 4, ctx)?;
    Value::double(calc_pmt(rate, nper, pv, fv, begin)?)
}

fn nper(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let rate = arg_double(args, 0, locale)?;
    let pmt = arg_double(args, 1, locale)?;
    let pv = arg_double(args, 2, locale)?;
    let fv = opt_double(args, 3, 0.0, locale)?;
    let begin = due_at_start(args, 4, ctx)?;

    if rate == 0.0 {
        if pmt == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        return Value::double(-(pv + fv) / pmt);
    }
    let timing = if begin { 1.0 + rate } else { 1.0 };
    let numerator = pmt * timing - fv * rate;
    let denominator = pmt * timing + pv * rate;
    if denominator == 0.0 || numerator / denominator <= 0.0 {
        return Err(EvalError::invalid("no solution for NPer"));
    }
    Value::double((numerator / denominator).ln() / (1.0 + rate).ln())
}

fn ipmt(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let rate = arg_double(args, 0, locale)?;
    let per = arg_double(args, 1, locale)?;
    let nper = arg_double(args, 2, locale)?;
    let pv = arg_double(args, 3, locale)?;
    let fv = opt_double(args, 4, 0.0, locale)?;
    let begin = due_at_start(args, 5, ctx)?;
    Value::double(calc_ipmt(rate, per, nper, pv, fv, begin)?)
}

fn ppmt(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let rate = arg_double(args, 0, locale)?;
    let per = arg_double(args, 1, locale)?;
    let nper = arg_double(args, 2, locale)?;
    let pv = arg_double(args, 3, locale)?;
    let fv = opt_double(args, 4, 0.0, locale)?;
    let begin = due_at_start(args, 5, ctx)?;
    let total = calc_pmt(rate, nper, pv, fv, begin)?;
    Value::double(total - calc_ipmt(rate, per, nper, pv, fv, begin)?)
}

/// Newton iteration on the annuity equation starting from `guess`.
fn rate(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let nper = arg_double(args, 0, locale)?;
    let pmt = arg_double(args, 1, locale)?;
    let pv = arg_double(args, 2, locale)?;
    let fv = opt_double(args, 3, 0.0, locale)?;
    let begin = due_at_start(args, 4, ctx)?;
    let mut r = opt_double(args, 5, 0.1, locale)?;
    if nper <= 0.0 {
        return Err(EvalError::invalid(format!("invalid number of periods {}", nper)));
    }

    let equation = |r: f64| fv - calc_fv(r, nper, pmt, pv, begin);
    for _ in 0..RATE_MAX_ITERATIONS {
        let f = equation(r);
        let step = 1e-6_f64.max(r.abs() * 1e-6);
        let slope = (equation(r + step) - equation(r - step)) / (2.0 * step);
        if slope == 0.0 || !slope.is_finite() {
            break;
        }
        let next = r - f / slope;
        if (next - r).abs() < RATE_TOLERANCE {
            return Value::double(next);
        }
        r = next;
    }
    Err(EvalError::invalid("Rate did not converge"))
}

/// Double-declining balance depreciation for one period.
fn ddb(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let cost = arg_double(args, 0, locale)?;
    let salvage = arg_double(args, 1, locale)?;
    let life = arg_double(args, 2, locale)?;
    let period = arg_double(args, 3, locale)?;
    let factor = opt_double(args, 4, 2.0, locale)?;
    if life <= 0.0 || period < 1.0 || period > life || factor <= 0.0 || cost < 0.0 {
        return Err(EvalError::invalid("invalid DDB arguments"));
    }

    let rate = factor / life;
    let mut book = cost;
    let mut depreciation = 0.0;
    for _ in 0..period.round() as u64 {
        depreciation = (book * rate).min((book - salvage).max(0.0));
        book -= depreciation;
    }
    Value::double(depreciation)
}

fn sln(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let cost = arg_double(args, 0, locale)?;
    let salvage = arg_double(args, 1, locale)?;
    let life = arg_double(args, 2, locale)?;
    if life == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    Value::double((cost - salvage) / life)
}

fn syd(ctx: &mut EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let locale = ctx.locale();
    let cost = arg_double(args, 0, locale)?;
    let salvage = arg_double(args, 1, locale)?;
    let life = arg_double(args, 2, locale)?;
    let period = arg_double(args, 3, locale)?;
    if life <= 0.0 || period < 1.0 || period > life {
        return Err(EvalError::invalid("invalid SYD arguments"));
    }
    Value::double((cost - salvage) * (life - period + 1.0) * 2.0 / (life * (life + 1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[f64]) -> Result<f64, EvalError> {
        let registry = FunctionRegistry::builtin();
        let mut ctx = EvalContext::default();
        let values: Vec<Value> = args.iter().copied().map(Value::Double).collect();
        let v = registry.functions[&name.to_ascii_uppercase()].call(&mut ctx, &values)?;
        v.as_double(ctx.locale())
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6 * b.abs().max(1.0)
    }

    #[test]
    fn loan_payment_round_trips_through_pv_and_nper() {
        let rate = 0.05 / 12.0;
        let pmt = call("Pmt", &[rate, 360.0, 200_000.0]).unwrap();
        assert!(close(pmt, -1073.643246), "pmt {}", pmt);

        let pv = call("PV", &[rate, 360.0, pmt]).unwrap();
        assert!(close(pv, 200_000.0), "pv {}", pv);

        let nper = call("NPer", &[rate, pmt, 200_000.0]).unwrap();
        assert!(close(nper, 360.0), "nper {}", nper);
    }

    #[test]
    fn interest_and_principal_add_up_to_payment() {
        let args = [0.01, 3.0, 12.0, 1000.0];
        let total = call("Pmt", &[0.01, 12.0, 1000.0]).unwrap();
        let interest = call("IPmt", &args).unwrap();
        let principal = call("PPmt", &args).unwrap();
        assert!(close(interest + principal, total));
        assert!(close(call("IPmt", &[0.01, 1.0, 12.0, 1000.0]).unwrap(), -10.0));
        assert!(call("IPmt", &[0.01, 13.0, 12.0, 1000.0]).is_err());
    }

    #[test]
    fn fv_with_zero_rate_is_linear() {
        assert!(close(call("FV", &[0.0, 10.0, -100.0]).unwrap(), 1000.0));
        assert!(close(
            call("FV", &[0.06 / 12.0, 10.0, -200.0, -500.0, 1.0]).unwrap(),
            2581.403374
        ));
    }

    #[test]
    fn rate_recovers_known_rate() {
        let pmt = call("Pmt", &[0.01, 24.0, 5000.0]).unwrap();
        let r = call("Rate", &[24.0, pmt, 5000.0]).unwrap();
        assert!(close(r, 0.01), "rate {}", r);
    }

    #[test]
    fn depreciation() {
        assert!(close(call("SLN", &[10_000.0, 1_000.0, 5.0]).unwrap(), 1800.0));
        assert!(close(call("SYD", &[10_000.0, 1_000.0, 5.0, 1.0]).unwrap(), 3000.0));
        assert!(close(call("DDB", &[2400.0, 300.0, 10.0, 1.0]).unwrap(), 480.0));
        assert!(close(call("DDB", &[2400.0, 300.0, 10.0, 2.0]).unwrap(), 384.0));
        assert!(matches!(
            call("SLN", &[1.0, 0.0, 0.0]),
            Err(EvalError::Function { .. })
        ));
    }
}
