//! # Expression Tests
//!
//! Parses and evaluates Access expressions end to end: constants, default
//! values with declared result types, validators, calculated columns over
//! table rows and user-registered functions.

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use jetdb::cursor::{Cursor, CursorBuilder};
use jetdb::expr::eval_constant;
use jetdb::functions::FunctionLookup;
use jetdb::types::{ColumnDef, DataType, ValueType};
use jetdb::{
    EvalContext, EvalError, Expression, ExpressionKind, Function, FunctionRegistry, LocaleContext,
    MemTable, ParseContext, Value,
};

fn constant(text: &str) -> Value {
    eval_constant(text, &LocaleContext::default()).unwrap()
}

fn parse(kind: ExpressionKind, text: &str, result_type: Option<ValueType>) -> Expression {
    Expression::parse(kind, text, result_type, &ParseContext::default()).unwrap()
}

#[test]
fn arithmetic_and_rounding() {
    common::init_tracing();
    assert_eq!(constant("Round(2.5, 0)"), Value::Double(2.0));
    assert_eq!(constant("Round(3.5, 0)"), Value::Double(4.0));
    assert_eq!(constant("7 \\ 2 + 7 Mod 4"), Value::Long(6));
    assert_eq!(constant("2 ^ 10"), Value::Double(1024.0));
    assert_eq!(constant("\"a\" & 1 & Null"), Value::string("a1"));
    assert_eq!(constant("1 + Null"), Value::Null);
    assert!(matches!(
        eval_constant("1 / 0", &LocaleContext::default()),
        Err(EvalError::DivisionByZero)
    ));
}

#[test]
fn null_handling_in_functions() {
    assert_eq!(constant("Abs(Null)"), Value::Null);
    assert_eq!(constant("Nz(Null, 5)"), Value::Long(5));
    assert_eq!(constant("IsNull(Null) And Not IsNull(1)"), Value::TRUE);
    assert_eq!(constant("IIf(Null, \"y\", \"n\")"), Value::string("n"));
}

#[test]
fn default_value_follows_result_type() {
    let mut ctx = EvalContext::default();
    let numeric = parse(ExpressionKind::DefaultValue, "Nz(Null)", Some(ValueType::Long));
    assert_eq!(numeric.eval(&mut ctx).unwrap(), Value::Long(0));

    let text = parse(ExpressionKind::DefaultValue, "Nz(Null)", Some(ValueType::String));
    assert_eq!(text.eval(&mut ctx).unwrap(), Value::string(""));

    let date = parse(
        ExpressionKind::DefaultValue,
        "DateAdd(\"m\", 1, #1/31/2024#)",
        Some(ValueType::Date),
    );
    assert_eq!(
        date.eval(&mut ctx).unwrap(),
        Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
    );
}

#[test]
fn field_validator_shorthand() {
    let rule = parse(ExpressionKind::FieldValidator, ">= 0 And < 100", None);
    let mut ctx = EvalContext::default();
    for (value, ok) in [(42, true), (100, false), (-1, false)] {
        ctx.set_this_value(Some(Value::Long(value)));
        assert_eq!(rule.eval_validator(&mut ctx).unwrap(), ok, "value {}", value);
    }
    ctx.set_this_value(Some(Value::Null));
    assert!(rule.eval_validator(&mut ctx).unwrap());

    let pattern = parse(ExpressionKind::FieldValidator, "Like \"A*\" Or Is Null", None);
    ctx.set_this_value(Some(Value::string("apple")));
    assert!(pattern.eval_validator(&mut ctx).unwrap());
    ctx.set_this_value(Some(Value::string("pear")));
    assert!(!pattern.eval_validator(&mut ctx).unwrap());
}

#[test]
fn calculated_column_reads_table_rows() {
    let table = MemTable::new(
        "Lines",
        vec![
            ColumnDef::new("qty", DataType::Long),
            ColumnDef::new("price", DataType::Double),
        ],
    )
    .into_shared();
    table.insert(vec![3.into(), 2.5.into()]).unwrap();
    table
        .insert(vec![4.into(), jetdb::OwnedValue::Null])
        .unwrap();

    let total = parse(ExpressionKind::Expression, "[qty] * Nz([price], 1)", None);
    let rule = parse(ExpressionKind::RecordValidator, "[qty] > 0 And [price] < 10", None);
    let mut cursor = CursorBuilder::new(table.clone()).to_scan_cursor();
    let mut totals = Vec::new();
    while cursor.move_to_next_row().unwrap() {
        let row = cursor.current_row(None).unwrap().unwrap();
        let mut ctx = EvalContext::default().with_resolver(&row);
        totals.push(total.eval(&mut ctx).unwrap());
        assert!(rule.eval_validator(&mut ctx).unwrap());
    }
    assert_eq!(totals, vec![Value::Double(7.5), Value::Long(4)]);

    let mut ctx = EvalContext::default();
    assert!(matches!(
        total.eval(&mut ctx),
        Err(EvalError::UnresolvedIdentifier(_))
    ));
}

#[test]
fn registered_functions_extend_the_library() {
    let mut custom = FunctionRegistry::new()
        .with_fallback(Arc::new(FunctionRegistry::builtin()) as Arc<dyn FunctionLookup>);
    custom
        .register(Function::new("Surcharge", 1, 2, |ctx, args| {
            let rate = match args.get(1) {
                Some(v) => v.as_double(ctx.locale())?,
                None => 0.1,
            };
            Value::double(args[0].as_double(ctx.locale())? * (1.0 + rate))
        }))
        .unwrap();
    assert!(custom
        .register(Function::new("SURCHARGE", 0, 0, |_, _| Ok(Value::Null)))
        .is_err());

    let parse_ctx = ParseContext::new(Arc::new(custom));
    let expr = Expression::parse(
        ExpressionKind::Expression,
        "Round(Surcharge(200), 2) + Surcharge(100, 0.5)",
        None,
        &parse_ctx,
    )
    .unwrap();
    assert!(expr.is_constant());
    assert_eq!(
        expr.eval(&mut EvalContext::default()).unwrap(),
        Value::Double(370.0)
    );

    let too_many = Expression::parse(
        ExpressionKind::Expression,
        "Surcharge(1, 2, 3)",
        None,
        &parse_ctx,
    )
    .unwrap();
    assert!(matches!(
        too_many.eval(&mut EvalContext::default()),
        Err(EvalError::Arity { actual: 3, .. })
    ));
    assert!(Expression::parse(ExpressionKind::Expression, "NoSuchFn(1)", None, &parse_ctx).is_err());
}
