//! Parse tree of an Access expression.
//!
//! Nodes own their children; a parsed tree is immutable and shared between
//! evaluations. Function call nodes hold the resolved [`Function`], so
//! evaluation never looks names up again.

use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveTime, Timelike};

use crate::functions::Function;
use crate::types::{temporal, Value};

/// A reference to a column, control or other named object:
/// `[collection].[object].[property]`, with `!` also accepted as separator.
/// A single name is the object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    collection: Option<String>,
    object: String,
    property: Option<String>,
}

impl Identifier {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            collection: None,
            object: object.into(),
            property: None,
        }
    }

    pub fn qualified(
        collection: Option<String>,
        object: impl Into<String>,
        property: Option<String>,
    ) -> Self {
        Self {
            collection,
            object: object.into(),
            property,
        }
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    /// Case-insensitive match on all parts.
    pub fn matches(&self, other: &Identifier) -> bool {
        fn eq(a: Option<&str>, b: Option<&str>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                (None, None) => true,
                _ => false,
            }
        }
        self.object.eq_ignore_ascii_case(&other.object)
            && eq(self.collection(), other.collection())
            && eq(self.property(), other.property())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(c) = &self.collection {
            write!(f, "[{}].", c)?;
        }
        write!(f, "[{}]", self.object)?;
        if let Some(p) = &self.property {
            write!(f, ".[{}]", p)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "Not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Power,
    Multiply,
    Divide,
    IntDivide,
    Mod,
    Add,
    Subtract,
    Concat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Xor,
    Eqv,
    Imp,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Power => "^",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::IntDivide => "\\",
            BinaryOp::Mod => "Mod",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "And",
            BinaryOp::Or => "Or",
            BinaryOp::Xor => "Xor",
            BinaryOp::Eqv => "Eqv",
            BinaryOp::Imp => "Imp",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(
            self,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Eqv | BinaryOp::Imp
        )
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Literal(Value),
    Identifier(Identifier),
    /// The value being validated, the implicit left side of a field
    /// validation rule such as `>= 5`.
    ThisValue,
    Paren(Box<Node>),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    IsNull {
        operand: Box<Node>,
        negated: bool,
    },
    Like {
        operand: Box<Node>,
        pattern: Box<Node>,
        negated: bool,
    },
    Between {
        operand: Box<Node>,
        low: Box<Node>,
        high: Box<Node>,
        negated: bool,
    },
    In {
        operand: Box<Node>,
        list: Vec<Node>,
        negated: bool,
    },
    Call {
        function: Arc<Function>,
        args: Vec<Node>,
    },
}

impl Node {
    /// Whether evaluating the node always yields a boolean (or Null).
    pub fn is_conditional(&self) -> bool {
        match self {
            Node::Paren(inner) => inner.is_conditional(),
            Node::Unary { op, .. } => *op == UnaryOp::Not,
            Node::Binary { op, .. } => op.is_comparison() || op.is_logical(),
            Node::IsNull { .. } | Node::Like { .. } | Node::Between { .. } | Node::In { .. } => {
                true
            }
            _ => false,
        }
    }

    pub fn is_constant(&self) -> bool {
        match self {
            Node::Literal(_) => true,
            Node::Identifier(_) | Node::ThisValue => false,
            Node::Paren(inner) => inner.is_constant(),
            Node::Unary { operand, .. } | Node::IsNull { operand, .. } => operand.is_constant(),
            Node::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Node::Like {
                operand, pattern, ..
            } => operand.is_constant() && pattern.is_constant(),
            Node::Between {
                operand, low, high, ..
            } => operand.is_constant() && low.is_constant() && high.is_constant(),
            Node::In { operand, list, .. } => {
                operand.is_constant() && list.iter().all(Node::is_constant)
            }
            Node::Call { function, args } => {
                function.is_pure() && args.iter().all(Node::is_constant)
            }
        }
    }

    /// Visits every node, parents before children.
    pub fn walk<'n>(&'n self, visit: &mut impl FnMut(&'n Node)) {
        visit(self);
        match self {
            Node::Literal(_) | Node::Identifier(_) | Node::ThisValue => {}
            Node::Paren(inner) => inner.walk(visit),
            Node::Unary { operand, .. } | Node::IsNull { operand, .. } => operand.walk(visit),
            Node::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Node::Like {
                operand, pattern, ..
            } => {
                operand.walk(visit);
                pattern.walk(visit);
            }
            Node::Between {
                operand, low, high, ..
            } => {
                operand.walk(visit);
                low.walk(visit);
                high.walk(visit);
            }
            Node::In { operand, list, .. } => {
                operand.walk(visit);
                for item in list {
                    item.walk(visit);
                }
            }
            Node::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }

    /// Normalized expression text.
    pub fn render(&self, out: &mut String) {
        match self {
            Node::Literal(v) => render_literal(v, out),
            Node::Identifier(id) => out.push_str(&id.to_string()),
            Node::ThisValue => {}
            Node::Paren(inner) => {
                out.push('(');
                inner.render(out);
                out.push(')');
            }
            Node::Unary { op, operand } => {
                out.push_str(op.symbol());
                if *op == UnaryOp::Not {
                    out.push(' ');
                }
                operand.render(out);
            }
            Node::Binary { op, left, right } => {
                render_left(left, out);
                out.push_str(op.symbol());
                out.push(' ');
                right.render(out);
            }
            Node::IsNull { operand, negated } => {
                render_left(operand, out);
                out.push_str(if *negated { "Is Not Null" } else { "Is Null" });
            }
            Node::Like {
                operand,
                pattern,
                negated,
            } => {
                render_left(operand, out);
                out.push_str(if *negated { "Not Like " } else { "Like " });
                pattern.render(out);
            }
            Node::Between {
                operand,
                low,
                high,
                negated,
            } => {
                render_left(operand, out);
                out.push_str(if *negated { "Not Between " } else { "Between " });
                low.render(out);
                out.push_str(" And ");
                high.render(out);
            }
            Node::In {
                operand,
                list,
                negated,
            } => {
                render_left(operand, out);
                out.push_str(if *negated { "Not In (" } else { "In (" });
                render_list(list, out, |n, out| n.render(out));
                out.push(')');
            }
            Node::Call { function, args } => {
                out.push_str(function.name());
                out.push('(');
                render_list(args, out, |n, out| n.render(out));
                out.push(')');
            }
        }
    }

    /// Tree rendering with node kinds, for diagnostics.
    pub fn render_debug(&self, out: &mut String) {
        match self {
            Node::Literal(v) => {
                out.push_str("<Literal>{");
                render_literal(v, out);
                out.push('}');
            }
            Node::Identifier(id) => {
                out.push_str("<Identifier>{");
                out.push_str(&id.to_string());
                out.push('}');
            }
            Node::ThisValue => out.push_str("<ThisValue>{}"),
            Node::Paren(inner) => {
                out.push_str("<Paren>{(");
                inner.render_debug(out);
                out.push_str(")}");
            }
            Node::Unary { op, operand } => {
                out.push_str("<Unary>{");
                out.push_str(op.symbol());
                out.push(' ');
                operand.render_debug(out);
                out.push('}');
            }
            Node::Binary { op, left, right } => {
                out.push_str(if op.is_logical() {
                    "<Logical>{"
                } else if op.is_comparison() {
                    "<Compare>{"
                } else {
                    "<Binary>{"
                });
                left.render_debug(out);
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                right.render_debug(out);
                out.push('}');
            }
            Node::IsNull { operand, negated } => {
                out.push_str("<IsNull>{");
                operand.render_debug(out);
                out.push_str(if *negated { " Is Not Null}" } else { " Is Null}" });
            }
            Node::Like {
                operand,
                pattern,
                negated,
            } => {
                out.push_str("<Like>{");
                operand.render_debug(out);
                out.push_str(if *negated { " Not Like " } else { " Like " });
                pattern.render_debug(out);
                out.push('}');
            }
            Node::Between {
                operand,
                low,
                high,
                negated,
            } => {
                out.push_str("<Between>{");
                operand.render_debug(out);
                out.push_str(if *negated { " Not Between " } else { " Between " });
                low.render_debug(out);
                out.push_str(" And ");
                high.render_debug(out);
                out.push('}');
            }
            Node::In {
                operand,
                list,
                negated,
            } => {
                out.push_str("<In>{");
                operand.render_debug(out);
                out.push_str(if *negated { " Not In (" } else { " In (" });
                render_list(list, out, |n, out| n.render_debug(out));
                out.push_str(")}");
            }
            Node::Call { function, args } => {
                out.push_str("<Call>{");
                out.push_str(function.name());
                out.push('(');
                render_list(args, out, |n, out| n.render_debug(out));
                out.push_str(")}");
            }
        }
    }
}

fn render_left(left: &Node, out: &mut String) {
    if !matches!(left, Node::ThisValue) {
        left.render(out);
        out.push(' ');
    }
}

fn render_list(nodes: &[Node], out: &mut String, each: impl Fn(&Node, &mut String)) {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        each(node, out);
    }
}

pub(crate) fn render_literal(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("Null"),
        Value::String(s) => {
            out.push('"');
            out.push_str(&s.replace('"', "\"\""));
            out.push('"');
        }
        Value::Long(l) => out.push_str(&l.to_string()),
        Value::Double(d) => out.push_str(&format_literal_double(*d)),
        Value::BigDecimal(d) => out.push_str(&d.normalize().to_string()),
        Value::Date(d) => out.push_str(&format!("#{}/{}/{}#", d.month(), d.day(), d.year())),
        Value::Time(t) => out.push_str(&format!("#{}#", format_literal_time(*t))),
        Value::DateTime(dt) => out.push_str(&format!(
            "#{}/{}/{} {}#",
            dt.month(),
            dt.day(),
            dt.year(),
            format_literal_time(dt.time())
        )),
    }
}

fn format_literal_double(d: f64) -> String {
    let text = format!("{}", d);
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{}.0", text)
    }
}

fn format_literal_time(t: NaiveTime) -> String {
    format!("{}:{:02}:{:02}", t.hour(), t.minute(), t.second())
}

/// Date literal value: a date, a time, or both.
pub(crate) fn temporal_literal(parsed: temporal::ParsedTemporal) -> Value {
    match (parsed.date, parsed.time) {
        (Some(d), Some(t)) => Value::DateTime(d.and_time(t)),
        (Some(d), None) => Value::Date(d),
        (None, Some(t)) => Value::Time(t),
        (None, None) => Value::Null,
    }
}
