//! # Expression Parser
//!
//! Pratt parser producing a [`Node`] tree. Function names are resolved
//! while parsing, so an unknown function is a parse error.
//!
//! ## Operator Precedence
//!
//! From tightest to loosest binding (all binary operators associate left):
//!
//! | Level | Operators                                          | Binding power |
//! |-------|----------------------------------------------------|---------------|
//! | 1     | `^`                                                | 28            |
//! | 2     | unary `-` `+`                                      | 26            |
//! | 3     | `*` `/`                                            | 24            |
//! | 4     | `\`                                                | 22            |
//! | 5     | `Mod`                                              | 20            |
//! | 6     | `+` `-`                                            | 18            |
//! | 7     | `&`                                                | 16            |
//! | 8     | `= <> < > <= >=`, `Like`, `Is`, `Between`, `In`    | 14            |
//! | 9     | `Not`                                              | 12            |
//! | 10    | `And`                                              | 10            |
//! | 11    | `Or`                                               | 8             |
//! | 12    | `Xor`                                              | 6             |
//! | 13    | `Eqv`                                              | 4             |
//! | 14    | `Imp`                                              | 2             |
//!
//! ## Field Validation Rules
//!
//! In a field validator a comparison may omit its left operand (`>= 5`,
//! `Between 1 And 9`, `Not Like "x*"`); the value being validated fills
//! it in. A validator that is not a condition at all (`"Y"`) is read as
//! `= "Y"`.

use std::sync::Arc;

use chrono::Datelike;

use super::ast::{temporal_literal, BinaryOp, Identifier, Node, UnaryOp};
use super::lexer::{Keyword, Lexer, Token};
use super::ExpressionKind;
use crate::config::{NumericConfig, TemporalConfig};
use crate::error::EvalError;
use crate::functions::{Function, FunctionLookup};
use crate::types::{parse_number, temporal, Value};

const COMPARISON_BP: u8 = 14;
const NOT_BP: u8 = 12;
const UNARY_BP: u8 = 26;
const MAX_IDENTIFIER_PARTS: usize = 3;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    input: &'a str,
    current: Token<'a>,
    current_start: usize,
    kind: ExpressionKind,
    functions: &'a dyn FunctionLookup,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, kind: ExpressionKind, functions: &'a dyn FunctionLookup) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        let current_start = lexer.token_start();
        Self {
            lexer,
            input,
            current,
            current_start,
            kind,
            functions,
        }
    }

    pub fn parse(mut self) -> Result<Node, EvalError> {
        if self.current == Token::Eof {
            return Err(self.error("empty expression"));
        }
        let node = self.parse_expr(0)?;
        if self.current != Token::Eof {
            return Err(self.error(format!("unexpected {}", describe(&self.current))));
        }

        if self.kind == ExpressionKind::FieldValidator && !node.is_conditional() {
            return Ok(Node::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Node::ThisValue),
                right: Box::new(node),
            });
        }
        Ok(node)
    }

    fn error(&self, message: impl Into<String>) -> EvalError {
        EvalError::Parse {
            position: self.current_start,
            message: message.into(),
            expr: self.input.to_string(),
        }
    }

    fn advance(&mut self) -> Token<'a> {
        let next = self.lexer.next_token();
        self.current_start = self.lexer.token_start();
        std::mem::replace(&mut self.current, next)
    }

    /// The token after the current one.
    fn peek_next(&self) -> Token<'a> {
        let mut lookahead = self.lexer.clone();
        lookahead.next_token()
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current, Token::Keyword(k) if k == keyword)
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), EvalError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {:?}, found {}",
                keyword,
                describe(&self.current)
            )))
        }
    }

    fn expect_token(&mut self, expected: Token<'static>) -> Result<(), EvalError> {
        if self.current == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                describe(&expected),
                describe(&self.current)
            )))
        }
    }

    /// `Not` followed by `Like`, `Between` or `In`.
    fn at_negated_postfix(&self) -> bool {
        self.check_keyword(Keyword::Not)
            && matches!(
                self.peek_next(),
                Token::Keyword(Keyword::Like | Keyword::Between | Keyword::In)
            )
    }

    fn at_comparison_start(&self) -> bool {
        matches!(
            self.current,
            Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::LtEq
                | Token::Gt
                | Token::GtEq
                | Token::Keyword(Keyword::Like | Keyword::Is | Keyword::Between | Keyword::In)
        ) || self.at_negated_postfix()
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Node, EvalError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let op = match self.current {
                Token::Caret => Some((BinaryOp::Power, 28, 29)),
                Token::Star => Some((BinaryOp::Multiply, 24, 25)),
                Token::Slash => Some((BinaryOp::Divide, 24, 25)),
                Token::Backslash => Some((BinaryOp::IntDivide, 22, 23)),
                Token::Keyword(Keyword::Mod) => Some((BinaryOp::Mod, 20, 21)),
                Token::Plus => Some((BinaryOp::Add, 18, 19)),
                Token::Minus => Some((BinaryOp::Subtract, 18, 19)),
                Token::Ampersand => Some((BinaryOp::Concat, 16, 17)),
                Token::Eq => Some((BinaryOp::Eq, 14, 15)),
                Token::NotEq => Some((BinaryOp::NotEq, 14, 15)),
                Token::Lt => Some((BinaryOp::Lt, 14, 15)),
                Token::LtEq => Some((BinaryOp::LtEq, 14, 15)),
                Token::Gt => Some((BinaryOp::Gt, 14, 15)),
                Token::GtEq => Some((BinaryOp::GtEq, 14, 15)),
                Token::Keyword(Keyword::And) => Some((BinaryOp::And, 10, 11)),
                Token::Keyword(Keyword::Or) => Some((BinaryOp::Or, 8, 9)),
                Token::Keyword(Keyword::Xor) => Some((BinaryOp::Xor, 6, 7)),
                Token::Keyword(Keyword::Eqv) => Some((BinaryOp::Eqv, 4, 5)),
                Token::Keyword(Keyword::Imp) => Some((BinaryOp::Imp, 2, 3)),
                _ => None,
            };

            if let Some((op, l_bp, r_bp)) = op {
                if l_bp < min_bp {
                    break;
                }
                self.advance();
                let rhs = self.parse_expr(r_bp)?;
                lhs = Node::Binary {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                };
                continue;
            }

            if self.check_keyword(Keyword::Is) {
                if COMPARISON_BP < min_bp {
                    break;
                }
                self.advance();
                let negated = self.consume_keyword(Keyword::Not);
                self.expect_keyword(Keyword::Null)?;
                lhs = Node::IsNull {
                    operand: Box::new(lhs),
                    negated,
                };
                continue;
            }

            let negated = self.at_negated_postfix();
            let postfix = match (negated, self.current) {
                (true, _) => Some(self.peek_next()),
                (false, Token::Keyword(Keyword::Like | Keyword::Between | Keyword::In)) => {
                    Some(self.current)
                }
                _ => None,
            };
            let Some(postfix) = postfix else {
                break;
            };
            if COMPARISON_BP < min_bp {
                break;
            }
            if negated {
                self.advance();
            }
            self.advance();

            lhs = match postfix {
                Token::Keyword(Keyword::Like) => {
                    let pattern = self.parse_expr(COMPARISON_BP + 1)?;
                    Node::Like {
                        operand: Box::new(lhs),
                        pattern: Box::new(pattern),
                        negated,
                    }
                }
                Token::Keyword(Keyword::Between) => {
                    let low = self.parse_expr(COMPARISON_BP + 1)?;
                    self.expect_keyword(Keyword::And)?;
                    let high = self.parse_expr(COMPARISON_BP + 1)?;
                    Node::Between {
                        operand: Box::new(lhs),
                        low: Box::new(low),
                        high: Box::new(high),
                        negated,
                    }
                }
                _ => {
                    self.expect_token(Token::LParen)?;
                    let list = self.parse_expr_list()?;
                    self.expect_token(Token::RParen)?;
                    if list.is_empty() {
                        return Err(self.error("empty In list"));
                    }
                    Node::In {
                        operand: Box::new(lhs),
                        list,
                        negated,
                    }
                }
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Node, EvalError> {
        if self.kind == ExpressionKind::FieldValidator && self.at_comparison_start() {
            return Ok(Node::ThisValue);
        }

        match self.current {
            Token::Minus | Token::Plus => {
                let op = if self.advance() == Token::Minus {
                    UnaryOp::Negate
                } else {
                    UnaryOp::Plus
                };
                let operand = self.parse_expr(UNARY_BP)?;
                Ok(Node::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            Token::Keyword(Keyword::Not) => {
                self.advance();
                let operand = self.parse_expr(NOT_BP)?;
                Ok(Node::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr(0)?;
                self.expect_token(Token::RParen)?;
                Ok(Node::Paren(Box::new(inner)))
            }
            Token::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Node::Literal(Value::Null))
            }
            Token::Keyword(Keyword::True) => {
                self.advance();
                Ok(Node::Literal(Value::TRUE))
            }
            Token::Keyword(Keyword::False) => {
                self.advance();
                Ok(Node::Literal(Value::FALSE))
            }
            Token::String { raw, quote } => {
                self.advance();
                let doubled = [quote as char, quote as char].iter().collect::<String>();
                Ok(Node::Literal(Value::String(
                    raw.replace(&doubled, &(quote as char).to_string()),
                )))
            }
            Token::Date(body) => {
                let value = self.date_literal(body)?;
                self.advance();
                Ok(Node::Literal(value))
            }
            Token::Integer(text) => {
                let value = match text.parse::<i32>() {
                    Ok(l) => Value::Long(l),
                    Err(_) => Value::Double(
                        text.parse::<f64>()
                            .map_err(|_| self.error("invalid number"))?,
                    ),
                };
                self.advance();
                Ok(Node::Literal(value))
            }
            Token::Float(text) => {
                let d = text
                    .parse::<f64>()
                    .ok()
                    .filter(|d| d.is_finite())
                    .ok_or_else(|| self.error("invalid number"))?;
                self.advance();
                Ok(Node::Literal(Value::Double(d)))
            }
            Token::Radix { digits, radix } => {
                let prefix = if radix == 16 { "&H" } else { "&O" };
                let value = parse_number(&format!("{}{}", prefix, digits), &NumericConfig::default())
                    .ok_or_else(|| self.error("radix literal out of range"))?;
                self.advance();
                Ok(Node::Literal(value))
            }
            Token::Ident(_) | Token::QuotedIdent(_) => self.parse_identifier_or_call(),
            Token::Error(message) => Err(self.error(message)),
            Token::Eof => Err(self.error("unexpected end of expression")),
            other => Err(self.error(format!("unexpected {}", describe(&other)))),
        }
    }

    fn parse_identifier_or_call(&mut self) -> Result<Node, EvalError> {
        if let Token::Ident(name) = self.current {
            if self.peek_next() == Token::LParen {
                let function = self.lookup(name)?;
                self.advance();
                self.advance();
                let args = if self.current == Token::RParen {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                self.expect_token(Token::RParen)?;
                return Ok(Node::Call { function, args });
            }
            if !matches!(self.peek_next(), Token::Dot | Token::Bang) {
                if let Some(function) = self.functions.get_function(name) {
                    if function.min_args() == 0 {
                        self.advance();
                        return Ok(Node::Call {
                            function,
                            args: Vec::new(),
                        });
                    }
                }
            }
        }

        let mut parts = vec![self.identifier_part()?];
        while matches!(self.current, Token::Dot | Token::Bang) {
            self.advance();
            parts.push(self.identifier_part()?);
            if parts.len() > MAX_IDENTIFIER_PARTS {
                return Err(self.error("identifier has too many parts"));
            }
        }

        let mut parts = parts.into_iter();
        let identifier = match (parts.next(), parts.next(), parts.next()) {
            (Some(object), None, None) => Identifier::new(object),
            (Some(collection), Some(object), None) => {
                Identifier::qualified(Some(collection), object, None)
            }
            (Some(collection), Some(object), Some(property)) => {
                Identifier::qualified(Some(collection), object, Some(property))
            }
            _ => return Err(self.error("invalid identifier")),
        };
        Ok(Node::Identifier(identifier))
    }

    fn identifier_part(&mut self) -> Result<String, EvalError> {
        match self.current {
            Token::Ident(name) | Token::QuotedIdent(name) => {
                self.advance();
                Ok(name.to_string())
            }
            other => Err(self.error(format!(
                "expected identifier, found {}",
                describe(&other)
            ))),
        }
    }

    fn lookup(&self, name: &str) -> Result<Arc<Function>, EvalError> {
        self.functions
            .get_function(name)
            .ok_or_else(|| self.error(format!("unknown function '{}'", name)))
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Node>, EvalError> {
        let mut items = vec![self.parse_expr(0)?];
        while self.current == Token::Comma {
            self.advance();
            items.push(self.parse_expr(0)?);
        }
        Ok(items)
    }

    /// Date literals are read in US month/day order whatever the locale.
    fn date_literal(&self, body: &str) -> Result<Value, EvalError> {
        let year = chrono::Local::now().year();
        temporal::parse_date_time(body, &TemporalConfig::default(), year)
            .map(temporal_literal)
            .ok_or_else(|| self.error(format!("invalid date literal #{}#", body)))
    }
}

fn describe(token: &Token<'_>) -> String {
    match token {
        Token::Keyword(k) => format!("keyword {:?}", k),
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::QuotedIdent(s) => format!("identifier [{}]", s),
        Token::String { .. } => "string literal".to_string(),
        Token::Date(_) => "date literal".to_string(),
        Token::Integer(s) | Token::Float(s) => format!("number {}", s),
        Token::Radix { digits, .. } => format!("number &{}", digits),
        Token::Error(message) => message.to_string(),
        Token::Eof => "end of expression".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::Backslash => "'\\'".to_string(),
        Token::Caret => "'^'".to_string(),
        Token::Ampersand => "'&'".to_string(),
        Token::Eq => "'='".to_string(),
        Token::NotEq => "'<>'".to_string(),
        Token::Lt => "'<'".to_string(),
        Token::LtEq => "'<='".to_string(),
        Token::Gt => "'>'".to_string(),
        Token::GtEq => "'>='".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::Bang => "'!'".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;

    fn parse(kind: ExpressionKind, text: &str) -> Result<Node, EvalError> {
        let registry = FunctionRegistry::builtin();
        Parser::new(text, kind, &registry).parse()
    }

    fn render(kind: ExpressionKind, text: &str) -> String {
        let mut out = String::new();
        parse(kind, text).unwrap().render_debug(&mut out);
        out
    }

    #[test]
    fn precedence_follows_access() {
        assert_eq!(
            render(ExpressionKind::Expression, "1 + 2 * 3"),
            "<Binary>{<Literal>{1} + <Binary>{<Literal>{2} * <Literal>{3}}}"
        );
        assert_eq!(
            render(ExpressionKind::Expression, "-2 ^ 2"),
            "<Unary>{- <Binary>{<Literal>{2} ^ <Literal>{2}}}"
        );
        assert_eq!(
            render(ExpressionKind::Expression, "Not a = b And c"),
            "<Logical>{<Unary>{Not <Compare>{<Identifier>{[a]} = <Identifier>{[b]}}} And <Identifier>{[c]}}"
        );
        assert_eq!(
            render(ExpressionKind::Expression, "7 \\ 2 Mod 3"),
            "<Binary>{<Binary>{<Literal>{7} \\ <Literal>{2}} Mod <Literal>{3}}"
        );
    }

    #[test]
    fn postfix_forms() {
        assert_eq!(
            render(ExpressionKind::Expression, "x Not Between 1 And 5 Or y Is Not Null"),
            "<Logical>{<Between>{<Identifier>{[x]} Not Between <Literal>{1} And <Literal>{5}} Or <IsNull>{<Identifier>{[y]} Is Not Null}}"
        );
        assert_eq!(
            render(ExpressionKind::Expression, "x In (1, \"a\")"),
            "<In>{<Identifier>{[x]} In (<Literal>{1}, <Literal>{\"a\"})}"
        );
    }

    #[test]
    fn field_validator_fills_in_this_value() {
        assert_eq!(
            render(ExpressionKind::FieldValidator, ">= 5 And < 10"),
            "<Logical>{<Compare>{<ThisValue>{} >= <Literal>{5}} And <Compare>{<ThisValue>{} < <Literal>{10}}}"
        );
        assert_eq!(
            render(ExpressionKind::FieldValidator, "\"Y\""),
            "<Compare>{<ThisValue>{} = <Literal>{\"Y\"}}"
        );
        assert_eq!(
            render(ExpressionKind::FieldValidator, "Not Like \"x*\""),
            "<Like>{<ThisValue>{} Not Like <Literal>{\"x*\"}}"
        );
        assert!(parse(ExpressionKind::RecordValidator, ">= 5").is_err());
    }

    #[test]
    fn identifiers_and_calls() {
        assert_eq!(
            render(ExpressionKind::Expression, "Forms!Orders![Unit Price] * Left$([s], 2)"),
            "<Binary>{<Identifier>{[Forms].[Orders].[Unit Price]} * <Call>{Left$(<Identifier>{[s]}, <Literal>{2})}}"
        );
        assert_eq!(
            render(ExpressionKind::DefaultValue, "Date"),
            "<Call>{Date()}"
        );
        assert_eq!(
            render(ExpressionKind::DefaultValue, "[Date]"),
            "<Identifier>{[Date]}"
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            render(ExpressionKind::Expression, "&HFFFF + 3000000000 + #1/2/2024#"),
            "<Binary>{<Binary>{<Literal>{-1} + <Literal>{3000000000.0}} + <Literal>{#1/2/2024#}}"
        );
        assert_eq!(
            render(ExpressionKind::Expression, "'it''s'"),
            "<Literal>{\"it's\"}"
        );
    }

    #[test]
    fn parse_errors_carry_position() {
        match parse(ExpressionKind::Expression, "1 + ") {
            Err(EvalError::Parse { position, .. }) => assert_eq!(position, 4),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(matches!(
            parse(ExpressionKind::Expression, "NoSuchFn(1)"),
            Err(EvalError::Parse { .. })
        ));
        assert!(parse(ExpressionKind::Expression, "(1 + 2").is_err());
        assert!(parse(ExpressionKind::Expression, "1 2").is_err());
        assert!(parse(ExpressionKind::Expression, "").is_err());
        assert!(parse(ExpressionKind::Expression, "#13/45/2024#").is_err());
    }
}
