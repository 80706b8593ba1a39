//! # Expression Lexer
//!
//! Tokenizes Access expression text without allocating: identifiers, string
//! bodies and date literal bodies are slices of the input.
//!
//! ## Token Categories
//!
//! - **Keywords**: `And Or Not Xor Eqv Imp Mod Like Is Null True False
//!   Between In`, matched case-insensitively through a phf map
//! - **Identifiers**: bare (`Field1`, `Left$`) or bracketed (`[Unit Price]`)
//! - **Literals**: strings (`"a ""b"""` or `'a'`), dates (`#1/2/2024#`),
//!   numbers (`42`, `1.5`, `2E3`), radix integers (`&HFF`, `&O17`)
//! - **Operators**: `^ - * / \ + & = <> < > <= >=` and the separators
//!   `( ) , . !`
//!
//! `&` is the concatenation operator unless it is immediately followed by
//! `H` or `O` and a run of digits valid in that radix, in which case the
//! whole run is a radix literal.

use phf::phf_map;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    And,
    Or,
    Not,
    Xor,
    Eqv,
    Imp,
    Mod,
    Like,
    Is,
    Null,
    True,
    False,
    Between,
    In,
}

static KEYWORDS: phf::Map<&'static str, Keyword> = phf_map! {
    "AND" => Keyword::And,
    "OR" => Keyword::Or,
    "NOT" => Keyword::Not,
    "XOR" => Keyword::Xor,
    "EQV" => Keyword::Eqv,
    "IMP" => Keyword::Imp,
    "MOD" => Keyword::Mod,
    "LIKE" => Keyword::Like,
    "IS" => Keyword::Is,
    "NULL" => Keyword::Null,
    "TRUE" => Keyword::True,
    "FALSE" => Keyword::False,
    "BETWEEN" => Keyword::Between,
    "IN" => Keyword::In,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'a> {
    Keyword(Keyword),
    Ident(&'a str),
    QuotedIdent(&'a str),
    /// String body with the doubled quotes still in place.
    String { raw: &'a str, quote: u8 },
    Date(&'a str),
    Integer(&'a str),
    Float(&'a str),
    Radix { digits: &'a str, radix: u32 },
    Plus,
    Minus,
    Star,
    Slash,
    Backslash,
    Caret,
    Ampersand,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    Comma,
    Dot,
    Bang,
    Error(&'static str),
    Eof,
}

#[derive(Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    token_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            token_start: 0,
        }
    }

    /// Byte offset where the last returned token starts.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    pub fn next_token(&mut self) -> Token<'a> {
        self.skip_whitespace();
        self.token_start = self.pos;

        if self.is_eof() {
            return Token::Eof;
        }

        let ch = self.current();

        if ch.is_ascii_alphabetic() || ch == b'_' {
            return self.scan_identifier_or_keyword();
        }

        if ch.is_ascii_digit() || (ch == b'.' && self.peek_char().is_some_and(|c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        match ch {
            b'"' | b'\'' => self.scan_string(ch),
            b'#' => self.scan_date(),
            b'[' => self.scan_bracket_identifier(),
            b'&' => self.scan_ampersand(),
            b'<' => {
                self.advance();
                match self.peek_current() {
                    Some(b'>') => {
                        self.advance();
                        Token::NotEq
                    }
                    Some(b'=') => {
                        self.advance();
                        Token::LtEq
                    }
                    _ => Token::Lt,
                }
            }
            b'>' => {
                self.advance();
                if self.peek_current() == Some(b'=') {
                    self.advance();
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            _ => {
                self.advance();
                match ch {
                    b'+' => Token::Plus,
                    b'-' => Token::Minus,
                    b'*' => Token::Star,
                    b'/' => Token::Slash,
                    b'\\' => Token::Backslash,
                    b'^' => Token::Caret,
                    b'=' => Token::Eq,
                    b'(' => Token::LParen,
                    b')' => Token::RParen,
                    b',' => Token::Comma,
                    b'.' => Token::Dot,
                    b'!' => Token::Bang,
                    _ => Token::Error("unexpected character"),
                }
            }
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn current(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn peek_current(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_char(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current().is_ascii_whitespace() {
            self.advance();
        }
    }

    fn scan_identifier_or_keyword(&mut self) -> Token<'a> {
        let start = self.pos;

        while !self.is_eof() && (self.current().is_ascii_alphanumeric() || self.current() == b'_') {
            self.advance();
        }
        if !self.is_eof() && self.current() == b'$' {
            self.advance();
        }

        let ident = &self.input[start..self.pos];
        let upper = ident.to_ascii_uppercase();

        if let Some(&keyword) = KEYWORDS.get(upper.as_str()) {
            Token::Keyword(keyword)
        } else {
            Token::Ident(ident)
        }
    }

    fn scan_number(&mut self) -> Token<'a> {
        let start = self.pos;
        let mut is_float = false;

        while !self.is_eof() && self.current().is_ascii_digit() {
            self.advance();
        }

        if !self.is_eof() && self.current() == b'.' {
            is_float = true;
            self.advance();
            while !self.is_eof() && self.current().is_ascii_digit() {
                self.advance();
            }
        }

        if !self.is_eof() && (self.current() == b'e' || self.current() == b'E') {
            let mark = self.pos;
            self.advance();
            if !self.is_eof() && (self.current() == b'+' || self.current() == b'-') {
                self.advance();
            }
            if self.is_eof() || !self.current().is_ascii_digit() {
                self.pos = mark;
            } else {
                is_float = true;
                while !self.is_eof() && self.current().is_ascii_digit() {
                    self.advance();
                }
            }
        }

        if !self.is_eof() && (self.current().is_ascii_alphabetic() || self.current() == b'_') {
            return Token::Error("invalid numeric literal");
        }

        let num_str = &self.input[start..self.pos];
        if is_float {
            Token::Float(num_str)
        } else {
            Token::Integer(num_str)
        }
    }

    fn scan_string(&mut self, quote: u8) -> Token<'a> {
        self.advance();
        let start = self.pos;

        loop {
            if self.is_eof() {
                return Token::Error("unterminated string");
            }

            if self.current() == quote {
                if self.peek_char() == Some(quote) {
                    self.advance();
                    self.advance();
                } else {
                    let end = self.pos;
                    self.advance();
                    return Token::String {
                        raw: &self.input[start..end],
                        quote,
                    };
                }
            } else {
                self.advance();
            }
        }
    }

    fn scan_date(&mut self) -> Token<'a> {
        self.advance();
        let start = self.pos;
        while !self.is_eof() && self.current() != b'#' {
            self.advance();
        }
        if self.is_eof() {
            return Token::Error("unterminated date literal");
        }
        let body = &self.input[start..self.pos];
        self.advance();
        Token::Date(body)
    }

    fn scan_bracket_identifier(&mut self) -> Token<'a> {
        self.advance();
        let start = self.pos;
        while !self.is_eof() && self.current() != b']' {
            if self.current() == b'[' {
                return Token::Error("nested '[' in identifier");
            }
            self.advance();
        }
        if self.is_eof() {
            return Token::Error("unterminated identifier");
        }
        let name = &self.input[start..self.pos];
        self.advance();
        if name.trim().is_empty() {
            return Token::Error("empty identifier");
        }
        Token::QuotedIdent(name)
    }

    fn scan_ampersand(&mut self) -> Token<'a> {
        self.advance();
        let radix = match self.peek_current() {
            Some(b'h' | b'H') => 16,
            Some(b'o' | b'O') => 8,
            _ => return Token::Ampersand,
        };

        let digits_start = self.pos + 1;
        let mut end = digits_start;
        while end < self.bytes.len() && self.bytes[end].is_ascii_alphanumeric() {
            end += 1;
        }
        let digits = &self.input[digits_start..end];
        let valid = !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix));
        if !valid {
            return Token::Ampersand;
        }
        self.pos = end;
        Token::Radix { digits, radix }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            if token == Token::Eof {
                break;
            }
            out.push(token);
        }
        out
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            tokens("a aNd b mod c"),
            vec![
                Token::Ident("a"),
                Token::Keyword(Keyword::And),
                Token::Ident("b"),
                Token::Keyword(Keyword::Mod),
                Token::Ident("c"),
            ]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            tokens(r#""say ""hi""" 'x' #1/2/2024# 12 1.5 .5 2E3"#),
            vec![
                Token::String {
                    raw: r#"say ""hi"""#,
                    quote: b'"'
                },
                Token::String {
                    raw: "x",
                    quote: b'\''
                },
                Token::Date("1/2/2024"),
                Token::Integer("12"),
                Token::Float("1.5"),
                Token::Float(".5"),
                Token::Float("2E3"),
            ]
        );
    }

    #[test]
    fn ampersand_is_radix_or_concat() {
        assert_eq!(
            tokens("&HFF & &o17"),
            vec![
                Token::Radix {
                    digits: "FF",
                    radix: 16
                },
                Token::Ampersand,
                Token::Radix {
                    digits: "17",
                    radix: 8
                },
            ]
        );
        assert_eq!(
            tokens("a &Hello"),
            vec![Token::Ident("a"), Token::Ampersand, Token::Ident("Hello")]
        );
    }

    #[test]
    fn identifiers_and_operators() {
        assert_eq!(
            tokens("[Unit Price]*Left$(x,2)<>Forms!f.c"),
            vec![
                Token::QuotedIdent("Unit Price"),
                Token::Star,
                Token::Ident("Left$"),
                Token::LParen,
                Token::Ident("x"),
                Token::Comma,
                Token::Integer("2"),
                Token::RParen,
                Token::NotEq,
                Token::Ident("Forms"),
                Token::Bang,
                Token::Ident("f"),
                Token::Dot,
                Token::Ident("c"),
            ]
        );
    }

    #[test]
    fn errors_are_tokens() {
        assert!(matches!(tokens("\"open")[0], Token::Error(_)));
        assert!(matches!(tokens("#1/2")[0], Token::Error(_)));
        assert!(matches!(tokens("[a")[0], Token::Error(_)));
        assert!(matches!(tokens("12abc")[0], Token::Error(_)));
    }
}
