//! `Like` pattern matching.
//!
//! | Pattern   | Matches                                  |
//! |-----------|------------------------------------------|
//! | `*`       | any run of characters, including none    |
//! | `?`       | any single character                     |
//! | `#`       | any single digit                         |
//! | `[abc]`   | one character from the set               |
//! | `[a-z]`   | one character from the range             |
//! | `[!abc]`  | one character not in the set             |
//!
//! `[*]`, `[?]` and `[#]` match the literal character. Matching ignores
//! case. An unterminated `[` is a pattern error.

use smallvec::SmallVec;

use crate::error::EvalError;

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Literal(char),
    AnyChar,
    Digit,
    AnyRun,
    Class {
        negated: bool,
        ranges: SmallVec<[(char, char); 4]>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LikePattern {
    pieces: Vec<Piece>,
}

impl LikePattern {
    pub fn compile(pattern: &str) -> Result<Self, EvalError> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut pieces = Vec::with_capacity(chars.len());
        let mut i = 0;

        while i < chars.len() {
            let piece = match chars[i] {
                '*' => {
                    if pieces.last() == Some(&Piece::AnyRun) {
                        i += 1;
                        continue;
                    }
                    Piece::AnyRun
                }
                '?' => Piece::AnyChar,
                '#' => Piece::Digit,
                '[' => {
                    let close = chars[i + 1..]
                        .iter()
                        .position(|&c| c == ']')
                        .map(|p| p + i + 1)
                        .ok_or_else(|| {
                            EvalError::invalid(format!("invalid Like pattern '{}'", pattern))
                        })?;
                    let piece = class(&chars[i + 1..close]);
                    i = close + 1;
                    pieces.push(piece);
                    continue;
                }
                c => Piece::Literal(fold_char(c)),
            };
            pieces.push(piece);
            i += 1;
        }

        Ok(Self { pieces })
    }

    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().map(fold_char).collect();
        match_from(&self.pieces, &text)
    }
}

fn class(body: &[char]) -> Piece {
    let (negated, body) = match body.first() {
        Some('!') if body.len() > 1 => (true, &body[1..]),
        _ => (false, body),
    };
    let mut ranges = SmallVec::new();
    let mut i = 0;
    while i < body.len() {
        let lo = fold_char(body[i]);
        if i + 2 < body.len() && body[i + 1] == '-' {
            let hi = fold_char(body[i + 2]);
            ranges.push(if lo <= hi { (lo, hi) } else { (hi, lo) });
            i += 3;
        } else {
            ranges.push((lo, lo));
            i += 1;
        }
    }
    Piece::Class { negated, ranges }
}

pub(crate) fn fold_char(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

/// Backtracks only at `*`, remembering the last star position.
fn match_from(pieces: &[Piece], text: &[char]) -> bool {
    let mut p = 0;
    let mut t = 0;
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pieces.len() {
            match &pieces[p] {
                Piece::AnyRun => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                piece if single(piece, text[t]) => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
        }
        match star {
            Some((sp, st)) => {
                p = sp + 1;
                t = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    pieces[p..].iter().all(|piece| *piece == Piece::AnyRun)
}

fn single(piece: &Piece, c: char) -> bool {
    match piece {
        Piece::Literal(l) => *l == c,
        Piece::AnyChar => true,
        Piece::Digit => c.is_ascii_digit(),
        Piece::Class { negated, ranges } => {
            let hit = ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
            hit != *negated
        }
        Piece::AnyRun => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn like(text: &str, pattern: &str) -> bool {
        LikePattern::compile(pattern).unwrap().matches(text)
    }

    #[test]
    fn wildcards() {
        assert!(like("Smith", "S*"));
        assert!(like("smith", "S*H"));
        assert!(like("abc", "a?c"));
        assert!(!like("abbc", "a?c"));
        assert!(like("a1b", "a#b"));
        assert!(!like("aXb", "a#b"));
        assert!(like("", "*"));
        assert!(like("aXXbYYc", "a*b*c"));
        assert!(!like("aXXbYY", "a*b*c"));
    }

    #[test]
    fn character_classes() {
        assert!(like("b", "[a-c]"));
        assert!(!like("d", "[a-c]"));
        assert!(like("d", "[!a-c]"));
        assert!(like("a*", "a[*]"));
        assert!(!like("ab", "a[*]"));
        assert!(like("F", "[def]"));
    }

    #[test]
    fn unterminated_class_is_an_error() {
        assert!(LikePattern::compile("[abc").is_err());
    }
}
