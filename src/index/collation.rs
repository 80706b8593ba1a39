//! General sort order for text index keys.
//!
//! A text key is two runs of codes. The primary run holds one weight per
//! character, case collapsed and with accents folded into the base letter,
//! so "Ärger" sorts among the A's. The accent run holds one weight per
//! character and breaks ties between strings with equal primary runs:
//! "resume" sorts before "résumé", and both before "resumes".
//!
//! ```text
//! primary codes | END_TEXT | accent codes (trailing plain ones trimmed) | END_TEXT
//! ```

use smallvec::SmallVec;

use crate::config::{
    END_TEXT, MAX_TEXT_INDEX_CHARS, TEXT_CONTROL_WEIGHT, TEXT_DIGIT_BASE, TEXT_LETTER_BASE,
    TEXT_NO_ACCENT, TEXT_SYMBOL_BASE, TEXT_WIDE_BASE,
};

/// Printable ASCII that is neither digit nor letter, in sort order.
const SYMBOLS: &[u8] = b" !\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~\x7f";

/// Base letters of U+0100..=U+017F (Latin Extended-A) after upper-casing.
/// `*` marks ligatures, handled separately.
const LATIN_EXTENDED_A: &[u8; 128] = b"AAAAAACCCCCCCCDDDDEEEEEEEEEEGGGGGGGGHHHHIIIIIIIIII**JJKKKLLLLLLLLLLNNNNNNNNN\
OOOOOO**RRRRRRSSSSSSSSTTTTTTUUUUUUUUUUUUWWYYYZZZZZZS";

/// Folded form of one character: primary letters and the accent weight
/// shared by all of them.
enum Folded {
    Ascii(u8),
    Letters(&'static [u8], u8),
    Wide(u32),
}

/// Appends the General sort order key of `text`.
pub fn encode_text(text: &str, out: &mut Vec<u8>) {
    let mut accents: SmallVec<[u8; 32]> = SmallVec::new();
    for c in text.chars().take(MAX_TEXT_INDEX_CHARS) {
        for upper in c.to_uppercase() {
            match fold(upper) {
                Folded::Ascii(b) => {
                    out.push(ascii_weight(b));
                    accents.push(TEXT_NO_ACCENT);
                }
                Folded::Letters(letters, accent) => {
                    for &l in letters {
                        out.push(ascii_weight(l));
                        accents.push(accent);
                    }
                }
                Folded::Wide(cp) => {
                    out.push(TEXT_WIDE_BASE + (cp >> 16) as u8);
                    out.push((cp >> 8) as u8);
                    out.push(cp as u8);
                    accents.push(TEXT_NO_ACCENT);
                }
            }
        }
    }
    out.push(END_TEXT);

    let used = accents
        .iter()
        .rposition(|&a| a != TEXT_NO_ACCENT)
        .map_or(0, |i| i + 1);
    out.extend_from_slice(&accents[..used]);
    out.push(END_TEXT);
}

fn ascii_weight(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => TEXT_DIGIT_BASE + (b - b'0'),
        b'A'..=b'Z' => TEXT_LETTER_BASE + (b - b'A'),
        b'a'..=b'z' => TEXT_LETTER_BASE + (b - b'a'),
        _ => match SYMBOLS.iter().position(|&s| s == b) {
            Some(i) => TEXT_SYMBOL_BASE + i as u8,
            None => TEXT_CONTROL_WEIGHT,
        },
    }
}

/// Accent weight of an accented Latin character. Variants of one base
/// letter are ordered by code point.
fn accent_of(cp: u32) -> u8 {
    TEXT_NO_ACCENT + 1 + (cp - 0xC0) as u8
}

fn fold(c: char) -> Folded {
    let cp = c as u32;
    if cp < 0x80 {
        return Folded::Ascii(cp as u8);
    }
    let letters: &'static [u8] = match cp {
        0xC0..=0xC5 => b"A",
        0xC6 => b"AE",
        0xC7 => b"C",
        0xC8..=0xCB => b"E",
        0xCC..=0xCF => b"I",
        0xD0 => b"D",
        0xD1 => b"N",
        0xD2..=0xD6 | 0xD8 => b"O",
        0xD9..=0xDC => b"U",
        0xDD => b"Y",
        0xDE => b"TH",
        0x132 | 0x133 => b"IJ",
        0x152 | 0x153 => b"OE",
        0x100..=0x17F => {
            let i = (cp - 0x100) as usize;
            &LATIN_EXTENDED_A[i..i + 1]
        }
        _ => return Folded::Wide(cp),
    };
    Folded::Letters(letters, accent_of(cp))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Vec<u8> {
        let mut out = Vec::new();
        encode_text(s, &mut out);
        out
    }

    #[test]
    fn accents_fold_into_base_letters() {
        assert!(key("Ärger") < key("Zebra"));
        assert!(key("éclair") < key("f"));
        assert!(key("Œuvre") < key("Ozone"));
        assert!(key("Straße") < key("Strasser"));
        assert_eq!(key("émile"), key("ÉMILE"));
    }

    #[test]
    fn accent_run_breaks_ties() {
        assert!(key("resume") < key("résumé"));
        assert!(key("résumé") < key("resumes"));
        assert_ne!(key("resume"), key("résumé"));
        assert_eq!(key("ab"), vec![TEXT_LETTER_BASE, TEXT_LETTER_BASE + 1, END_TEXT, END_TEXT]);
    }

    #[test]
    fn punctuation_before_digits_before_letters() {
        assert!(key("_x") < key("0"));
        assert!(key("~") < key("9"));
        assert!(key("9") < key("a"));
        assert!(key("z") < key("Ω"));
    }

    #[test]
    fn extended_table_maps_each_code_point() {
        assert_eq!(LATIN_EXTENDED_A[0x141 - 0x100], b'L');
        assert_eq!(LATIN_EXTENDED_A[0x160 - 0x100], b'S');
        assert_eq!(LATIN_EXTENDED_A[0x17D - 0x100], b'Z');
        assert_eq!(key("Łódź")[..4], key("lodz")[..4]);
    }
}
