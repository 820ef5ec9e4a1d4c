use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Single-byte tokens the in-place tokenizer substitutes for keyword and
/// operator text. Order and numeric values follow the reference
/// interpreter's `KEYWORDS_INSTANTIATE` table exactly, starting at `0x80` so
/// that ordinary line text (ASCII, always `< 0x80` once string literals are
/// excluded) can never collide with a token byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Keyword {
    End = 0x80,
    For,
    Next,
    Data,
    Input,
    Dim,
    Read,
    Let,
    Goto,
    Run,
    If,
    Restore,
    Gosub,
    Return,
    Rem,
    Stop,
    Print,
    List,
    Clear,
    New,
    Tab,
    To,
    Then,
    Step,
    Plus,
    Minus,
    Multiply,
    Divide,
    Greater,
    Equals,
    Less,
    Sgn,
    Int,
    Abs,
    Usr,
    Sqr,
    Rnd,
    Sin,
}

pub const RANGE_BEGIN: u8 = Keyword::End as u8;
pub const RANGE_END: u8 = Keyword::Sin as u8;
pub const RANGE_BEGIN_GENERAL: u8 = Keyword::End as u8;
pub const RANGE_END_GENERAL: u8 = Keyword::New as u8;
pub const RANGE_BEGIN_SUPPLEMENTARY: u8 = Keyword::Tab as u8;
pub const RANGE_END_SUPPLEMENTARY: u8 = Keyword::Step as u8;
pub const RANGE_BEGIN_OPERATORS: u8 = Keyword::Plus as u8;
pub const RANGE_END_OPERATORS: u8 = Keyword::Divide as u8;
pub const RANGE_BEGIN_COMPARISON_OPERATORS: u8 = Keyword::Greater as u8;
pub const RANGE_END_COMPARISON_OPERATORS: u8 = Keyword::Less as u8;
pub const RANGE_BEGIN_FUNCTIONS: u8 = Keyword::Sgn as u8;
pub const RANGE_END_FUNCTIONS: u8 = Keyword::Sin as u8;

/// Text table used both by the tokenizer (longest/first match wins, scanned
/// in this order) and by `LIST` to de-tokenize a stored line. Index `i`
/// corresponds to token byte `RANGE_BEGIN + i`.
pub const KEYWORD_TEXT: &[&str] = &[
    "END", "FOR", "NEXT", "DATA", "INPUT", "DIM", "READ", "LET", "GOTO", "RUN", "IF", "RESTORE",
    "GOSUB", "RETURN", "REM", "STOP", "PRINT", "LIST", "CLEAR", "NEW", "TAB(", "TO", "THEN",
    "STEP", "+", "-", "*", "/", ">", "=", "<", "SGN", "INT", "ABS", "USR", "SQR", "RND", "SIN",
];

pub fn keyword_text(token: u8) -> Option<&'static str> {
    if token < RANGE_BEGIN || token > RANGE_END {
        return None;
    }
    KEYWORD_TEXT.get((token - RANGE_BEGIN) as usize).copied()
}

pub fn keyword_from_byte(token: u8) -> Option<Keyword> {
    Keyword::from_u8(token)
}

/// In-place tokenizer: string literals are copied verbatim, keyword/operator
/// text is replaced by its single-byte token, and everything after a `REM`
/// token is copied verbatim without further tokenization (matching the
/// reference tokenizer's own `REM` special case). Returns raw bytes rather
/// than a `String`: token bytes (`>= 0x80`) are not valid standalone UTF-8,
/// so the tokenized line is never a text string, just bytes with the same
/// byte-vs-text split the `Arena` already makes.
pub fn tokenize_line(line: &str) -> Vec<u8> {
    let bytes = line.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'"' {
            out.push(c);
            i += 1;
            while i < bytes.len() {
                let c = bytes[i];
                out.push(c);
                i += 1;
                if c == b'"' {
                    break;
                }
            }
            continue;
        }
        let rest = &line[i..];
        let mut matched = None;
        for (idx, text) in KEYWORD_TEXT.iter().enumerate() {
            if rest.starts_with(text) {
                matched = Some((idx, text.len()));
                break;
            }
        }
        if let Some((idx, len)) = matched {
            let token = RANGE_BEGIN + idx as u8;
            out.push(token);
            i += len;
            if token == Keyword::Rem as u8 {
                out.extend_from_slice(&bytes[i..]);
                break;
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn tokenizes_keywords_in_table_order() {
        let t = tokenize_line("10 PRINT A+B");
        assert!(t.contains(&(Keyword::Print as u8)));
        assert!(t.contains(&(Keyword::Plus as u8)));
    }

    #[test]
    fn leaves_string_literals_untouched() {
        let t = tokenize_line("PRINT \"FOR SALE\"");
        assert!(contains_subslice(&t, b"FOR SALE"));
    }

    #[test]
    fn rem_stops_tokenization() {
        let t = tokenize_line("REM this has a + sign");
        assert_eq!(t[0], Keyword::Rem as u8);
        assert!(contains_subslice(&t, b"this has a + sign"));
    }
}
