//! Splits a macro replacement list into preprocessing tokens.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    /// A preprocessing number: integer and floating literals, suffixes included.
    Number,
    StringLiteral,
    CharLiteral,
    Punctuator,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

const PUNCTUATORS: [&str; 23] = [
    "...", "<<=", ">>=", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "*=",
    "/=", "%=", "+=", "-=", "&=", "^=", "|=", "##",
];

const STRING_PREFIXES: [&str; 4] = ["u8", "L", "u", "U"];

/// Tokenizes `text`. Whitespace and comments separate tokens and are dropped; an unterminated
/// literal extends to the end of the input.
pub fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if text[i..].starts_with("/*") {
            i = text[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
            continue;
        }
        if text[i..].starts_with("//") {
            i = text[i..].find('\n').map_or(bytes.len(), |end| i + end);
            continue;
        }

        let start = i;
        let kind = if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            match bytes.get(i) {
                Some(&quote)
                    if matches!(quote, b'"' | b'\'')
                        && STRING_PREFIXES.contains(&&text[start..i]) =>
                {
                    i = skip_literal(bytes, i, quote);
                    literal_kind(quote)
                }
                _ => TokenKind::Identifier,
            }
        } else if c.is_ascii_digit()
            || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        {
            i += 1;
            while i < bytes.len() {
                let b = bytes[i];
                if matches!(b, b'+' | b'-') && matches!(bytes[i - 1], b'e' | b'E' | b'p' | b'P') {
                    i += 1;
                } else if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' {
                    i += 1;
                } else {
                    break;
                }
            }
            TokenKind::Number
        } else if c == b'"' || c == b'\'' {
            i = skip_literal(bytes, i, c);
            literal_kind(c)
        } else {
            let len = PUNCTUATORS
                .iter()
                .find(|p| text[i..].starts_with(**p))
                .map_or_else(|| text[i..].chars().next().map_or(1, char::len_utf8), |p| p.len());
            i += len;
            TokenKind::Punctuator
        };
        tokens.push(Token {
            kind,
            text: text[start..i].to_string(),
        });
    }
    tokens
}

fn literal_kind(quote: u8) -> TokenKind {
    if quote == b'"' {
        TokenKind::StringLiteral
    } else {
        TokenKind::CharLiteral
    }
}

/// Returns the index just past the literal whose opening quote is at `open`.
fn skip_literal(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// One of `u`, `l`, `ul`, `lu`, `ll`, `ull`, `llu` in either case, with `ll` not mixed-case.
fn is_integer_suffix(suffix: &str) -> bool {
    let long = suffix.trim_matches(['u', 'U']);
    suffix.len() - long.len() <= 1 && matches!(long, "" | "l" | "L" | "ll" | "LL")
}

/// True for decimal, octal and hexadecimal integer literals with an optional integer suffix.
pub fn is_integer_literal(text: &str) -> bool {
    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
    if digits.is_empty() || !is_integer_suffix(&text[digits.len()..]) {
        return false;
    }
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        return !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit());
    }
    if let Some(octal) = digits.strip_prefix('0') {
        return octal.bytes().all(|b| (b'0'..=b'7').contains(&b));
    }
    digits.bytes().all(|b| b.is_ascii_digit())
}
