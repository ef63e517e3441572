//! Expression-level tokenizer shared by the formula parser and by
//! [`EvalFactor`](crate::factor::EvalFactor) evaluation.
//!
//! Formula operators are ordinary punctuation at this level; grouping them into
//! formula tokens and embedded expressions is the parser's job.

use crate::error::{FormulaError, Result};
use crate::origin::Origin;

/// Lexical class of a [`Token`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    String,
    Punct,
}

/// A single token together with its byte span in the source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// True when this is punctuation spelled exactly `text`.
    pub fn is_punct(&self, text: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == text
    }

    fn closes_group(&self) -> bool {
        self.kind == TokenKind::Punct && matches!(self.text.as_str(), ")" | "]" | "}")
    }
}

// Longest match first; `*` must never be split out of `**`.
const MULTI_CHAR_PUNCT: &[&str] = &["**", "//", "==", "!=", "<=", ">=", "<<", ">>"];

/// Splits `code` into tokens, rejecting comments and unterminated strings.
pub fn tokenize(code: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while let Some(c) = code[pos..].chars().next() {
        let start = pos;
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        if c == '#' {
            let end = code[start..].find('\n').map_or(code.len(), |n| start + n);
            return Err(FormulaError::parse(
                "comments are not allowed",
                Origin::new(code, start, end),
            ));
        }

        let (kind, end) = if c == '"' || c == '\'' {
            (TokenKind::String, scan_string(code, start, c)?)
        } else if c.is_ascii_digit() || (c == '.' && next_is_digit(code, start + 1)) {
            (TokenKind::Number, scan_number(code, start))
        } else if c.is_alphabetic() || c == '_' {
            let len = code[start..]
                .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
                .unwrap_or(code.len() - start);
            (TokenKind::Name, start + len)
        } else {
            let len = MULTI_CHAR_PUNCT
                .iter()
                .find(|op| code[start..].starts_with(*op))
                .map_or(c.len_utf8(), |op| op.len());
            (TokenKind::Punct, start + len)
        };

        tokens.push(Token {
            kind,
            text: code[start..end].to_string(),
            start,
            end,
        });
        pos = end;
    }

    Ok(tokens)
}

fn next_is_digit(code: &str, at: usize) -> bool {
    code[at..].chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn scan_number(code: &str, start: usize) -> usize {
    let hex = code[start..].starts_with("0x") || code[start..].starts_with("0X");
    let mut end = start;
    let mut prev = '\0';
    for c in code[start..].chars() {
        let exponent_sign = !hex && matches!(c, '+' | '-') && matches!(prev, 'e' | 'E');
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign) {
            break;
        }
        end += c.len_utf8();
        prev = c;
    }
    end
}

fn scan_string(code: &str, start: usize, quote: char) -> Result<usize> {
    let mut escaped = false;
    for (offset, c) in code[start + 1..].char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok(start + 1 + offset + 1);
        }
    }
    Err(FormulaError::parse(
        "unterminated string literal",
        Origin::new(code, start, code.len()),
    ))
}

/// Re-joins tokens with canonical spacing, so `np . log(a , base = 10)`
/// renders as `np.log(a, base=10)`.
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    let mut prev_unary = false;

    for token in tokens {
        if let Some(p) = prev {
            if !prev_unary && needs_space(p, token) {
                out.push(' ');
            }
        }
        prev_unary = matches!(token.text.as_str(), "+" | "-" | "~")
            && token.kind == TokenKind::Punct
            && prev.map_or(true, |p| p.kind == TokenKind::Punct && !p.closes_group());
        out.push_str(&token.text);
        prev = Some(token);
    }

    out
}

fn needs_space(prev: &Token, cur: &Token) -> bool {
    if cur.kind == TokenKind::Punct && matches!(cur.text.as_str(), ")" | "]" | "}" | "," | "." | ":")
    {
        return false;
    }
    if prev.kind == TokenKind::Punct && matches!(prev.text.as_str(), "(" | "[" | "{" | "." | ":") {
        return false;
    }
    if (cur.is_punct("(") || cur.is_punct("["))
        && (matches!(prev.kind, TokenKind::Name | TokenKind::String) || prev.closes_group())
    {
        return false;
    }
    !(cur.is_punct("=") || prev.is_punct("="))
}

/// Strips the quotes from a string token and resolves simple escapes.
pub fn unquote(text: &str) -> String {
    let inner = &text[1..text.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
