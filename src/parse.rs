//! Formula text to [`ParseNode`] trees.
//!
//! Formula operators are recognised only outside embedded expressions. Any run
//! of other tokens (names, calls, indexing, literals) becomes a single leaf,
//! classified as `0`, `1`, another number, or a free-form expression.

use serde::Serialize;

use crate::error::{FormulaError, Result};
use crate::lexer::{self, Token, TokenKind};
use crate::options::FormulaOptions;
use crate::origin::Origin;

/// Node kinds produced by the parser; the evaluator dispatches on these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Tilde,
    Plus,
    Minus,
    Times,
    Divide,
    Interact,
    Power,
    Zero,
    One,
    Number,
    Expr,
}

impl NodeKind {
    /// Source spelling of the operator, or the leaf class name.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Tilde => "~",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Times => "*",
            Self::Divide => "/",
            Self::Interact => ":",
            Self::Power => "**",
            Self::Zero => "ZERO",
            Self::One => "ONE",
            Self::Number => "NUMBER",
            Self::Expr => "EXPR",
        }
    }

    fn from_operator(text: &str) -> Option<Self> {
        Some(match text {
            "~" => Self::Tilde,
            "+" => Self::Plus,
            "-" => Self::Minus,
            "*" => Self::Times,
            "/" => Self::Divide,
            ":" => Self::Interact,
            "**" => Self::Power,
            _ => return None,
        })
    }

    fn binary_precedence(self) -> i32 {
        match self {
            Self::Tilde => -100,
            Self::Plus | Self::Minus => 100,
            Self::Times | Self::Divide => 200,
            Self::Interact => 300,
            Self::Power => 500,
            _ => unreachable!("leaf kinds have no precedence"),
        }
    }

    fn unary_precedence(self) -> Option<i32> {
        match self {
            Self::Tilde => Some(-100),
            Self::Plus | Self::Minus => Some(100),
            _ => None,
        }
    }
}

/// A node of the formula syntax tree.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParseNode {
    pub kind: NodeKind,
    pub args: Vec<ParseNode>,
    pub origin: Origin,
    /// Span of the operator token itself; `None` for leaves and for the
    /// implicit `~` added around a formula without one.
    pub operator_origin: Option<Origin>,
    /// Normalized source text of a leaf; `None` for operators.
    pub token: Option<String>,
}

impl ParseNode {
    /// Builds an operator node whose origin spans all of its arguments.
    pub fn operator(kind: NodeKind, args: Vec<ParseNode>, operator_origin: &Origin) -> Self {
        let origin = Origin::combine(
            std::iter::once(operator_origin).chain(args.iter().map(|arg| &arg.origin)),
        )
        .unwrap_or_else(|| operator_origin.clone());
        Self {
            kind,
            args,
            origin,
            operator_origin: Some(operator_origin.clone()),
            token: None,
        }
    }

    /// Wraps `tree` in a one-argument `~` that has no token of its own.
    fn implicit_tilde(tree: ParseNode) -> Self {
        Self {
            kind: NodeKind::Tilde,
            origin: tree.origin.clone(),
            args: vec![tree],
            operator_origin: None,
            token: None,
        }
    }

    /// Builds a leaf node carrying its normalized text.
    pub fn leaf<S: Into<String>>(kind: NodeKind, token: S, origin: Origin) -> Self {
        Self {
            kind,
            args: Vec::new(),
            origin,
            operator_origin: None,
            token: Some(token.into()),
        }
    }
}

#[derive(Clone, Debug)]
enum FormulaToken {
    LParen(Origin),
    RParen(Origin),
    Operator(NodeKind, Origin),
    Leaf(ParseNode),
}

impl FormulaToken {
    fn origin(&self) -> &Origin {
        match self {
            Self::LParen(origin) | Self::RParen(origin) | Self::Operator(_, origin) => origin,
            Self::Leaf(node) => &node.origin,
        }
    }
}

/// Parses formula text with default options.
pub fn parse_formula(code: &str) -> Result<ParseNode> {
    parse_formula_with_options(code, &FormulaOptions::default())
}

/// Parses formula text into a tree whose root is always a `~` node.
///
/// Empty input is read as `~ 1`, with every origin covering the whole input.
pub fn parse_formula_with_options(code: &str, options: &FormulaOptions) -> Result<ParseNode> {
    if code.trim().is_empty() {
        let one = ParseNode::leaf(NodeKind::One, "1", Origin::new(code, 0, code.len()));
        return Ok(ParseNode::implicit_tilde(one));
    }
    let tokens = formula_tokens(code, options)?;

    let mut parser = Parser {
        code,
        tokens,
        pos: 0,
        last: None,
    };
    let tree = parser.expression(i32::MIN)?;
    if let Some(token) = parser.tokens.get(parser.pos) {
        return Err(FormulaError::parse("unmatched ')'", token.origin().clone()));
    }

    if tree.kind == NodeKind::Tilde {
        Ok(tree)
    } else {
        Ok(ParseNode::implicit_tilde(tree))
    }
}

fn formula_tokens(code: &str, options: &FormulaOptions) -> Result<Vec<FormulaToken>> {
    let raw = lexer::tokenize(code)?;
    let mut out = Vec::new();
    let mut pos = 0usize;

    while pos < raw.len() {
        let token = &raw[pos];
        let origin = Origin::new(code, token.start, token.end);
        if token.is_punct("(") {
            out.push(FormulaToken::LParen(origin));
            pos += 1;
        } else if token.is_punct(")") {
            out.push(FormulaToken::RParen(origin));
            pos += 1;
        } else if let Some(kind) = operator_kind(token) {
            out.push(FormulaToken::Operator(kind, origin));
            pos += 1;
        } else {
            let (leaf, next) = embedded_expression(code, &raw, pos, options)?;
            out.push(FormulaToken::Leaf(leaf));
            pos = next;
        }
    }

    Ok(out)
}

fn operator_kind(token: &Token) -> Option<NodeKind> {
    if token.kind == TokenKind::Punct {
        NodeKind::from_operator(&token.text)
    } else {
        None
    }
}

/// Reads one embedded expression starting at `start`, stopping at the first
/// formula operator or `)` outside any bracket.
fn embedded_expression(
    code: &str,
    raw: &[Token],
    start: usize,
    options: &FormulaOptions,
) -> Result<(ParseNode, usize)> {
    let mut depth = 0usize;
    let mut pos = start;

    while let Some(token) = raw.get(pos) {
        if depth == 0 && (token.is_punct(")") || operator_kind(token).is_some()) {
            break;
        }
        if token.kind == TokenKind::Punct {
            match token.text.as_str() {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    if depth == 0 {
                        return Err(FormulaError::parse(
                            "unmatched close bracket",
                            Origin::new(code, token.start, token.end),
                        ));
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        pos += 1;
    }

    let span = &raw[start..pos];
    let origin = Origin::new(code, span[0].start, span[span.len() - 1].end);
    if depth != 0 {
        return Err(FormulaError::parse(
            "unclosed bracket in embedded expression",
            origin,
        ));
    }

    let text = if options.normalize_spacing {
        lexer::render(span)
    } else {
        origin.relevant_code().to_string()
    };
    let kind = match text.as_str() {
        "0" => NodeKind::Zero,
        "1" => NodeKind::One,
        other if is_number(other) => NodeKind::Number,
        _ => NodeKind::Expr,
    };
    Ok((ParseNode::leaf(kind, text, origin), pos))
}

fn is_number(text: &str) -> bool {
    let numeric_start = text
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.');
    numeric_start && (text.parse::<i64>().is_ok() || text.parse::<f64>().is_ok())
}

struct Parser<'a> {
    code: &'a str,
    tokens: Vec<FormulaToken>,
    pos: usize,
    last: Option<Origin>,
}

impl Parser<'_> {
    fn next(&mut self) -> Option<FormulaToken> {
        let token = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        self.last = Some(token.origin().clone());
        Some(token)
    }

    /// Precedence climbing: consumes binary operators binding tighter than
    /// `min_precedence`, which keeps every operator left-associative.
    fn expression(&mut self, min_precedence: i32) -> Result<ParseNode> {
        let mut left = self.noun()?;

        loop {
            let (kind, origin) = match self.tokens.get(self.pos) {
                None | Some(FormulaToken::RParen(_)) => break,
                Some(FormulaToken::Operator(kind, origin)) => (*kind, origin.clone()),
                Some(other) => {
                    return Err(FormulaError::parse(
                        "expected an operator",
                        other.origin().clone(),
                    ))
                }
            };
            let precedence = kind.binary_precedence();
            if precedence <= min_precedence {
                break;
            }
            self.next();
            let right = self.expression(precedence)?;
            left = ParseNode::operator(kind, vec![left, right], &origin);
        }

        Ok(left)
    }

    fn noun(&mut self) -> Result<ParseNode> {
        let token = match self.next() {
            Some(token) => token,
            None => {
                let origin = self
                    .last
                    .clone()
                    .unwrap_or_else(|| Origin::new(self.code, self.code.len(), self.code.len()));
                return Err(FormulaError::parse(
                    "expected a noun, but instead the expression ended",
                    origin,
                ));
            }
        };

        match token {
            FormulaToken::Leaf(node) => Ok(node),
            FormulaToken::LParen(open) => {
                let mut inner = self.expression(i32::MIN)?;
                match self.next() {
                    Some(FormulaToken::RParen(close)) => {
                        inner.origin = Origin::combine([&open, &inner.origin, &close])
                            .unwrap_or(inner.origin);
                        Ok(inner)
                    }
                    _ => Err(FormulaError::parse("unmatched '('", open)),
                }
            }
            FormulaToken::Operator(kind, origin) => match kind.unary_precedence() {
                Some(precedence) => {
                    let operand = self.expression(precedence)?;
                    Ok(ParseNode::operator(kind, vec![operand], &origin))
                }
                None => Err(FormulaError::parse(
                    format!("expected a noun, not '{}'", kind.symbol()),
                    origin,
                )),
            },
            FormulaToken::RParen(origin) => {
                Err(FormulaError::parse("expected a noun, not ')'", origin))
            }
        }
    }
}
