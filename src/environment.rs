//! Variable bindings that embedded expressions are evaluated against.

use std::collections::HashMap;
use std::fmt;

use crate::error::{FormulaError, Result};
use crate::factor::{DataSource, Value};
use crate::lexer::{self, Token, TokenKind};

/// Signature of a builtin helper: receives evaluated arguments and the data.
pub type HelperFn = fn(&[Value], &dyn DataSource) -> Result<Value>;

/// A named function callable from embedded expressions, e.g. `I(x)`.
#[derive(Clone, Copy)]
pub struct Helper {
    pub name: &'static str,
    pub arity: usize,
    pub apply: HelperFn,
}

impl Helper {
    /// Checks the argument count and applies the helper.
    pub fn call(&self, args: &[Value], data: &dyn DataSource) -> Result<Value> {
        if args.len() != self.arity {
            return Err(FormulaError::HelperArity {
                helper: self.name,
                expected: self.arity,
                found: args.len(),
            });
        }
        (self.apply)(args, data)
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helper")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// What a name resolves to inside an [`EvalEnvironment`].
#[derive(Clone, Debug)]
pub enum Binding {
    Value(Value),
    Helper(Helper),
}

pub type Namespace = HashMap<String, Binding>;

/// Variables bound with [`with_variable`](Self::with_variable), then an
/// ordered stack of outer namespaces; earlier layers shadow later ones.
#[derive(Clone, Debug, Default)]
pub struct EvalEnvironment {
    variables: Namespace,
    outer: Vec<Namespace>,
}

impl EvalEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value` in the innermost namespace, which shadows every
    /// outer namespace whenever those were added.
    pub fn with_variable<S: Into<String>>(mut self, name: S, value: Value) -> Self {
        self.variables.insert(name.into(), Binding::Value(value));
        self
    }

    /// Appends a fallback namespace consulted after every existing one.
    pub fn add_outer_namespace(&mut self, namespace: Namespace) {
        self.outer.push(namespace);
    }

    /// Builder form of [`add_outer_namespace`](Self::add_outer_namespace).
    pub fn with_outer_namespace(mut self, namespace: Namespace) -> Self {
        self.add_outer_namespace(namespace);
        self
    }

    /// Number of non-empty variable layers plus outer namespaces.
    pub fn namespace_count(&self) -> usize {
        usize::from(!self.variables.is_empty()) + self.outer.len()
    }

    /// Resolves `name` through the namespaces, innermost first.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.variables
            .get(name)
            .or_else(|| self.outer.iter().find_map(|namespace| namespace.get(name)))
    }

    /// Evaluates an embedded expression; names resolve against `data` before
    /// the environment.
    ///
    /// Only names, numeric and string literals, parentheses and helper calls
    /// are understood.
    pub fn eval(&self, code: &str, data: &dyn DataSource) -> Result<Value> {
        let tokens = lexer::tokenize(code)?;
        let mut reader = ExprReader {
            code,
            tokens: &tokens,
            pos: 0,
            env: self,
            data,
        };
        let value = reader.value()?;
        if reader.pos != tokens.len() {
            return Err(reader.unsupported());
        }
        Ok(value)
    }
}

const SUPPORTED_FORMS: &str = "only names, literals and helper calls are supported";

struct ExprReader<'a> {
    code: &'a str,
    tokens: &'a [Token],
    pos: usize,
    env: &'a EvalEnvironment,
    data: &'a dyn DataSource,
}

impl ExprReader<'_> {
    fn unsupported(&self) -> FormulaError {
        FormulaError::unsupported(self.code, SUPPORTED_FORMS)
    }

    fn peek_is(&self, text: &str) -> bool {
        self.tokens.get(self.pos).is_some_and(|token| token.is_punct(text))
    }

    fn value(&mut self) -> Result<Value> {
        let tokens = self.tokens;
        let token = tokens.get(self.pos).ok_or_else(|| self.unsupported())?;
        self.pos += 1;

        match token.kind {
            TokenKind::Name if self.peek_is("(") => self.call(&token.text),
            TokenKind::Name => self.name(&token.text),
            TokenKind::Number => token
                .text
                .parse::<f64>()
                .map(Value::Scalar)
                .map_err(|_| FormulaError::unsupported(self.code, "malformed number")),
            TokenKind::String => Ok(Value::Text(lexer::unquote(&token.text))),
            TokenKind::Punct if token.text == "(" => {
                let inner = self.value()?;
                if !self.peek_is(")") {
                    return Err(self.unsupported());
                }
                self.pos += 1;
                Ok(inner)
            }
            TokenKind::Punct => Err(self.unsupported()),
        }
    }

    fn name(&self, name: &str) -> Result<Value> {
        if let Some(column) = self.data.column(name) {
            return Ok(Value::Column(column.clone()));
        }
        match self.env.lookup(name) {
            Some(Binding::Value(value)) => Ok(value.clone()),
            Some(Binding::Helper(_)) => Err(FormulaError::unsupported(
                self.code,
                "helpers must be called, not used as values",
            )),
            None => Err(FormulaError::UnknownName {
                name: name.to_string(),
                origin: None,
            }),
        }
    }

    fn call(&mut self, name: &str) -> Result<Value> {
        let helper = match self.env.lookup(name) {
            Some(Binding::Helper(helper)) => *helper,
            Some(Binding::Value(_)) => {
                return Err(FormulaError::unsupported(self.code, "only helpers can be called"))
            }
            None => {
                return Err(FormulaError::UnknownName {
                    name: name.to_string(),
                    origin: None,
                })
            }
        };

        // Skip the opening parenthesis.
        self.pos += 1;
        let mut args = Vec::new();
        if self.peek_is(")") {
            self.pos += 1;
        } else {
            loop {
                let keyword = self.tokens.get(self.pos + 1).is_some_and(|t| t.is_punct("="));
                if keyword {
                    return Err(FormulaError::unsupported(
                        self.code,
                        "keyword arguments are not supported",
                    ));
                }
                args.push(self.value()?);
                if self.peek_is(",") {
                    self.pos += 1;
                } else if self.peek_is(")") {
                    self.pos += 1;
                    break;
                } else {
                    return Err(self.unsupported());
                }
            }
        }

        helper.call(&args, self.data)
    }
}
