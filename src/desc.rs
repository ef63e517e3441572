//! Model descriptions: the left- and right-hand term lists of a formula.

use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::builtins;
use crate::environment::EvalEnvironment;
use crate::error::{FormulaError, Result};
use crate::evaluator::{Evaluated, Evaluator};
use crate::options::FormulaOptions;
use crate::parse::{parse_formula_with_options, ParseNode};
use crate::term::{unique, Term, INTERCEPT};

/// Formula text or an already parsed tree.
#[derive(Clone, Copy, Debug)]
pub enum FormulaInput<'a> {
    Text(&'a str),
    Tree(&'a ParseNode),
}

impl<'a> From<&'a str> for FormulaInput<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a String> for FormulaInput<'a> {
    fn from(value: &'a String) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a ParseNode> for FormulaInput<'a> {
    fn from(value: &'a ParseNode) -> Self {
        Self::Tree(value)
    }
}

/// A model as two ordered lists of distinct terms.
///
/// The intercept, when present, appears as [`INTERCEPT`] in the list. Term
/// order is the order of first appearance in the formula.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelDesc {
    lhs_termlist: Vec<Term>,
    rhs_termlist: Vec<Term>,
}

impl ModelDesc {
    /// Builds a description, dropping repeated terms.
    pub fn new(
        lhs_termlist: impl IntoIterator<Item = Term>,
        rhs_termlist: impl IntoIterator<Item = Term>,
    ) -> Self {
        Self {
            lhs_termlist: unique(lhs_termlist),
            rhs_termlist: unique(rhs_termlist),
        }
    }

    pub fn lhs_termlist(&self) -> &[Term] {
        &self.lhs_termlist
    }

    pub fn rhs_termlist(&self) -> &[Term] {
        &self.rhs_termlist
    }

    /// Renders a canonical formula equivalent to this description.
    ///
    /// The intercept is written `1`; a right-hand side without it starts with
    /// `0 +`. Parsing the output again yields an equal description.
    pub fn describe(&self) -> String {
        fn term_code(term: &Term) -> String {
            if term.is_intercept() {
                "1".to_string()
            } else {
                term.name()
            }
        }

        let lhs = self
            .lhs_termlist
            .iter()
            .map(term_code)
            .collect::<Vec<_>>()
            .join(" + ");
        let mut result = if lhs.is_empty() {
            "~ ".to_string()
        } else {
            format!("{lhs} ~ ")
        };

        if self.rhs_termlist == [INTERCEPT] {
            result.push_str(&term_code(&INTERCEPT));
        } else {
            let mut names = Vec::new();
            if !self.rhs_termlist.contains(&INTERCEPT) {
                names.push("0".to_string());
            }
            names.extend(
                self.rhs_termlist
                    .iter()
                    .filter(|term| !term.is_intercept())
                    .map(term_code),
            );
            result.push_str(&names.join(" + "));
        }
        result
    }

    /// Builds a description from formula text or a parsed tree.
    ///
    /// `env` is copied; the builtin helpers are added to the copy as its
    /// outermost namespace before embedded expressions capture it.
    ///
    /// ```
    /// use formula_terms::{EvalEnvironment, ModelDesc};
    ///
    /// let desc = ModelDesc::from_formula("y ~ a * b", &EvalEnvironment::new()).unwrap();
    /// assert_eq!(desc.describe(), "y ~ a + b + a:b");
    /// ```
    pub fn from_formula<'a>(
        input: impl Into<FormulaInput<'a>>,
        env: &EvalEnvironment,
    ) -> Result<Self> {
        Self::from_formula_with_options(input, env, &FormulaOptions::default())
    }

    /// [`from_formula`](Self::from_formula) with explicit options.
    pub fn from_formula_with_options<'a>(
        input: impl Into<FormulaInput<'a>>,
        env: &EvalEnvironment,
        options: &FormulaOptions,
    ) -> Result<Self> {
        let parsed;
        let tree = match input.into() {
            FormulaInput::Text(code) => {
                parsed = parse_formula_with_options(code, options)?;
                &parsed
            }
            FormulaInput::Tree(tree) => tree,
        };

        let mut env = env.clone();
        if options.inject_builtins {
            env.add_outer_namespace(builtins::namespace());
        }

        match Evaluator::new(Arc::new(env)).eval(tree, false)? {
            Evaluated::Model(desc) => {
                debug!("`{}` describes as `{}`", tree.origin.code(), desc.describe());
                Ok(desc)
            }
            Evaluated::Intermediate(_) => Err(FormulaError::InternalContractViolation {
                origin: tree.origin.clone(),
            }),
        }
    }
}

impl fmt::Display for ModelDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
