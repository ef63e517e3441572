//! The term algebra: turns a [`ParseNode`] tree into a [`ModelDesc`].
//!
//! Every node is handled by one [`Rule`], looked up by the node's kind and
//! argument count. Rules below the top-level `~` produce an
//! [`IntermediateExpr`], which tracks the intercept separately from the terms
//! until `~` decides whether to materialize it.

use std::collections::HashMap;
use std::sync::Arc;

use log::trace;

use crate::desc::ModelDesc;
use crate::environment::EvalEnvironment;
use crate::error::{FormulaError, Result};
use crate::factor::{AnyFactor, EvalFactor};
use crate::origin::Origin;
use crate::parse::{NodeKind, ParseNode};
use crate::term::{unique, Term, INTERCEPT};

/// Pending intercept decision of a subexpression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterceptState {
    /// Neither `1` nor `0` was asserted.
    Unspecified,
    /// An intercept was asserted by the node at this origin.
    Present(Origin),
    /// The intercept was explicitly removed.
    Removed,
}

/// Result of evaluating a subexpression below `~`.
#[derive(Clone, Debug)]
pub struct IntermediateExpr {
    intercept: InterceptState,
    terms: Vec<Term>,
}

impl IntermediateExpr {
    fn new(intercept: InterceptState, terms: impl IntoIterator<Item = Term>) -> Self {
        Self {
            intercept,
            terms: unique(terms),
        }
    }

    fn plain(terms: impl IntoIterator<Item = Term>) -> Self {
        Self::new(InterceptState::Unspecified, terms)
    }

    fn removed(terms: impl IntoIterator<Item = Term>) -> Self {
        Self::new(InterceptState::Removed, terms)
    }

    fn present(origin: Origin, terms: impl IntoIterator<Item = Term>) -> Self {
        Self::new(InterceptState::Present(origin), terms)
    }

    pub fn intercept(&self) -> &InterceptState {
        &self.intercept
    }

    pub fn has_intercept(&self) -> bool {
        matches!(self.intercept, InterceptState::Present(_))
    }

    pub fn intercept_removed(&self) -> bool {
        self.intercept == InterceptState::Removed
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }
}

/// What evaluating a node produced.
#[derive(Clone, Debug)]
pub enum Evaluated {
    Intermediate(IntermediateExpr),
    Model(ModelDesc),
}

/// Dispatch key: a node kind together with its argument count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpKey {
    pub kind: NodeKind,
    pub arity: usize,
}

impl OpKey {
    pub fn new(kind: NodeKind, arity: usize) -> Self {
        Self { kind, arity }
    }

    fn of(node: &ParseNode) -> Self {
        Self::new(node.kind, node.args.len())
    }
}

/// The operator semantics the evaluator knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    Tilde,
    BinaryPlus,
    BinaryMinus,
    Product,
    Divide,
    Interact,
    Power,
    UnaryPlus,
    UnaryMinus,
    Zero,
    One,
    Number,
    Expr,
}

impl Rule {
    fn accepts(self, arity: usize) -> bool {
        match self {
            Self::Tilde => arity == 1 || arity == 2,
            Self::UnaryPlus | Self::UnaryMinus => arity == 1,
            Self::Zero | Self::One | Self::Number | Self::Expr => arity == 0,
            _ => arity == 2,
        }
    }
}

/// Tree walker holding the dispatch table and the environment captured by
/// expression factors.
#[derive(Debug)]
pub struct Evaluator {
    rules: HashMap<OpKey, Rule>,
    env: Arc<EvalEnvironment>,
}

impl Evaluator {
    /// Creates an evaluator with the standard formula operators registered.
    pub fn new(env: Arc<EvalEnvironment>) -> Self {
        let mut evaluator = Self {
            rules: HashMap::new(),
            env,
        };
        evaluator.add_op(NodeKind::Tilde, 2, Rule::Tilde);
        evaluator.add_op(NodeKind::Tilde, 1, Rule::Tilde);

        evaluator.add_op(NodeKind::Plus, 2, Rule::BinaryPlus);
        evaluator.add_op(NodeKind::Minus, 2, Rule::BinaryMinus);
        evaluator.add_op(NodeKind::Times, 2, Rule::Product);
        evaluator.add_op(NodeKind::Divide, 2, Rule::Divide);
        evaluator.add_op(NodeKind::Interact, 2, Rule::Interact);
        evaluator.add_op(NodeKind::Power, 2, Rule::Power);

        evaluator.add_op(NodeKind::Plus, 1, Rule::UnaryPlus);
        evaluator.add_op(NodeKind::Minus, 1, Rule::UnaryMinus);

        evaluator.add_op(NodeKind::Zero, 0, Rule::Zero);
        evaluator.add_op(NodeKind::One, 0, Rule::One);
        evaluator.add_op(NodeKind::Number, 0, Rule::Number);
        evaluator.add_op(NodeKind::Expr, 0, Rule::Expr);
        evaluator
    }

    /// Registers (or replaces) the rule for `kind` at `arity`.
    pub fn add_op(&mut self, kind: NodeKind, arity: usize, rule: Rule) {
        self.rules.insert(OpKey::new(kind, arity), rule);
    }

    /// Removes the rule for `kind` at `arity`, returning it if present.
    pub fn remove_op(&mut self, kind: NodeKind, arity: usize) -> Option<Rule> {
        self.rules.remove(&OpKey::new(kind, arity))
    }

    /// Evaluates `node`. With `require_intermediate`, a [`ModelDesc`] result
    /// means `~` was used below the top level and is reported as an error.
    pub fn eval(&self, node: &ParseNode, require_intermediate: bool) -> Result<Evaluated> {
        let key = OpKey::of(node);
        let rule = *self
            .rules
            .get(&key)
            .ok_or_else(|| FormulaError::UnknownOperator {
                operator: node.kind.symbol(),
                arity: key.arity,
                origin: node
                    .operator_origin
                    .clone()
                    .unwrap_or_else(|| node.origin.clone()),
            })?;
        if !rule.accepts(key.arity) {
            return Err(FormulaError::InternalContractViolation {
                origin: node.origin.clone(),
            });
        }

        trace!(
            "{:?} for '{}' at {}..{}",
            rule,
            node.kind.symbol(),
            node.origin.start,
            node.origin.end
        );
        let result = match rule {
            Rule::Tilde => Evaluated::Model(self.tilde(node)?),
            other => Evaluated::Intermediate(self.apply(other, node)?),
        };
        match result {
            Evaluated::Model(_) if require_intermediate => Err(FormulaError::MisplacedSeparator {
                origin: node.origin.clone(),
            }),
            result => Ok(result),
        }
    }

    fn apply(&self, rule: Rule, node: &ParseNode) -> Result<IntermediateExpr> {
        match rule {
            Rule::BinaryPlus => self.binary_plus(node),
            Rule::BinaryMinus => self.binary_minus(node),
            Rule::Product => self.product(node),
            Rule::Divide => self.divide(node),
            Rule::Interact => {
                let (left, right) = self.both(node)?;
                interaction(&left, &right)
            }
            Rule::Power => self.power(node),
            Rule::UnaryPlus => self.eval_expr(&node.args[0]),
            Rule::UnaryMinus => unary_minus(node),
            Rule::Zero => Ok(IntermediateExpr::removed(Vec::<Term>::new())),
            Rule::One => Ok(IntermediateExpr::present(
                node.origin.clone(),
                Vec::<Term>::new(),
            )),
            Rule::Number => Err(FormulaError::invalid_literal(
                "numbers besides '0' and '1' are only allowed with **",
                node.origin.clone(),
            )),
            Rule::Expr => self.expr(node),
            Rule::Tilde => Err(FormulaError::InternalContractViolation {
                origin: node.origin.clone(),
            }),
        }
    }

    fn eval_expr(&self, node: &ParseNode) -> Result<IntermediateExpr> {
        match self.eval(node, true)? {
            Evaluated::Intermediate(expr) => Ok(expr),
            Evaluated::Model(_) => Err(FormulaError::InternalContractViolation {
                origin: node.origin.clone(),
            }),
        }
    }

    fn both(&self, node: &ParseNode) -> Result<(IntermediateExpr, IntermediateExpr)> {
        Ok((self.eval_expr(&node.args[0])?, self.eval_expr(&node.args[1])?))
    }

    /// Only the right-hand side gets an implicit intercept.
    fn tilde(&self, node: &ParseNode) -> Result<ModelDesc> {
        let mut exprs = node
            .args
            .iter()
            .map(|arg| self.eval_expr(arg))
            .collect::<Result<Vec<_>>>()?;
        if exprs.len() == 1 {
            // `~ rhs` reads as `0 ~ rhs`.
            exprs.insert(0, IntermediateExpr::removed(Vec::<Term>::new()));
        }
        let rhs = exprs.pop();
        let lhs = exprs.pop();
        let (lhs, rhs) = match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => (lhs, rhs),
            _ => {
                return Err(FormulaError::InternalContractViolation {
                    origin: node.origin.clone(),
                })
            }
        };

        let lhs_terms = with_intercept(lhs.has_intercept(), lhs.terms);
        let rhs_terms = with_intercept(!rhs.intercept_removed(), rhs.terms);
        Ok(ModelDesc::new(lhs_terms, rhs_terms))
    }

    fn binary_plus(&self, node: &ParseNode) -> Result<IntermediateExpr> {
        let left = self.eval_expr(&node.args[0])?;
        // `x + 0` drops the intercept whatever `x` said about it.
        if node.args[1].kind == NodeKind::Zero {
            return Ok(IntermediateExpr::removed(left.terms));
        }

        let right = self.eval_expr(&node.args[1])?;
        let intercept = if right.has_intercept() {
            right.intercept
        } else {
            left.intercept
        };
        Ok(IntermediateExpr::new(
            intercept,
            left.terms.into_iter().chain(right.terms),
        ))
    }

    fn binary_minus(&self, node: &ParseNode) -> Result<IntermediateExpr> {
        let left = self.eval_expr(&node.args[0])?;
        let subtrahend = &node.args[1];
        match subtrahend.kind {
            NodeKind::Zero => {
                return Ok(IntermediateExpr::present(
                    subtrahend.origin.clone(),
                    left.terms,
                ))
            }
            NodeKind::One => return Ok(IntermediateExpr::removed(left.terms)),
            _ => {}
        }

        let right = self.eval_expr(subtrahend)?;
        let terms: Vec<Term> = left
            .terms
            .into_iter()
            .filter(|term| !right.terms.contains(term))
            .collect();
        if right.has_intercept() {
            Ok(IntermediateExpr::removed(terms))
        } else {
            Ok(IntermediateExpr::new(left.intercept, terms))
        }
    }

    fn product(&self, node: &ParseNode) -> Result<IntermediateExpr> {
        let (left, right) = self.both(node)?;
        let interacted = interaction(&left, &right)?;
        Ok(IntermediateExpr::plain(
            left.terms
                .into_iter()
                .chain(right.terms)
                .chain(interacted.terms),
        ))
    }

    // Nesting distributes to the right, a/(b + c) = a + a:b + a:c, but the
    // left side is always collapsed into one group: (a + b)/c = a + b + a:b:c.
    fn divide(&self, node: &ParseNode) -> Result<IntermediateExpr> {
        let (left, right) = self.both(node)?;
        check_interactable(&left)?;

        let combined = Term::new(
            left.terms
                .iter()
                .flat_map(|term| term.factors().iter().cloned()),
        );
        let nested = interaction(&IntermediateExpr::plain([combined]), &right)?;
        Ok(IntermediateExpr::plain(
            left.terms.into_iter().chain(nested.terms),
        ))
    }

    fn power(&self, node: &ParseNode) -> Result<IntermediateExpr> {
        let left = self.eval_expr(&node.args[0])?;
        check_interactable(&left)?;

        let exponent = &node.args[1];
        let power = match exponent.kind {
            NodeKind::One | NodeKind::Number => {
                exponent.token.as_deref().and_then(positive_integer)
            }
            _ => None,
        }
        .ok_or_else(|| {
            FormulaError::invalid_literal(
                "'**' requires a positive integer",
                exponent.origin.clone(),
            )
        })?;

        // Orders above the number of terms cannot add anything new.
        let power = power.min(left.terms.len());
        let mut all_terms = left.terms.clone();
        let mut product = left.clone();
        for _ in 1..power {
            product = interaction(&left, &product)?;
            all_terms.extend(product.terms.iter().cloned());
        }
        Ok(IntermediateExpr::plain(all_terms))
    }

    fn expr(&self, node: &ParseNode) -> Result<IntermediateExpr> {
        let code = node
            .token
            .as_deref()
            .ok_or_else(|| FormulaError::InternalContractViolation {
                origin: node.origin.clone(),
            })?;
        let factor = EvalFactor::new(code, self.env.clone()).with_origin(node.origin.clone());
        Ok(IntermediateExpr::plain([Term::new([AnyFactor::from(factor)])]))
    }
}

fn unary_minus(node: &ParseNode) -> Result<IntermediateExpr> {
    match node.args[0].kind {
        NodeKind::Zero => Ok(IntermediateExpr::present(
            node.origin.clone(),
            Vec::<Term>::new(),
        )),
        NodeKind::One => Ok(IntermediateExpr::removed(Vec::<Term>::new())),
        _ => Err(FormulaError::InvalidUnaryMinus {
            origin: node.origin.clone(),
        }),
    }
}

/// Reads a run of ASCII digits as a positive count. Values too large for
/// `usize` saturate, since the caller caps them anyway.
fn positive_integer(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = text.trim_start_matches('0');
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse::<usize>().unwrap_or(usize::MAX))
}

fn check_interactable(expr: &IntermediateExpr) -> Result<()> {
    match &expr.intercept {
        InterceptState::Present(origin) => Err(FormulaError::InterceptInteraction {
            origin: origin.clone(),
        }),
        _ => Ok(()),
    }
}

/// Every pairing of a left term with a right term; no main effects.
fn interaction(left: &IntermediateExpr, right: &IntermediateExpr) -> Result<IntermediateExpr> {
    check_interactable(left)?;
    check_interactable(right)?;
    let terms = left
        .terms
        .iter()
        .flat_map(|l| right.terms.iter().map(move |r| l.interact(r)));
    Ok(IntermediateExpr::plain(terms))
}

fn with_intercept(add: bool, terms: Vec<Term>) -> Vec<Term> {
    if add {
        std::iter::once(INTERCEPT).chain(terms).collect()
    } else {
        terms
    }
}
