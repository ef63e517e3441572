//! Factors: the named, evaluable sources of a single model column.
//!
//! [`Factor`] is the capability contract consumed by design-matrix builders.
//! Terms store factors through the closed [`AnyFactor`] union, whose equality
//! and hash follow each variant's identity key.

use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use nalgebra::DVector;
use serde::Serialize;

use crate::environment::EvalEnvironment;
use crate::error::{FormulaError, Result};
use crate::origin::Origin;

/// A value produced by evaluating a factor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Value {
    /// One entry per observation.
    Column(DVector<f64>),
    Scalar(f64),
    Text(String),
}

/// Read access to named data columns.
pub trait DataSource {
    /// Returns the column stored under `name`, if any.
    fn column(&self, name: &str) -> Option<&DVector<f64>>;
}

impl DataSource for HashMap<String, DVector<f64>> {
    fn column(&self, name: &str) -> Option<&DVector<f64>> {
        self.get(name)
    }
}

impl DataSource for BTreeMap<String, DVector<f64>> {
    fn column(&self, name: &str) -> Option<&DVector<f64>> {
        self.get(name)
    }
}

/// Per-factor scratch space filled in by memorization passes.
pub type MemoState = BTreeMap<String, Value>;

/// Capability contract every factor implements.
///
/// A design-matrix builder first asks each factor how many passes over the
/// data it needs, feeds every chunk of data to [`memorize_chunk`] for each pass
/// and closes the pass with [`memorize_finish`]; only then is [`evaluate`]
/// called.
///
/// [`memorize_chunk`]: Factor::memorize_chunk
/// [`memorize_finish`]: Factor::memorize_finish
/// [`evaluate`]: Factor::evaluate
pub trait Factor {
    /// Display name used in term names and descriptions.
    fn name(&self) -> &str;

    /// Computes the factor's value for `data`.
    fn evaluate(&self, state: &MemoState, data: &dyn DataSource) -> Result<Value>;

    /// Number of memorization passes needed before evaluation.
    fn memorize_passes_needed(&self, state: &mut MemoState) -> usize;

    /// Accumulates statistics from one chunk of data during pass `which_pass`.
    fn memorize_chunk(
        &self,
        state: &mut MemoState,
        which_pass: usize,
        data: &dyn DataSource,
    ) -> Result<()>;

    /// Completes pass `which_pass`.
    fn memorize_finish(&self, state: &mut MemoState, which_pass: usize) -> Result<()>;
}

/// Factor whose name is directly a key into the data.
#[derive(Clone, Debug, Serialize)]
pub struct LookupFactor {
    name: String,
    origin: Option<Origin>,
}

impl LookupFactor {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            origin: None,
        }
    }

    /// Attaches the source span this factor was read from.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }
}

impl PartialEq for LookupFactor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for LookupFactor {}

impl Hash for LookupFactor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Factor for LookupFactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, _state: &MemoState, data: &dyn DataSource) -> Result<Value> {
        data.column(&self.name)
            .map(|column| Value::Column(column.clone()))
            .ok_or_else(|| FormulaError::UnknownName {
                name: self.name.clone(),
                origin: self.origin.clone(),
            })
    }

    fn memorize_passes_needed(&self, _state: &mut MemoState) -> usize {
        0
    }

    fn memorize_chunk(
        &self,
        _state: &mut MemoState,
        which_pass: usize,
        _data: &dyn DataSource,
    ) -> Result<()> {
        Err(FormulaError::Memorization {
            factor: self.name.clone(),
            pass: which_pass,
        })
    }

    fn memorize_finish(&self, _state: &mut MemoState, which_pass: usize) -> Result<()> {
        Err(FormulaError::Memorization {
            factor: self.name.clone(),
            pass: which_pass,
        })
    }
}

/// Factor backed by an embedded expression from the formula text, evaluated
/// against the data and a captured [`EvalEnvironment`].
///
/// Two expression factors are the same factor when their (normalized) source
/// text matches.
#[derive(Clone, Debug, Serialize)]
pub struct EvalFactor {
    code: String,
    origin: Option<Origin>,
    #[serde(skip)]
    env: Arc<EvalEnvironment>,
}

impl EvalFactor {
    pub fn new<S: Into<String>>(code: S, env: Arc<EvalEnvironment>) -> Self {
        Self {
            code: code.into(),
            origin: None,
            env,
        }
    }

    /// Attaches the source span this factor was read from.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn env(&self) -> &EvalEnvironment {
        &self.env
    }
}

impl PartialEq for EvalFactor {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for EvalFactor {}

impl Hash for EvalFactor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl Factor for EvalFactor {
    fn name(&self) -> &str {
        &self.code
    }

    fn evaluate(&self, _state: &MemoState, data: &dyn DataSource) -> Result<Value> {
        self.env
            .eval(&self.code, data)
            .map_err(|err| err.with_origin(self.origin.as_ref()))
    }

    fn memorize_passes_needed(&self, _state: &mut MemoState) -> usize {
        0
    }

    fn memorize_chunk(
        &self,
        _state: &mut MemoState,
        which_pass: usize,
        _data: &dyn DataSource,
    ) -> Result<()> {
        Err(FormulaError::Memorization {
            factor: self.code.clone(),
            pass: which_pass,
        })
    }

    fn memorize_finish(&self, _state: &mut MemoState, which_pass: usize) -> Result<()> {
        Err(FormulaError::Memorization {
            factor: self.code.clone(),
            pass: which_pass,
        })
    }
}

/// The closed set of factor variants a [`Term`](crate::term::Term) can hold.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum AnyFactor {
    Lookup(LookupFactor),
    Eval(EvalFactor),
}

impl AnyFactor {
    /// Source span of the factor, when it was read from formula text.
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Self::Lookup(factor) => factor.origin(),
            Self::Eval(factor) => factor.origin(),
        }
    }

    fn inner(&self) -> &dyn Factor {
        match self {
            Self::Lookup(factor) => factor,
            Self::Eval(factor) => factor,
        }
    }
}

impl Factor for AnyFactor {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn evaluate(&self, state: &MemoState, data: &dyn DataSource) -> Result<Value> {
        self.inner().evaluate(state, data)
    }

    fn memorize_passes_needed(&self, state: &mut MemoState) -> usize {
        self.inner().memorize_passes_needed(state)
    }

    fn memorize_chunk(
        &self,
        state: &mut MemoState,
        which_pass: usize,
        data: &dyn DataSource,
    ) -> Result<()> {
        self.inner().memorize_chunk(state, which_pass, data)
    }

    fn memorize_finish(&self, state: &mut MemoState, which_pass: usize) -> Result<()> {
        self.inner().memorize_finish(state, which_pass)
    }
}

impl From<LookupFactor> for AnyFactor {
    fn from(factor: LookupFactor) -> Self {
        Self::Lookup(factor)
    }
}

impl From<EvalFactor> for AnyFactor {
    fn from(factor: EvalFactor) -> Self {
        Self::Eval(factor)
    }
}
