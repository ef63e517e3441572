use thiserror::Error;

use crate::origin::Origin;

/// Unified error type for `formula_terms` operations.
///
/// Variants raised while reading or evaluating formula text always carry the
/// [`Origin`] of the offending node so callers can point at it with
/// [`Origin::caretize`].
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Raised when formula text cannot be tokenized or parsed.
    #[error("{message}")]
    Parse { message: String, origin: Origin },

    /// Raised when no rule is registered for an operator at a given arity.
    #[error("don't know how to evaluate the '{operator}' operator with {arity} argument(s)")]
    UnknownOperator {
        operator: &'static str,
        arity: usize,
        origin: Origin,
    },

    /// Raised when `~` appears more than once or below the top level.
    #[error("~ can only be used once, and only at the top level")]
    MisplacedSeparator { origin: Origin },

    /// Raised for bare numbers other than 0/1, or a bad exponent to `**`.
    #[error("{message}")]
    InvalidLiteral {
        message: &'static str,
        origin: Origin,
    },

    /// Raised when unary minus is applied to something other than 0 or 1.
    #[error("unary minus can only be applied to 1 or 0")]
    InvalidUnaryMinus { origin: Origin },

    /// Raised when a pending intercept takes part in `:`, `*`, `/` or `**`.
    #[error("intercept term cannot interact with anything else")]
    InterceptInteraction { origin: Origin },

    /// Raised when a rule hands back a value of the wrong kind.
    #[error("operator rule returned a value that cannot be used here")]
    InternalContractViolation { origin: Origin },

    /// Raised when a name is found neither in the data nor in the environment.
    #[error("name `{name}` is not defined in the data or the evaluation environment")]
    UnknownName {
        name: String,
        origin: Option<Origin>,
    },

    /// Raised when an embedded expression uses a form the factor cannot evaluate.
    #[error("cannot evaluate embedded expression `{code}`: {reason}")]
    UnsupportedExpression {
        code: String,
        reason: &'static str,
        origin: Option<Origin>,
    },

    /// Raised when a builtin helper receives the wrong number of arguments.
    #[error("helper `{helper}` takes {expected} argument(s) but {found} were supplied")]
    HelperArity {
        helper: &'static str,
        expected: usize,
        found: usize,
    },

    /// Raised when a helper receives an argument of the wrong kind.
    #[error("helper `{helper}` expected {expected}")]
    HelperArgument {
        helper: &'static str,
        expected: &'static str,
    },

    /// Raised when a memorization pass is requested from a stateless factor.
    #[error("factor `{factor}` has no memorization pass {pass}")]
    Memorization { factor: String, pass: usize },
}

impl FormulaError {
    /// Helper to raise a parse error covering `origin`.
    pub fn parse<S: Into<String>>(message: S, origin: Origin) -> Self {
        Self::Parse {
            message: message.into(),
            origin,
        }
    }

    /// Helper to raise an [`InvalidLiteral`](FormulaError::InvalidLiteral) error.
    pub fn invalid_literal(message: &'static str, origin: Origin) -> Self {
        Self::InvalidLiteral { message, origin }
    }

    /// Helper for bubbling up unsupported embedded expressions.
    pub fn unsupported(code: &str, reason: &'static str) -> Self {
        Self::UnsupportedExpression {
            code: code.to_string(),
            reason,
            origin: None,
        }
    }

    /// Returns the source span the error points at, if it has one.
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Self::Parse { origin, .. }
            | Self::UnknownOperator { origin, .. }
            | Self::MisplacedSeparator { origin }
            | Self::InvalidLiteral { origin, .. }
            | Self::InvalidUnaryMinus { origin }
            | Self::InterceptInteraction { origin }
            | Self::InternalContractViolation { origin } => Some(origin),
            Self::UnknownName { origin, .. } | Self::UnsupportedExpression { origin, .. } => {
                origin.as_ref()
            }
            Self::HelperArity { .. } | Self::HelperArgument { .. } | Self::Memorization { .. } => {
                None
            }
        }
    }

    /// Attaches `origin` to factor-evaluation errors that do not carry one yet.
    pub(crate) fn with_origin(mut self, at: Option<&Origin>) -> Self {
        match &mut self {
            Self::UnknownName { origin, .. } | Self::UnsupportedExpression { origin, .. } => {
                if origin.is_none() {
                    *origin = at.cloned();
                }
            }
            _ => {}
        }
        self
    }

    /// Renders the message followed by a caret display of the origin.
    pub fn display_with_origin(&self) -> String {
        match self.origin() {
            Some(origin) => format!("{self}\n{}", origin.caretize(4)),
            None => self.to_string(),
        }
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, FormulaError>;
