//! Term algebra for S/R-style statistical model formulas.
//!
//! A formula such as `y ~ a + b*c` is read into a [`ModelDesc`]: an ordered
//! list of left-hand terms and an ordered list of right-hand terms, where each
//! [`Term`] is a set of factors (the empty set being the intercept). The crate
//! covers
//!
//! - reading formula text into a syntax tree (`parse` module),
//! - the classical formula calculus of crossing (`*`), nesting (`/`),
//!   interaction (`:`), powers (`**`), term addition and removal (`+`, `-`) and
//!   intercept tracking (`0`, `1`) (`evaluator` module),
//! - factors that look up or evaluate data columns (`factor` and `environment`
//!   modules), and
//! - rendering a description back into canonical formula text.
//!
//! Turning a description into a numeric design matrix is left to downstream
//! crates; they drive evaluation through the [`Factor`] trait.
//!
//! # Quick start
//!
//! ```
//! use formula_terms::{EvalEnvironment, ModelDesc, INTERCEPT};
//!
//! let desc = ModelDesc::from_formula("y ~ (a + b)/c", &EvalEnvironment::new())
//!     .expect("valid formula");
//!
//! let rhs: Vec<String> = desc.rhs_termlist().iter().map(|t| t.name()).collect();
//! assert_eq!(rhs, ["Intercept", "a", "b", "a:b:c"]);
//! assert_eq!(desc.rhs_termlist()[0], INTERCEPT);
//! assert_eq!(desc.describe(), "y ~ a + b + a:b:c");
//! ```
//!
//! Errors carry the [`Origin`] of the offending piece of the formula:
//!
//! ```
//! use formula_terms::{EvalEnvironment, FormulaError, ModelDesc};
//!
//! let err = ModelDesc::from_formula("y ~ a:1", &EvalEnvironment::new()).unwrap_err();
//! assert!(matches!(err, FormulaError::InterceptInteraction { .. }));
//! let origin = err.origin().unwrap();
//! assert_eq!((origin.start, origin.end), (6, 7));
//! ```

pub mod builtins;
pub mod desc;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod factor;
pub mod lexer;
pub mod options;
pub mod origin;
pub mod parse;
pub mod term;

pub use desc::{FormulaInput, ModelDesc};
pub use environment::EvalEnvironment;
pub use error::{FormulaError, Result};
pub use evaluator::{Evaluator, IntermediateExpr};
pub use factor::{AnyFactor, DataSource, EvalFactor, Factor, LookupFactor, MemoState, Value};
pub use options::FormulaOptions;
pub use origin::Origin;
pub use parse::{parse_formula, NodeKind, ParseNode};
pub use term::{Term, INTERCEPT};
