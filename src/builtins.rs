//! Helpers made available to every embedded expression as the outermost
//! namespace of its environment.

use crate::environment::{Binding, Helper, Namespace};
use crate::error::{FormulaError, Result};
use crate::factor::{DataSource, Value};

/// The fixed builtin helper table.
pub const BUILTINS: &[Helper] = &[
    Helper {
        name: "I",
        arity: 1,
        apply: identity,
    },
    Helper {
        name: "Q",
        arity: 1,
        apply: quote,
    },
];

/// Builds a namespace binding every entry of [`BUILTINS`].
pub fn namespace() -> Namespace {
    BUILTINS
        .iter()
        .map(|helper| (helper.name.to_string(), Binding::Helper(*helper)))
        .collect()
}

/// `I(x)`: returns its argument unchanged.
fn identity(args: &[Value], _data: &dyn DataSource) -> Result<Value> {
    Ok(args[0].clone())
}

/// `Q("name")`: looks up a column whose name is not a valid identifier.
fn quote(args: &[Value], data: &dyn DataSource) -> Result<Value> {
    let name = match &args[0] {
        Value::Text(name) => name,
        _ => {
            return Err(FormulaError::HelperArgument {
                helper: "Q",
                expected: "a string naming a column",
            })
        }
    };
    data.column(name)
        .map(|column| Value::Column(column.clone()))
        .ok_or_else(|| FormulaError::UnknownName {
            name: name.clone(),
            origin: None,
        })
}
