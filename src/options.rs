//! Configuration for parsing formulas and building model descriptions.

/// Controls how formula text is read and which namespaces embedded
/// expressions see.
#[derive(Clone, Debug)]
pub struct FormulaOptions {
    /// Merge the builtin helpers (`I`, `Q`) into the evaluation environment as
    /// its outermost namespace.
    pub inject_builtins: bool,
    /// Re-render embedded expressions with canonical token spacing, so that
    /// `np . log(x)` and `np.log(x)` name the same factor.
    pub normalize_spacing: bool,
}

impl Default for FormulaOptions {
    fn default() -> Self {
        Self {
            inject_builtins: true,
            normalize_spacing: true,
        }
    }
}

impl FormulaOptions {
    /// Enable or disable the builtin helper namespace.
    pub fn with_builtins(mut self, inject: bool) -> Self {
        self.inject_builtins = inject;
        self
    }

    /// Enable or disable spacing normalization of embedded expressions.
    pub fn with_normalize_spacing(mut self, normalize: bool) -> Self {
        self.normalize_spacing = normalize;
        self
    }
}
