//! Source spans attached to parse nodes and factors for error attribution.

use std::fmt;

use serde::Serialize;

/// A half-open byte range `start..end` into the formula text it was taken from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Origin {
    code: String,
    /// Offset of the first byte covered by this origin.
    pub start: usize,
    /// Offset one past the last byte covered by this origin.
    pub end: usize,
}

impl Origin {
    /// Creates an origin covering `start..end` of `code`.
    pub fn new<S: Into<String>>(code: S, start: usize, end: usize) -> Self {
        let code = code.into();
        debug_assert!(start <= end && end <= code.len());
        Self { code, start, end }
    }

    /// Returns the smallest origin covering every origin in `origins`.
    ///
    /// Returns `None` for an empty iterator. All origins are expected to refer
    /// to the same formula text.
    pub fn combine<'a, I>(origins: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Origin>,
    {
        let mut iter = origins.into_iter();
        let first = iter.next()?;
        let mut start = first.start;
        let mut end = first.end;
        for origin in iter {
            debug_assert_eq!(origin.code, first.code);
            start = start.min(origin.start);
            end = end.max(origin.end);
        }
        Some(Self {
            code: first.code.clone(),
            start,
            end,
        })
    }

    /// The full formula text this origin points into.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The covered slice of the formula text.
    pub fn relevant_code(&self) -> &str {
        &self.code[self.start..self.end]
    }

    /// Renders the formula with a caret line underneath the covered span.
    ///
    /// ```
    /// use formula_terms::origin::Origin;
    ///
    /// let origin = Origin::new("a + b", 4, 5);
    /// assert_eq!(origin.caretize(2), "  a + b\n      ^");
    /// ```
    pub fn caretize(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let width = (self.end - self.start).max(1);
        format!(
            "{pad}{}\n{pad}{}{}",
            self.code,
            " ".repeat(self.code[..self.start].chars().count()),
            "^".repeat(width)
        )
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{} in `{}`", self.start, self.end, self.code)
    }
}
