//! Terms: sets of factors that keep the order the user wrote them in.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::factor::{AnyFactor, Factor};

/// Keeps the first occurrence of every item, preserving order.
pub(crate) fn unique<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// One model effect: an interaction of zero or more factors.
///
/// Equality and hashing treat the factors as a set, so `a:b` and `b:a` are the
/// same term; the stored order is the order of first appearance and only
/// affects [`name`](Term::name). The empty term is the intercept.
#[derive(Clone, Debug, Serialize)]
#[serde(transparent)]
pub struct Term {
    factors: Vec<AnyFactor>,
}

/// The intercept: the term with no factors.
pub const INTERCEPT: Term = Term {
    factors: Vec::new(),
};

impl Term {
    pub fn new(factors: impl IntoIterator<Item = AnyFactor>) -> Self {
        Self {
            factors: unique(factors),
        }
    }

    pub fn factors(&self) -> &[AnyFactor] {
        &self.factors
    }

    pub fn is_intercept(&self) -> bool {
        self.factors.is_empty()
    }

    /// Factor names joined by `:`, or `Intercept` for the empty term.
    pub fn name(&self) -> String {
        if self.factors.is_empty() {
            "Intercept".to_string()
        } else {
            self.factors
                .iter()
                .map(|factor| factor.name())
                .collect::<Vec<_>>()
                .join(":")
        }
    }

    /// A term whose factors are this term's followed by `other`'s.
    pub(crate) fn interact(&self, other: &Term) -> Term {
        Term::new(self.factors.iter().chain(other.factors.iter()).cloned())
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.factors.len() == other.factors.len()
            && self.factors.iter().all(|factor| other.factors.contains(factor))
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Order-independent: combine per-factor hashes commutatively.
        let combined = self.factors.iter().fold(0u64, |acc, factor| {
            let mut hasher = DefaultHasher::new();
            factor.hash(&mut hasher);
            acc.wrapping_add(hasher.finish())
        });
        self.factors.len().hash(state);
        combined.hash(state);
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::factor::LookupFactor;

    fn f(name: &str) -> AnyFactor {
        LookupFactor::new(name).into()
    }

    fn hash_of(term: &Term) -> u64 {
        let mut hasher = DefaultHasher::new();
        term.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn drops_duplicate_factors() {
        let term = Term::new([f("a"), f("b"), f("a")]);
        assert_eq!(term.factors(), &[f("a"), f("b")]);
    }

    #[test]
    fn equality_ignores_factor_order() {
        let ab = Term::new([f("a"), f("b")]);
        let ba = Term::new([f("b"), f("a")]);
        assert_eq!(ab, ba);
        assert_eq!(hash_of(&ab), hash_of(&ba));
        assert_ne!(ab, Term::new([f("a")]));
        assert_ne!(ab, Term::new([f("a"), f("b"), f("c")]));

        let set: HashSet<Term> = [ab, ba].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn names_follow_construction_order() {
        assert_eq!(Term::new([f("a"), f("b")]).name(), "a:b");
        assert_eq!(Term::new([f("b"), f("a")]).name(), "b:a");
        assert_eq!(INTERCEPT.name(), "Intercept");
        assert!(Term::new(Vec::<AnyFactor>::new()).is_intercept());
    }

    #[test]
    fn interaction_concatenates_factors() {
        let left = Term::new([f("a"), f("b")]);
        let right = Term::new([f("b"), f("c")]);
        assert_eq!(left.interact(&right).name(), "a:b:c");
        assert_eq!(left.interact(&INTERCEPT), left);
    }
}
