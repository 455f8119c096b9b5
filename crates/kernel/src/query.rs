//! Uniqueness-checked queries over world collections.
//!
//! A query names exactly one element. Zero matches and several matches are
//! distinct failures; there is deliberately no "first match" accessor.
//! Predicates must be pure, since domain iteration order is not part of the
//! contract.

use crate::error::{WorldError, WorldResult};

/// Outcome of a single-result query.
#[derive(Debug, Clone, PartialEq)]
pub enum Match<T> {
    Found(T),
    NotFound,
    /// Number of elements that satisfied the predicate.
    Ambiguous(usize),
}

impl<T> Match<T> {
    /// Classify every element of `candidates` as a match.
    pub fn from_candidates(candidates: impl IntoIterator<Item = T>) -> Self {
        let mut candidates = candidates.into_iter();
        let Some(first) = candidates.next() else {
            return Self::NotFound;
        };
        match candidates.count() {
            0 => Self::Found(first),
            rest => Self::Ambiguous(rest + 1),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Match<U> {
        match self {
            Self::Found(value) => Match::Found(f(value)),
            Self::NotFound => Match::NotFound,
            Self::Ambiguous(count) => Match::Ambiguous(count),
        }
    }

    pub fn into_result(self) -> WorldResult<T> {
        match self {
            Self::Found(value) => Ok(value),
            Self::NotFound => Err(WorldError::NoMatch),
            Self::Ambiguous(count) => Err(WorldError::AmbiguousMatch { count }),
        }
    }
}

/// The unique element of `domain` satisfying `predicate`.
///
/// ```
/// use kinetree_kernel::{the, WorldError};
///
/// assert_eq!(the([1, 2, 3], |x| *x == 2), Ok(2));
/// assert_eq!(the([1, 2, 3], |x| *x > 5), Err(WorldError::NoMatch));
/// assert_eq!(the([1, 2, 3], |x| *x > 1), Err(WorldError::AmbiguousMatch { count: 2 }));
/// ```
pub fn the<I, P>(domain: I, mut predicate: P) -> WorldResult<I::Item>
where
    I: IntoIterator,
    P: FnMut(&I::Item) -> bool,
{
    Match::from_candidates(domain.into_iter().filter(|item| predicate(item))).into_result()
}

/// The unique pair `(a, b)` from the product of two domains satisfying `predicate`.
pub fn the_pair<A, B, P>(first: A, second: B, mut predicate: P) -> WorldResult<(A::Item, B::Item)>
where
    A: IntoIterator,
    A::Item: Clone,
    B: IntoIterator,
    B::Item: Clone,
    P: FnMut(&A::Item, &B::Item) -> bool,
{
    let second: Vec<B::Item> = second.into_iter().collect();
    let mut candidates = Vec::new();
    for a in first {
        for b in &second {
            if predicate(&a, b) {
                candidates.push((a.clone(), b.clone()));
            }
        }
    }
    Match::from_candidates(candidates).into_result()
}

/// A domain narrowed by a conjunction of predicates.
pub struct Query<'p, T> {
    domain: Vec<T>,
    filters: Vec<Box<dyn Fn(&T) -> bool + 'p>>,
}

impl<'p, T> Query<'p, T> {
    pub fn over(domain: impl IntoIterator<Item = T>) -> Self {
        Self {
            domain: domain.into_iter().collect(),
            filters: Vec::new(),
        }
    }

    /// Add a predicate. All predicates must hold for an element to match.
    pub fn filter(mut self, predicate: impl Fn(&T) -> bool + 'p) -> Self {
        self.filters.push(Box::new(predicate));
        self
    }

    fn matches(&self, item: &T) -> bool {
        self.filters.iter().all(|f| f(item))
    }

    pub fn count(&self) -> usize {
        self.domain.iter().filter(|item| self.matches(item)).count()
    }

    pub fn evaluate(self) -> Match<T> {
        let Self { domain, filters } = self;
        Match::from_candidates(
            domain
                .into_iter()
                .filter(|item| filters.iter().all(|f| f(item))),
        )
    }

    pub fn the(self) -> WorldResult<T> {
        self.evaluate().into_result()
    }

    /// Every matching element, in domain order.
    pub fn all(self) -> Vec<T> {
        let Self { domain, filters } = self;
        domain
            .into_iter()
            .filter(|item| filters.iter().all(|f| f(item)))
            .collect()
    }
}
