//! The fact store that evaluation reads from and derives into.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::Fact;

/// An insertion-ordered set of facts, indexed by predicate name and arity.
///
/// Enumeration order is the order in which facts were first inserted, so
/// facts contributed by the same block stay together in diagnostics.
#[derive(Debug, Clone, Default)]
pub struct FactSet {
    facts: IndexSet<Fact>,
    index: HashMap<(String, usize), Vec<usize>>,
}

impl FactSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fact, returning `true` if it was not already present.
    pub fn insert(&mut self, fact: Fact) -> bool {
        let key = (fact.name().to_owned(), fact.arity());
        let (position, inserted) = self.facts.insert_full(fact);
        if inserted {
            self.index.entry(key).or_default().push(position);
        }
        inserted
    }

    /// Whether `fact` is present.
    #[must_use]
    pub fn contains(&self, fact: &Fact) -> bool {
        self.facts.contains(fact)
    }

    /// Number of distinct facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// All facts, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    /// Facts whose name and arity match, in insertion order.
    pub fn matching<'a>(&'a self, name: &str, arity: usize) -> impl Iterator<Item = &'a Fact> {
        self.index
            .get(&(name.to_owned(), arity))
            .into_iter()
            .flatten()
            .filter_map(|position| self.facts.get_index(*position))
    }
}

impl PartialEq for FactSet {
    fn eq(&self, other: &Self) -> bool {
        self.facts == other.facts
    }
}

impl Eq for FactSet {}

impl Extend<Fact> for FactSet {
    fn extend<T: IntoIterator<Item = Fact>>(&mut self, iter: T) {
        for fact in iter {
            self.insert(fact);
        }
    }
}

impl FromIterator<Fact> for FactSet {
    fn from_iter<T: IntoIterator<Item = Fact>>(iter: T) -> Self {
        let mut set = FactSet::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a FactSet {
    type Item = &'a Fact;
    type IntoIter = indexmap::set::Iter<'a, Fact>;

    fn into_iter(self) -> Self::IntoIter {
        self.facts.iter()
    }
}
