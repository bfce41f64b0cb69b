//! Seeds and the literals that stand for them in the optimization problem.

use std::fmt;

/// The boolean decision variable "this seed is selected". Literals are positive
/// and handed out consecutively from 1, in the order seeds are first seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal(usize);

impl Literal {
    /// Returns `None` for zero, which is not a valid literal (it terminates
    /// clauses in DIMACS-style formats).
    pub fn new(value: usize) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One corpus input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub name: String,
    pub literal: Literal,
    pub weight: u64,
}

/// All seeds of a corpus, indexed by literal. Only grows by [`SeedTable::push`],
/// so a literal is never reassigned.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedTable {
    seeds: Vec<Seed>,
}

impl SeedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a seed and assigns it the next unused literal.
    pub fn push(&mut self, name: String, weight: u64) -> Literal {
        let literal = Literal(self.seeds.len() + 1);
        self.seeds.push(Seed {
            name,
            literal,
            weight,
        });
        literal
    }

    pub fn get(&self, literal: Literal) -> Option<&Seed> {
        self.seeds.get(literal.0 - 1)
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// Iterates over the seeds in literal order
    pub fn iter(&self) -> std::slice::Iter<'_, Seed> {
        self.seeds.iter()
    }
}

impl<'a> IntoIterator for &'a SeedTable {
    type Item = &'a Seed;
    type IntoIter = std::slice::Iter<'a, Seed>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
