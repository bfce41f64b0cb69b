//! Direct solving of a minimization instance. The optimizer is an external
//! capability behind the [`CoverSolver`] trait: it receives an [`Instance`] and
//! either returns the cheapest selection satisfying every hard clause, or reports
//! that none exists.

use std::collections::BTreeSet;

use crate::{
    error::MinimizeResult,
    instance::Instance,
    seeds::{Literal, SeedTable},
};

pub mod z3_solver;

/// The seeds an optimizer selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub selected: BTreeSet<Literal>,
    /// Total weight of the selected seeds
    pub cost: u64,
}

impl Solution {
    pub fn new(instance: &Instance, selected: BTreeSet<Literal>) -> Self {
        let cost = instance.cost(&selected);
        Self { selected, cost }
    }
}

/// A weighted partial MaxSAT optimizer
pub trait CoverSolver {
    /// Solves `instance`. The seed table is only used to label variables in
    /// diagnostics. Fails with `NoCover` if the hard clauses are unsatisfiable.
    fn solve(&mut self, instance: &Instance, seeds: &SeedTable) -> MinimizeResult<Solution>;
}
