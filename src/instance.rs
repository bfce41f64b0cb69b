//! Builds the weighted minimum set-cover instance from a coverage index.
//!
//! Every coverage element becomes a hard clause "at least one of its coverers is
//! selected", and every seed a soft unit clause "this seed is not selected" whose
//! violation costs the seed's weight. Minimizing the violated soft weight is then
//! the same as minimizing the total weight of the selected cover.

use std::collections::BTreeSet;

use crate::{
    encoder::CoverageIndex,
    error::{MinimizeError, MinimizeResult},
    seeds::{Literal, SeedTable},
    weights::WeightTable,
};

/// A disjunction of positive seed literals, sorted and free of duplicates
pub type Clause = Vec<Literal>;

/// "Do not select `literal`", violated at a cost of `weight`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftClause {
    pub literal: Literal,
    pub weight: u64,
}

/// A weighted partial MaxSAT instance, independent of any solver format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub num_vars: usize,
    /// Deduplicated hard clauses, each weighted `top`
    pub hard: BTreeSet<Clause>,
    /// One soft clause per seed, in literal order
    pub soft: Vec<SoftClause>,
    pub top: u64,
}

impl Instance {
    /// Builds the instance. Fails only if the weights overflow while computing top.
    pub fn build(
        seeds: &SeedTable,
        index: &CoverageIndex,
        weights: &WeightTable,
    ) -> MinimizeResult<Self> {
        let top = compute_top(weights)?;

        let mut hard = BTreeSet::new();
        for (element, coverers) in index.iter() {
            if coverers.is_empty() {
                log::debug!("Skipping {element:?}, which no seed covers");
                continue;
            }
            hard.insert(coverers.iter().copied().collect::<Clause>());
        }
        log::debug!(
            "{} coverage elements collapsed into {} distinct hard clauses",
            index.len(),
            hard.len()
        );

        let soft = seeds
            .iter()
            .map(|seed| SoftClause {
                literal: seed.literal,
                weight: seed.weight,
            })
            .collect();

        Ok(Self {
            num_vars: seeds.len(),
            hard,
            soft,
            top,
        })
    }

    /// Total number of clauses, hard and soft
    pub fn num_clauses(&self) -> usize {
        self.hard.len() + self.soft.len()
    }

    /// The cost of selecting exactly the given literals
    pub fn cost(&self, selected: &BTreeSet<Literal>) -> u64 {
        self.soft
            .iter()
            .filter(|clause| selected.contains(&clause.literal))
            .map(|clause| clause.weight)
            .sum()
    }

    /// Whether selecting exactly the given literals satisfies every hard clause
    pub fn is_cover(&self, selected: &BTreeSet<Literal>) -> bool {
        self.hard
            .iter()
            .all(|clause| clause.iter().any(|literal| selected.contains(literal)))
    }
}

/// Computes the weight of hard clauses. It is one more than the sum of all
/// explicit weights, or 2 without a weight table so that the implicit unit weights
/// stay below it. Overflow is an error and never wraps.
pub fn compute_top(weights: &WeightTable) -> MinimizeResult<u64> {
    if weights.is_empty() {
        return Ok(2);
    }
    weights.iter().try_fold(1u64, |top, (_, weight)| {
        top.checked_add(weight).ok_or(MinimizeError::TopOverflow {
            entries: weights.len(),
        })
    })
}
