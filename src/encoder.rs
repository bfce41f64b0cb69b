//! The coverage encoder turns per-seed coverage records into the coverage index:
//! the mapping from every solver-visible coverage element to the seeds that
//! produce it. It also owns the corpus-wide literal assignment, so it is the single
//! writer of both; readers can run in parallel and hand their records over here.

use std::collections::{BTreeMap, BTreeSet, btree_map};

use crate::{
    coverage_readers::{CoverageRecord, ElementKey, Region},
    seeds::{Literal, SeedTable},
};

/// Width of the hit-count range reserved for each edge in frequency-sensitive
/// mode. Matches the number of hit-count classes `afl-showmap` reports.
pub const BUCKET_WIDTH: u64 = 8;

/// How coverage records are turned into coverage elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageMode {
    /// An edge hit `n` times yields `n` elements, so higher hit counts satisfy
    /// strictly more constraints. Regions are keyed together with their count.
    Frequency,
    /// Only whether an edge or region was reached matters.
    CoverageOnly,
}

/// An atomic fact about program behaviour that the chosen cover must preserve
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CoverageElement {
    /// An edge id, or in frequency-sensitive mode a bucketed `BUCKET_WIDTH * edge + i`
    Edge(u64),
    /// A region together with its count (1 for every reached region in
    /// coverage-only mode)
    Region { region: Region, count: u64 },
}

/// Derives coverage elements from coverage records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementDerivation {
    pub mode: CoverageMode,
    /// Clamp edge hit counts to [`BUCKET_WIDTH`] before bucketing. Without it, a
    /// count above the bucket width spills into the key range of the next edge.
    pub clamp_hit_counts: bool,
}

impl ElementDerivation {
    pub fn new(mode: CoverageMode, clamp_hit_counts: bool) -> Self {
        Self {
            mode,
            clamp_hit_counts,
        }
    }

    /// Calls `emit` for every element the record stands for.
    pub fn derive(&self, record: &CoverageRecord, mut emit: impl FnMut(CoverageElement)) {
        match (record.key, self.mode) {
            (ElementKey::Edge(edge), CoverageMode::CoverageOnly) => {
                emit(CoverageElement::Edge(u64::from(edge)))
            }
            (ElementKey::Edge(edge), CoverageMode::Frequency) => {
                let hits = if self.clamp_hit_counts {
                    record.hit_count.min(BUCKET_WIDTH)
                } else {
                    record.hit_count
                };
                let base = BUCKET_WIDTH * u64::from(edge);
                for bucket in 0..hits {
                    emit(CoverageElement::Edge(base + bucket));
                }
            }
            (ElementKey::Region(region), CoverageMode::Frequency) => {
                emit(CoverageElement::Region {
                    region,
                    count: record.hit_count,
                })
            }
            (ElementKey::Region(region), CoverageMode::CoverageOnly) => {
                emit(CoverageElement::Region {
                    region,
                    count: u64::from(record.hit_count > 0),
                })
            }
        }
    }
}

/// Maps each coverage element to the set of seed literals producing it. Both the
/// elements and each coverer set are kept ordered, so everything built from the
/// index iterates deterministically.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoverageIndex {
    elements: BTreeMap<CoverageElement, BTreeSet<Literal>>,
}

impl CoverageIndex {
    fn insert(&mut self, element: CoverageElement, literal: Literal) {
        self.elements.entry(element).or_default().insert(literal);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn coverers(&self, element: &CoverageElement) -> Option<&BTreeSet<Literal>> {
        self.elements.get(element)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, CoverageElement, BTreeSet<Literal>> {
        self.elements.iter()
    }
}

/// Accumulates the corpus one seed at a time.
#[derive(Debug)]
pub struct CoverageEncoder {
    derivation: ElementDerivation,
    seeds: SeedTable,
    index: CoverageIndex,
}

impl CoverageEncoder {
    pub fn new(derivation: ElementDerivation) -> Self {
        Self {
            derivation,
            seeds: SeedTable::new(),
            index: CoverageIndex::default(),
        }
    }

    /// Assigns the seed its literal and records every element its coverage
    /// derives to.
    pub fn add_seed(&mut self, name: String, weight: u64, records: &[CoverageRecord]) -> Literal {
        let literal = self.seeds.push(name, weight);
        for record in records {
            self.derivation
                .derive(record, |element| self.index.insert(element, literal));
        }
        log::trace!(
            "Seed {literal} contributed {} records, index now holds {} elements",
            records.len(),
            self.index.len()
        );
        literal
    }

    pub fn seeds(&self) -> &SeedTable {
        &self.seeds
    }

    pub fn index(&self) -> &CoverageIndex {
        &self.index
    }

    /// Hands out the seed table and the finished, read-only index.
    pub fn finish(self) -> (SeedTable, CoverageIndex) {
        (self.seeds, self.index)
    }
}
