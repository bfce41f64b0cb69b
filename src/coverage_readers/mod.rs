//! Collection of coverage readers. Each coverage artifact format needs its own reader.
//! The formats are tied to the instrumentation that produced them: AFL's `afl-showmap`
//! writes one `tuple:count` line per edge, while `llvm-cov export` writes a JSON report
//! listing code regions. Every reader turns one seed's artifact into the same uniform
//! sequence of [`CoverageRecord`]s so the encoder does not care where they came from.

use std::io::BufRead;

use crate::{configuration::CoverageFormat, error::MinimizeResult};

pub mod llvm_cov;
pub mod showmap;

pub use llvm_cov::{Region, RegionKind};

/// Identifies the thing a coverage record talks about, before any hit-count
/// bucketing is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementKey {
    /// An AFL tuple (edge) id
    Edge(u32),
    /// An llvm-cov code region, without its execution count
    Region(Region),
}

/// One (element, count) fact read from a seed's coverage artifact. Readers never
/// emit a record with a hit count of zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageRecord {
    pub key: ElementKey,
    pub hit_count: u64,
}

impl CoverageRecord {
    pub fn new(key: ElementKey, hit_count: u64) -> Self {
        Self { key, hit_count }
    }
}

/// A CoverageReader parses the coverage artifact of a single seed. Readers are
/// stateless, so one reader is shared by all worker threads scanning a corpus.
pub trait CoverageReader: Send + Sync {
    /// Reads all coverage records from the given stream, in the order they appear.
    fn read_coverage(&self, input: &mut dyn BufRead) -> MinimizeResult<Vec<CoverageRecord>>;

    /// Human readable name of the format, used in log messages.
    fn format_name(&self) -> &'static str;
}

/// Produces a coverage reader corresponding to the given format
pub fn get_coverage_reader(format: CoverageFormat) -> Box<dyn CoverageReader> {
    match format {
        CoverageFormat::AflShowmap => Box::new(showmap::ShowmapReader),
        CoverageFormat::LlvmCov => Box::new(llvm_cov::LlvmCovReader),
    }
}
