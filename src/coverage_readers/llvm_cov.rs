//! Reader for the JSON coverage report produced by `llvm-cov export`. The report
//! nests its regions as `data[0].functions[*].regions[*]`, and each region is an
//! array `[lineStart, colStart, lineEnd, colEnd, count, fileId, expandedFileId, kind]`
//! (see `renderRegion` in LLVM's `CoverageExporterJson.cpp`).

use std::io::BufRead;

use serde::Deserialize;

use super::{CoverageReader, CoverageRecord, ElementKey};
use crate::error::{MinimizeError, MinimizeResult};

/// Number of leading fields of a region array we rely on. Newer LLVM versions
/// may append more, which are ignored.
const REGION_FIELDS: usize = 8;

/// Mirrors `CounterMappingRegion::RegionKind` from LLVM's coverage mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionKind {
    Code,
    Expansion,
    Skipped,
    Gap,
    Other(u32),
}

impl From<u32> for RegionKind {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Code,
            1 => Self::Expansion,
            2 => Self::Skipped,
            3 => Self::Gap,
            other => Self::Other(other),
        }
    }
}

/// Position and identity of a code region. The execution count is kept in
/// [`CoverageRecord::hit_count`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Region {
    pub line_start: u32,
    pub column_start: u32,
    pub line_end: u32,
    pub column_end: u32,
    pub file_id: u32,
    pub expanded_file_id: u32,
    pub kind: RegionKind,
}

#[derive(Deserialize)]
struct Export {
    data: Vec<ExportData>,
}

#[derive(Deserialize)]
struct ExportData {
    #[serde(default)]
    functions: Vec<Function>,
}

#[derive(Deserialize)]
struct Function {
    #[serde(default)]
    regions: Vec<Vec<u64>>,
}

pub struct LlvmCovReader;

impl CoverageReader for LlvmCovReader {
    fn read_coverage(&self, input: &mut dyn BufRead) -> MinimizeResult<Vec<CoverageRecord>> {
        let export: Export = serde_json::from_reader(input)?;
        let [data] = export.data.as_slice() else {
            return Err(MinimizeError::schema(format!(
                "expected exactly one `data` entry, found {}",
                export.data.len()
            )));
        };

        let mut records = Vec::new();
        for function in &data.functions {
            for fields in &function.regions {
                let (region, count) = parse_region(fields)?;
                if count > 0 && region.kind == RegionKind::Code {
                    records.push(CoverageRecord::new(ElementKey::Region(region), count));
                }
            }
        }
        Ok(records)
    }

    fn format_name(&self) -> &'static str {
        "llvm-cov"
    }
}

fn parse_region(fields: &[u64]) -> MinimizeResult<(Region, u64)> {
    if fields.len() < REGION_FIELDS {
        return Err(MinimizeError::schema(format!(
            "region record has {} fields, expected at least {REGION_FIELDS}",
            fields.len()
        )));
    }
    let narrow = |index: usize| {
        u32::try_from(fields[index]).map_err(|_| {
            MinimizeError::schema(format!(
                "region field {index} does not fit in 32 bits: {}",
                fields[index]
            ))
        })
    };
    let region = Region {
        line_start: narrow(0)?,
        column_start: narrow(1)?,
        line_end: narrow(2)?,
        column_end: narrow(3)?,
        file_id: narrow(5)?,
        expanded_file_id: narrow(6)?,
        kind: RegionKind::from(narrow(7)?),
    };
    Ok((region, fields[4]))
}
