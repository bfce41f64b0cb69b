//! Reader for the line-oriented output of `afl-showmap`: one `tuple:count` line
//! per edge the seed exercised.

use std::io::BufRead;

use super::{CoverageReader, CoverageRecord, ElementKey};
use crate::error::{MinimizeError, MinimizeResult};

pub struct ShowmapReader;

impl CoverageReader for ShowmapReader {
    fn read_coverage(&self, input: &mut dyn BufRead) -> MinimizeResult<Vec<CoverageRecord>> {
        let mut records = Vec::new();
        for (index, line) in input.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                return Err(MinimizeError::parse(index + 1, "empty line, expected `tuple:count`"));
            }
            if let Some(record) = parse_tuple(index + 1, line)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn format_name(&self) -> &'static str {
        "afl-showmap"
    }
}

/// Parses a single `tuple:count` line. Returns `None` for a zero count, which
/// `afl-showmap` never writes but which would mean the edge was not observed.
fn parse_tuple(line_number: usize, line: &str) -> MinimizeResult<Option<CoverageRecord>> {
    let (tuple, count) = line.split_once(':').ok_or_else(|| {
        MinimizeError::parse(line_number, format!("expected `tuple:count`, got `{line}`"))
    })?;
    let tuple: u32 = tuple.trim().parse().map_err(|err| {
        MinimizeError::parse(line_number, format!("invalid tuple id `{tuple}`: {err}"))
    })?;
    let count: u32 = count.trim().parse().map_err(|err| {
        MinimizeError::parse(line_number, format!("invalid hit count `{count}`: {err}"))
    })?;
    if count == 0 {
        log::trace!("Dropping zero-count tuple {tuple} on line {line_number}");
        return Ok(None);
    }
    Ok(Some(CoverageRecord::new(
        ElementKey::Edge(tuple),
        u64::from(count),
    )))
}

#[cfg(test)]
mod tests {
    use super::ShowmapReader;
    use crate::{
        coverage_readers::{CoverageReader, CoverageRecord, ElementKey},
        error::MinimizeError,
    };

    fn read(text: &str) -> Result<Vec<CoverageRecord>, MinimizeError> {
        ShowmapReader.read_coverage(&mut text.as_bytes())
    }

    #[test]
    fn reads_tuples_in_order() {
        let records = read("000005:3\n001234:1\n000002:8\n").unwrap();
        assert_eq!(
            records,
            vec![
                CoverageRecord::new(ElementKey::Edge(5), 3),
                CoverageRecord::new(ElementKey::Edge(1234), 1),
                CoverageRecord::new(ElementKey::Edge(2), 8),
            ]
        );
    }

    #[test]
    fn empty_input_is_empty_coverage() {
        assert!(read("").unwrap().is_empty());
    }

    #[test]
    fn tolerates_crlf_and_missing_final_newline() {
        let records = read("7:2\r\n9:1").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], CoverageRecord::new(ElementKey::Edge(9), 1));
    }

    #[test]
    fn zero_counts_are_dropped() {
        let records = read("1:0\n2:1\n").unwrap();
        assert_eq!(records, vec![CoverageRecord::new(ElementKey::Edge(2), 1)]);
    }

    #[test]
    fn missing_delimiter_is_a_parse_error() {
        match read("1:1\n12345\n") {
            Err(MinimizeError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn blank_lines_are_parse_errors() {
        match read("1:1\n\n   \n2:1\n") {
            Err(MinimizeError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_fields_are_parse_errors() {
        assert!(matches!(read("abc:1\n"), Err(MinimizeError::Parse { line: 1, .. })));
        assert!(matches!(read("1:many\n"), Err(MinimizeError::Parse { line: 1, .. })));
        assert!(matches!(read("-1:1\n"), Err(MinimizeError::Parse { line: 1, .. })));
    }
}
