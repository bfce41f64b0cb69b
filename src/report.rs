//! The summary printed after a successful minimization: how many seeds were
//! kept, what share of the corpus that is, and their names.

use std::fmt;

use serde::Serialize;

use crate::configuration::OutputFormat;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionReport {
    /// Number of selected seeds
    pub selected: usize,
    /// Number of seeds in the corpus
    pub total: usize,
    /// Share of the corpus retained, in percent
    pub percentage: f64,
    /// Names of the selected seeds, in literal order
    pub seeds: Vec<String>,
}

impl SelectionReport {
    pub fn new(seeds: Vec<String>, total: usize) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            seeds.len() as f64 / total as f64 * 100.0
        };
        Self {
            selected: seeds.len(),
            total,
            percentage,
            seeds,
        }
    }

    /// Renders the report in the configured format
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::HumanReadable => self.to_string(),
            OutputFormat::Json => format!("{}\n", serde_json::json!(self)),
        }
    }
}

impl fmt::Display for SelectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Num. seeds: {} ({:.2}%)",
            self.selected, self.percentage
        )?;
        writeln!(f)?;
        for seed in &self.seeds {
            writeln!(f, "{seed}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SelectionReport;
    use crate::configuration::OutputFormat;

    #[test]
    fn human_readable() {
        let report = SelectionReport::new(vec!["a".into(), "c".into()], 3);
        assert_eq!(
            report.render(OutputFormat::HumanReadable),
            "Num. seeds: 2 (66.67%)\n\na\nc\n"
        );
    }

    #[test]
    fn json() {
        let report = SelectionReport::new(vec!["a".into()], 4);
        let value: serde_json::Value =
            serde_json::from_str(&report.render(OutputFormat::Json)).unwrap();
        assert_eq!(value["selected"], 1);
        assert_eq!(value["total"], 4);
        assert_eq!(value["percentage"], 25.0);
        assert_eq!(value["seeds"][0], "a");
    }

    #[test]
    fn both_formats_end_with_a_newline() {
        let report = SelectionReport::new(vec!["a".into()], 2);
        assert!(report.render(OutputFormat::Json).ends_with("}\n"));
        assert!(report.render(OutputFormat::HumanReadable).ends_with("a\n"));
    }

    #[test]
    fn empty_corpus_retains_nothing() {
        let report = SelectionReport::new(Vec::new(), 0);
        assert_eq!(report.percentage, 0.0);
    }
}
