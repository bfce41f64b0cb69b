//! Seed weights. A weight table is a headerless CSV file with one `seed,weight`
//! line per seed; the seed is a file name in the corpus directory and the weight
//! a positive integer. Seeds missing from the table weigh 1.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::Context;
use indexmap::IndexMap;

use crate::error::{MinimizeError, MinimizeResult};

/// Weight of a seed that has no entry in the table
pub const DEFAULT_WEIGHT: u64 = 1;

/// Maps seed file names to their weight. Loaded once per run, read-only afterwards.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WeightTable {
    weights: IndexMap<String, u64>,
}

impl WeightTable {
    /// Loads a weight table from a CSV file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open weights file {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse weights file {}", path.display()))
    }

    pub fn from_reader(reader: impl BufRead) -> MinimizeResult<Self> {
        let mut weights = IndexMap::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                return Err(MinimizeError::parse(index + 1, "empty line, expected `seed,weight`"));
            }
            let (seed, weight) = parse_entry(index + 1, line)?;
            if weights.contains_key(seed) {
                log::warn!("Seed {seed} is weighted more than once; keeping the first weight");
                continue;
            }
            weights.insert(seed.to_owned(), weight);
        }
        Ok(Self { weights })
    }

    /// The weight of `seed`, or [`DEFAULT_WEIGHT`] if the table has no entry for it
    pub fn weight(&self, seed: &str) -> u64 {
        self.weights.get(seed).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Iterates over the explicit entries, in file order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.weights.iter().map(|(seed, weight)| (seed.as_str(), *weight))
    }
}

impl FromIterator<(String, u64)> for WeightTable {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut weights = IndexMap::new();
        for (seed, weight) in iter {
            weights.entry(seed).or_insert(weight);
        }
        Self { weights }
    }
}

fn parse_entry(line_number: usize, line: &str) -> MinimizeResult<(&str, u64)> {
    let mut columns = line.split(',');
    let (Some(seed), Some(weight), None) = (columns.next(), columns.next(), columns.next()) else {
        return Err(MinimizeError::parse(
            line_number,
            format!("expected `seed,weight`, got `{line}`"),
        ));
    };
    if seed.is_empty() {
        return Err(MinimizeError::parse(line_number, "empty seed name"));
    }
    let weight: u64 = weight.trim().parse().map_err(|err| {
        MinimizeError::parse(line_number, format!("invalid weight `{weight}` for {seed}: {err}"))
    })?;
    if weight == 0 {
        return Err(MinimizeError::parse(
            line_number,
            format!("weight of {seed} must be positive; omit the seed to use the default"),
        ));
    }
    Ok((seed, weight))
}
