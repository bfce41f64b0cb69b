//! Helper functions for loading a corpus of coverage artifacts from disk. The
//! corpus directory holds one coverage file per seed, named after the seed.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::{
    coverage_readers::{CoverageReader, CoverageRecord},
    encoder::{CoverageEncoder, ElementDerivation},
    weights::WeightTable,
};

/// Lists the regular files in `corpus_dir`, sorted by name. The order fixes the
/// literal of every seed, so it must not depend on the file system.
pub fn seed_files(corpus_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(corpus_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() > 0 => {
                log::debug!("Skipping unreadable entry: {err}");
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Unable to open corpus directory {}", corpus_dir.display())
                });
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        } else {
            log::debug!("Skipping non-regular entry {}", entry.path().display());
        }
    }
    Ok(files)
}

/// Reads the coverage artifact of a single seed
pub fn read_seed_coverage(reader: &dyn CoverageReader, path: &Path) -> Result<Vec<CoverageRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open coverage file {}", path.display()))?;
    reader
        .read_coverage(&mut BufReader::new(file))
        .with_context(|| {
            format!(
                "Failed to read {} coverage from {}",
                reader.format_name(),
                path.display()
            )
        })
}

/// Options for scanning a corpus
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub derivation: ElementDerivation,
    /// Worker threads for reading coverage files; 0 lets rayon decide
    pub jobs: usize,
    pub show_progress: bool,
}

/// Reads every seed of the corpus and accumulates its coverage into an encoder.
///
/// Coverage files are parsed in parallel, then merged one seed at a time in
/// file-name order, so literal assignment is the same for every run.
pub fn encode_corpus(
    corpus_dir: &Path,
    reader: &dyn CoverageReader,
    weights: &WeightTable,
    options: ScanOptions,
) -> Result<CoverageEncoder> {
    log::info!("Reading coverage in `{}`", corpus_dir.display());
    let start = Instant::now();

    let files = seed_files(corpus_dir)?;
    let progress = progress_bar(files.len(), "Reading seed coverage", options.show_progress)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()
        .context("Could not start the coverage reader threads")?;
    let coverage: Vec<Vec<CoverageRecord>> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let records = read_seed_coverage(reader, path);
                progress.inc(1);
                records
            })
            .collect::<Result<_>>()
    })?;
    progress.finish_and_clear();

    let mut encoder = CoverageEncoder::new(options.derivation);
    for (path, records) in files.iter().zip(&coverage) {
        let name = seed_name(path);
        let weight = weights.weight(&name);
        let literal = encoder.add_seed(name, weight, records);
        log::debug!("{} is literal {literal}", path.display());
    }

    log::info!(
        "Read {} seeds covering {} elements in {:.1?}",
        encoder.seeds().len(),
        encoder.index().len(),
        start.elapsed()
    );
    Ok(encoder)
}

fn seed_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

pub(crate) fn progress_bar(len: usize, message: &'static str, visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(len as u64).with_message(message);
    bar.set_style(ProgressStyle::with_template(
        "[*] {msg} [{bar:40}] {pos}/{len} ({elapsed})",
    )?);
    Ok(bar)
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, fs};

    use super::{ScanOptions, encode_corpus, seed_files};
    use crate::{
        coverage_readers::showmap::ShowmapReader,
        encoder::{CoverageElement, CoverageMode, ElementDerivation},
        weights::WeightTable,
    };

    fn options(mode: CoverageMode) -> ScanOptions {
        ScanOptions {
            derivation: ElementDerivation::new(mode, false),
            jobs: 2,
            show_progress: false,
        }
    }

    #[test]
    fn lists_regular_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b"), "").unwrap();
        fs::write(dir.path().join("a"), "").unwrap();
        fs::create_dir(dir.path().join("queue")).unwrap();
        fs::write(dir.path().join("queue").join("c"), "").unwrap();

        let names: Vec<_> = seed_files(dir.path())
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlinks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), "1:1\n").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("link")).unwrap();

        let files = seed_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a")]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(seed_files(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn encodes_a_corpus_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("seed3"), "1:1\n3:1\n").unwrap();
        fs::write(dir.path().join("seed1"), "1:1\n2:1\n").unwrap();
        fs::write(dir.path().join("seed2"), "2:1\n3:1\n").unwrap();
        let weights = WeightTable::from_reader("seed2,7\n".as_bytes()).unwrap();

        let encoder = encode_corpus(
            dir.path(),
            &ShowmapReader,
            &weights,
            options(CoverageMode::CoverageOnly),
        )
        .unwrap();
        let (seeds, index) = encoder.finish();

        let names: Vec<_> = seeds.iter().map(|seed| seed.name.as_str()).collect();
        assert_eq!(names, vec!["seed1", "seed2", "seed3"]);
        assert_eq!(seeds.iter().map(|seed| seed.weight).collect::<Vec<_>>(), vec![1, 7, 1]);
        let elements: BTreeSet<_> = index.iter().map(|(element, _)| *element).collect();
        assert_eq!(
            elements,
            BTreeSet::from([
                CoverageElement::Edge(1),
                CoverageElement::Edge(2),
                CoverageElement::Edge(3)
            ])
        );
    }

    #[test]
    fn frequency_elements_match_hand_derivation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("only"), "5:3\n").unwrap();
        let encoder = encode_corpus(
            dir.path(),
            &ShowmapReader,
            &WeightTable::default(),
            options(CoverageMode::Frequency),
        )
        .unwrap();
        let elements: Vec<_> = encoder.index().iter().map(|(element, _)| *element).collect();
        assert_eq!(
            elements,
            vec![
                CoverageElement::Edge(40),
                CoverageElement::Edge(41),
                CoverageElement::Edge(42)
            ]
        );
    }

    #[test]
    fn a_broken_seed_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good"), "1:1\n").unwrap();
        fs::write(dir.path().join("bad"), "garbage\n").unwrap();
        let err = encode_corpus(
            dir.path(),
            &ShowmapReader,
            &WeightTable::default(),
            options(CoverageMode::Frequency),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("bad"));
    }
}
