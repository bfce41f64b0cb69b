//! The end-to-end minimization tasks: read a corpus, build the weighted set-cover
//! instance, then either write it out as WCNF or solve it. Decoding the answer
//! of an external solver lives here too, since it closes the WCNF round trip.

use std::{fs::File, io::BufReader, path::Path, time::Instant};

use anyhow::{Context, Result};

use crate::{
    configuration::{Configuration, Task},
    corpus::{ScanOptions, encode_corpus},
    coverage_readers::get_coverage_reader,
    decode::{parse_solver_output, read_legend},
    encoder::ElementDerivation,
    instance::Instance,
    report::SelectionReport,
    seeds::SeedTable,
    solver::{CoverSolver, z3_solver::Z3CoverSolver},
    wcnf::write_wcnf_file,
    weights::WeightTable,
};

/// Runs the configured task. Tasks that select seeds return a report for stdout.
pub fn run(config: &Configuration) -> Result<Option<SelectionReport>> {
    match &config.task {
        Task::Wcnf { corpus_dir, output } => {
            write_instance(config, corpus_dir, output)?;
            Ok(None)
        }
        Task::Solve {
            corpus_dir,
            smt_output,
            solver_timeout,
        } => {
            let mut solver = Z3CoverSolver::new(*solver_timeout, smt_output.clone());
            solve_corpus(config, corpus_dir, &mut solver).map(Some)
        }
        Task::Decode {
            wcnf,
            solver_output,
        } => decode_solution(wcnf, solver_output).map(Some),
    }
}

/// Reads the corpus and builds its instance
pub fn build_instance(config: &Configuration, corpus_dir: &Path) -> Result<(SeedTable, Instance)> {
    let weights = match &config.weights {
        Some(path) => {
            let weights = WeightTable::from_file(path)?;
            log::info!("Read {} weights from `{}`", weights.len(), path.display());
            weights
        }
        None => WeightTable::default(),
    };

    let reader = get_coverage_reader(config.coverage_format);
    let options = ScanOptions {
        derivation: ElementDerivation::new(config.coverage_mode, config.clamp_hit_counts),
        jobs: config.jobs,
        show_progress: config.progress,
    };
    let (seeds, index) = encode_corpus(corpus_dir, reader.as_ref(), &weights, options)?.finish();

    log::info!("Creating constraints");
    let start = Instant::now();
    let instance = Instance::build(&seeds, &index, &weights)?;
    log::info!(
        "Created {} hard and {} soft constraints (top {}) in {:.1?}",
        instance.hard.len(),
        instance.soft.len(),
        instance.top,
        start.elapsed()
    );
    Ok((seeds, instance))
}

/// Builds the instance of `corpus_dir` and writes it to `output` in WCNF
pub fn write_instance(config: &Configuration, corpus_dir: &Path, output: &Path) -> Result<()> {
    let (seeds, instance) = build_instance(config, corpus_dir)?;

    log::info!("Writing WCNF to `{}`", output.display());
    let start = Instant::now();
    write_wcnf_file(output, corpus_dir, &seeds, &instance)?;
    log::info!("Wrote WCNF in {:.1?}", start.elapsed());
    Ok(())
}

/// Builds the instance of `corpus_dir` and solves it with `solver`
pub fn solve_corpus(
    config: &Configuration,
    corpus_dir: &Path,
    solver: &mut impl CoverSolver,
) -> Result<SelectionReport> {
    let (seeds, instance) = build_instance(config, corpus_dir)?;

    let solution = solver.solve(&instance, &seeds)?;
    log::info!(
        "Selected {} of {} seeds at a total weight of {}",
        solution.selected.len(),
        seeds.len(),
        solution.cost
    );

    let names = solution
        .selected
        .iter()
        .filter_map(|literal| seeds.get(*literal))
        .map(|seed| seed.name.clone())
        .collect();
    Ok(SelectionReport::new(names, seeds.len()))
}

/// Maps the output of an external MaxSAT solver, run on a WCNF file written by
/// [`write_instance`], back to seed names
pub fn decode_solution(wcnf: &Path, solver_output: &Path) -> Result<SelectionReport> {
    let file =
        File::open(wcnf).with_context(|| format!("Failed to open WCNF file {}", wcnf.display()))?;
    let legend = read_legend(BufReader::new(file))
        .with_context(|| format!("Failed to read the seed legend of {}", wcnf.display()))?;
    let num_vars = legend.last_key_value().map_or(0, |(literal, _)| literal.get());

    let file = File::open(solver_output).with_context(|| {
        format!("Failed to open solver output {}", solver_output.display())
    })?;
    let selected = parse_solver_output(BufReader::new(file), num_vars)
        .with_context(|| format!("Failed to decode solver output {}", solver_output.display()))?;

    let mut names = Vec::with_capacity(selected.len());
    for literal in &selected {
        match legend.get(literal) {
            Some(name) => names.push(name.clone()),
            None => log::warn!("Literal {literal} is not in the legend of {}", wcnf.display()),
        }
    }
    Ok(SelectionReport::new(names, legend.len()))
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use super::{decode_solution, solve_corpus, write_instance};
    use crate::{
        configuration::{Configuration, CoverageFormat, OutputFormat, Task},
        encoder::CoverageMode,
        error::MinimizeError,
        solver::tests::ExhaustiveSolver,
    };

    fn config(corpus_dir: &Path, weights: Option<&Path>, mode: CoverageMode) -> Configuration {
        Configuration {
            task: Task::Solve {
                corpus_dir: corpus_dir.to_path_buf(),
                smt_output: None,
                solver_timeout: None,
            },
            coverage_format: CoverageFormat::AflShowmap,
            coverage_mode: mode,
            clamp_hit_counts: false,
            weights: weights.map(Path::to_path_buf),
            progress: false,
            jobs: 1,
            output_format: OutputFormat::HumanReadable,
            log_level: log::LevelFilter::Off,
            ignored_options: Vec::new(),
        }
    }

    fn write_corpus(dir: &Path, seeds: &[(&str, &str)]) {
        for (name, coverage) in seeds {
            fs::write(dir.join(name), coverage).unwrap();
        }
    }

    #[test]
    fn solves_the_three_seed_corpus() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(
            dir.path(),
            &[("seed1", "1:1\n2:1\n"), ("seed2", "2:1\n3:1\n"), ("seed3", "1:1\n3:1\n")],
        );
        let config = config(dir.path(), None, CoverageMode::CoverageOnly);
        let report = solve_corpus(&config, dir.path(), &mut ExhaustiveSolver).unwrap();
        assert_eq!(report.selected, 2);
        assert_eq!(report.total, 3);
    }

    #[test]
    fn weights_steer_the_selection() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("queue");
        fs::create_dir(&corpus).unwrap();
        write_corpus(
            &corpus,
            &[("seed1", "1:1\n2:1\n"), ("seed2", "2:1\n3:1\n"), ("seed3", "1:1\n3:1\n")],
        );
        let weights = dir.path().join("weights.csv");
        fs::write(&weights, "seed1,10\n").unwrap();

        let config = config(&corpus, Some(&weights), CoverageMode::CoverageOnly);
        let report = solve_corpus(&config, &corpus, &mut ExhaustiveSolver).unwrap();
        assert_eq!(report.seeds, vec!["seed2", "seed3"]);
    }

    #[test]
    fn hit_counts_keep_the_busier_seed() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path(), &[("low", "5:2\n"), ("high", "5:4\n")]);

        let frequency = config(dir.path(), None, CoverageMode::Frequency);
        let report = solve_corpus(&frequency, dir.path(), &mut ExhaustiveSolver).unwrap();
        assert_eq!(report.seeds, vec!["high"]);

        let coverage_only = config(dir.path(), None, CoverageMode::CoverageOnly);
        let report = solve_corpus(&coverage_only, dir.path(), &mut ExhaustiveSolver).unwrap();
        assert_eq!(report.selected, 1);
    }

    #[test]
    fn empty_corpus_selects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), None, CoverageMode::Frequency);
        let report = solve_corpus(&config, dir.path(), &mut ExhaustiveSolver).unwrap();
        assert_eq!(report.selected, 0);
        assert_eq!(report.total, 0);
    }

    #[test]
    fn overflowing_weights_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("queue");
        fs::create_dir(&corpus).unwrap();
        write_corpus(&corpus, &[("a", "1:1\n")]);
        let weights = dir.path().join("weights.csv");
        fs::write(&weights, format!("a,{}\nb,{}\n", u64::MAX, u64::MAX)).unwrap();

        let config = config(&corpus, Some(&weights), CoverageMode::Frequency);
        let err = solve_corpus(&config, &corpus, &mut ExhaustiveSolver).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MinimizeError>(),
            Some(MinimizeError::TopOverflow { .. })
        ));
    }

    #[test]
    fn wcnf_round_trip_through_decode() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("queue");
        fs::create_dir(&corpus).unwrap();
        write_corpus(
            &corpus,
            &[("seed1", "1:1\n2:1\n"), ("seed2", "2:1\n3:1\n"), ("seed3", "1:1\n3:1\n")],
        );
        let wcnf = dir.path().join("corpus.wcnf");
        let config = config(&corpus, None, CoverageMode::CoverageOnly);
        write_instance(&config, &corpus, &wcnf).unwrap();

        let written = fs::read_to_string(&wcnf).unwrap();
        assert!(written.contains("c 2 : seed2\n"));
        assert!(written.contains("p wcnf 3 6 2\n"));

        let solver_output = dir.path().join("solver.out");
        fs::write(&solver_output, "o 2\ns OPTIMUM FOUND\nv -1 2 3\n").unwrap();
        let report = decode_solution(&wcnf, &solver_output).unwrap();
        assert_eq!(report.seeds, vec!["seed2", "seed3"]);
        assert_eq!(report.total, 3);
    }
}
