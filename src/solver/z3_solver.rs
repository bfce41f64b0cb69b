//! Solves a minimization instance with z3's MaxSAT engine (`Optimize`).
//!
//! Each seed becomes a boolean constant. Hard clauses are plain assertions; soft
//! clauses are `not seed` with the seed's weight, so the optimizer maximizes the
//! weight of unselected seeds, which minimizes the weight of the selected ones.

use std::{
    collections::BTreeSet,
    fs::File,
    io::Write,
    path::PathBuf,
    time::{Duration, Instant},
};

use z3::{Optimize, Params, SatResult, ast::Bool};

use super::{CoverSolver, Solution};
use crate::{
    error::{MinimizeError, MinimizeResult},
    instance::Instance,
    seeds::{Literal, SeedTable},
};

#[derive(Debug, Default, Clone)]
pub struct Z3CoverSolver {
    /// Give up after this long. Without it, `solve` may run indefinitely.
    timeout: Option<Duration>,
    /// Where to dump the problem as SMT-LIB2 before solving
    smt_output: Option<PathBuf>,
}

impl Z3CoverSolver {
    pub fn new(timeout: Option<Duration>, smt_output: Option<PathBuf>) -> Self {
        Self {
            timeout,
            smt_output,
        }
    }

    fn dump_smt(&self, optimizer: &Optimize) -> MinimizeResult<()> {
        if let Some(path) = &self.smt_output {
            log::info!("Writing SMT2 to `{}`", path.display());
            let mut file = File::create(path)?;
            write!(file, "{optimizer}")?;
        }
        Ok(())
    }
}

impl CoverSolver for Z3CoverSolver {
    fn solve(&mut self, instance: &Instance, seeds: &SeedTable) -> MinimizeResult<Solution> {
        let optimizer = Optimize::new();
        if let Some(timeout) = self.timeout {
            let mut params = Params::new();
            params.set_u32(
                "timeout",
                u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX),
            );
            optimizer.set_params(&params);
        }

        // Names are prefixed with the literal, as z3 merges constants of the same name.
        let variables: Vec<Bool> = (1..=instance.num_vars)
            .map(|value| {
                let name = Literal::new(value)
                    .and_then(|literal| seeds.get(literal))
                    .map_or_else(String::new, |seed| seed.name.clone());
                Bool::new_const(format!("{value}:{name}"))
            })
            .collect();
        let variable = |literal: &Literal| &variables[literal.get() - 1];

        // At least one seed for each coverage element
        for clause in &instance.hard {
            let disjunction = clause
                .iter()
                .map(|literal| variable(literal).clone())
                .reduce(|d1, d2| d1 | d2)
                .unwrap_or_else(|| Bool::from_bool(false));
            optimizer.assert(&disjunction);
        }
        // Selecting a seed violates its soft clause, costing its weight
        for soft in &instance.soft {
            optimizer.assert_soft(&!variable(&soft.literal), soft.weight, None);
        }

        self.dump_smt(&optimizer)?;

        log::info!(
            "Solving {} hard and {} soft constraints",
            instance.hard.len(),
            instance.soft.len()
        );
        let start = Instant::now();
        let result = optimizer.check(&[]);
        log::info!("Solver finished after {:.1?}", start.elapsed());

        match result {
            SatResult::Sat => {
                let model = optimizer.get_model().ok_or_else(|| {
                    MinimizeError::SolverUnknown("satisfiable, but no model available".into())
                })?;
                let selected: BTreeSet<Literal> = variables
                    .iter()
                    .enumerate()
                    .filter(|(_, variable)| {
                        model
                            .eval(*variable, true)
                            .and_then(|value| value.as_bool())
                            .unwrap_or(false)
                    })
                    .filter_map(|(index, _)| Literal::new(index + 1))
                    .collect();
                Ok(Solution::new(instance, selected))
            }
            SatResult::Unsat => Err(MinimizeError::NoCover),
            SatResult::Unknown => Err(MinimizeError::SolverUnknown(match self.timeout {
                Some(timeout) => format!("no optimum within the timeout of {timeout:?}"),
                None => "no optimum found".to_owned(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::Z3CoverSolver;
    use crate::{
        error::MinimizeError,
        instance::Instance,
        seeds::{Literal, SeedTable},
        solver::{
            CoverSolver,
            tests::{ExhaustiveSolver, corpus_instance},
        },
        weights::WeightTable,
    };

    #[test]
    fn finds_an_optimal_cover() {
        let (seeds, instance) = corpus_instance(
            &[("seed1", &[1, 2]), ("seed2", &[2, 3]), ("seed3", &[1, 3])],
            &WeightTable::default(),
        );
        let solution = Z3CoverSolver::default().solve(&instance, &seeds).unwrap();
        assert_eq!(solution.selected.len(), 2);
        assert!(instance.is_cover(&solution.selected));
    }

    #[test]
    fn agrees_with_exhaustive_search_on_cost() {
        let weights: WeightTable = [
            ("a".to_owned(), 4),
            ("b".to_owned(), 2),
            ("c".to_owned(), 3),
            ("d".to_owned(), 1),
        ]
        .into_iter()
        .collect();
        let (seeds, instance) = corpus_instance(
            &[
                ("a", &[1, 2, 3, 4]),
                ("b", &[1, 2]),
                ("c", &[3, 4, 5]),
                ("d", &[5]),
                ("e", &[2, 3]),
            ],
            &weights,
        );
        let z3 = Z3CoverSolver::default().solve(&instance, &seeds).unwrap();
        let exhaustive = ExhaustiveSolver.solve(&instance, &seeds).unwrap();
        assert_eq!(z3.cost, exhaustive.cost);
        assert!(instance.is_cover(&z3.selected));
    }

    #[test]
    fn unit_clause_forces_selection() {
        let mut seeds = SeedTable::new();
        seeds.push("lonely".to_owned(), 1);
        let instance = Instance {
            num_vars: 1,
            hard: BTreeSet::from([vec![Literal::new(1).unwrap()]]),
            soft: Vec::new(),
            top: 2,
        };
        let solution = Z3CoverSolver::default().solve(&instance, &seeds).unwrap();
        assert_eq!(solution.selected.len(), 1);
    }

    #[test]
    fn clause_without_coverers_has_no_cover() {
        let instance = Instance {
            num_vars: 0,
            hard: BTreeSet::from([Vec::new()]),
            soft: Vec::new(),
            top: 2,
        };
        assert!(matches!(
            Z3CoverSolver::default().solve(&instance, &SeedTable::new()),
            Err(MinimizeError::NoCover)
        ));
    }

    #[test]
    fn writes_smt_dump() {
        let dir = tempfile::tempdir().unwrap();
        let smt = dir.path().join("problem.smt2");
        let (seeds, instance) =
            corpus_instance(&[("a", &[1]), ("b", &[1, 2])], &WeightTable::default());
        Z3CoverSolver::new(None, Some(smt.clone()))
            .solve(&instance, &seeds)
            .unwrap();
        let dump = std::fs::read_to_string(smt).unwrap();
        assert!(dump.contains("assert-soft"));
    }
}
