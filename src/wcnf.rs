//! Serializes an instance as a weighted partial MaxSAT (WCNF) file for an
//! external solver. The format is DIMACS-like, see
//! <https://maxsat-evaluations.github.io/2020/rules.html#input>. A comment header maps
//! every literal back to its seed so solver output can be decoded later.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use itertools::Itertools;

use crate::{instance::Instance, seeds::SeedTable};

/// Writes the instance to `out`. Output only depends on the seed table and the
/// instance, so equal inputs give byte-identical files.
pub fn write_wcnf(
    out: &mut impl Write,
    corpus_dir: &Path,
    seeds: &SeedTable,
    instance: &Instance,
) -> io::Result<()> {
    writeln!(out, "c corpus dir: {}", corpus_dir.display())?;
    writeln!(out, "c")?;
    for seed in seeds {
        writeln!(out, "c {} : {}", seed.literal, seed.name)?;
    }
    writeln!(out, "c")?;
    writeln!(
        out,
        "p wcnf {} {} {}",
        instance.num_vars,
        instance.num_clauses(),
        instance.top
    )?;

    for clause in &instance.hard {
        writeln!(out, "{} {} 0", instance.top, clause.iter().format(" "))?;
    }
    for soft in &instance.soft {
        writeln!(out, "{} -{} 0", soft.weight, soft.literal)?;
    }
    Ok(())
}

/// Writes the instance to a file at `path`, replacing any existing file
pub fn write_wcnf_file(
    path: &Path,
    corpus_dir: &Path,
    seeds: &SeedTable,
    instance: &Instance,
) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create WCNF file {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_wcnf(&mut out, corpus_dir, seeds, instance)
        .and_then(|()| out.flush())
        .with_context(|| format!("Failed to write WCNF file {}", path.display()))
}
