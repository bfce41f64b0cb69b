//! Decodes the result of an external MaxSAT solver run on a WCNF file written by
//! this tool. The literal to seed mapping is recovered from the WCNF comment
//! header, and the solver's model lines are turned back into seed literals.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::BufRead,
};

use crate::{
    error::{MinimizeError, MinimizeResult},
    seeds::Literal,
};

/// Maps literals to the seed names listed in a WCNF header
pub type Legend = BTreeMap<Literal, String>;

/// Reads the `c <literal> : <seed>` comment lines of a WCNF file, up to the
/// `p wcnf` problem line. Other comments are ignored.
pub fn read_legend(reader: impl BufRead) -> MinimizeResult<Legend> {
    let mut legend = Legend::new();
    for line in reader.lines() {
        let line = line?;
        if line.starts_with("p wcnf ") {
            break;
        }
        let Some((literal, seed)) = line
            .strip_prefix("c ")
            .and_then(|comment| comment.split_once(" : "))
        else {
            continue;
        };
        if let Some(literal) = literal.parse().ok().and_then(Literal::new) {
            legend.insert(literal, seed.to_owned());
        }
    }
    Ok(legend)
}

/// Parses solver output in the MaxSAT evaluation style: an `s` status line and
/// one or more `v` model lines. The model is either a list of signed literals
/// (`v 1 -2 3`) or a string of truth values (`v 101`). Returns the literals set
/// to true, or `NoCover` when the solver did not report an optimum.
pub fn parse_solver_output(reader: impl BufRead, num_vars: usize) -> MinimizeResult<BTreeSet<Literal>> {
    let mut selected = BTreeSet::new();
    let mut has_model = false;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if let Some(status) = line.strip_prefix("s ") {
            if !status.contains("OPTIMUM FOUND") {
                log::error!("Solver reported `{status}`");
                return Err(MinimizeError::NoCover);
            }
        } else if let Some(values) = line.strip_prefix("v ") {
            has_model = true;
            parse_model_line(index + 1, values.trim(), num_vars, &mut selected)?;
        }
    }
    if !has_model {
        log::error!("Solver output contains no model");
        return Err(MinimizeError::NoCover);
    }
    Ok(selected)
}

fn parse_model_line(
    line_number: usize,
    values: &str,
    num_vars: usize,
    selected: &mut BTreeSet<Literal>,
) -> MinimizeResult<()> {
    let is_bit_string = values.len() == num_vars
        && !values.is_empty()
        && values.bytes().all(|b| b == b'0' || b == b'1');
    if is_bit_string {
        selected.extend(
            values
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'1')
                .filter_map(|(index, _)| Literal::new(index + 1)),
        );
        return Ok(());
    }

    for token in values.split_whitespace() {
        let value: i64 = token.parse().map_err(|err| {
            MinimizeError::parse(line_number, format!("invalid literal `{token}`: {err}"))
        })?;
        let magnitude = usize::try_from(value.unsigned_abs()).unwrap_or(usize::MAX);
        if magnitude > num_vars {
            return Err(MinimizeError::parse(
                line_number,
                format!("literal {value} is out of range, the instance has {num_vars} variables"),
            ));
        }
        if value > 0 {
            selected.extend(Literal::new(magnitude));
        }
    }
    Ok(())
}
