//! Angular derivative signals.
//!
//! For a time-ordered angle sequence: speed is the successive difference
//! of the angles, acceleration the successive difference of speed, and
//! smoothness (jerk) the successive difference of acceleration. Each
//! derived sequence keeps the length of its source; the first sample has
//! no predecessor and is defined as zero, as is any difference involving
//! a missing value.
//!
//! Derivatives are computed independently per (player, match) group:
//! a difference must never straddle the boundary between two players or
//! two recordings.

use tracing::debug;

use super::CalculateError;
use crate::models::TickTable;

/// Successive difference with the first sample defined as zero.
pub fn successive_difference(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for (i, &v) in values.iter().enumerate() {
        if i == 0 {
            out.push(0.0);
            continue;
        }
        let d = v - values[i - 1];
        out.push(if d.is_finite() { d } else { 0.0 });
    }
    out
}

/// Add `{prop}_speed`, `{prop}_acceleration` and `{prop}_smoothness`
/// columns for each requested scalar property, computed per
/// (player, match) group in row order.
pub fn compute_derivatives(table: &mut TickTable, props: &[&str]) -> Result<(), CalculateError> {
    let groups = table.group_by_player_match();
    debug!(
        "Computing derivatives for {} properties over {} player/match groups",
        props.len(),
        groups.len()
    );

    for prop in props {
        let source = match table.scalar(prop) {
            Ok(values) => values.to_vec(),
            Err(crate::models::TableError::UnknownColumn(name)) => {
                return Err(CalculateError::FieldNotFound(name));
            }
            Err(_) => return Err(CalculateError::NotScalar(prop.to_string())),
        };

        let mut speed = vec![0.0; source.len()];
        let mut acceleration = vec![0.0; source.len()];
        let mut smoothness = vec![0.0; source.len()];

        for indices in groups.values() {
            let seq: Vec<f64> = indices.iter().map(|&i| source[i]).collect();
            let s = successive_difference(&seq);
            let a = successive_difference(&s);
            let j = successive_difference(&a);
            for (pos, &row) in indices.iter().enumerate() {
                speed[row] = s[pos];
                acceleration[row] = a[pos];
                smoothness[row] = j[pos];
            }
        }

        table.add_scalar_column(&format!("{}_speed", prop), speed)?;
        table.add_scalar_column(&format!("{}_acceleration", prop), acceleration)?;
        table.add_scalar_column(&format!("{}_smoothness", prop), smoothness)?;
    }
    Ok(())
}
