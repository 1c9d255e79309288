//! Boolean/behavioral statistics.
//!
//! Fraction of time each player spends in a boolean state (ducked,
//! airborne, ...) per (player, match) group.

use tracing::debug;

use super::CalculateError;
use crate::models::{TableError, TickTable};

/// Fraction-active row for one (player, match) group.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanFraction {
    pub player_name: String,
    pub match_id: String,

    /// Ticks where the field was recorded (finite).
    pub total_ticks: usize,

    /// Ticks where the field was 1.
    pub active_ticks: usize,

    /// `active_ticks / total_ticks`, or 0 for an empty group.
    pub fraction_active: f64,
}

/// Compute per-(player, match) fractions for a 0/1-valued field.
///
/// Requesting a field the table does not carry is a validation error;
/// a group where the field was never recorded yields fraction 0.
pub fn compute_boolean_fractions(
    ticks: &TickTable,
    field: &str,
) -> Result<Vec<BooleanFraction>, CalculateError> {
    let values = match ticks.scalar(field) {
        Ok(v) => v,
        Err(TableError::UnknownColumn(name)) => {
            return Err(CalculateError::FieldNotFound(name));
        }
        Err(_) => return Err(CalculateError::NotScalar(field.to_string())),
    };

    let groups = ticks.group_by_player_match();
    debug!(
        "Computing {} fractions over {} player/match groups",
        field,
        groups.len()
    );

    let mut rows = Vec::with_capacity(groups.len());
    for ((player_name, match_id), indices) in groups {
        let mut total = 0usize;
        let mut active = 0usize;
        for &i in &indices {
            let v = values[i];
            if !v.is_finite() {
                continue;
            }
            total += 1;
            if v == 1.0 {
                active += 1;
            }
        }
        let fraction_active = if total > 0 {
            active as f64 / total as f64
        } else {
            0.0
        };
        rows.push(BooleanFraction {
            player_name,
            match_id,
            total_ticks: total,
            active_ticks: active,
            fraction_active,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;
    use std::collections::BTreeMap;

    fn table(rows: &[(&str, &str, f64)]) -> TickTable {
        let mut columns = BTreeMap::new();
        columns.insert(
            "ducking".to_string(),
            Column::Scalar(rows.iter().map(|(_, _, v)| *v).collect()),
        );
        TickTable::from_parts(
            rows.iter().map(|(_, m, _)| m.to_string()).collect(),
            vec!["de_dust2".to_string(); rows.len()],
            rows.iter().map(|(p, _, _)| p.to_string()).collect(),
            vec![0; rows.len()],
            columns,
        )
        .unwrap()
    }

    #[test]
    fn test_exact_fractions_two_players_two_matches() {
        let t = table(&[
            // alpha, m1: 2 of 3 active
            ("alpha", "m1", 1.0),
            ("alpha", "m1", 1.0),
            ("alpha", "m1", 0.0),
            // alpha, m2: 0 of 2 active
            ("alpha", "m2", 0.0),
            ("alpha", "m2", 0.0),
            // beta, m1: 1 of 1 active
            ("beta", "m1", 1.0),
            // beta, m2: 1 of 4 active
            ("beta", "m2", 0.0),
            ("beta", "m2", 1.0),
            ("beta", "m2", 0.0),
            ("beta", "m2", 0.0),
        ]);

        let rows = compute_boolean_fractions(&t, "ducking").unwrap();
        assert_eq!(rows.len(), 4);

        let get = |p: &str, m: &str| {
            rows.iter()
                .find(|r| r.player_name == p && r.match_id == m)
                .unwrap()
        };
        assert_eq!(get("alpha", "m1").fraction_active, 2.0 / 3.0);
        assert_eq!(get("alpha", "m2").fraction_active, 0.0);
        assert_eq!(get("beta", "m1").fraction_active, 1.0);
        assert_eq!(get("beta", "m2").fraction_active, 0.25);
    }

    #[test]
    fn test_unrecorded_ticks_excluded() {
        let t = table(&[
            ("alpha", "m1", 1.0),
            ("alpha", "m1", f64::NAN),
            ("alpha", "m1", 0.0),
        ]);
        let rows = compute_boolean_fractions(&t, "ducking").unwrap();
        assert_eq!(rows[0].total_ticks, 2);
        assert_eq!(rows[0].active_ticks, 1);
        assert_eq!(rows[0].fraction_active, 0.5);
    }

    #[test]
    fn test_group_with_nothing_recorded_is_zero() {
        let t = table(&[("alpha", "m1", f64::NAN), ("alpha", "m1", f64::NAN)]);
        let rows = compute_boolean_fractions(&t, "ducking").unwrap();
        assert_eq!(rows[0].total_ticks, 0);
        assert_eq!(rows[0].fraction_active, 0.0);
    }

    #[test]
    fn test_missing_field_is_error() {
        let t = table(&[("alpha", "m1", 1.0)]);
        let err = compute_boolean_fractions(&t, "jumping");
        assert!(matches!(err, Err(CalculateError::FieldNotFound(_))));
    }
}
