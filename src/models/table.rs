//! Column-oriented tick telemetry table.
//!
//! One row is one observation of one player at one simulation step within
//! one recording. Identity columns (`match_id`, `map_name`, `player_name`,
//! `steam_id`) are always present; telemetry columns are an open set
//! selected by the caller and may be scalar or vector valued.

use std::collections::BTreeMap;

use thiserror::Error;

/// Errors raised by tick table operations.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Column not found: {0}")]
    UnknownColumn(String),

    #[error("Column already exists: {0}")]
    DuplicateColumn(String),

    #[error("Column {0} is not scalar")]
    NotScalar(String),

    #[error("Column {name} has {actual} values, table has {expected} rows")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported vector dimension {0} (expected 2 or 3)")]
    BadVectorDim(usize),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
}

/// A single telemetry column.
///
/// Vector columns hold fixed-length 2- or 3-tuples (the third component of
/// a 2-tuple is unused and kept at 0). Missing scalar values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Scalar(Vec<f64>),
    Vector { dim: usize, values: Vec<[f64; 3]> },
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Scalar(v) => v.len(),
            Column::Vector { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retain_rows(&mut self, keep: &[bool]) {
        match self {
            Column::Scalar(v) => {
                let mut i = 0;
                v.retain(|_| {
                    let k = keep[i];
                    i += 1;
                    k
                });
            }
            Column::Vector { values, .. } => {
                let mut i = 0;
                values.retain(|_| {
                    let k = keep[i];
                    i += 1;
                    k
                });
            }
        }
    }

    fn append(&mut self, other: Column, name: &str) -> Result<(), TableError> {
        match (self, other) {
            (Column::Scalar(a), Column::Scalar(b)) => {
                a.extend(b);
                Ok(())
            }
            (
                Column::Vector { dim: da, values: a },
                Column::Vector { dim: db, values: b },
            ) if *da == db => {
                a.extend(b);
                Ok(())
            }
            _ => Err(TableError::SchemaMismatch(format!(
                "column {} has a different kind across recordings",
                name
            ))),
        }
    }
}

/// The unified per-tick telemetry table.
///
/// Invariant: every column, including the four identity columns, has
/// exactly `len()` entries. `map_name` is constant within a `match_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickTable {
    match_id: Vec<String>,
    map_name: Vec<String>,
    player_name: Vec<String>,
    steam_id: Vec<u64>,
    columns: BTreeMap<String, Column>,
}

impl TickTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a table from pre-built columns, validating lengths.
    pub fn from_parts(
        match_id: Vec<String>,
        map_name: Vec<String>,
        player_name: Vec<String>,
        steam_id: Vec<u64>,
        columns: BTreeMap<String, Column>,
    ) -> Result<Self, TableError> {
        let rows = player_name.len();
        for (name, len) in [
            ("match_id", match_id.len()),
            ("map_name", map_name.len()),
            ("steam_id", steam_id.len()),
        ] {
            if len != rows {
                return Err(TableError::LengthMismatch {
                    name: name.to_string(),
                    expected: rows,
                    actual: len,
                });
            }
        }
        for (name, col) in &columns {
            if let Column::Vector { dim, .. } = col {
                if *dim != 2 && *dim != 3 {
                    return Err(TableError::BadVectorDim(*dim));
                }
            }
            if col.len() != rows {
                return Err(TableError::LengthMismatch {
                    name: name.clone(),
                    expected: rows,
                    actual: col.len(),
                });
            }
        }
        Ok(Self {
            match_id,
            map_name,
            player_name,
            steam_id,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.player_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.player_name.is_empty()
    }

    pub fn match_ids(&self) -> &[String] {
        &self.match_id
    }

    pub fn map_names(&self) -> &[String] {
        &self.map_name
    }

    pub fn player_names(&self) -> &[String] {
        &self.player_name
    }

    pub fn steam_ids(&self) -> &[u64] {
        &self.steam_id
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Telemetry columns in deterministic (sorted) name order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    /// Borrow a scalar column.
    pub fn scalar(&self, name: &str) -> Result<&[f64], TableError> {
        match self.columns.get(name) {
            Some(Column::Scalar(v)) => Ok(v),
            Some(_) => Err(TableError::NotScalar(name.to_string())),
            None => Err(TableError::UnknownColumn(name.to_string())),
        }
    }

    /// Borrow a vector column as (dimension, rows).
    pub fn vector(&self, name: &str) -> Result<(usize, &[[f64; 3]]), TableError> {
        match self.columns.get(name) {
            Some(Column::Vector { dim, values }) => Ok((*dim, values)),
            Some(_) => Err(TableError::SchemaMismatch(format!(
                "column {} is scalar, not vector",
                name
            ))),
            None => Err(TableError::UnknownColumn(name.to_string())),
        }
    }

    /// Add a scalar telemetry column.
    pub fn add_scalar_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), TableError> {
        if self.columns.contains_key(name) {
            return Err(TableError::DuplicateColumn(name.to_string()));
        }
        if values.len() != self.len() {
            return Err(TableError::LengthMismatch {
                name: name.to_string(),
                expected: self.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(name.to_string(), Column::Scalar(values));
        Ok(())
    }

    /// Add a vector telemetry column of the given dimension (2 or 3).
    pub fn add_vector_column(
        &mut self,
        name: &str,
        dim: usize,
        values: Vec<[f64; 3]>,
    ) -> Result<(), TableError> {
        if dim != 2 && dim != 3 {
            return Err(TableError::BadVectorDim(dim));
        }
        if self.columns.contains_key(name) {
            return Err(TableError::DuplicateColumn(name.to_string()));
        }
        if values.len() != self.len() {
            return Err(TableError::LengthMismatch {
                name: name.to_string(),
                expected: self.len(),
                actual: values.len(),
            });
        }
        self.columns
            .insert(name.to_string(), Column::Vector { dim, values });
        Ok(())
    }

    /// Stamp every row with the recording it came from.
    ///
    /// Called by the merger after decoding: the decoder does not know the
    /// match identifier, and the header map applies to all rows.
    pub fn assign_recording(&mut self, match_id: &str, map_name: &str) {
        for m in &mut self.match_id {
            *m = match_id.to_string();
        }
        for m in &mut self.map_name {
            *m = map_name.to_string();
        }
    }

    /// Keep only rows where `keep[row]` is true.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.len());
        let filter_strings = |v: &mut Vec<String>| {
            let mut i = 0;
            v.retain(|_| {
                let k = keep[i];
                i += 1;
                k
            });
        };
        filter_strings(&mut self.match_id);
        filter_strings(&mut self.map_name);
        filter_strings(&mut self.player_name);
        let mut i = 0;
        self.steam_id.retain(|_| {
            let k = keep[i];
            i += 1;
            k
        });
        for col in self.columns.values_mut() {
            col.retain_rows(keep);
        }
    }

    /// Keep only rows whose player name is in the allow-list.
    pub fn retain_players(&mut self, allow: &[String]) {
        if allow.is_empty() {
            return;
        }
        let keep: Vec<bool> = self
            .player_name
            .iter()
            .map(|p| allow.iter().any(|a| a == p))
            .collect();
        self.retain_rows(&keep);
    }

    /// Copy of the rows for one player, optionally restricted to one map.
    pub fn player_slice(&self, player: &str, map: Option<&str>) -> TickTable {
        let keep: Vec<bool> = (0..self.len())
            .map(|i| {
                self.player_name[i] == player
                    && map.map_or(true, |m| self.map_name[i] == m)
            })
            .collect();
        let mut out = self.clone();
        out.retain_rows(&keep);
        out
    }

    /// Concatenate another table with an identical schema.
    ///
    /// Row content is preserved; no cross-recording ordering is implied.
    pub fn append(&mut self, other: TickTable) -> Result<(), TableError> {
        if self.is_empty() && self.columns.is_empty() {
            *self = other;
            return Ok(());
        }
        let ours: Vec<&String> = self.columns.keys().collect();
        let theirs: Vec<&String> = other.columns.keys().collect();
        if ours != theirs {
            return Err(TableError::SchemaMismatch(format!(
                "column sets differ: {:?} vs {:?}",
                ours, theirs
            )));
        }
        self.match_id.extend(other.match_id);
        self.map_name.extend(other.map_name);
        self.player_name.extend(other.player_name);
        self.steam_id.extend(other.steam_id);
        for (name, col) in other.columns {
            self.columns
                .get_mut(&name)
                .expect("column set checked above")
                .append(col, &name)?;
        }
        Ok(())
    }

    /// Decompose every vector column into per-axis scalar columns.
    ///
    /// Rows where any vector column has a non-finite component are dropped
    /// first. A dim-2 column `v` becomes `v_X`, `v_Y`; dim-3 adds `v_Z`.
    /// The original vector columns are removed.
    pub fn split_vector_columns(&mut self) -> Result<(), TableError> {
        let vector_names: Vec<String> = self
            .columns
            .iter()
            .filter(|(_, c)| matches!(c, Column::Vector { .. }))
            .map(|(n, _)| n.clone())
            .collect();
        if vector_names.is_empty() {
            return Ok(());
        }

        let mut keep = vec![true; self.len()];
        for name in &vector_names {
            let (dim, values) = self.vector(name)?;
            for (row, v) in values.iter().enumerate() {
                if !v[..dim].iter().all(|c| c.is_finite()) {
                    keep[row] = false;
                }
            }
        }
        self.retain_rows(&keep);

        for name in &vector_names {
            let (dim, values) = match self.columns.remove(name) {
                Some(Column::Vector { dim, values }) => (dim, values),
                _ => unreachable!("collected as vector above"),
            };
            for (axis, suffix) in ["_X", "_Y", "_Z"].iter().enumerate().take(dim) {
                let component: Vec<f64> = values.iter().map(|v| v[axis]).collect();
                self.add_scalar_column(&format!("{}{}", name, suffix), component)?;
            }
        }
        Ok(())
    }

    /// Drop rows where every component of the vector column lies inside
    /// its per-axis band (inclusive). Used to strip idle samples (e.g.
    /// aim-punch vectors resting near zero) before distribution
    /// analysis. `bands` must have one (low, high) pair per dimension.
    pub fn drop_vector_within(
        &mut self,
        name: &str,
        bands: &[(f64, f64)],
    ) -> Result<(), TableError> {
        let (dim, values) = self.vector(name)?;
        if bands.len() != dim {
            return Err(TableError::SchemaMismatch(format!(
                "{} bands given for column {} of dimension {}",
                bands.len(),
                name,
                dim
            )));
        }
        let keep: Vec<bool> = values
            .iter()
            .map(|v| {
                let idle = bands
                    .iter()
                    .enumerate()
                    .all(|(axis, (low, high))| v[axis] >= *low && v[axis] <= *high);
                !idle
            })
            .collect();
        self.retain_rows(&keep);
        Ok(())
    }

    /// Row indices grouped by (player_name, match_id), preserving row order
    /// within each group. Derivatives must never cross these boundaries.
    pub fn group_by_player_match(&self) -> BTreeMap<(String, String), Vec<usize>> {
        let mut groups: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
        for i in 0..self.len() {
            groups
                .entry((self.player_name[i].clone(), self.match_id[i].clone()))
                .or_default()
                .push(i);
        }
        groups
    }

    /// Unique (steam_id, player_name) pairs in first-seen order.
    pub fn players(&self) -> Vec<(u64, String)> {
        let mut seen = Vec::new();
        for i in 0..self.len() {
            let pair = (self.steam_id[i], self.player_name[i].clone());
            if !seen.contains(&pair) {
                seen.push(pair);
            }
        }
        seen
    }

    /// Unique map names in first-seen order.
    pub fn maps(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for m in &self.map_name {
            if !seen.iter().any(|s| s == m) {
                seen.push(m.clone());
            }
        }
        seen
    }

    /// Unique match identifiers in first-seen order.
    pub fn matches(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for m in &self.match_id {
            if !seen.iter().any(|s| s == m) {
                seen.push(m.clone());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_player_table() -> TickTable {
        let mut cols = BTreeMap::new();
        cols.insert(
            "velocity".to_string(),
            Column::Scalar(vec![1.0, 2.0, 3.0, 4.0]),
        );
        TickTable::from_parts(
            vec!["m1".into(), "m1".into(), "m1".into(), "m1".into()],
            vec!["de_dust2".into(); 4],
            vec!["alpha".into(), "beta".into(), "alpha".into(), "beta".into()],
            vec![1, 2, 1, 2],
            cols,
        )
        .unwrap()
    }

    #[test]
    fn test_from_parts_length_mismatch() {
        let mut cols = BTreeMap::new();
        cols.insert("velocity".to_string(), Column::Scalar(vec![1.0]));
        let err = TickTable::from_parts(
            vec!["m1".into(), "m1".into()],
            vec!["map".into(), "map".into()],
            vec!["a".into(), "b".into()],
            vec![1, 2],
            cols,
        );
        assert!(matches!(err, Err(TableError::LengthMismatch { .. })));
    }

    #[test]
    fn test_retain_players() {
        let mut t = two_player_table();
        t.retain_players(&["alpha".to_string()]);
        assert_eq!(t.len(), 2);
        assert!(t.player_names().iter().all(|p| p == "alpha"));
        assert_eq!(t.scalar("velocity").unwrap(), &[1.0, 3.0]);
    }

    #[test]
    fn test_retain_players_empty_allowlist_keeps_all() {
        let mut t = two_player_table();
        t.retain_players(&[]);
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn test_player_slice_by_map() {
        let mut t = two_player_table();
        let mut other = two_player_table();
        other.assign_recording("m2", "de_mirage");
        t.append(other).unwrap();

        let slice = t.player_slice("alpha", Some("de_mirage"));
        assert_eq!(slice.len(), 2);
        assert!(slice.map_names().iter().all(|m| m == "de_mirage"));
    }

    #[test]
    fn test_append_schema_mismatch() {
        let mut t = two_player_table();
        let mut cols = BTreeMap::new();
        cols.insert("health".to_string(), Column::Scalar(vec![100.0]));
        let other = TickTable::from_parts(
            vec!["m2".into()],
            vec!["map".into()],
            vec!["a".into()],
            vec![1],
            cols,
        )
        .unwrap();
        assert!(matches!(
            t.append(other),
            Err(TableError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_append_into_empty() {
        let mut t = TickTable::new();
        t.append(two_player_table()).unwrap();
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn test_split_vector_columns_three_axes() {
        let mut t = two_player_table();
        t.add_vector_column(
            "aim_punch_angle",
            3,
            vec![
                [0.1, 0.2, 0.3],
                [0.4, 0.5, 0.6],
                [0.7, 0.8, 0.9],
                [1.0, 1.1, 1.2],
            ],
        )
        .unwrap();
        t.split_vector_columns().unwrap();

        assert!(!t.has_column("aim_punch_angle"));
        assert!(t.has_column("aim_punch_angle_X"));
        assert!(t.has_column("aim_punch_angle_Y"));
        assert!(t.has_column("aim_punch_angle_Z"));
        assert_eq!(
            t.scalar("aim_punch_angle_Y").unwrap(),
            &[0.2, 0.5, 0.8, 1.1]
        );
    }

    #[test]
    fn test_split_vector_columns_two_axes_no_z() {
        let mut t = two_player_table();
        t.add_vector_column(
            "aim_punch_angle_vel",
            2,
            vec![[1.0, 2.0, 0.0]; 4],
        )
        .unwrap();
        t.split_vector_columns().unwrap();

        assert!(t.has_column("aim_punch_angle_vel_X"));
        assert!(t.has_column("aim_punch_angle_vel_Y"));
        assert!(!t.has_column("aim_punch_angle_vel_Z"));
    }

    #[test]
    fn test_split_vector_columns_drops_incomplete_rows() {
        let mut t = two_player_table();
        t.add_vector_column(
            "aim_punch_angle",
            3,
            vec![
                [0.1, 0.2, 0.3],
                [f64::NAN, 0.5, 0.6],
                [0.7, 0.8, 0.9],
                [1.0, 1.1, 1.2],
            ],
        )
        .unwrap();
        t.split_vector_columns().unwrap();

        assert_eq!(t.len(), 3);
        assert_eq!(t.scalar("velocity").unwrap(), &[1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_drop_vector_within_strips_idle_rows() {
        let mut t = two_player_table();
        t.add_vector_column(
            "aim_punch_angle",
            3,
            vec![
                [0.0, 0.0, 0.0],   // idle, dropped
                [0.8, 0.0, 0.0],   // x outside its band, kept
                [0.01, -0.01, 0.0], // idle, dropped
                [0.0, 0.2, 0.0],   // y outside its band, kept
            ],
        )
        .unwrap();
        t.drop_vector_within(
            "aim_punch_angle",
            &[(-0.5, 0.5), (-0.05, 0.05), (-0.5, 0.5)],
        )
        .unwrap();

        assert_eq!(t.len(), 2);
        assert_eq!(t.scalar("velocity").unwrap(), &[2.0, 4.0]);
    }

    #[test]
    fn test_drop_vector_within_band_count_mismatch() {
        let mut t = two_player_table();
        t.add_vector_column("punch", 2, vec![[0.0, 0.0, 0.0]; 4]).unwrap();
        let err = t.drop_vector_within("punch", &[(-1.0, 1.0)]);
        assert!(matches!(err, Err(TableError::SchemaMismatch(_))));
    }

    #[test]
    fn test_group_by_player_match_preserves_order() {
        let t = two_player_table();
        let groups = t.group_by_player_match();
        assert_eq!(
            groups[&("alpha".to_string(), "m1".to_string())],
            vec![0, 2]
        );
        assert_eq!(groups[&("beta".to_string(), "m1".to_string())], vec![1, 3]);
    }

    #[test]
    fn test_players_unique_first_seen() {
        let t = two_player_table();
        assert_eq!(
            t.players(),
            vec![(1, "alpha".to_string()), (2, "beta".to_string())]
        );
    }

    #[test]
    fn test_bad_vector_dim_rejected() {
        let mut t = two_player_table();
        let err = t.add_vector_column("bad", 4, vec![[0.0; 3]; 4]);
        assert!(matches!(err, Err(TableError::BadVectorDim(4))));
    }
}
