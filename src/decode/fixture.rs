//! JSON fixture recordings.
//!
//! A fixture file is one recording serialized as JSON:
//!
//! ```json
//! {
//!   "header": { "map_name": "de_dust2" },
//!   "ticks": [
//!     { "steam_id": 101, "player_name": "alpha", "X": 12.5,
//!       "aim_punch_angle": [0.1, -0.2, 0.0] }
//!   ],
//!   "events": [ { "name": "round_start", "fields": {} } ]
//! }
//! ```
//!
//! Scalar tick fields are numbers; vector fields are arrays of length 2 or
//! 3. A field missing from an individual tick decodes as NaN; a field
//! missing from every tick is a validation error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{DecodeError, Decoder, Header};
use crate::models::{Column, GameEvent, TickTable};

#[derive(Debug, Deserialize)]
struct FixtureHeader {
    map_name: String,
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    header: FixtureHeader,
    #[serde(default)]
    ticks: Vec<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    events: Vec<GameEvent>,
}

/// Decoder over a parsed JSON fixture recording.
pub struct JsonFixtureDecoder {
    path: PathBuf,
    fixture: FixtureFile,
}

impl JsonFixtureDecoder {
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let raw = fs::read_to_string(path)?;
        let fixture: FixtureFile =
            serde_json::from_str(&raw).map_err(|e| DecodeError::Malformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            fixture,
        })
    }

    fn malformed(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::Malformed {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    /// Determine whether `field` is scalar or vector from its first
    /// occurrence, returning the vector dimension (0 = scalar).
    fn field_dim(&self, field: &str) -> Result<usize, DecodeError> {
        for tick in &self.fixture.ticks {
            match tick.get(field) {
                None | Some(serde_json::Value::Null) => continue,
                Some(serde_json::Value::Array(items)) => {
                    if items.len() == 2 || items.len() == 3 {
                        return Ok(items.len());
                    }
                    return Err(self.malformed(format!(
                        "vector field {} has length {} (expected 2 or 3)",
                        field,
                        items.len()
                    )));
                }
                Some(v) if v.is_number() => return Ok(0),
                Some(v) => {
                    return Err(self.malformed(format!(
                        "field {} has unsupported value {}",
                        field, v
                    )));
                }
            }
        }
        Err(DecodeError::MissingField(field.to_string()))
    }
}

fn number(value: Option<&serde_json::Value>) -> f64 {
    value.and_then(|v| v.as_f64()).unwrap_or(f64::NAN)
}

impl Decoder for JsonFixtureDecoder {
    fn parse_header(&self) -> Result<Header, DecodeError> {
        Ok(Header {
            map_name: self.fixture.header.map_name.clone(),
        })
    }

    fn parse_ticks(&self, fields: &[String]) -> Result<TickTable, DecodeError> {
        let rows = self.fixture.ticks.len();

        let mut player_name = Vec::with_capacity(rows);
        let mut steam_id = Vec::with_capacity(rows);
        for (i, tick) in self.fixture.ticks.iter().enumerate() {
            let name = tick
                .get("player_name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| self.malformed(format!("tick {} missing player_name", i)))?;
            let sid = tick
                .get("steam_id")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| self.malformed(format!("tick {} missing steam_id", i)))?;
            player_name.push(name.to_string());
            steam_id.push(sid);
        }

        let mut columns = BTreeMap::new();
        for field in fields {
            if field == "player_name" || field == "steam_id" {
                continue;
            }
            let dim = self.field_dim(field)?;
            let column = if dim == 0 {
                Column::Scalar(
                    self.fixture
                        .ticks
                        .iter()
                        .map(|tick| number(tick.get(field)))
                        .collect(),
                )
            } else {
                let values = self
                    .fixture
                    .ticks
                    .iter()
                    .map(|tick| match tick.get(field) {
                        Some(serde_json::Value::Array(items)) => {
                            let mut v = [f64::NAN; 3];
                            if dim == 2 {
                                v[2] = 0.0;
                            }
                            for (axis, item) in items.iter().enumerate().take(3) {
                                v[axis] = item.as_f64().unwrap_or(f64::NAN);
                            }
                            v
                        }
                        _ => {
                            let mut v = [f64::NAN; 3];
                            if dim == 2 {
                                v[2] = 0.0;
                            }
                            v
                        }
                    })
                    .collect();
                Column::Vector { dim, values }
            };
            columns.insert(field.clone(), column);
        }

        // Placeholder identity; the merger stamps the real values.
        let table = TickTable::from_parts(
            vec![String::new(); rows],
            vec![String::new(); rows],
            player_name,
            steam_id,
            columns,
        )?;
        Ok(table)
    }

    fn parse_events(&self, names: &[String]) -> Result<Vec<GameEvent>, DecodeError> {
        let all = names.is_empty() || names.iter().any(|n| n == "all");
        Ok(self
            .fixture
            .events
            .iter()
            .filter(|e| all || names.contains(&e.name))
            .cloned()
            .collect())
    }
}
