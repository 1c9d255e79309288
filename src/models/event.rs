//! Game event models.
//!
//! Events are loosely structured by contract: a type tag plus named fields
//! that vary by event type. The pipeline passes them through opaquely;
//! nothing in the similarity core reads them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One discrete game event (kill, round_start, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Event type tag as reported by the decoder.
    pub name: String,

    /// Named fields, including the acting/affected player name when the
    /// event carries one. Value shapes vary by event type.
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl GameEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// All events decoded from a single recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingEvents {
    /// Match identifier of the recording these events came from.
    pub match_id: String,

    pub events: Vec<GameEvent>,
}

impl RecordingEvents {
    pub fn new(match_id: impl Into<String>, events: Vec<GameEvent>) -> Self {
        Self {
            match_id: match_id.into(),
            events,
        }
    }

    /// Events with the given type tag.
    pub fn of_type<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a GameEvent> {
        self.events.iter().filter(move |e| e.name == name)
    }
}
