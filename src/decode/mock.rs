//! Programmable in-memory recordings for tests.
//!
//! `MockProvider` serves prebuilt recordings and counts how many times a
//! decoder was opened; the merge-cache tests assert a cache hit never
//! touches the decoder.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{DecodeError, Decoder, Header, RecordingProvider};
use crate::models::{Column, GameEvent, TickTable};

/// One in-memory recording.
#[derive(Debug, Clone)]
pub struct MockRecording {
    /// Virtual path; its parent folder and stem feed the match id.
    pub path: PathBuf,

    pub map_name: String,

    /// Tick telemetry with placeholder identity columns.
    pub ticks: TickTable,

    pub events: Vec<GameEvent>,
}

/// Provider over a fixed set of mock recordings.
pub struct MockProvider {
    recordings: Vec<MockRecording>,
    opens: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(recordings: Vec<MockRecording>) -> Self {
        Self {
            recordings,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many times a recording was opened for decoding.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl RecordingProvider for MockProvider {
    fn discover(&self, _folder: &Path) -> Result<Vec<PathBuf>, DecodeError> {
        let mut paths: Vec<PathBuf> = self.recordings.iter().map(|r| r.path.clone()).collect();
        paths.sort();
        Ok(paths)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Decoder>, DecodeError> {
        let recording = self
            .recordings
            .iter()
            .find(|r| r.path == path)
            .ok_or_else(|| DecodeError::UnsupportedFormat(path.to_path_buf()))?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDecoder {
            recording: recording.clone(),
        }))
    }
}

struct MockDecoder {
    recording: MockRecording,
}

impl Decoder for MockDecoder {
    fn parse_header(&self) -> Result<Header, DecodeError> {
        Ok(Header {
            map_name: self.recording.map_name.clone(),
        })
    }

    fn parse_ticks(&self, fields: &[String]) -> Result<TickTable, DecodeError> {
        let source = &self.recording.ticks;
        let mut columns = std::collections::BTreeMap::new();
        for field in fields {
            if field == "player_name" || field == "steam_id" {
                continue;
            }
            if let Ok(values) = source.scalar(field) {
                columns.insert(field.clone(), Column::Scalar(values.to_vec()));
            } else if let Ok((dim, values)) = source.vector(field) {
                columns.insert(
                    field.clone(),
                    Column::Vector {
                        dim,
                        values: values.to_vec(),
                    },
                );
            } else {
                return Err(DecodeError::MissingField(field.clone()));
            }
        }
        let table = TickTable::from_parts(
            vec![String::new(); source.len()],
            vec![String::new(); source.len()],
            source.player_names().to_vec(),
            source.steam_ids().to_vec(),
            columns,
        )?;
        Ok(table)
    }

    fn parse_events(&self, names: &[String]) -> Result<Vec<GameEvent>, DecodeError> {
        let all = names.is_empty() || names.iter().any(|n| n == "all");
        Ok(self
            .recording
            .events
            .iter()
            .filter(|e| all || names.contains(&e.name))
            .cloned()
            .collect())
    }
}
