//! Persisted widget state
//!
//! A small JSON key/value file in the app data directory. Holds the last
//! committed window position and the draft note text.

use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::geometry::Position;

pub const POSITION_KEY: &str = "pensieve-position";
pub const NOTE_KEY: &str = "pensieve-note";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
pub struct NoteStore {
    /// `None` keeps everything in memory
    path: Option<PathBuf>,
    entries: Map<String, Value>,
}

impl NoteStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store at `path`. A missing file starts empty; a corrupt one is
    /// logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("[store] Ignoring corrupt {}: {}", path.display(), e);
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    pub fn position(&self) -> Option<Position> {
        let value = self.entries.get(POSITION_KEY)?.clone();
        match serde_json::from_value::<Position>(value) {
            Ok(p) if p.is_finite() => Some(p),
            Ok(_) => None,
            Err(e) => {
                log::warn!("[store] Failed to load position: {}", e);
                None
            }
        }
    }

    pub fn save_position(&mut self, position: Position) -> Result<(), StoreError> {
        self.entries
            .insert(POSITION_KEY.to_string(), serde_json::to_value(position)?);
        self.flush()
    }

    pub fn note(&self) -> String {
        self.entries
            .get(NOTE_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Empty drafts are not written
    pub fn save_note(&mut self, note: &str) -> Result<(), StoreError> {
        if note.is_empty() {
            return Ok(());
        }
        self.entries
            .insert(NOTE_KEY.to_string(), Value::String(note.to_string()));
        self.flush()
    }

    pub fn clear_note(&mut self) -> Result<(), StoreError> {
        if self.entries.remove(NOTE_KEY).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("state.json");

        let mut store = NoteStore::open(&path).unwrap();
        assert_eq!(store.position(), None);
        assert_eq!(store.note(), "");

        store.save_position(Position::new(90.0, 40.0)).unwrap();
        store.save_note("buy milk").unwrap();

        let reopened = NoteStore::open(&path).unwrap();
        assert_eq!(reopened.position(), Some(Position::new(90.0, 40.0)));
        assert_eq!(reopened.note(), "buy milk");

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[POSITION_KEY]["x"], 90.0);
    }

    #[test]
    fn test_empty_note_is_not_written() {
        let mut store = NoteStore::in_memory();
        store.save_note("draft").unwrap();
        store.save_note("").unwrap();
        assert_eq!(store.note(), "draft");

        store.clear_note().unwrap();
        assert_eq!(store.note(), "");
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let mut store = NoteStore::open(&path).unwrap();
        assert_eq!(store.position(), None);

        store.save_note("recovered").unwrap();
        assert_eq!(NoteStore::open(&path).unwrap().note(), "recovered");
    }

    #[test]
    fn test_malformed_position_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"pensieve-position": {"x": "left"}}"#).unwrap();

        assert_eq!(NoteStore::open(&path).unwrap().position(), None);
    }
}
