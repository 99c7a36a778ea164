//! Module for keeping the records in a JSON file on the local disk.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::record::{decode_record, Record, RecordId};
use crate::store::{RecordBackend, ServerFilter};

#[derive(Serialize, Deserialize, Debug, Clone)]
/// Struct modeling the parameters of the local record file.
pub struct LocalParameters {
    /// Path of the JSON file holding the ordered list of records.
    #[serde(default = "default_path")]
    pub path: PathBuf,
}

fn default_path() -> PathBuf {
    PathBuf::from("data/redlineData.json")
}

impl Default for LocalParameters {
    fn default() -> Self {
        LocalParameters { path: default_path() }
    }
}

/// Record backend storing all records as one JSON array. Last write wins.
pub struct LocalBackend {
    path: PathBuf,
}

impl LocalBackend {
    pub fn new(params: &LocalParameters) -> Self {
        LocalBackend {
            path: params.path.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every stored record. A missing or malformed file reads as an empty collection.
    pub fn load(&self) -> Vec<Record> {
        self.read_entries()
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Record(record) => Some(record),
                Entry::Unreadable(_) => None,
            })
            .collect()
    }

    /// Reads the stored entries in file order, keeping the ones that do not decode.
    fn read_entries(&self) -> Vec<Entry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!(target: "redlined::local", "No record file at '{}' yet", self.path.display());
                return Vec::new();
            }
            Err(err) => {
                log::warn!(target: "redlined::local", "Cannot read record file '{}': '{}'", self.path.display(), err);
                return Vec::new();
            }
        };
        if content.trim().is_empty() {
            return Vec::new();
        }

        let values = match serde_json::from_str::<Vec<Value>>(&content) {
            Ok(values) => values,
            Err(err) => {
                log::warn!(target: "redlined::local", "Record file '{}' is malformed, treating it as empty: '{}'", self.path.display(), err);
                return Vec::new();
            }
        };
        values
            .into_iter()
            .enumerate()
            .map(|(position, value)| match decode_record(&value, "local", position) {
                Ok(record) => Entry::Record(record),
                Err(reason) => {
                    log::warn!(target: "redlined::local", "Keeping record #{} of '{}' as stored, {}", position, self.path.display(), reason);
                    Entry::Unreadable(value)
                }
            })
            .collect()
    }

    /// Replaces the stored collection. Written to a sibling file first and renamed into place.
    fn save(&self, entries: &[Entry]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let serialized = serde_json::to_string_pretty(entries)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serialized)?;
        fs::rename(&staging, &self.path)?;
        log::debug!(target: "redlined::local", "Stored {} entries in '{}'", entries.len(), self.path.display());
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(untagged)]
/// One element of the record file. Entries that do not decode are written back unchanged.
enum Entry {
    Record(Record),
    Unreadable(Value),
}

impl Entry {
    fn id(&self) -> Option<RecordId> {
        match self {
            Entry::Record(record) => Some(record.id),
            Entry::Unreadable(_) => None,
        }
    }
}

impl RecordBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn list(&self, filter: &ServerFilter) -> Result<Vec<Record>, StoreError> {
        Ok(self.load().into_iter().filter(|r| filter.matches(r)).collect())
    }

    fn create(&self, record: &Record) -> Result<(), StoreError> {
        let mut entries = self.read_entries();
        let mut stored = record.clone();
        stored.row = None;
        entries.push(Entry::Record(stored));
        self.save(&entries)
    }

    fn update(&self, id: RecordId, record: &Record) -> Result<(), StoreError> {
        let mut entries = self.read_entries();
        let slot = entries
            .iter_mut()
            .find(|entry| entry.id() == Some(id))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        *slot = Entry::Record(Record {
            id,
            row: None,
            ..record.clone()
        });
        self.save(&entries)
    }

    fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        let mut entries = self.read_entries();
        let before = entries.len();
        entries.retain(|entry| entry.id() != Some(id));
        if entries.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.save(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Line, MeasurementType, Month};

    fn backend(dir: &tempfile::TempDir) -> LocalBackend {
        LocalBackend::new(&LocalParameters {
            path: dir.path().join("store").join("redlineData.json"),
        })
    }

    #[test]
    fn create_then_list_preserves_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let local = backend(&dir);
        let mut record = Record::new(2565, Month::July, Line::West, MeasurementType::Tsa, 17.25);
        record.note = Some("หลังฝนตก".to_string());

        local.create(&record).unwrap();
        let listed = local.list(&ServerFilter::default()).unwrap();
        assert_eq!(listed, vec![record]);
    }

    #[test]
    fn missing_or_malformed_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let local = backend(&dir);
        assert!(local.load().is_empty());

        fs::create_dir_all(local.path().parent().unwrap()).unwrap();
        fs::write(local.path(), "{ not json").unwrap();
        assert!(local.load().is_empty());
    }

    #[test]
    fn update_and_delete_address_records_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let local = backend(&dir);
        let first = Record::new(2565, Month::January, Line::North, MeasurementType::Tsp, 1.0);
        let second = Record::new(2565, Month::February, Line::North, MeasurementType::Tsp, 2.0);
        local.create(&first).unwrap();
        local.create(&second).unwrap();

        let mut changed = second.clone();
        changed.value = 20.0;
        local.update(second.id, &changed).unwrap();
        local.delete(first.id).unwrap();

        assert_eq!(local.load(), vec![changed]);
        assert!(matches!(local.delete(first.id), Err(StoreError::NotFound(_))));
        assert!(matches!(local.update(first.id, &first), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn legacy_records_get_ids_that_survive_the_next_write() {
        let dir = tempfile::tempdir().unwrap();
        let local = backend(&dir);
        fs::create_dir_all(local.path().parent().unwrap()).unwrap();
        fs::write(
            local.path(),
            r#"[{"year":2564,"month":"มกราคม","line":"North","type":"TSP","value":4},
                {"year":2564,"month":"กุมภาพันธ์","line":"Red","type":"TA","value":6}]"#,
        )
        .unwrap();

        let loaded = local.load();
        assert_eq!(loaded, local.load());
        local.delete(loaded[0].id).unwrap();

        let remaining = local.load();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, loaded[1].id);
    }

    #[test]
    fn unreadable_entries_survive_other_writes() {
        let dir = tempfile::tempdir().unwrap();
        let local = backend(&dir);
        fs::create_dir_all(local.path().parent().unwrap()).unwrap();
        fs::write(
            local.path(),
            r#"[{"year":2564,"month":"มกราคม","line":"East","type":"TSP","value":4},
                {"year":2564,"month":"มกราคม","line":"North","type":"TSP","value":5},
                {"year":2564,"month":"มกราคม","line":"Red","type":"PM10","value":6}]"#,
        )
        .unwrap();

        let loaded = local.load();
        assert_eq!(loaded.len(), 1);
        let record = Record::new(2565, Month::March, Line::Red, MeasurementType::Ta, 3.0);
        local.create(&record).unwrap();
        let mut changed = loaded[0].clone();
        changed.value = 50.0;
        local.update(loaded[0].id, &changed).unwrap();

        let after = fs::read_to_string(local.path()).unwrap();
        assert!(after.contains("East"));
        assert!(after.contains("PM10"));
        let stored: Vec<Value> = serde_json::from_str(&after).unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[0]["line"], "East");
        assert_eq!(stored[2]["type"], "PM10");
        assert_eq!(local.load(), vec![changed, record]);
    }

    #[test]
    fn server_filter_is_applied_on_list() {
        let dir = tempfile::tempdir().unwrap();
        let local = backend(&dir);
        local
            .create(&Record::new(2565, Month::January, Line::North, MeasurementType::Tsp, 1.0))
            .unwrap();
        local
            .create(&Record::new(2566, Month::January, Line::North, MeasurementType::Tsp, 1.0))
            .unwrap();
        let filter = ServerFilter {
            year: Some(2566),
            ..ServerFilter::default()
        };
        assert_eq!(local.list(&filter).unwrap().len(), 1);
    }
}
