use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::{CatalogBackend, CatalogError, OrbitTable};
use crate::pipeline::record::Row;

static WRITE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// One JSON file per row under `<root>/<table>/<packed>.json`; archives are
/// JSON lines in `<root>/<table>_archive.jsonl`.
#[derive(Debug)]
pub struct JsonDirBackend {
    root: PathBuf,
    archive_lock: Mutex<()>,
}

impl JsonDirBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            archive_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn row_path(&self, table: OrbitTable, key: &str) -> Result<PathBuf, CatalogError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '~' | '_' | '-'));
        if !valid {
            return Err(CatalogError::Serialization(format!(
                "'{key}' is not usable as a row key"
            )));
        }
        Ok(self.root.join(table.name()).join(format!("{key}.json")))
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> CatalogError {
    CatalogError::Unavailable(format!("{}: {err}", path.display()))
}

impl CatalogBackend for JsonDirBackend {
    fn fetch_row(&self, table: OrbitTable, key: &str) -> Result<Option<Row>, CatalogError> {
        let path = self.row_path(table, key)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(unavailable(&path, err)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| CatalogError::Serialization(format!("{}: {err}", path.display())))
    }

    fn store_row(&self, table: OrbitTable, key: &str, row: Row) -> Result<(), CatalogError> {
        let path = self.row_path(table, key)?;
        let dir = self.root.join(table.name());
        fs::create_dir_all(&dir).map_err(|err| unavailable(&dir, err))?;

        let body = serde_json::to_vec_pretty(&row)
            .map_err(|err| CatalogError::Serialization(err.to_string()))?;
        let tmp = dir.join(format!(
            ".{key}.{}.{}.tmp",
            std::process::id(),
            WRITE_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, body).map_err(|err| unavailable(&tmp, err))?;
        fs::rename(&tmp, &path).map_err(|err| {
            fs::remove_file(&tmp).ok();
            unavailable(&path, err)
        })
    }

    fn append_archive(&self, table: OrbitTable, row: Row) -> Result<(), CatalogError> {
        let mut line = serde_json::to_string(&row)
            .map_err(|err| CatalogError::Serialization(err.to_string()))?;
        line.push('\n');

        let _guard = self
            .archive_lock
            .lock()
            .map_err(|_| CatalogError::Unavailable("archive lock poisoned".to_string()))?;
        fs::create_dir_all(&self.root).map_err(|err| unavailable(&self.root, err))?;
        let path = self.root.join(format!("{}.jsonl", table.archive_name()));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| unavailable(&path, err))?;
        file.write_all(line.as_bytes())
            .map_err(|err| unavailable(&path, err))
    }

    fn keys(&self, table: OrbitTable) -> Result<Vec<String>, CatalogError> {
        let dir = self.root.join(table.name());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(unavailable(&dir, err)),
        };
        let mut keys: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".json")
                    .filter(|key| !key.starts_with('.'))
                    .map(str::to_string)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static SCRATCH: AtomicU64 = AtomicU64::new(0);

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!(
            "orbit_json_catalog_{}_{}",
            std::process::id(),
            SCRATCH.fetch_add(1, Ordering::Relaxed)
        ))
    }

    fn row(value: &str) -> Row {
        let mut row = Row::new();
        row.insert("packed_designation".to_string(), json!("K08W19J"));
        row.insert("quality_json".to_string(), json!({"mid_epoch": value}));
        row
    }

    #[test]
    fn rows_round_trip_through_files() {
        let root = scratch_dir();
        let backend = JsonDirBackend::new(&root);
        assert_eq!(
            backend
                .fetch_row(OrbitTable::AsteroidOrbits, "K08W19J")
                .expect("fetch"),
            None
        );
        backend
            .store_row(OrbitTable::AsteroidOrbits, "K08W19J", row("ok"))
            .expect("store");
        backend
            .store_row(OrbitTable::AsteroidOrbits, "K08W19J", row("no orbit"))
            .expect("overwrite");
        let stored = backend
            .fetch_row(OrbitTable::AsteroidOrbits, "K08W19J")
            .expect("fetch")
            .expect("present");
        assert_eq!(stored, row("no orbit"));
        assert_eq!(
            backend.keys(OrbitTable::AsteroidOrbits).expect("keys"),
            vec!["K08W19J"]
        );
        assert!(backend.keys(OrbitTable::CometOrbits).expect("keys").is_empty());
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn archive_appends_lines() {
        let root = scratch_dir();
        let backend = JsonDirBackend::new(&root);
        backend
            .append_archive(OrbitTable::AsteroidOrbits, row("ok"))
            .expect("archive");
        backend
            .append_archive(OrbitTable::AsteroidOrbits, row("ok"))
            .expect("archive");
        let contents = fs::read_to_string(root.join("asteroid_orbits_archive.jsonl"))
            .expect("archive file");
        assert_eq!(contents.lines().count(), 2);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let backend = JsonDirBackend::new(scratch_dir());
        assert!(matches!(
            backend.fetch_row(OrbitTable::AsteroidOrbits, "../escape"),
            Err(CatalogError::Serialization(_))
        ));
    }
}
