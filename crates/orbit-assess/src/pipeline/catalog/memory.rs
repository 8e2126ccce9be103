use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{CatalogBackend, CatalogError, OrbitTable};
use crate::pipeline::record::Row;

#[derive(Debug, Default)]
struct Tables {
    rows: BTreeMap<(OrbitTable, String), Row>,
    archive: Vec<(OrbitTable, Row)>,
}

/// Process-local backend for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tables: Mutex<Tables>,
}

impl InMemoryBackend {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, CatalogError> {
        self.tables
            .lock()
            .map_err(|_| CatalogError::Unavailable("in-memory catalog lock poisoned".to_string()))
    }

    /// Archived rows for `table`, oldest first.
    pub fn archived(&self, table: OrbitTable) -> Vec<Row> {
        self.lock()
            .map(|tables| {
                tables
                    .archive
                    .iter()
                    .filter(|(archived_in, _)| *archived_in == table)
                    .map(|(_, row)| row.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: OrbitTable) -> usize {
        self.lock()
            .map(|tables| tables.rows.keys().filter(|(t, _)| *t == table).count())
            .unwrap_or(0)
    }
}

impl CatalogBackend for InMemoryBackend {
    fn fetch_row(&self, table: OrbitTable, key: &str) -> Result<Option<Row>, CatalogError> {
        Ok(self.lock()?.rows.get(&(table, key.to_string())).cloned())
    }

    fn store_row(&self, table: OrbitTable, key: &str, row: Row) -> Result<(), CatalogError> {
        self.lock()?.rows.insert((table, key.to_string()), row);
        Ok(())
    }

    fn append_archive(&self, table: OrbitTable, row: Row) -> Result<(), CatalogError> {
        self.lock()?.archive.push((table, row));
        Ok(())
    }

    fn keys(&self, table: OrbitTable) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .lock()?
            .rows
            .keys()
            .filter(|(t, _)| *t == table)
            .map(|(_, key)| key.clone())
            .collect())
    }
}
