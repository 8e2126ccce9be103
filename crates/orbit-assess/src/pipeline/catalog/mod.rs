//! Thin adapter over the orbit catalog.
//!
//! Destination tables come from a fixed allow-list that is checked before any
//! backend call, and upserts merge explicitly on the packed designation so they
//! stay idempotent whatever the storage underneath enforces.

mod json_dir;
mod memory;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::designation::{Designation, OrbitClass};
use crate::pipeline::quality::summarize;
use crate::pipeline::record::{quality_from_row, EpochTag, OrbitRecord, Row, PACKED_COLUMN};

pub use json_dir::JsonDirBackend;
pub use memory::InMemoryBackend;

const ARCHIVED_AT_COLUMN: &str = "archived_at";

/// Allow-listed destination tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrbitTable {
    AsteroidOrbits,
    CometOrbits,
    SatelliteOrbits,
}

impl OrbitTable {
    pub const ALL: [OrbitTable; 3] = [
        OrbitTable::AsteroidOrbits,
        OrbitTable::CometOrbits,
        OrbitTable::SatelliteOrbits,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OrbitTable::AsteroidOrbits => "asteroid_orbits",
            OrbitTable::CometOrbits => "comet_orbits",
            OrbitTable::SatelliteOrbits => "satellite_orbits",
        }
    }

    /// Append-only history table paired with this one.
    pub fn archive_name(&self) -> &'static str {
        match self {
            OrbitTable::AsteroidOrbits => "asteroid_orbits_archive",
            OrbitTable::CometOrbits => "comet_orbits_archive",
            OrbitTable::SatelliteOrbits => "satellite_orbits_archive",
        }
    }

    /// Exact-match lookup; anything outside the allow-list is rejected.
    pub fn from_name(name: &str) -> Result<Self, CatalogError> {
        Self::ALL
            .into_iter()
            .find(|table| table.name() == name)
            .ok_or_else(|| CatalogError::InvalidTable(name.to_string()))
    }

    pub fn for_class(class: OrbitClass) -> Self {
        match class {
            OrbitClass::Asteroid => OrbitTable::AsteroidOrbits,
            OrbitClass::Comet => OrbitTable::CometOrbits,
            OrbitClass::Satellite => OrbitTable::SatelliteOrbits,
        }
    }
}

impl fmt::Display for OrbitTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("table '{0}' is not an allowed destination")]
    InvalidTable(String),
    #[error("no stored result for {0}")]
    NotFound(String),
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("catalog serialization failed: {0}")]
    Serialization(String),
    #[error("stored row for {expected} carries key {found}")]
    KeyMismatch { expected: String, found: String },
}

/// Row-level storage behind the catalog.
pub trait CatalogBackend: Send + Sync {
    fn fetch_row(&self, table: OrbitTable, key: &str) -> Result<Option<Row>, CatalogError>;
    fn store_row(&self, table: OrbitTable, key: &str, row: Row) -> Result<(), CatalogError>;
    fn append_archive(&self, table: OrbitTable, row: Row) -> Result<(), CatalogError>;
    fn keys(&self, table: OrbitTable) -> Result<Vec<String>, CatalogError>;
}

/// Designation-scoped catalog operations.
pub struct CatalogStore<B> {
    backend: B,
}

impl<B> CatalogStore<B>
where
    B: CatalogBackend,
{
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn has_result(
        &self,
        designation: &Designation,
        table: OrbitTable,
    ) -> Result<bool, CatalogError> {
        Ok(self.backend.fetch_row(table, designation.packed())?.is_some())
    }

    /// Presence of the designation in every allow-listed table.
    pub fn presence(
        &self,
        designation: &Designation,
    ) -> Result<BTreeMap<OrbitTable, bool>, CatalogError> {
        OrbitTable::ALL
            .into_iter()
            .map(|table| Ok((table, self.has_result(designation, table)?)))
            .collect()
    }

    /// Stored per-epoch summary. Rows written without one are summarized from
    /// their stored element columns.
    pub fn quality_summary(
        &self,
        designation: &Designation,
        table: OrbitTable,
    ) -> Result<BTreeMap<EpochTag, String>, CatalogError> {
        let row = self
            .backend
            .fetch_row(table, designation.packed())?
            .ok_or_else(|| CatalogError::NotFound(designation.packed().to_string()))?;

        if let Some(summary) = quality_from_row(&row) {
            return Ok(summary);
        }

        let elements = EpochTag::ordered()
            .into_iter()
            .filter_map(|tag| {
                row.get(tag.column())
                    .and_then(Value::as_object)
                    .map(|set| (tag, set.clone()))
            })
            .collect();
        Ok(summarize(&elements))
    }

    /// Insert-or-merge keyed on the packed designation. `table` is validated
    /// against the allow-list before the backend is touched.
    pub fn upsert(&self, record: &OrbitRecord, table: &str) -> Result<(), CatalogError> {
        let table = OrbitTable::from_name(table)?;
        self.upsert_into(record, table)
    }

    pub fn upsert_into(&self, record: &OrbitRecord, table: OrbitTable) -> Result<(), CatalogError> {
        let key = record.packed_designation.as_str();
        if key.trim().is_empty() {
            return Err(CatalogError::Serialization(
                "record has an empty packed designation".to_string(),
            ));
        }

        let existing = self.backend.fetch_row(table, key)?;
        if let Some(found) = existing
            .as_ref()
            .and_then(|row| row.get(PACKED_COLUMN))
            .and_then(Value::as_str)
        {
            if found != key {
                return Err(CatalogError::KeyMismatch {
                    expected: key.to_string(),
                    found: found.to_string(),
                });
            }
        }

        let mut merged = existing.clone().unwrap_or_default();
        merged.extend(record.to_columns());

        if existing.as_ref() == Some(&merged) {
            debug!(table = %table, key, "stored row already current");
            return Ok(());
        }
        self.backend.store_row(table, key, merged)
    }

    /// Appends the record to the table's history; never overwrites.
    pub fn archive(&self, record: &OrbitRecord, table: &str) -> Result<(), CatalogError> {
        let table = OrbitTable::from_name(table)?;
        self.archive_into(record, table)
    }

    pub fn archive_into(&self, record: &OrbitRecord, table: OrbitTable) -> Result<(), CatalogError> {
        let mut row = record.to_columns();
        row.insert(
            ARCHIVED_AT_COLUMN.to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        self.backend.append_archive(table, row)
    }

    pub fn stored_designations(&self, table: OrbitTable) -> Result<Vec<String>, CatalogError> {
        self.backend.keys(table)
    }
}
