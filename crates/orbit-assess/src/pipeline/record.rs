use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reference epoch an element block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochTag {
    MidEpoch,
    StdEpoch,
    StdEpochPeri,
    StdEpochNext,
}

impl EpochTag {
    pub const fn ordered() -> [EpochTag; 4] {
        [
            EpochTag::MidEpoch,
            EpochTag::StdEpoch,
            EpochTag::StdEpochPeri,
            EpochTag::StdEpochNext,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            EpochTag::MidEpoch => "mid_epoch",
            EpochTag::StdEpoch => "std_epoch",
            EpochTag::StdEpochPeri => "std_epoch_peri",
            EpochTag::StdEpochNext => "std_epoch_next",
        }
    }

    /// Key the fitters use for this epoch's element dictionary.
    pub fn raw_key(&self) -> &'static str {
        match self {
            EpochTag::MidEpoch => "eq0dict",
            EpochTag::StdEpoch => "eq1dict",
            EpochTag::StdEpochPeri => "eq2dict",
            EpochTag::StdEpochNext => "eq3dict",
        }
    }

    /// Catalog column holding this epoch's elements.
    pub fn column(&self) -> &'static str {
        match self {
            EpochTag::MidEpoch => "mid_epoch_json",
            EpochTag::StdEpoch => "standard_epoch_json",
            EpochTag::StdEpochPeri => "standard_epoch_closest_to_pericenter_json",
            EpochTag::StdEpochNext => "standard_epoch_closest_to_next_passage_json",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|tag| tag.label() == label.trim())
    }
}

/// Elements of one epoch, keyed by coordinate-system block (`EQU`, `KEP`, ...).
pub type ElementSet = Map<String, Value>;

/// Per-observation residuals exactly as the fitter reported them.
pub type ResidualSet = Value;

pub const PACKED_COLUMN: &str = "packed_designation";
pub const UNPACKED_COLUMN: &str = "unpacked_designation";
pub const RESIDUALS_COLUMN: &str = "rwo_json";
pub const QUALITY_COLUMN: &str = "quality_json";
pub const EXTRA_PARAMETERS_COLUMN: &str = "additional_parameter_json";

/// One stored catalog row: column name to JSON value.
pub type Row = BTreeMap<String, Value>;

/// Canonical persisted unit, unique per packed designation within a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitRecord {
    pub packed_designation: String,
    pub unpacked_designation: String,
    pub per_epoch_elements: BTreeMap<EpochTag, ElementSet>,
    pub observation_residuals: ResidualSet,
    pub quality_summary: BTreeMap<EpochTag, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_parameters: Option<Map<String, Value>>,
}

impl OrbitRecord {
    /// Columns carried by this record. Epochs the fitter did not produce are
    /// left out so an upsert never nulls what is already stored.
    pub fn to_columns(&self) -> Row {
        let mut row = Row::new();
        row.insert(
            PACKED_COLUMN.to_string(),
            Value::String(self.packed_designation.clone()),
        );
        row.insert(
            UNPACKED_COLUMN.to_string(),
            Value::String(self.unpacked_designation.clone()),
        );
        for (tag, elements) in &self.per_epoch_elements {
            row.insert(tag.column().to_string(), Value::Object(elements.clone()));
        }
        row.insert(
            RESIDUALS_COLUMN.to_string(),
            self.observation_residuals.clone(),
        );
        let summary: Map<String, Value> = self
            .quality_summary
            .iter()
            .map(|(tag, text)| (tag.label().to_string(), Value::String(text.clone())))
            .collect();
        row.insert(QUALITY_COLUMN.to_string(), Value::Object(summary));
        if let Some(extra) = &self.extra_parameters {
            row.insert(
                EXTRA_PARAMETERS_COLUMN.to_string(),
                Value::Object(extra.clone()),
            );
        }
        row
    }
}

/// Reads the quality column of a stored row back into tagged form.
/// Unknown epoch labels and non-string values are ignored.
pub fn quality_from_row(row: &Row) -> Option<BTreeMap<EpochTag, String>> {
    let summary = row.get(QUALITY_COLUMN)?.as_object()?;
    Some(
        summary
            .iter()
            .filter_map(|(label, text)| {
                Some((EpochTag::from_label(label)?, text.as_str()?.to_string()))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> OrbitRecord {
        let mut elements = BTreeMap::new();
        let mut mid = ElementSet::new();
        mid.insert("CAR".to_string(), json!({"element0": 1.0, "cov00": 0.1}));
        elements.insert(EpochTag::MidEpoch, mid);

        let mut summary = BTreeMap::new();
        summary.insert(EpochTag::MidEpoch, "ok".to_string());

        OrbitRecord {
            packed_designation: "K08W19J".to_string(),
            unpacked_designation: "2008 WJ19".to_string(),
            per_epoch_elements: elements,
            observation_residuals: json!({"obs": []}),
            quality_summary: summary,
            extra_parameters: None,
        }
    }

    #[test]
    fn columns_skip_absent_epochs_and_extras() {
        let row = record().to_columns();
        assert!(row.contains_key("mid_epoch_json"));
        assert!(!row.contains_key("standard_epoch_json"));
        assert!(!row.contains_key(EXTRA_PARAMETERS_COLUMN));
        assert_eq!(row[PACKED_COLUMN], json!("K08W19J"));
        assert_eq!(row[QUALITY_COLUMN], json!({"mid_epoch": "ok"}));
    }

    #[test]
    fn quality_reads_back_from_row() {
        let mut row = record().to_columns();
        row.insert(
            QUALITY_COLUMN.to_string(),
            json!({"mid_epoch": "ok", "std_epoch": "no CAR covariance", "eq9": "?"}),
        );
        let summary = quality_from_row(&row).expect("quality column present");
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[&EpochTag::StdEpoch], "no CAR covariance");
    }

    #[test]
    fn epoch_labels_round_trip_through_lookup() {
        for tag in EpochTag::ordered() {
            assert_eq!(EpochTag::from_label(tag.label()), Some(tag));
        }
        assert_eq!(EpochTag::from_label("eq0dict"), None);
    }
}
