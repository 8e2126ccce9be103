//! Orbit quality: the per-epoch summary builder and the verdict classifier.

mod rules;
pub mod summary;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::record::EpochTag;

pub use rules::QualityRules;
pub use summary::summarize;

/// Quality of a stored or freshly fitted orbit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityVerdict {
    Good,
    Intermediate,
    Bad,
}

impl QualityVerdict {
    fn severity(&self) -> u8 {
        match self {
            QualityVerdict::Good => 0,
            QualityVerdict::Intermediate => 1,
            QualityVerdict::Bad => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityVerdict::Good => "good",
            QualityVerdict::Intermediate => "intermediate",
            QualityVerdict::Bad => "bad",
        }
    }
}

/// Orders by severity, so `Bad > Intermediate > Good`.
impl Ord for QualityVerdict {
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl PartialOrd for QualityVerdict {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QualityError {
    #[error("diagnostics are missing required epoch '{}'", .0.label())]
    MissingEpochKey(EpochTag),
}

/// Stateless classifier driven by [`QualityRules`].
#[derive(Debug, Clone, Default)]
pub struct QualityClassifier {
    rules: QualityRules,
}

impl QualityClassifier {
    pub fn new(rules: QualityRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &QualityRules {
        &self.rules
    }

    /// Severe substrings are checked over every epoch before any moderate one,
    /// so a severe finding always masks lesser ones.
    pub fn classify(
        &self,
        diagnostics: &BTreeMap<EpochTag, String>,
    ) -> Result<QualityVerdict, QualityError> {
        if let Some(missing) = self
            .rules
            .required_epochs
            .iter()
            .find(|tag| !diagnostics.contains_key(tag))
        {
            return Err(QualityError::MissingEpochKey(*missing));
        }

        if matches_any(&self.rules.severe, diagnostics) {
            return Ok(QualityVerdict::Bad);
        }
        if matches_any(&self.rules.moderate, diagnostics) {
            return Ok(QualityVerdict::Intermediate);
        }
        Ok(QualityVerdict::Good)
    }
}

fn matches_any(needles: &[String], diagnostics: &BTreeMap<EpochTag, String>) -> bool {
    needles
        .iter()
        .filter(|needle| !needle.is_empty())
        .any(|needle| diagnostics.values().any(|text| text.contains(needle.as_str())))
}
