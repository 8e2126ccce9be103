use serde::{Deserialize, Serialize};

use crate::pipeline::record::EpochTag;

/// Substring lists the classifier matches, most severe first.
///
/// The vocabulary must stay aligned with the strings produced by
/// [`super::summary::summarize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityRules {
    pub severe: Vec<String>,
    pub moderate: Vec<String>,
    pub required_epochs: Vec<EpochTag>,
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            severe: vec!["no orbit".to_string()],
            moderate: vec![
                "no CAR covariance".to_string(),
                "no COM covariance".to_string(),
            ],
            required_epochs: vec![EpochTag::MidEpoch, EpochTag::StdEpoch],
        }
    }
}

impl QualityRules {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let rules = QualityRules::from_json(r#"{"moderate": ["no KEP"]}"#).expect("parses");
        assert_eq!(rules.moderate, vec!["no KEP"]);
        assert_eq!(rules.severe, QualityRules::default().severe);
        assert_eq!(rules.required_epochs.len(), 2);
    }

    #[test]
    fn unknown_epoch_tags_are_rejected() {
        assert!(QualityRules::from_json(r#"{"required_epochs": ["eq7"]}"#).is_err());
    }
}
