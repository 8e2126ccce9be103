use std::collections::BTreeMap;

use serde_json::Value;

use crate::pipeline::record::{ElementSet, EpochTag};

/// Coordinate-system blocks inspected in every element set.
pub const COORDINATE_BLOCKS: [&str; 5] = ["EQU", "KEP", "CAR", "COM", "COT"];

pub const NO_ORBIT: &str = "no orbit";
pub const OK: &str = "ok";

/// Builds the per-epoch diagnostic text the classifier matches against.
pub fn summarize(element_sets: &BTreeMap<EpochTag, ElementSet>) -> BTreeMap<EpochTag, String> {
    element_sets
        .iter()
        .map(|(tag, elements)| (*tag, summarize_epoch(elements)))
        .collect()
}

pub fn summarize_epoch(elements: &ElementSet) -> String {
    if elements.is_empty() {
        return NO_ORBIT.to_string();
    }

    let findings: Vec<String> = COORDINATE_BLOCKS
        .iter()
        .filter_map(|block| block_finding(block, elements.get(*block)))
        .collect();

    if findings.is_empty() {
        OK.to_string()
    } else {
        findings.join(", ")
    }
}

fn block_finding(block: &str, value: Option<&Value>) -> Option<String> {
    match value.and_then(Value::as_object) {
        None => Some(format!("no {block}")),
        Some(params) if params.is_empty() => Some(format!("no {block}")),
        Some(params) if params.contains_key("element0") && !params.contains_key("cov00") => {
            Some(format!("no {block} covariance"))
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete_set() -> ElementSet {
        let mut set = ElementSet::new();
        for block in COORDINATE_BLOCKS {
            set.insert(block.to_string(), json!({"element0": 1.5, "cov00": 0.01}));
        }
        set
    }

    #[test]
    fn complete_element_set_is_ok() {
        assert_eq!(summarize_epoch(&complete_set()), "ok");
    }

    #[test]
    fn empty_element_set_has_no_orbit() {
        assert_eq!(summarize_epoch(&ElementSet::new()), "no orbit");
    }

    #[test]
    fn findings_are_joined_in_block_order() {
        let mut set = complete_set();
        set.insert("CAR".to_string(), json!({"element0": 1.5}));
        set.insert("KEP".to_string(), json!({}));
        set.insert("COM".to_string(), json!({"element0": 2.0}));
        assert_eq!(
            summarize_epoch(&set),
            "no KEP, no CAR covariance, no COM covariance"
        );
    }

    #[test]
    fn missing_block_counts_as_empty() {
        let mut set = complete_set();
        set.remove("COT");
        assert_eq!(summarize_epoch(&set), "no COT");
    }

    #[test]
    fn summarize_covers_each_present_epoch() {
        let mut sets = BTreeMap::new();
        sets.insert(EpochTag::MidEpoch, complete_set());
        sets.insert(EpochTag::StdEpoch, ElementSet::new());
        let summary = summarize(&sets);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[&EpochTag::MidEpoch], "ok");
        assert_eq!(summary[&EpochTag::StdEpoch], "no orbit");
    }
}
