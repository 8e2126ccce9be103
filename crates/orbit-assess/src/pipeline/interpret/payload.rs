use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::{FitOutcome, ObservationPolicy};
use crate::designation::Designation;
use crate::pipeline::quality::summarize;
use crate::pipeline::record::{EpochTag, OrbitRecord};

pub(super) const RESIDUALS_KEY: &str = "rwodict";
pub(super) const EXTRA_PARAMETERS_KEY: &str = "addpardict";
pub(super) const OBSERVATION_COUNT_KEY: &str = "NUMBER_OF_OBSERVATIONS";
pub(super) const ARC_LENGTH_KEY: &str = "ARC_LENGTH_DAYS";
pub(super) const PREEXISTING_ORBIT_KEY: &str = "PREEXISTING_ORBIT";
pub(super) const BAD_TRACKLETS_KEY: &str = "BAD_TRACKLETS";

/// Keys an entry needs before it is accepted as an orbit.
pub(super) fn required_keys() -> [&'static str; 3] {
    [
        EpochTag::MidEpoch.raw_key(),
        EpochTag::StdEpoch.raw_key(),
        RESIDUALS_KEY,
    ]
}

pub(super) fn missing_required(entry: &Map<String, Value>) -> Vec<&'static str> {
    required_keys()
        .into_iter()
        .filter(|key| !matches!(entry.get(*key), Some(Value::Object(_))))
        .collect()
}

/// Entry keyed by the packed designation only.
pub(super) fn packed_entry<'a>(
    payload: &'a Value,
    designation: &Designation,
) -> Option<&'a Map<String, Value>> {
    payload.get(designation.packed()).and_then(Value::as_object)
}

/// Finds the per-designation entry, first by packed form then by fitter name.
/// The IOD and comet wrappers key their output either way.
pub(super) fn designation_entry<'a>(
    payload: &'a Value,
    designation: &Designation,
) -> Option<&'a Map<String, Value>> {
    [designation.packed(), designation.fitter_name()]
        .into_iter()
        .find_map(|key| payload.get(key).and_then(Value::as_object))
}

/// Reads a key from the entry, falling back to the top level of the payload.
pub(super) fn scoped<'a>(
    entry: Option<&'a Map<String, Value>>,
    payload: &'a Value,
    key: &str,
) -> Option<&'a Value> {
    entry
        .and_then(|entry| entry.get(key))
        .or_else(|| payload.get(key))
}

pub(super) fn truthy(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn days(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn tracklets(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(id) => Some(id.clone()),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::Object(items)) => items.keys().cloned().collect(),
        _ => BTreeSet::new(),
    }
}

/// Copies the observation diagnostics shared by every origin into `outcome`.
pub(super) fn apply_observation_stats(
    outcome: &mut FitOutcome,
    entry: Option<&Map<String, Value>>,
    payload: &Value,
    policy: &ObservationPolicy,
) {
    outcome.observation_count = count(scoped(entry, payload, OBSERVATION_COUNT_KEY));
    outcome.arc_length_days = days(scoped(entry, payload, ARC_LENGTH_KEY));
    outcome.preexisting_orbit =
        truthy(scoped(entry, payload, PREEXISTING_ORBIT_KEY)).unwrap_or(false);
    outcome.bad_tracklet_ids = tracklets(scoped(entry, payload, BAD_TRACKLETS_KEY));
    outcome.has_enough_observations = outcome
        .observation_count
        .map(|n| n >= policy.min_observations_for_iod)
        .unwrap_or(false);
}

/// Builds the canonical record from an accepted entry.
pub(super) fn build_record(designation: &Designation, entry: &Map<String, Value>) -> OrbitRecord {
    let per_epoch_elements: BTreeMap<EpochTag, Map<String, Value>> = EpochTag::ordered()
        .into_iter()
        .filter_map(|tag| {
            entry
                .get(tag.raw_key())
                .and_then(Value::as_object)
                .map(|elements| (tag, elements.clone()))
        })
        .collect();

    let quality_summary = summarize(&per_epoch_elements);

    OrbitRecord {
        packed_designation: designation.packed().to_string(),
        unpacked_designation: designation.unpacked().to_string(),
        per_epoch_elements,
        observation_residuals: entry.get(RESIDUALS_KEY).cloned().unwrap_or(Value::Null),
        quality_summary,
        extra_parameters: entry
            .get(EXTRA_PARAMETERS_KEY)
            .and_then(Value::as_object)
            .filter(|extra| !extra.is_empty())
            .cloned(),
    }
}
