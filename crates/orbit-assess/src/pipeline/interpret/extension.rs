use serde_json::Value;

use super::payload::{
    apply_observation_stats, build_record, missing_required, packed_entry, truthy,
};
use super::{FitOutcome, ObservationPolicy, OriginTag};
use crate::designation::Designation;
use crate::pipeline::fitter::RawResult;

const FAILED_FITS_KEY: &str = "failedfits";
const INPUT_GENERATION_KEY: &str = "INPUT_GENERATION_SUCCESS";

/// Extension-fit shape: a `failedfits` entry plus, when the wrapper got as
/// far as the object, an entry keyed by the packed designation.
///
/// Each failure cause is checked independently so every reason is reported.
pub(super) fn interpret(
    designation: &Designation,
    raw: &RawResult,
    policy: &ObservationPolicy,
) -> FitOutcome {
    let payload = &raw.payload;
    let mut outcome = FitOutcome::empty(OriginTag::ExtensionWrapper);
    let entry = packed_entry(payload, designation);
    apply_observation_stats(&mut outcome, entry, payload, policy);

    let failed_fits = payload.get(FAILED_FITS_KEY);
    outcome.attempted = failed_fits.is_some();
    outcome.input_generation_ok = entry
        .and_then(|entry| truthy(entry.get(INPUT_GENERATION_KEY)))
        .unwrap_or(false);

    let Some(failed_fits) = failed_fits else {
        outcome
            .failure_reasons
            .push("extension fit did not run: no failedfits entry".to_string());
        return outcome;
    };

    let mut executed = true;
    if !is_empty(failed_fits) {
        executed = false;
        outcome
            .failure_reasons
            .push(format!("failedfits reported: {failed_fits}"));
    }
    if entry.is_none() {
        executed = false;
        outcome.failure_reasons.push(format!(
            "no result entry for {}",
            designation.packed()
        ));
    }
    if entry.is_some() && !outcome.input_generation_ok {
        executed = false;
        outcome
            .failure_reasons
            .push("input generation failed".to_string());
    }
    outcome.executed = executed;

    let record = match entry {
        Some(entry) if executed => {
            let missing = missing_required(entry);
            if missing.is_empty() {
                Some(build_record(designation, entry))
            } else {
                outcome.ambiguity = Some(format!(
                    "extension fit executed but result lacks {}",
                    missing.join(", ")
                ));
                None
            }
        }
        _ => None,
    };

    outcome.with_record(record)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.trim().is_empty(),
        Value::Bool(flag) => !flag,
        Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::designation::MpcDesignationCodec;
    use crate::pipeline::record::EpochTag;
    use serde_json::json;

    fn designation() -> Designation {
        Designation::parse("2008 WJ19", &MpcDesignationCodec).expect("valid")
    }

    fn elements() -> Value {
        let block = json!({"element0": 1.0, "cov00": 0.1});
        json!({"EQU": block, "KEP": block, "CAR": block, "COM": block, "COT": block})
    }

    fn interpret_payload(payload: Value) -> FitOutcome {
        interpret(
            &designation(),
            &RawResult::new(payload),
            &ObservationPolicy::default(),
        )
    }

    #[test]
    fn missing_failedfits_means_not_executed() {
        let outcome = interpret_payload(json!({
            "K08W19J": {"INPUT_GENERATION_SUCCESS": true, "eq0dict": elements(),
                        "eq1dict": elements(), "rwodict": {}}
        }));
        assert!(!outcome.attempted);
        assert!(!outcome.executed);
        assert!(!outcome.orbit_produced);
        assert!(outcome.normalized_record.is_none());
    }

    #[test]
    fn clean_result_is_executed_and_normalized() {
        let outcome = interpret_payload(json!({
            "failedfits": {},
            "K08W19J": {
                "INPUT_GENERATION_SUCCESS": true,
                "NUMBER_OF_OBSERVATIONS": 42,
                "ARC_LENGTH_DAYS": 12.5,
                "eq0dict": elements(),
                "eq1dict": elements(),
                "rwodict": {"obs": [1, 2]},
                "addpardict": {"H": 21.3}
            }
        }));
        assert!(outcome.executed);
        assert!(outcome.orbit_produced);
        assert!(outcome.has_enough_observations);
        assert_eq!(outcome.observation_count, Some(42));
        let record = outcome.normalized_record.expect("record present");
        assert_eq!(record.packed_designation, "K08W19J");
        assert_eq!(record.per_epoch_elements.len(), 2);
        assert_eq!(record.quality_summary[&EpochTag::MidEpoch], "ok");
        assert_eq!(record.observation_residuals, json!({"obs": [1, 2]}));
        assert!(record.extra_parameters.is_some());
    }

    #[test]
    fn entry_under_fitter_name_is_not_a_result() {
        let outcome = interpret_payload(json!({
            "failedfits": {},
            "2008WJ19": {"INPUT_GENERATION_SUCCESS": true, "eq0dict": elements(),
                         "eq1dict": elements(), "rwodict": {}}
        }));
        assert!(outcome.attempted);
        assert!(!outcome.executed);
        assert!(!outcome.orbit_produced);
        assert!(outcome.normalized_record.is_none());
        assert_eq!(outcome.failure_reasons, vec!["no result entry for K08W19J"]);
    }

    #[test]
    fn every_failure_cause_is_collected() {
        let outcome = interpret_payload(json!({"failedfits": {"K08W19J": "no convergence"}}));
        assert!(outcome.attempted);
        assert!(!outcome.executed);
        assert_eq!(outcome.failure_reasons.len(), 2);
        assert!(outcome.failure_reasons[0].contains("no convergence"));
        assert!(outcome.failure_reasons[1].contains("K08W19J"));
    }

    #[test]
    fn input_generation_failure_downgrades_execution() {
        let outcome = interpret_payload(json!({
            "failedfits": {},
            "K08W19J": {"INPUT_GENERATION_SUCCESS": false, "NUMBER_OF_OBSERVATIONS": 5}
        }));
        assert!(outcome.attempted);
        assert!(!outcome.executed);
        assert!(!outcome.input_generation_ok);
        assert!(outcome.has_enough_observations);
        assert_eq!(outcome.failure_reasons, vec!["input generation failed"]);
    }

    #[test]
    fn executed_without_required_keys_is_ambiguous() {
        let outcome = interpret_payload(json!({
            "failedfits": [],
            "K08W19J": {"INPUT_GENERATION_SUCCESS": true, "eq0dict": elements()}
        }));
        assert!(outcome.executed);
        assert!(!outcome.orbit_produced);
        let ambiguity = outcome.ambiguity.expect("ambiguity recorded");
        assert!(ambiguity.contains("eq1dict"));
        assert!(ambiguity.contains("rwodict"));
    }

    #[test]
    fn preexisting_orbit_and_tracklets_are_read() {
        let outcome = interpret_payload(json!({
            "failedfits": {},
            "K08W19J": {
                "INPUT_GENERATION_SUCCESS": false,
                "PREEXISTING_ORBIT": "yes",
                "BAD_TRACKLETS": ["t1", 7]
            }
        }));
        assert!(outcome.preexisting_orbit);
        assert_eq!(outcome.bad_tracklet_ids.len(), 2);
        assert!(outcome.bad_tracklet_ids.contains("7"));
    }
}
