use super::payload::{apply_observation_stats, build_record, designation_entry, missing_required};
use super::{FitOutcome, ObservationPolicy, OriginTag};
use crate::designation::Designation;
use crate::pipeline::fitter::RawResult;

/// IOD and comet shape: a completion flag plus a nested per-designation dict.
///
/// An orbit is accepted only when the fitter completed and every required
/// key is present; anything partial is reported as ambiguous.
pub(super) fn interpret(
    designation: &Designation,
    raw: &RawResult,
    origin: OriginTag,
    policy: &ObservationPolicy,
) -> FitOutcome {
    let payload = &raw.payload;
    let mut outcome = FitOutcome::empty(origin);
    let entry = designation_entry(payload, designation);
    apply_observation_stats(&mut outcome, entry, payload, policy);

    outcome.attempted = true;
    outcome.executed = raw.completion.unwrap_or(false);
    outcome.input_generation_ok = outcome.executed;

    if raw.completion.is_none() {
        outcome
            .failure_reasons
            .push(format!("{origin} fitter reported no completion code"));
    } else if !outcome.executed {
        outcome
            .failure_reasons
            .push(format!("{origin} fitter did not complete"));
    }

    let Some(entry) = entry else {
        if outcome.executed {
            outcome.failure_reasons.push(format!(
                "no result entry for {} or {}",
                designation.packed(),
                designation.fitter_name()
            ));
        }
        return outcome.with_record(None);
    };

    let missing = missing_required(entry);
    let record = if !outcome.executed {
        if missing.is_empty() {
            outcome.ambiguity = Some(format!(
                "{origin} fitter reported failure but its result carries a complete orbit"
            ));
        }
        None
    } else if missing.is_empty() {
        Some(build_record(designation, entry))
    } else {
        outcome.ambiguity = Some(format!(
            "{origin} result for {} lacks {}",
            designation.packed(),
            missing.join(", ")
        ));
        None
    };

    if record.is_some() && outcome.observation_count.is_none() {
        outcome.has_enough_observations = true;
    }

    outcome.with_record(record)
}
