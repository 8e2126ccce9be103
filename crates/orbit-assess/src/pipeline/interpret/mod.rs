//! Normalizes the three fitter result shapes into one [`FitOutcome`].
//!
//! Origin-specific key names stay inside this module; everything downstream
//! only sees the canonical outcome and its optional [`OrbitRecord`].

mod completion;
mod extension;
mod payload;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::designation::Designation;
use crate::pipeline::fitter::RawResult;
use crate::pipeline::record::OrbitRecord;

/// Which external fitter produced a raw result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginTag {
    ExtensionWrapper,
    IodWrapper,
    CometWrapper,
}

impl OriginTag {
    pub fn label(&self) -> &'static str {
        match self {
            OriginTag::ExtensionWrapper => "extension",
            OriginTag::IodWrapper => "iod",
            OriginTag::CometWrapper => "comet",
        }
    }
}

impl fmt::Display for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OriginTag {
    type Err = InterpretError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "extension" | "extension_wrapper" => Ok(OriginTag::ExtensionWrapper),
            "iod" | "iod_wrapper" => Ok(OriginTag::IodWrapper),
            "comet" | "comet_wrapper" => Ok(OriginTag::CometWrapper),
            _ => Err(InterpretError::UnknownOrigin(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpretError {
    #[error("unknown result origin '{0}'")]
    UnknownOrigin(String),
}

/// Observation thresholds used to flag weak fits and gate the IOD fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationPolicy {
    pub min_observations_for_iod: u64,
    pub few_observations: u64,
    pub short_arc_days: f64,
}

impl Default for ObservationPolicy {
    fn default() -> Self {
        Self {
            min_observations_for_iod: 3,
            few_observations: 6,
            short_arc_days: 1.0,
        }
    }
}

/// Canonical result of one fit attempt.
///
/// `orbit_produced` implies `executed`, and `normalized_record` is present
/// exactly when `orbit_produced` is true.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitOutcome {
    pub origin: OriginTag,
    /// The fitter got far enough to report on the designation at all.
    pub attempted: bool,
    pub executed: bool,
    pub orbit_produced: bool,
    pub input_generation_ok: bool,
    pub has_enough_observations: bool,
    pub preexisting_orbit: bool,
    pub bad_tracklet_ids: BTreeSet<String>,
    pub observation_count: Option<u64>,
    pub arc_length_days: Option<f64>,
    pub failure_reasons: Vec<String>,
    pub ambiguity: Option<String>,
    pub normalized_record: Option<OrbitRecord>,
}

impl FitOutcome {
    fn empty(origin: OriginTag) -> Self {
        Self {
            origin,
            attempted: false,
            executed: false,
            orbit_produced: false,
            input_generation_ok: false,
            has_enough_observations: false,
            preexisting_orbit: false,
            bad_tracklet_ids: BTreeSet::new(),
            observation_count: None,
            arc_length_days: None,
            failure_reasons: Vec::new(),
            ambiguity: None,
            normalized_record: None,
        }
    }

    /// The fitter ran but left nothing readable behind.
    fn undecodable(origin: OriginTag, error: &str) -> Self {
        let mut outcome = Self::empty(origin);
        outcome.attempted = true;
        outcome
            .failure_reasons
            .push(format!("{origin} output could not be decoded"));
        outcome.ambiguity = Some(format!("{origin} fitter ran but left unreadable output: {error}"));
        outcome
    }

    /// Attaches the record, keeping the produced/executed invariants intact.
    fn with_record(mut self, record: Option<OrbitRecord>) -> Self {
        self.orbit_produced = self.executed && record.is_some();
        self.normalized_record = if self.orbit_produced { record } else { None };
        self
    }

    pub fn failure_summary(&self) -> Option<String> {
        if self.orbit_produced {
            return None;
        }
        let mut parts = self.failure_reasons.clone();
        if let Some(ambiguity) = &self.ambiguity {
            parts.push(ambiguity.clone());
        }
        if parts.is_empty() {
            parts.push(format!("{} fit produced no orbit", self.origin));
        }
        Some(parts.join("; "))
    }
}

/// Stateless interpreter for all fitter origins.
#[derive(Debug, Clone, Default)]
pub struct ResultInterpreter {
    policy: ObservationPolicy,
}

impl ResultInterpreter {
    pub fn new(policy: ObservationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ObservationPolicy {
        &self.policy
    }

    pub fn interpret(
        &self,
        designation: &Designation,
        raw: &RawResult,
        origin: OriginTag,
    ) -> FitOutcome {
        if let Some(error) = &raw.decode_error {
            return FitOutcome::undecodable(origin, error);
        }
        match origin {
            OriginTag::ExtensionWrapper => extension::interpret(designation, raw, &self.policy),
            OriginTag::IodWrapper | OriginTag::CometWrapper => {
                completion::interpret(designation, raw, origin, &self.policy)
            }
        }
    }

    /// Same as [`Self::interpret`] for callers holding a textual origin.
    pub fn interpret_labelled(
        &self,
        designation: &Designation,
        raw: &RawResult,
        origin: &str,
    ) -> Result<FitOutcome, InterpretError> {
        let origin = origin.parse::<OriginTag>()?;
        Ok(self.interpret(designation, raw, origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::designation::MpcDesignationCodec;

    #[test]
    fn origin_labels_parse() {
        assert_eq!("iod".parse::<OriginTag>(), Ok(OriginTag::IodWrapper));
        assert_eq!(
            " Extension ".parse::<OriginTag>(),
            Ok(OriginTag::ExtensionWrapper)
        );
        assert_eq!(
            "comet_wrapper".parse::<OriginTag>(),
            Ok(OriginTag::CometWrapper)
        );
    }

    #[test]
    fn unknown_origin_is_rejected() {
        assert_eq!(
            "pan".parse::<OriginTag>(),
            Err(InterpretError::UnknownOrigin("pan".to_string()))
        );
    }

    #[test]
    fn outcome_without_record_is_not_produced() {
        let mut outcome = FitOutcome::empty(OriginTag::IodWrapper);
        outcome.executed = true;
        let outcome = outcome.with_record(None);
        assert!(!outcome.orbit_produced);
        assert_eq!(
            outcome.failure_summary().as_deref(),
            Some("iod fit produced no orbit")
        );
    }

    #[test]
    fn unreadable_output_is_ambiguous_for_every_origin() {
        let designation = Designation::parse("2008 WJ19", &MpcDesignationCodec).expect("valid");
        let interpreter = ResultInterpreter::default();
        let raw = RawResult::undecodable(Some(true), "malformed JSON in result.json");

        for origin in [
            OriginTag::ExtensionWrapper,
            OriginTag::IodWrapper,
            OriginTag::CometWrapper,
        ] {
            let outcome = interpreter.interpret(&designation, &raw, origin);
            assert!(outcome.attempted);
            assert!(!outcome.executed);
            assert!(!outcome.orbit_produced);
            let ambiguity = outcome.ambiguity.expect("decode failure surfaces");
            assert!(ambiguity.contains("malformed JSON in result.json"));
        }
    }
}
