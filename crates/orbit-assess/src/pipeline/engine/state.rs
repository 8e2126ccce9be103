use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::status::StatusCode;
use crate::designation::OrbitClass;
use crate::pipeline::catalog::OrbitTable;
use crate::pipeline::interpret::{FitOutcome, ObservationPolicy, OriginTag};
use crate::pipeline::quality::QualityVerdict;
use crate::pipeline::record::EpochTag;

/// Pipeline stages, in the only order a run may visit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    CheckExisting,
    HasOrbit,
    NoOrbit,
    Fitting,
    Interpreting,
    Persisting,
    Reassessing,
    Done,
}

/// Error taxonomy recorded against a failed assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    ExternalUnavailable,
    InterpretationAmbiguous,
    Persistence,
    Cancelled,
}

impl FailureKind {
    pub const fn ordered() -> [FailureKind; 5] {
        [
            FailureKind::Configuration,
            FailureKind::ExternalUnavailable,
            FailureKind::InterpretationAmbiguous,
            FailureKind::Persistence,
            FailureKind::Cancelled,
        ]
    }

    /// Only launch and connection problems are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::ExternalUnavailable)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Configuration => "configuration",
            FailureKind::ExternalUnavailable => "external_unavailable",
            FailureKind::InterpretationAmbiguous => "interpretation_ambiguous",
            FailureKind::Persistence => "persistence",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

/// Working record for one designation during one run. Built fresh by every
/// assessment and never shared.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentState {
    pub orbit_class: OrbitClass,
    pub valid_designation: bool,
    pub table_presence: BTreeMap<OrbitTable, bool>,
    pub existing_verdict: Option<QualityVerdict>,
    pub verdict: Option<QualityVerdict>,
    pub quality_summary: BTreeMap<EpochTag, String>,
    pub last_origin: Option<OriginTag>,
    pub fit_attempted: bool,
    pub executed: bool,
    pub orbit_generated: bool,
    pub input_generation_ok: bool,
    pub enough_observations: bool,
    pub observation_count: Option<u64>,
    pub arc_length_days: Option<f64>,
    pub preexisting_orbit: bool,
    pub iod_attempted: bool,
    pub bad_tracklets: BTreeSet<String>,
    pub short_arc: bool,
    pub few_observations: bool,
    pub weak_fit: bool,
    pub persisted: bool,
    pub persistence_failed: bool,
    pub manual_handling: bool,
    pub failure: Option<FailureKind>,
    pub diagnostics: Vec<String>,
    pub stage: Stage,
    pub history: Vec<Stage>,
    pub status: Option<StatusCode>,
}

impl AssessmentState {
    pub fn new(orbit_class: OrbitClass) -> Self {
        Self {
            orbit_class,
            valid_designation: true,
            table_presence: OrbitTable::ALL.into_iter().map(|t| (t, false)).collect(),
            existing_verdict: None,
            verdict: None,
            quality_summary: BTreeMap::new(),
            last_origin: None,
            fit_attempted: false,
            executed: false,
            orbit_generated: false,
            input_generation_ok: false,
            enough_observations: false,
            observation_count: None,
            arc_length_days: None,
            preexisting_orbit: false,
            iod_attempted: false,
            bad_tracklets: BTreeSet::new(),
            short_arc: false,
            few_observations: false,
            weak_fit: false,
            persisted: false,
            persistence_failed: false,
            manual_handling: false,
            failure: None,
            diagnostics: Vec::new(),
            stage: Stage::Start,
            history: vec![Stage::Start],
            status: None,
        }
    }

    /// State for input the codec rejected; nothing else is ever evaluated.
    pub fn invalid(orbit_class: OrbitClass, reason: impl Into<String>) -> Self {
        let mut state = Self::new(orbit_class);
        state.valid_designation = false;
        state.diagnostics.push(reason.into());
        state.stage = Stage::Done;
        state.history.push(Stage::Done);
        state
    }

    /// Moves forward to `stage`. Returns false for a backwards move, which is ignored.
    pub fn enter(&mut self, stage: Stage) -> bool {
        if stage <= self.stage {
            return false;
        }
        self.stage = stage;
        self.history.push(stage);
        true
    }

    pub fn has_any_result(&self) -> bool {
        self.table_presence.values().any(|present| *present)
    }

    pub fn has_result_in(&self, table: OrbitTable) -> bool {
        self.table_presence.get(&table).copied().unwrap_or(false)
    }

    /// Records a failure. The first recorded kind wins except that aborts
    /// (configuration, cancellation, unavailability) override softer ones.
    pub fn record_failure(&mut self, kind: FailureKind, message: impl Into<String>) {
        let is_abort = matches!(
            kind,
            FailureKind::Configuration | FailureKind::Cancelled | FailureKind::ExternalUnavailable
        );
        if self.failure.is_none() || is_abort {
            self.failure = Some(kind);
        }
        if kind == FailureKind::Persistence {
            self.persistence_failed = true;
        }
        self.diagnostics.push(message.into());
    }

    /// Copies the canonical fit flags into the state.
    pub fn absorb(&mut self, outcome: &FitOutcome, policy: &ObservationPolicy) {
        self.last_origin = Some(outcome.origin);
        self.fit_attempted |= outcome.attempted;
        self.executed = outcome.executed;
        self.orbit_generated = outcome.orbit_produced;
        self.input_generation_ok = outcome.input_generation_ok;
        self.enough_observations = outcome.has_enough_observations;
        if outcome.observation_count.is_some() {
            self.observation_count = outcome.observation_count;
        }
        if outcome.arc_length_days.is_some() {
            self.arc_length_days = outcome.arc_length_days;
        }
        self.preexisting_orbit = outcome.preexisting_orbit;
        self.bad_tracklets
            .extend(outcome.bad_tracklet_ids.iter().cloned());

        self.short_arc = self
            .arc_length_days
            .map(|days| days < policy.short_arc_days)
            .unwrap_or(false);
        self.few_observations = self
            .observation_count
            .map(|count| count < policy.few_observations)
            .unwrap_or(false);
        self.weak_fit = self.short_arc || self.few_observations;
    }
}
