//! Per-designation state machine.
//!
//! `Start -> CheckExisting -> {HasOrbit | NoOrbit} -> Fitting -> Interpreting
//! -> Persisting -> Reassessing -> Done`, with every run building its own
//! [`AssessmentState`] and finishing with exactly one [`StatusCode`].

mod signal;
mod state;
mod status;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::designation::{Designation, OrbitClass};
use crate::pipeline::catalog::{CatalogBackend, CatalogError, CatalogStore, OrbitTable};
use crate::pipeline::fitter::{FitterGateway, GatewayError, RawResult};
use crate::pipeline::interpret::{FitOutcome, ObservationPolicy, OriginTag, ResultInterpreter};
use crate::pipeline::quality::{QualityClassifier, QualityRules, QualityVerdict};

pub use signal::RunSignal;
pub use state::{AssessmentState, FailureKind, Stage};
pub use status::{derive_status, StatusBand, StatusCode};

/// Final product of one assessment.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub designation: Designation,
    pub status: StatusCode,
    pub state: AssessmentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Assessment {
    pub fn is_retryable(&self) -> bool {
        self.state
            .failure
            .map(|kind| kind.is_retryable())
            .unwrap_or(false)
    }
}

#[derive(Debug, Error)]
enum StageError {
    #[error("catalog read failed: {0}")]
    Read(#[source] CatalogError),
    #[error("catalog write failed: {0}")]
    Persist(#[source] CatalogError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("run cancelled before {0:?}")]
    Cancelled(Stage),
}

impl StageError {
    fn kind(&self) -> FailureKind {
        match self {
            StageError::Read(CatalogError::InvalidTable(_))
            | StageError::Persist(CatalogError::InvalidTable(_)) => FailureKind::Configuration,
            StageError::Read(_) => FailureKind::ExternalUnavailable,
            StageError::Persist(_) => FailureKind::Persistence,
            StageError::Gateway(GatewayError::NotConfigured { .. }) => FailureKind::Configuration,
            StageError::Gateway(_) => FailureKind::ExternalUnavailable,
            StageError::Cancelled(_) => FailureKind::Cancelled,
        }
    }
}

/// Orchestrates catalog, fitters, interpreter and classifier per designation.
pub struct AssessmentEngine<B, G> {
    store: Arc<CatalogStore<B>>,
    gateway: Arc<G>,
    classifier: QualityClassifier,
    interpreter: ResultInterpreter,
}

impl<B, G> AssessmentEngine<B, G>
where
    B: CatalogBackend,
    G: FitterGateway,
{
    pub fn new(
        store: Arc<CatalogStore<B>>,
        gateway: Arc<G>,
        rules: QualityRules,
        policy: ObservationPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            classifier: QualityClassifier::new(rules),
            interpreter: ResultInterpreter::new(policy),
        }
    }

    pub fn store(&self) -> &CatalogStore<B> {
        &self.store
    }

    pub fn interpreter(&self) -> &ResultInterpreter {
        &self.interpreter
    }

    pub fn classifier(&self) -> &QualityClassifier {
        &self.classifier
    }

    /// Runs the full pipeline for one designation. Never panics on
    /// designation-level failures; they end up in the returned state.
    pub fn assess(&self, designation: &Designation, signal: &RunSignal) -> Assessment {
        let mut state = AssessmentState::new(designation.orbit_class());
        let result = self.run(designation, signal, &mut state);
        self.finish(designation, state, result)
    }

    /// Read-only freshness check: classifies whatever is stored, never fits.
    pub fn refresh_quality(&self, designation: &Designation) -> Assessment {
        let mut state = AssessmentState::new(designation.orbit_class());
        self.transition(designation, &mut state, Stage::CheckExisting);
        let result = self.check_existing(designation, &mut state);
        self.finish(designation, state, result)
    }

    fn finish(
        &self,
        designation: &Designation,
        mut state: AssessmentState,
        result: Result<(), StageError>,
    ) -> Assessment {
        let error = result.err().map(|err| {
            let kind = err.kind();
            warn!(
                designation = %designation,
                stage = ?state.stage,
                failure = kind.label(),
                error = %err,
                "assessment stopped early"
            );
            let message = err.to_string();
            state.record_failure(kind, message.clone());
            message
        });

        self.transition(designation, &mut state, Stage::Done);
        let status = derive_status(&state);
        state.status = Some(status);
        info!(
            designation = %designation,
            status = %status,
            band = status.band().label(),
            "assessment complete"
        );

        Assessment {
            designation: designation.clone(),
            status,
            state,
            error,
        }
    }

    fn transition(&self, designation: &Designation, state: &mut AssessmentState, stage: Stage) {
        if state.enter(stage) {
            debug!(designation = %designation, stage = ?stage, "stage entered");
        }
    }

    fn checkpoint(&self, signal: &RunSignal, next: Stage) -> Result<(), StageError> {
        if signal.is_cancelled() {
            Err(StageError::Cancelled(next))
        } else {
            Ok(())
        }
    }

    fn run(
        &self,
        designation: &Designation,
        signal: &RunSignal,
        state: &mut AssessmentState,
    ) -> Result<(), StageError> {
        self.checkpoint(signal, Stage::CheckExisting)?;
        self.transition(designation, state, Stage::CheckExisting);
        self.check_existing(designation, state)?;

        let table = OrbitTable::for_class(state.orbit_class);
        if state.has_result_in(table) {
            self.transition(designation, state, Stage::HasOrbit);
            if state.existing_verdict == Some(QualityVerdict::Good) {
                return Ok(());
            }
            info!(
                designation = %designation,
                verdict = ?state.existing_verdict,
                "stored orbit is not good; refitting"
            );
        } else {
            self.transition(designation, state, Stage::NoOrbit);
        }

        let outcome = match state.orbit_class {
            OrbitClass::Satellite => {
                state.manual_handling = true;
                state
                    .diagnostics
                    .push("no fitter defined for satellites; manual handling".to_string());
                info!(designation = %designation, "satellite left for manual handling");
                return Ok(());
            }
            OrbitClass::Asteroid => self.fit_asteroid(designation, signal, state)?,
            OrbitClass::Comet => self.fit_comet(designation, signal, state)?,
        };

        let Some(record) = outcome.and_then(|outcome| outcome.normalized_record) else {
            return Ok(());
        };

        self.checkpoint(signal, Stage::Persisting)?;
        self.transition(designation, state, Stage::Persisting);
        self.store
            .upsert_into(&record, table)
            .map_err(StageError::Persist)?;
        self.store
            .archive_into(&record, table)
            .map_err(StageError::Persist)?;
        state.persisted = true;
        info!(designation = %designation, table = %table, "orbit persisted");

        self.transition(designation, state, Stage::Reassessing);
        self.check_existing(designation, state)
    }

    /// Reads presence and stored quality; sets the verdict flags.
    fn check_existing(
        &self,
        designation: &Designation,
        state: &mut AssessmentState,
    ) -> Result<(), StageError> {
        state.table_presence = self.store.presence(designation).map_err(StageError::Read)?;

        let table = OrbitTable::for_class(state.orbit_class);
        if !state.has_result_in(table) {
            state.verdict = None;
            return Ok(());
        }

        let summary = self
            .store
            .quality_summary(designation, table)
            .map_err(StageError::Read)?;
        let verdict = match self.classifier.classify(&summary) {
            Ok(verdict) => Some(verdict),
            Err(err) => {
                warn!(designation = %designation, error = %err, "stored quality not classified");
                state.diagnostics.push(err.to_string());
                None
            }
        };

        if state.stage < Stage::Reassessing {
            state.existing_verdict = verdict;
        }
        state.verdict = verdict;
        state.quality_summary = summary;
        debug!(designation = %designation, verdict = ?verdict, "stored quality classified");
        Ok(())
    }

    fn fit_asteroid(
        &self,
        designation: &Designation,
        signal: &RunSignal,
        state: &mut AssessmentState,
    ) -> Result<Option<FitOutcome>, StageError> {
        self.checkpoint(signal, Stage::Fitting)?;
        self.transition(designation, state, Stage::Fitting);
        let raw = self.gateway.run_extension_fit(designation)?;

        self.transition(designation, state, Stage::Interpreting);
        let extension = self
            .interpreter
            .interpret(designation, &raw, OriginTag::ExtensionWrapper);
        state.absorb(&extension, self.interpreter.policy());
        if extension.orbit_produced {
            return Ok(Some(extension));
        }

        // IOD only seeds objects without any orbit, stored or reported.
        let has_stored_orbit = state.has_result_in(OrbitTable::for_class(state.orbit_class));
        let iod_eligible = !extension.input_generation_ok
            && extension.has_enough_observations
            && !extension.preexisting_orbit
            && !has_stored_orbit;
        if iod_eligible {
            self.checkpoint(signal, Stage::Interpreting)?;
            info!(designation = %designation, "extension fit failed; trying IOD");
            state.iod_attempted = true;
            state.fit_attempted = true;

            let (completed, raw) = self.gateway.run_iod(designation, state.orbit_class)?;
            let raw = RawResult {
                completion: Some(completed),
                ..raw
            };
            let iod = self
                .interpreter
                .interpret(designation, &raw, OriginTag::IodWrapper);
            if iod.orbit_produced {
                state.absorb(&iod, self.interpreter.policy());
                return Ok(Some(iod));
            }
            self.note_failed_fit(designation, state, &iod);
        }

        self.note_failed_fit(designation, state, &extension);
        Ok(None)
    }

    fn fit_comet(
        &self,
        designation: &Designation,
        signal: &RunSignal,
        state: &mut AssessmentState,
    ) -> Result<Option<FitOutcome>, StageError> {
        self.checkpoint(signal, Stage::Fitting)?;
        self.transition(designation, state, Stage::Fitting);
        let (completed, raw) = self.gateway.run_comet_fit(designation)?;
        let raw = RawResult {
            completion: Some(completed),
            ..raw
        };

        self.transition(designation, state, Stage::Interpreting);
        let outcome = self
            .interpreter
            .interpret(designation, &raw, OriginTag::CometWrapper);
        state.absorb(&outcome, self.interpreter.policy());
        if outcome.orbit_produced {
            return Ok(Some(outcome));
        }
        self.note_failed_fit(designation, state, &outcome);
        Ok(None)
    }

    /// Keeps the deciding attempt's reasons; ambiguity is reported, not raised.
    fn note_failed_fit(
        &self,
        designation: &Designation,
        state: &mut AssessmentState,
        outcome: &FitOutcome,
    ) {
        if let Some(ambiguity) = &outcome.ambiguity {
            state.record_failure(FailureKind::InterpretationAmbiguous, ambiguity.clone());
        }
        for reason in &outcome.failure_reasons {
            state.diagnostics.push(format!("{}: {reason}", outcome.origin));
        }
        info!(
            designation = %designation,
            fitter = %outcome.origin,
            iod_attempted = state.iod_attempted,
            "fit produced no orbit"
        );
    }
}
