//! Orbit assessment and reconciliation for an astrometric catalog.
//!
//! For each designation the pipeline reads the stored orbit state, decides
//! whether an external fitter has to run, normalizes whatever the fitter
//! returned into an [`pipeline::record::OrbitRecord`] and commits it to the
//! catalog before deriving a [`pipeline::engine::StatusCode`].

pub mod config;
pub mod designation;
pub mod error;
pub mod pipeline;
pub mod telemetry;

pub use designation::{Designation, DesignationCodec, MpcDesignationCodec, OrbitClass};
pub use pipeline::batch::{BatchReport, BatchRunner, BatchSettings};
pub use pipeline::catalog::{CatalogBackend, CatalogStore, OrbitTable};
pub use pipeline::engine::{Assessment, AssessmentEngine, AssessmentState, RunSignal, StatusCode};
pub use pipeline::fitter::{FitterGateway, RawResult};
pub use pipeline::interpret::{FitOutcome, OriginTag, ResultInterpreter};
pub use pipeline::quality::{QualityClassifier, QualityRules, QualityVerdict};
