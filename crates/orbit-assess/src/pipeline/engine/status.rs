use std::fmt;

use serde::{Serialize, Serializer};

use super::state::{AssessmentState, FailureKind};
use crate::designation::OrbitClass;
use crate::pipeline::quality::QualityVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBand {
    Absent,
    Poor,
    Good,
}

impl StatusBand {
    pub const fn ordered() -> [StatusBand; 3] {
        [StatusBand::Absent, StatusBand::Poor, StatusBand::Good]
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusBand::Absent => "Orbit Absent",
            StatusBand::Poor => "Orbit Poor",
            StatusBand::Good => "Orbit Good",
        }
    }
}

/// Outcome code of a completed assessment; the hundreds digit is the band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusCode {
    InvalidDesignation,
    NoObservations,
    InsufficientObservations,
    FitFailed,
    SaveFailed,
    Unavailable,
    Cancelled,
    ConfigurationAbort,
    AbsentUnestablished,
    ShortArc,
    OutlyingTracklets,
    MissingCovariance,
    OrbitBlocksMissing,
    PoorOther,
    Consistent,
    MostlyConsistent,
    GoodOther,
}

impl StatusCode {
    pub const ALL: [StatusCode; 17] = [
        StatusCode::InvalidDesignation,
        StatusCode::NoObservations,
        StatusCode::InsufficientObservations,
        StatusCode::FitFailed,
        StatusCode::SaveFailed,
        StatusCode::Unavailable,
        StatusCode::Cancelled,
        StatusCode::ConfigurationAbort,
        StatusCode::AbsentUnestablished,
        StatusCode::ShortArc,
        StatusCode::OutlyingTracklets,
        StatusCode::MissingCovariance,
        StatusCode::OrbitBlocksMissing,
        StatusCode::PoorOther,
        StatusCode::Consistent,
        StatusCode::MostlyConsistent,
        StatusCode::GoodOther,
    ];

    pub fn code(&self) -> u16 {
        match self {
            StatusCode::InvalidDesignation => 0,
            StatusCode::NoObservations => 1,
            StatusCode::InsufficientObservations => 2,
            StatusCode::FitFailed => 3,
            StatusCode::SaveFailed => 4,
            StatusCode::Unavailable => 5,
            StatusCode::Cancelled => 6,
            StatusCode::ConfigurationAbort => 7,
            StatusCode::AbsentUnestablished => 99,
            StatusCode::ShortArc => 100,
            StatusCode::OutlyingTracklets => 101,
            StatusCode::MissingCovariance => 102,
            StatusCode::OrbitBlocksMissing => 103,
            StatusCode::PoorOther => 199,
            StatusCode::Consistent => 200,
            StatusCode::MostlyConsistent => 201,
            StatusCode::GoodOther => 299,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub fn band(&self) -> StatusBand {
        match self.code() / 100 {
            0 => StatusBand::Absent,
            1 => StatusBand::Poor,
            _ => StatusBand::Good,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StatusCode::InvalidDesignation => "Not a valid primary designation",
            StatusCode::NoObservations => "No observations exist",
            StatusCode::InsufficientObservations => {
                "Insufficient observations exist to form a reasonable orbit"
            }
            StatusCode::FitFailed => "Fit attempted and failed",
            StatusCode::SaveFailed => "Fit succeeded but the orbit could not be saved",
            StatusCode::Unavailable => "Fitter or catalog unavailable",
            StatusCode::Cancelled => "Assessment cancelled before completion",
            StatusCode::ConfigurationAbort => "Assessment aborted on a configuration error",
            StatusCode::AbsentUnestablished => "Reason not established",
            StatusCode::ShortArc => "Short arc / few observations",
            StatusCode::OutlyingTracklets => {
                "Significant fraction of observations in outlying tracklets"
            }
            StatusCode::MissingCovariance => {
                "Orbit lacks covariance for one or more coordinate systems"
            }
            StatusCode::OrbitBlocksMissing => "Orbit blocks missing",
            StatusCode::PoorOther => "Other",
            StatusCode::Consistent => "Orbit consistent with all observations",
            StatusCode::MostlyConsistent => {
                "Orbit consistent with most observations (tracklets to be dealt with)"
            }
            StatusCode::GoodOther => "Other",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.code())
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

/// Pure function of the final state, most severe finding first.
pub fn derive_status(state: &AssessmentState) -> StatusCode {
    match state.failure {
        Some(FailureKind::Configuration) => return StatusCode::ConfigurationAbort,
        Some(FailureKind::Cancelled) => return StatusCode::Cancelled,
        Some(FailureKind::ExternalUnavailable) => return StatusCode::Unavailable,
        _ => {}
    }

    if !state.valid_designation {
        return StatusCode::InvalidDesignation;
    }
    if state.fit_attempted && !state.orbit_generated {
        return StatusCode::FitFailed;
    }
    if state.orbit_generated && state.persistence_failed {
        return StatusCode::SaveFailed;
    }

    if state.has_any_result() {
        let tracklets = !state.bad_tracklets.is_empty();
        return match state.verdict {
            Some(QualityVerdict::Good) if tracklets => StatusCode::MostlyConsistent,
            Some(QualityVerdict::Good) => StatusCode::Consistent,
            Some(QualityVerdict::Bad) => StatusCode::OrbitBlocksMissing,
            Some(QualityVerdict::Intermediate) if tracklets => StatusCode::OutlyingTracklets,
            Some(QualityVerdict::Intermediate) if state.weak_fit => StatusCode::ShortArc,
            Some(QualityVerdict::Intermediate) => StatusCode::MissingCovariance,
            None => StatusCode::PoorOther,
        };
    }

    if state.orbit_class == OrbitClass::Satellite {
        return StatusCode::AbsentUnestablished;
    }
    match state.observation_count {
        Some(0) => StatusCode::NoObservations,
        Some(_) if !state.enough_observations => StatusCode::InsufficientObservations,
        _ => StatusCode::AbsentUnestablished,
    }
}
