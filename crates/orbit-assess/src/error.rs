use crate::config::ConfigError;
use crate::designation::CodecError;
use crate::pipeline::catalog::CatalogError;
use crate::pipeline::interpret::InterpretError;
use crate::pipeline::quality::QualityError;
use crate::telemetry::TelemetryError;
use std::fmt;

/// Errors surfaced to the binary; per-designation failures stay inside assessments.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Codec(CodecError),
    Interpret(InterpretError),
    Quality(QualityError),
    Catalog(CatalogError),
    Json(serde_json::Error),
    Csv(csv::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Codec(err) => write!(f, "designation error: {}", err),
            AppError::Interpret(err) => write!(f, "interpretation error: {}", err),
            AppError::Quality(err) => write!(f, "quality error: {}", err),
            AppError::Catalog(err) => write!(f, "catalog error: {}", err),
            AppError::Json(err) => write!(f, "json error: {}", err),
            AppError::Csv(err) => write!(f, "csv error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Codec(err) => Some(err),
            AppError::Interpret(err) => Some(err),
            AppError::Quality(err) => Some(err),
            AppError::Catalog(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::Csv(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<CodecError> for AppError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<InterpretError> for AppError {
    fn from(value: InterpretError) -> Self {
        Self::Interpret(value)
    }
}

impl From<QualityError> for AppError {
    fn from(value: QualityError) -> Self {
        Self::Quality(value)
    }
}

impl From<CatalogError> for AppError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}
