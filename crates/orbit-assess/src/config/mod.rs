use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::fitter::FitterCommand;
use crate::pipeline::interpret::ObservationPolicy;
use crate::pipeline::quality::QualityRules;

const DEFAULT_IOD_SUCCESS_MARKER: &str = "Initial return code = 0";

/// Distinguishes runtime behavior for different stages of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the assessment pipeline.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub catalog: CatalogConfig,
    pub fitters: FitterConfig,
    pub pipeline: PipelineConfig,
    pub quality: QualityRules,
    pub observations: ObservationPolicy,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("ORBIT_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("ORBIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let telemetry = TelemetryConfig {
            log_level,
            ansi: environment == AppEnvironment::Development,
        };

        let catalog = CatalogConfig {
            dir: PathBuf::from(env::var("ORBIT_CATALOG_DIR").unwrap_or_else(|_| "./catalog".into())),
        };

        let iod_marker = env::var("ORBIT_IOD_SUCCESS_MARKER")
            .unwrap_or_else(|_| DEFAULT_IOD_SUCCESS_MARKER.to_string());
        let fitters = FitterConfig {
            work_dir: PathBuf::from(
                env::var("ORBIT_WORK_DIR").unwrap_or_else(|_| "./orbit-work".into()),
            ),
            extension: command_from_env("ORBIT_EXTENSION_CMD", None),
            iod: command_from_env("ORBIT_IOD_CMD", Some(iod_marker)),
            comet: command_from_env("ORBIT_COMET_CMD", None),
            timeout: optional_number::<u64>("ORBIT_FITTER_TIMEOUT_SECS")?
                .map(Duration::from_secs),
        };

        let workers = number_or("ORBIT_WORKERS", 4usize)?;
        if workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }

        let pipeline = PipelineConfig {
            workers,
            max_retries: number_or("ORBIT_MAX_RETRIES", 2u32)?,
            retry_backoff: Duration::from_millis(number_or("ORBIT_RETRY_BACKOFF_MS", 500u64)?),
            deadline: optional_number::<u64>("ORBIT_DEADLINE_SECS")?.map(Duration::from_secs),
        };

        let quality = match env::var("ORBIT_QUALITY_RULES") {
            Ok(path) if !path.trim().is_empty() => load_quality_rules(Path::new(path.trim()))?,
            _ => QualityRules::default(),
        };

        let defaults = ObservationPolicy::default();
        let observations = ObservationPolicy {
            min_observations_for_iod: number_or(
                "ORBIT_MIN_IOD_OBSERVATIONS",
                defaults.min_observations_for_iod,
            )?,
            ..defaults
        };

        Ok(Self {
            environment,
            telemetry,
            catalog,
            fitters,
            pipeline,
            quality,
            observations,
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Location of the JSON-directory catalog backend.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub dir: PathBuf,
}

/// External fitter programs and the scratch area they run in.
#[derive(Debug, Clone)]
pub struct FitterConfig {
    pub work_dir: PathBuf,
    pub extension: Option<FitterCommand>,
    pub iod: Option<FitterCommand>,
    pub comet: Option<FitterCommand>,
    pub timeout: Option<Duration>,
}

/// Batch-level knobs: concurrency, retry budget and run deadline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub deadline: Option<Duration>,
}

fn command_from_env(key: &str, success_marker: Option<String>) -> Option<FitterCommand> {
    let raw = env::var(key).ok()?;
    let mut parts = raw.split_whitespace();
    let program = parts.next()?;
    Some(FitterCommand {
        program: PathBuf::from(program),
        args: parts.map(str::to_string).collect(),
        success_marker,
    })
}

fn number_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(optional_number(key)?.unwrap_or(default))
}

fn optional_number<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key }),
        _ => Ok(None),
    }
}

fn load_quality_rules(path: &Path) -> Result<QualityRules, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::QualityRules {
        path: path.to_path_buf(),
        detail: source.to_string(),
    })?;
    QualityRules::from_json(&raw).map_err(|source| ConfigError::QualityRules {
        path: path.to_path_buf(),
        detail: source.to_string(),
    })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { key: &'static str },
    InvalidWorkers,
    QualityRules { path: PathBuf, detail: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { key } => write!(f, "{key} must be a valid number"),
            ConfigError::InvalidWorkers => write!(f, "ORBIT_WORKERS must be at least 1"),
            ConfigError::QualityRules { path, detail } => write!(
                f,
                "unable to load quality rules from {}: {}",
                path.display(),
                detail
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
