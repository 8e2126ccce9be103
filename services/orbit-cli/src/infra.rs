use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use orbit_assess::config::AppConfig;
use orbit_assess::error::AppError;
use orbit_assess::pipeline::batch::new_run_id;
use orbit_assess::pipeline::catalog::JsonDirBackend;
use orbit_assess::pipeline::fitter::ProcessFitterGateway;
use orbit_assess::telemetry;
use orbit_assess::{AssessmentEngine, BatchRunner, BatchSettings, CatalogStore};
use serde_json::Value;
use tracing::info;

pub(crate) type CliEngine = AssessmentEngine<JsonDirBackend, ProcessFitterGateway>;

/// Concrete adapters wired from the loaded configuration.
pub(crate) struct Pipeline {
    pub(crate) config: AppConfig,
    pub(crate) engine: Arc<CliEngine>,
    pub(crate) run_id: String,
}

impl Pipeline {
    pub(crate) fn runner(&self, settings: BatchSettings) -> BatchRunner<JsonDirBackend, ProcessFitterGateway> {
        BatchRunner::new(Arc::clone(&self.engine), settings).with_run_id(self.run_id.clone())
    }
}

/// Loads configuration and installs logging without touching any adapter.
pub(crate) fn load_config() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    Ok(config)
}

pub(crate) fn bootstrap() -> Result<Pipeline, AppError> {
    let config = load_config()?;
    let run_id = new_run_id();

    let store = Arc::new(CatalogStore::new(JsonDirBackend::new(
        config.catalog.dir.clone(),
    )));
    let gateway = Arc::new(ProcessFitterGateway::new(
        config.fitters.clone(),
        run_id.clone(),
    ));
    let engine = Arc::new(AssessmentEngine::new(
        store,
        gateway,
        config.quality.clone(),
        config.observations.clone(),
    ));

    info!(
        ?config.environment,
        run_id = %run_id,
        catalog = %config.catalog.dir.display(),
        "orbit pipeline ready"
    );
    Ok(Pipeline {
        config,
        engine,
        run_id,
    })
}

pub(crate) fn read_json(path: &Path) -> Result<Value, AppError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub(crate) fn create_output(path: &Path) -> Result<BufWriter<File>, AppError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}
