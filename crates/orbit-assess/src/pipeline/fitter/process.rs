use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::decoder::{FlatFileDecoder, JsonResultDecoder};
use super::{FitterCommand, FitterGateway, GatewayError, RawResult};
use crate::config::FitterConfig;
use crate::designation::{Designation, OrbitClass};
use crate::pipeline::interpret::OriginTag;

const LOG_FILE: &str = "fitter.log";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

static INVOCATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Runs the configured fitter programs as child processes.
///
/// Each call gets its own directory under `<work_dir>/<run_id>/`, so concurrent
/// invocations never share files.
pub struct ProcessFitterGateway<D = JsonResultDecoder> {
    config: FitterConfig,
    run_id: String,
    decoder: D,
}

impl ProcessFitterGateway<JsonResultDecoder> {
    pub fn new(config: FitterConfig, run_id: impl Into<String>) -> Self {
        Self::with_decoder(config, run_id, JsonResultDecoder::default())
    }
}

impl<D> ProcessFitterGateway<D>
where
    D: FlatFileDecoder,
{
    pub fn with_decoder(config: FitterConfig, run_id: impl Into<String>, decoder: D) -> Self {
        Self {
            config,
            run_id: run_id.into(),
            decoder,
        }
    }

    pub fn run_directory(&self) -> PathBuf {
        self.config.work_dir.join(&self.run_id)
    }

    fn processing_directory(
        &self,
        designation: &Designation,
        origin: OriginTag,
    ) -> Result<PathBuf, GatewayError> {
        let seq = INVOCATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let dir = self.run_directory().join(format!(
            "{}-{}-{seq:04}",
            designation.fitter_name(),
            origin.label()
        ));
        fs::create_dir_all(&dir).map_err(|source| GatewayError::Workspace {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    fn invoke(
        &self,
        origin: OriginTag,
        command: Option<&FitterCommand>,
        designation: &Designation,
        extra_args: &[&str],
    ) -> Result<RawResult, GatewayError> {
        let command = command.ok_or(GatewayError::NotConfigured { fitter: origin })?;
        let dir = self.processing_directory(designation, origin)?;
        let log_path = dir.join(LOG_FILE);
        let unavailable = |reason: String| GatewayError::Unavailable {
            fitter: origin,
            reason,
        };

        let log = File::create(&log_path).map_err(|source| GatewayError::Workspace {
            path: log_path.clone(),
            source,
        })?;
        let log_err = log.try_clone().map_err(|source| GatewayError::Workspace {
            path: log_path.clone(),
            source,
        })?;

        info!(
            designation = %designation,
            fitter = %origin,
            directory = %dir.display(),
            "launching fitter"
        );

        let child = Command::new(&command.program)
            .args(&command.args)
            .arg(designation.fitter_name())
            .arg("--directory")
            .arg(&dir)
            .args(extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|err| {
                unavailable(format!(
                    "cannot launch {}: {err}",
                    command.program.display()
                ))
            })?;

        let status = wait_with_timeout(child, self.config.timeout).map_err(unavailable)?;

        let completed = match &command.success_marker {
            Some(marker) => fs::read_to_string(&log_path)
                .map(|output| output.contains(marker.as_str()))
                .unwrap_or(false),
            None => status.success(),
        };
        debug!(
            designation = %designation,
            fitter = %origin,
            exit = ?status.code(),
            completed,
            "fitter finished"
        );

        Ok(self.decode(&dir, designation, origin, completed))
    }

    fn decode(
        &self,
        dir: &Path,
        designation: &Designation,
        origin: OriginTag,
        completed: bool,
    ) -> RawResult {
        match self.decoder.decode(dir, designation) {
            Ok(payload) => RawResult::with_completion(completed, payload),
            Err(err) => {
                warn!(
                    designation = %designation,
                    fitter = %origin,
                    error = %err,
                    "fitter output could not be decoded"
                );
                RawResult::undecodable(Some(completed), err.to_string())
            }
        }
    }
}

fn wait_with_timeout(mut child: Child, timeout: Option<Duration>) -> Result<ExitStatus, String> {
    let Some(timeout) = timeout else {
        return child.wait().map_err(|err| format!("wait failed: {err}"));
    };

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if started.elapsed() >= timeout => {
                child.kill().ok();
                child.wait().ok();
                return Err(format!("timed out after {}s", timeout.as_secs_f32()));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => return Err(format!("wait failed: {err}")),
        }
    }
}

impl<D> FitterGateway for ProcessFitterGateway<D>
where
    D: FlatFileDecoder,
{
    fn run_extension_fit(&self, designation: &Designation) -> Result<RawResult, GatewayError> {
        let raw = self.invoke(
            OriginTag::ExtensionWrapper,
            self.config.extension.as_ref(),
            designation,
            &[],
        )?;
        // The extension payload carries its own success markers.
        Ok(RawResult {
            completion: None,
            ..raw
        })
    }

    fn run_iod(
        &self,
        designation: &Designation,
        class: OrbitClass,
    ) -> Result<(bool, RawResult), GatewayError> {
        let raw = self.invoke(
            OriginTag::IodWrapper,
            self.config.iod.as_ref(),
            designation,
            &["--orbit-class", class.label()],
        )?;
        Ok((raw.completed(), raw))
    }

    fn run_comet_fit(&self, designation: &Designation) -> Result<(bool, RawResult), GatewayError> {
        let raw = self.invoke(
            OriginTag::CometWrapper,
            self.config.comet.as_ref(),
            designation,
            &[],
        )?;
        Ok((raw.completed(), raw))
    }
}
