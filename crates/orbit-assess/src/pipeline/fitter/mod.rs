//! Contract over the external orbit fitters.
//!
//! Every call is a single blocking attempt. Retrying belongs to the batch
//! runner and reading the payload belongs to the interpreter.

mod decoder;
mod process;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::designation::{Designation, OrbitClass};
use crate::pipeline::interpret::OriginTag;

pub use decoder::{DecodeError, FlatFileDecoder, JsonResultDecoder};
pub use process::ProcessFitterGateway;

/// Loosely structured payload returned by a fitter, plus its completion code
/// when the fitter reports one.
///
/// `decode_error` is set when the fitter ran but its output could not be
/// read; the payload is then empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    #[serde(default)]
    pub completion: Option<bool>,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
}

impl RawResult {
    pub fn new(payload: Value) -> Self {
        Self {
            completion: None,
            payload,
            decode_error: None,
        }
    }

    pub fn with_completion(completed: bool, payload: Value) -> Self {
        Self {
            completion: Some(completed),
            payload,
            decode_error: None,
        }
    }

    pub fn undecodable(completion: Option<bool>, error: impl Into<String>) -> Self {
        Self {
            completion,
            payload: Value::Object(serde_json::Map::new()),
            decode_error: Some(error.into()),
        }
    }

    pub fn completed(&self) -> bool {
        self.completion.unwrap_or(false)
    }
}

/// External program behind one fitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitterCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Output line that flags a completed run; the exit status decides when unset.
    pub success_marker: Option<String>,
}

pub trait FitterGateway: Send + Sync {
    fn run_extension_fit(&self, designation: &Designation) -> Result<RawResult, GatewayError>;

    fn run_iod(
        &self,
        designation: &Designation,
        class: OrbitClass,
    ) -> Result<(bool, RawResult), GatewayError>;

    fn run_comet_fit(&self, designation: &Designation) -> Result<(bool, RawResult), GatewayError>;
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{fitter} fitter unavailable: {reason}")]
    Unavailable { fitter: OriginTag, reason: String },
    #[error("{fitter} fitter is not configured")]
    NotConfigured { fitter: OriginTag },
    #[error("unable to prepare processing directory {}: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
