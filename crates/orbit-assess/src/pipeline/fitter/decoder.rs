use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::designation::Designation;

/// Turns a fitter's processing directory into a JSON-like payload.
pub trait FlatFileDecoder: Send + Sync {
    fn decode(&self, directory: &Path, designation: &Designation) -> Result<Value, DecodeError>;
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no result file at {}", .0.display())]
    Missing(PathBuf),
    #[error("unable to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid result json in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads a wrapper-written JSON file from the processing directory.
#[derive(Debug, Clone)]
pub struct JsonResultDecoder {
    file_name: String,
}

impl JsonResultDecoder {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl Default for JsonResultDecoder {
    fn default() -> Self {
        Self::new("result.json")
    }
}

impl FlatFileDecoder for JsonResultDecoder {
    fn decode(&self, directory: &Path, _designation: &Designation) -> Result<Value, DecodeError> {
        let path = directory.join(&self.file_name);
        if !path.is_file() {
            return Err(DecodeError::Missing(path));
        }
        let raw = fs::read_to_string(&path).map_err(|source| DecodeError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| DecodeError::Json { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::designation::MpcDesignationCodec;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    static SCRATCH: AtomicU64 = AtomicU64::new(0);

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "orbit_decoder_{}_{}",
            std::process::id(),
            SCRATCH.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn reads_result_file() {
        let dir = scratch_dir();
        fs::write(dir.join("result.json"), r#"{"failedfits": {}}"#).expect("write result");
        let designation = Designation::parse("2008 WJ19", &MpcDesignationCodec).expect("valid");
        let payload = JsonResultDecoder::default()
            .decode(&dir, &designation)
            .expect("decodes");
        assert_eq!(payload, json!({"failedfits": {}}));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reports_missing_and_invalid_files() {
        let dir = scratch_dir();
        let designation = Designation::parse("2008 WJ19", &MpcDesignationCodec).expect("valid");
        let decoder = JsonResultDecoder::default();
        assert!(matches!(
            decoder.decode(&dir, &designation),
            Err(DecodeError::Missing(_))
        ));
        fs::write(dir.join("result.json"), "{not json").expect("write result");
        assert!(matches!(
            decoder.decode(&dir, &designation),
            Err(DecodeError::Json { .. })
        ));
        fs::remove_dir_all(&dir).ok();
    }
}
