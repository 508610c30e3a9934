//! Environment-driven configuration for the serving binaries.

use std::env;
use std::path::PathBuf;

use crate::classifier::DEFAULT_MAX_SEQUENCE_LENGTH;
use crate::model_store::CACHE_ENV_VAR;
use crate::runtime::RuntimeConfig;
use crate::s3::{DEFAULT_BUCKET, DEFAULT_PREFIX};

pub const MODEL_DIR_ENV: &str = "EMOTION_MODEL_DIR";
pub const BUCKET_ENV: &str = "EMOTION_MODEL_BUCKET";
pub const PREFIX_ENV: &str = "EMOTION_MODEL_PREFIX";
pub const URL_ENV: &str = "EMOTION_MODEL_URL";
pub const MAX_SEQUENCE_LENGTH_ENV: &str = "EMOTION_MAX_SEQUENCE_LENGTH";
pub const INTRA_THREADS_ENV: &str = "EMOTION_INTRA_THREADS";

/// Writable scratch root of a serverless execution environment.
pub const SCRATCH_ROOT: &str = "/tmp";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the remote copy of the model lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteModel {
    S3 { bucket: String, prefix: String },
    Http { base_url: String },
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Local model directory; `None` means the cache default.
    pub model_dir: Option<PathBuf>,
    pub remote: RemoteModel,
    pub max_sequence_length: usize,
    pub intra_threads: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            remote: RemoteModel::S3 {
                bucket: DEFAULT_BUCKET.to_string(),
                prefix: DEFAULT_PREFIX.to_string(),
            },
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            intra_threads: 0,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let remote = match get(URL_ENV) {
            Some(base_url) => RemoteModel::Http { base_url },
            None => RemoteModel::S3 {
                bucket: get(BUCKET_ENV).unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
                prefix: get(PREFIX_ENV).unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            },
        };

        let max_sequence_length = match get(MAX_SEQUENCE_LENGTH_ENV) {
            Some(v) => parse_usize(MAX_SEQUENCE_LENGTH_ENV, &v, 1)?,
            None => defaults.max_sequence_length,
        };
        let intra_threads = match get(INTRA_THREADS_ENV) {
            Some(v) => parse_usize(INTRA_THREADS_ENV, &v, 0)?,
            None => defaults.intra_threads,
        };

        Ok(Self {
            model_dir: get(MODEL_DIR_ENV).map(PathBuf::from),
            remote,
            max_sequence_length,
            intra_threads,
        })
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig::with_intra_threads(self.intra_threads)
    }
}

fn parse_usize(name: &'static str, value: &str, min: usize) -> Result<usize, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
        reason,
    };
    let parsed = value.trim().parse::<usize>().map_err(|e| invalid(e.to_string()))?;
    if parsed < min {
        return Err(invalid(format!("must be at least {}", min)));
    }
    Ok(parsed)
}

/// Points the model cache at the writable scratch root.
///
/// Read-only serverless filesystems only allow writes under `/tmp`, so this
/// has to run before any model code resolves a default directory.
pub fn redirect_cache_to_scratch() {
    if env::var_os(CACHE_ENV_VAR).is_none() {
        env::set_var(CACHE_ENV_VAR, SCRATCH_ROOT);
        log::info!("{} redirected to {}", CACHE_ENV_VAR, SCRATCH_ROOT);
    }
}
