use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::config::MODEL_DIR_ENV;
use crate::model_store::ModelStore;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that read or write process environment variables.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Model directory for tests that need real weights; `None` skips them.
pub(crate) fn model_dir_from_env() -> Option<PathBuf> {
    let dir = {
        let _env = env_lock();
        PathBuf::from(std::env::var(MODEL_DIR_ENV).ok()?)
    };
    if ModelStore::new(&dir).get_model_path().exists() {
        Some(dir)
    } else {
        eprintln!("skipping: {} has no model.onnx", dir.display());
        None
    }
}
