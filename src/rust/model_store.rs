use std::path::{Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::env;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

/// ONNX export of the fine-tuned sequence classifier.
pub const MODEL_FILE: &str = "model.onnx";
/// Serialized fast tokenizer.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Every file mirrored from the remote model store, in download order.
pub const MODEL_FILES: [&str; 6] = [
    MODEL_FILE,
    "special_tokens_map.json",
    "tokenizer_config.json",
    TOKENIZER_FILE,
    "vocab.txt",
    "config.json",
];

/// Environment variable overriding the cache root for downloaded models.
pub const CACHE_ENV_VAR: &str = "EMOTION_MODEL_CACHE";

const MODEL_DIR_NAME: &str = "emotion_model";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("Object storage error for {key}: {message}")]
    StorageError { key: String, message: String },
    #[error("Unexpected HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// A remote location holding the model files under fixed keys.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Fetches the object stored under `file_name`.
    async fn fetch(&self, file_name: &str) -> Result<Bytes, ModelError>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}

/// Plain HTTPS source, e.g. a model hub `resolve/main/` URL.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}{}", self.base_url, file_name)
    }
}

#[async_trait]
impl ObjectSource for HttpSource {
    async fn fetch(&self, file_name: &str) -> Result<Bytes, ModelError> {
        let url = self.url_for(file_name);
        let response = self.client.get(&url).send().await?;
        log::info!("Download response status: {}", response.status());
        if !response.status().is_success() {
            return Err(ModelError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Local mirror of the model store.
#[derive(Clone)]
pub struct ModelStore {
    model_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelStore {
    /// Creates a store rooted at the default cache directory.
    pub fn new_default() -> Self {
        Self::new(Self::get_default_model_dir())
    }

    /// Returns the default model directory path
    pub fn get_default_model_dir() -> PathBuf {
        if let Ok(path) = env::var(CACHE_ENV_VAR) {
            return PathBuf::from(path).join(MODEL_DIR_NAME);
        }

        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("emotion-api").join(MODEL_DIR_NAME);
        }

        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("emotion-api").join(MODEL_DIR_NAME);
        }

        env::temp_dir().join("emotion-api").join(MODEL_DIR_NAME)
    }

    /// Unlike a download, construction never touches the filesystem: whether
    /// the directory exists is what decides if a mirror is needed.
    pub fn new<P: AsRef<Path>>(model_dir: P) -> Self {
        Self {
            model_dir: model_dir.as_ref().to_path_buf(),
            download_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.model_dir.join(file_name)
    }

    pub fn get_model_path(&self) -> PathBuf {
        self.file_path(MODEL_FILE)
    }

    pub fn get_tokenizer_path(&self) -> PathBuf {
        self.file_path(TOKENIZER_FILE)
    }

    /// True once every file in [`MODEL_FILES`] is present locally.
    pub fn is_downloaded(&self) -> bool {
        let missing = self.missing_files();
        if !missing.is_empty() {
            log::debug!("Model files missing from {:?}: {:?}", self.model_dir, missing);
        }
        missing.is_empty()
    }

    pub fn missing_files(&self) -> Vec<&'static str> {
        MODEL_FILES
            .iter()
            .copied()
            .filter(|name| !self.file_path(name).exists())
            .collect()
    }

    /// Fails with `NotDownloaded` unless every model file is present.
    pub fn require_downloaded(&self) -> Result<(), ModelError> {
        let missing = self.missing_files();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ModelError::NotDownloaded(format!(
                "{} is missing {}",
                self.model_dir.display(),
                missing.join(", ")
            )))
        }
    }

    /// Downloads every model file from `source`, overwriting local copies.
    ///
    /// No checksum and no retry: the first failure aborts the download.
    pub async fn download(&self, source: &dyn ObjectSource) -> Result<(), ModelError> {
        let _lock = self.download_lock.lock().await;

        log::info!("Creating model directory at {:?}", self.model_dir);
        fs::create_dir_all(&self.model_dir)?;

        for file_name in MODEL_FILES {
            let path = self.file_path(file_name);
            log::info!("Downloading {} from {} to {:?}", file_name, source.describe(), path);
            let bytes = source.fetch(file_name).await.map_err(|e| {
                log::error!("Failed to download {}: {}", file_name, e);
                e
            })?;
            log::info!("Writing {} bytes to {:?}", bytes.len(), path);
            fs::write(&path, &bytes)?;
        }

        log::info!("Model files ready in {:?}", self.model_dir);
        Ok(())
    }

    /// Mirrors the remote store only when the local directory does not exist yet.
    ///
    /// Returns `true` if a download happened.
    pub async fn ensure_downloaded(&self, source: &dyn ObjectSource) -> Result<bool, ModelError> {
        if self.model_dir.exists() {
            log::info!("Model directory {:?} exists, skipping download", self.model_dir);
            return Ok(false);
        }
        log::info!("Model directory {:?} not found, downloading...", self.model_dir);
        self.download(source).await?;
        Ok(true)
    }

    /// Removes the local mirror so the next `ensure_downloaded` fetches again.
    pub fn remove_download(&self) -> Result<(), ModelError> {
        if self.model_dir.exists() {
            fs::remove_dir_all(&self.model_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct MemorySource {
        objects: HashMap<String, Bytes>,
        fetched: StdMutex<Vec<String>>,
    }

    impl MemorySource {
        fn complete() -> Self {
            let objects = MODEL_FILES
                .iter()
                .map(|name| (name.to_string(), Bytes::from(format!("contents of {}", name))))
                .collect();
            Self { objects, fetched: StdMutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ObjectSource for MemorySource {
        async fn fetch(&self, file_name: &str) -> Result<Bytes, ModelError> {
            self.fetched.lock().unwrap().push(file_name.to_string());
            self.objects.get(file_name).cloned().ok_or_else(|| ModelError::StorageError {
                key: file_name.to_string(),
                message: "NoSuchKey".to_string(),
            })
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    #[tokio::test]
    async fn test_ensure_downloaded_fetches_once() -> Result<(), ModelError> {
        let scratch = tempfile::tempdir()?;
        let store = ModelStore::new(scratch.path().join("emotion_model"));
        let source = MemorySource::complete();

        assert!(!store.is_downloaded());
        assert!(store.ensure_downloaded(&source).await?);
        assert!(store.is_downloaded());
        assert_eq!(*source.fetched.lock().unwrap(), MODEL_FILES.to_vec());
        assert_eq!(fs::read_to_string(store.file_path("vocab.txt"))?, "contents of vocab.txt");

        // Warm start: directory exists, nothing is fetched
        assert!(!store.ensure_downloaded(&source).await?);
        assert_eq!(source.fetched.lock().unwrap().len(), MODEL_FILES.len());
        Ok(())
    }

    #[tokio::test]
    async fn test_download_failure_aborts() -> Result<(), ModelError> {
        let scratch = tempfile::tempdir()?;
        let store = ModelStore::new(scratch.path().join("emotion_model"));
        let mut source = MemorySource::complete();
        source.objects.remove("vocab.txt");

        let result = store.download(&source).await;
        assert!(matches!(result, Err(ModelError::StorageError { ref key, .. }) if key == "vocab.txt"));
        assert!(!store.is_downloaded());
        assert!(matches!(store.require_downloaded(), Err(ModelError::NotDownloaded(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_download() -> Result<(), ModelError> {
        let scratch = tempfile::tempdir()?;
        let store = ModelStore::new(scratch.path().join("emotion_model"));
        store.download(&MemorySource::complete()).await?;
        assert!(store.require_downloaded().is_ok());

        store.remove_download()?;
        assert!(!store.model_dir().exists());
        store.remove_download()?; // Nothing left to remove is fine
        Ok(())
    }

    #[test]
    fn test_paths() {
        let store = ModelStore::new("/tmp/emotion_model");
        assert!(store.get_model_path().ends_with("emotion_model/model.onnx"));
        assert!(store.get_tokenizer_path().ends_with("emotion_model/tokenizer.json"));
        assert_eq!(HttpSource::new("https://example.com/m").url_for("vocab.txt"), "https://example.com/m/vocab.txt");
    }

    #[test]
    fn test_default_model_dir() {
        let _env = crate::test_support::env_lock();
        env::set_var(CACHE_ENV_VAR, "/tmp/test-emotion-cache");
        let path = ModelStore::get_default_model_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-emotion-cache/emotion_model"));
        env::remove_var(CACHE_ENV_VAR);

        let path = ModelStore::get_default_model_dir();
        assert!(path.ends_with("emotion-api/emotion_model"));
    }
}
