use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;

use crate::model_store::{ModelError, ObjectSource};

/// Bucket holding the fine-tuned model.
pub const DEFAULT_BUCKET: &str = "emotion-detection-model";
/// Key prefix of the model files inside the bucket.
pub const DEFAULT_PREFIX: &str = "emotion_model/";

/// S3 bucket + key prefix holding the model files.
#[derive(Debug, Clone)]
pub struct S3Source {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3Source {
    pub fn new(client: S3Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Builds a client from the ambient AWS configuration (env, profile or instance role).
    pub async fn from_env(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let shared_config = aws_config::from_env().load().await;
        Self::new(S3Client::new(&shared_config), bucket, prefix)
    }

    pub fn key_for(&self, file_name: &str) -> String {
        object_key(&self.prefix, file_name)
    }
}

pub(crate) fn object_key(prefix: &str, file_name: &str) -> String {
    format!("{}{}", prefix, file_name)
}

#[async_trait]
impl ObjectSource for S3Source {
    async fn fetch(&self, file_name: &str) -> Result<Bytes, ModelError> {
        let key = self.key_for(file_name);
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| ModelError::StorageError {
                key: key.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let data = output.body.collect().await.map_err(|e| ModelError::StorageError {
            key: key.clone(),
            message: e.to_string(),
        })?;
        Ok(data.into_bytes())
    }

    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}
