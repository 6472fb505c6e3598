//! Byte-stream access across S3, GCS, HTTPS and local filesystem.
//!
//! One [`ObjectStoreAdapter`] per worker (object-store clients are
//! worker-local and constructed inside the worker). The adapter never
//! retries: a failed read or write is surfaced immediately and retry
//! policy, if any, belongs to the caller.

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tracing::debug;

use forcing_core::{ForcingError, Result};

use crate::uri::{classify, split_gcs, split_s3, UriKind};

/// Opens and writes back byte streams for one object/file, regardless of
/// which of the four supported backends it lives on.
pub struct ObjectStoreAdapter {
    http: reqwest::Client,
}

impl Default for ObjectStoreAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStoreAdapter {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Open a readable byte stream for a URL or local path.
    pub async fn get(&self, uri: &str) -> Result<Bytes> {
        match classify(uri) {
            UriKind::S3 => self.get_s3(uri).await,
            UriKind::Gcs => self.get_gcs(uri).await,
            UriKind::Https => self.get_https(uri).await,
            UriKind::Local => self.get_local(uri).await,
        }
    }

    /// Fetch the object if it exists, or `None` if it does not. Used by the
    /// emitter's append path, where a missing object in non-append mode is
    /// not an error but in append mode is [`ForcingError::AppendMissing`].
    pub async fn get_optional(&self, uri: &str) -> Result<Option<Bytes>> {
        match self.get(uri).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(ForcingError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Byte size of an object without downloading its body, used by the
    /// metadata collector to sample input/output file sizes cheaply.
    pub async fn size(&self, uri: &str) -> Result<u64> {
        match classify(uri) {
            UriKind::S3 => {
                let (bucket, key) = split_s3(uri);
                let store = AmazonS3Builder::new()
                    .with_bucket_name(&bucket)
                    .with_region("us-east-1")
                    .with_skip_signature(true)
                    .build()
                    .map_err(|e| ForcingError::transport(uri, e.to_string()))?;
                head_size(&store, &key, uri).await
            }
            UriKind::Gcs => {
                let (bucket, key) = split_gcs(uri);
                let store = GoogleCloudStorageBuilder::new()
                    .with_bucket_name(&bucket)
                    .build()
                    .map_err(|e| ForcingError::transport(uri, e.to_string()))?;
                head_size(&store, &key, uri).await
            }
            UriKind::Https => {
                let response = self
                    .http
                    .head(uri)
                    .send()
                    .await
                    .map_err(|e| ForcingError::transport(uri, e.to_string()))?;
                response
                    .content_length()
                    .ok_or_else(|| ForcingError::transport(uri, "no Content-Length header"))
            }
            UriKind::Local => {
                let meta = tokio::fs::metadata(uri)
                    .await
                    .map_err(|e| ForcingError::transport(uri, e.to_string()))?;
                Ok(meta.len())
            }
        }
    }

    /// Write bytes to a URL or local path, overwriting any existing object.
    pub async fn put(&self, uri: &str, data: Bytes) -> Result<()> {
        match classify(uri) {
            UriKind::S3 => self.put_s3(uri, data).await,
            UriKind::Gcs => self.put_gcs(uri, data).await,
            UriKind::Https => Err(ForcingError::configuration(
                "HTTPS sinks are not writable; output_path must be s3://, gs:// or a local path",
            )),
            UriKind::Local => self.put_local(uri, data).await,
        }
    }

    async fn get_s3(&self, uri: &str) -> Result<Bytes> {
        let (bucket, key) = split_s3(uri);
        let store = AmazonS3Builder::new()
            .with_bucket_name(&bucket)
            .with_region("us-east-1")
            .with_skip_signature(true)
            .build()
            .map_err(|e| ForcingError::transport(uri, e.to_string()))?;

        debug!(bucket = %bucket, key = %key, "anonymous S3 read");
        fetch(&store, &key, uri).await
    }

    async fn put_s3(&self, uri: &str, data: Bytes) -> Result<()> {
        let (bucket, key) = split_s3(uri);
        let store = AmazonS3Builder::new()
            .with_bucket_name(&bucket)
            .with_region("us-east-1")
            .build()
            .map_err(|e| ForcingError::transport(uri, e.to_string()))?;

        store
            .put(&ObjectPath::from(key), data.into())
            .await
            .map_err(|e| ForcingError::transport(uri, e.to_string()))?;
        Ok(())
    }

    async fn get_gcs(&self, uri: &str) -> Result<Bytes> {
        let (bucket, key) = split_gcs(uri);
        let store = GoogleCloudStorageBuilder::new()
            .with_bucket_name(&bucket)
            .build()
            .map_err(|e| ForcingError::transport(uri, e.to_string()))?;

        debug!(bucket = %bucket, key = %key, "GCS read");
        fetch(&store, &key, uri).await
    }

    async fn put_gcs(&self, uri: &str, data: Bytes) -> Result<()> {
        let (bucket, key) = split_gcs(uri);
        let store = GoogleCloudStorageBuilder::new()
            .with_bucket_name(&bucket)
            .build()
            .map_err(|e| ForcingError::transport(uri, e.to_string()))?;

        store
            .put(&ObjectPath::from(key), data.into())
            .await
            .map_err(|e| ForcingError::transport(uri, e.to_string()))?;
        Ok(())
    }

    async fn get_https(&self, uri: &str) -> Result<Bytes> {
        let response = self
            .http
            .get(uri)
            .send()
            .await
            .map_err(|e| ForcingError::transport(uri, e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ForcingError::NotFound(uri.to_string()));
        }
        let response = response
            .error_for_status()
            .map_err(|e| ForcingError::transport(uri, e.to_string()))?;

        response
            .bytes()
            .await
            .map_err(|e| ForcingError::transport(uri, e.to_string()))
    }

    async fn get_local(&self, path: &str) -> Result<Bytes> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ForcingError::NotFound(path.to_string()))
            }
            Err(e) => Err(ForcingError::transport(path, e.to_string())),
        }
    }

    async fn put_local(&self, path: &str, data: Bytes) -> Result<()> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ForcingError::transport(path, e.to_string()))?;
        }
        tokio::fs::write(path, data)
            .await
            .map_err(|e| ForcingError::transport(path, e.to_string()))
    }
}

async fn head_size(store: &dyn ObjectStore, key: &str, uri_for_errors: &str) -> Result<u64> {
    let location = ObjectPath::from(key);
    store
        .head(&location)
        .await
        .map(|meta| meta.size as u64)
        .map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                ForcingError::NotFound(uri_for_errors.to_string())
            }
            other => ForcingError::transport(uri_for_errors, other.to_string()),
        })
}

async fn fetch(store: &dyn ObjectStore, key: &str, uri_for_errors: &str) -> Result<Bytes> {
    let location = ObjectPath::from(key);
    let result = store.get(&location).await.map_err(|e| match e {
        object_store::Error::NotFound { .. } => ForcingError::NotFound(uri_for_errors.to_string()),
        other => ForcingError::transport(uri_for_errors, other.to_string()),
    })?;

    result
        .bytes()
        .await
        .map_err(|e| ForcingError::transport(uri_for_errors, e.to_string()))
}
