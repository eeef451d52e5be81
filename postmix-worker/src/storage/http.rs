//! S3 REST backend
//!
//! Path-style URLs: `{endpoint}/{bucket}/{key}`. Requests are signed with
//! SigV4 when credentials are configured and sent unsigned otherwise.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use postmix_common::config::StorageCredentials;

use super::sigv4::{self, SigningRequest, UNSIGNED_PAYLOAD};
use super::{ObjectStore, StorageError};

const USER_AGENT: &str = concat!("postmix-worker/", env!("CARGO_PKG_VERSION"));

/// S3-compatible object store client
/// Upper bound on one request, including the body transfer
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct HttpObjectStore {
    http_client: reqwest::Client,
    endpoint: Url,
    /// Host header value covered by signatures
    host: String,
    region: String,
    credentials: Option<StorageCredentials>,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: &str,
        region: impl Into<String>,
        credentials: Option<StorageCredentials>,
    ) -> Result<Self, StorageError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StorageError::Transport(format!("invalid endpoint {}: {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(StorageError::Transport(format!(
                "endpoint {} must use http or https",
                endpoint
            )));
        }
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(StorageError::Transport(format!(
                    "endpoint {} has no host",
                    endpoint
                )))
            }
        };

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            endpoint,
            host,
            region: region.into(),
            credentials,
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        // URL parsing would resolve these and address another object
        if key.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        let base = self.endpoint.as_str().trim_end_matches('/');
        let raw = format!(
            "{}/{}/{}",
            base,
            sigv4::uri_encode(bucket, false),
            sigv4::uri_encode(key, true)
        );
        Url::parse(&raw).map_err(|e| StorageError::InvalidKey(format!("{}: {}", key, e)))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self.http_client.request(method.clone(), url.clone());

        if let Some(credentials) = &self.credentials {
            let signing = SigningRequest {
                method: method.as_str(),
                host: &self.host,
                canonical_uri: url.path(),
                payload_hash: UNSIGNED_PAYLOAD,
            };
            for (name, value) in sigv4::sign(&signing, credentials, &self.region, Utc::now()) {
                builder = builder.header(name, value);
            }
        }

        builder
    }
}

/// Turn a non-success response into a status error
async fn status_error(key: &str, response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    StorageError::Status {
        status,
        key: key.to_string(),
        message,
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        let url = self.object_url(bucket, key)?;
        let response = self.request(Method::HEAD, url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(key, response).await),
        }
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StorageError> {
        info!(bucket, key, "Downloading object");

        let url = self.object_url(bucket, key)?;
        let mut response = self.request(Method::GET, url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(status_error(key, response).await);
        }

        let mut file = tokio::fs::File::create(local_path).await?;
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        info!(
            key,
            path = %local_path.display(),
            bytes = written,
            "File downloaded"
        );
        Ok(())
    }

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        info!(path = %local_path.display(), bucket, key, "Uploading file");

        let body = tokio::fs::read(local_path).await?;
        let bytes = body.len();
        let url = self.object_url(bucket, key)?;

        let response = self
            .request(Method::PUT, url)
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(key, response).await);
        }

        debug!(key, bytes, "Upload accepted");
        info!(path = %local_path.display(), "File uploaded successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_is_path_style_and_encoded() {
        let store = HttpObjectStore::new("http://localhost:9000/", "us-east-1", None).unwrap();
        let url = store.object_url("songs", "utau_inference/my vocals.wav").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/songs/utau_inference/my%20vocals.wav"
        );
    }

    #[test]
    fn test_empty_key_rejected() {
        let store = HttpObjectStore::new("http://localhost:9000", "us-east-1", None).unwrap();
        assert!(matches!(
            store.object_url("songs", ""),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(HttpObjectStore::new("not a url", "us-east-1", None).is_err());
    }

    #[test]
    fn test_endpoint_without_host_rejected() {
        assert!(HttpObjectStore::new("file:///srv/objects", "us-east-1", None).is_err());
        assert!(HttpObjectStore::new("unix:/run/s3.sock", "us-east-1", None).is_err());
    }

    #[test]
    fn test_signed_host_includes_explicit_port() {
        let store = HttpObjectStore::new("http://127.0.0.1:9000", "us-east-1", None).unwrap();
        assert_eq!(store.host, "127.0.0.1:9000");

        let store = HttpObjectStore::new("https://s3.us-east-1.amazonaws.com", "us-east-1", None).unwrap();
        assert_eq!(store.host, "s3.us-east-1.amazonaws.com");
    }

    #[test]
    fn test_dot_segments_rejected() {
        let store = HttpObjectStore::new("http://localhost:9000", "us-east-1", None).unwrap();
        for key in [
            "utau_inference/../static/audio/reference.wav",
            "../secrets.wav",
            "utau_inference/./v.wav",
            "utau_inference/..",
        ] {
            assert!(
                matches!(store.object_url("songs", key), Err(StorageError::InvalidKey(_))),
                "{key} should be rejected"
            );
        }
        // Dots inside a segment are ordinary characters
        assert!(store.object_url("songs", "utau_inference/v..1.wav").is_ok());
    }
}
