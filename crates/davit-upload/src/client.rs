//! Upload client speaking the S3 protocol against a configured endpoint.

use std::env;

use chrono::Utc;
use reqwest::Method;
use reqwest::header::ETAG;
use tracing::{debug, info};
use url::Url;

use crate::error::UploadError;
use crate::multipart::{CompletedPart, completion_manifest, parse_upload_id};
use crate::sign::{SigningParams, canonical_query, sha256_hex, sign_request, uri_encode};

/// Payloads below this size go up as one signed `PUT`.
pub const MULTIPART_THRESHOLD: usize = 5 * 1024 * 1024;

/// Chunk size for multipart uploads.
pub const PART_SIZE: usize = 5 * 1024 * 1024;

/// Region component of the credential scope; R2 uses the literal `auto`.
const REGION: &str = "auto";

/// Connection settings for the object store.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    /// Endpoint origin, e.g. `https://<account>.r2.cloudflarestorage.com`.
    pub endpoint: String,
    /// Bucket all objects are written into.
    pub bucket: String,
    /// Access key identifier.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
}

impl ObjectStoreConfig {
    /// Read the `R2_*` environment variables.
    ///
    /// Returns `Ok(None)` when none of them are set (uploads disabled).
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Config`] when only some of the variables are
    /// present.
    pub fn from_env() -> Result<Option<Self>, UploadError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`ObjectStoreConfig::from_env`], with an injectable source.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Config`] when only some variables are present.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, UploadError> {
        let fetch = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let endpoint = fetch("R2_ENDPOINT");
        let bucket = fetch("R2_BUCKET");
        let access_key_id = fetch("R2_ACCESS_KEY_ID");
        let secret_access_key = fetch("R2_SECRET_ACCESS_KEY");

        match (endpoint, bucket, access_key_id, secret_access_key) {
            (None, None, None, None) => Ok(None),
            (Some(endpoint), Some(bucket), Some(access_key_id), Some(secret_access_key)) => {
                Ok(Some(Self {
                    endpoint,
                    bucket,
                    access_key_id,
                    secret_access_key,
                }))
            }
            (endpoint, bucket, access_key_id, _) => {
                let missing = if endpoint.is_none() {
                    "R2_ENDPOINT"
                } else if bucket.is_none() {
                    "R2_BUCKET"
                } else if access_key_id.is_none() {
                    "R2_ACCESS_KEY_ID"
                } else {
                    "R2_SECRET_ACCESS_KEY"
                };
                Err(UploadError::Config { missing })
            }
        }
    }
}

/// Client for signed uploads. Fail-fast: no step is retried.
pub struct ObjectStoreClient {
    config: ObjectStoreConfig,
    scheme: String,
    host: String,
    http: reqwest::Client,
    part_size: usize,
}

impl ObjectStoreClient {
    /// Construct a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Endpoint`] for unparseable endpoints and
    /// [`UploadError::Transport`] when the HTTP client cannot be built.
    pub fn new(config: ObjectStoreConfig) -> Result<Self, UploadError> {
        let endpoint =
            Url::parse(config.endpoint.trim_end_matches('/')).map_err(|_| {
                UploadError::Endpoint {
                    endpoint: config.endpoint.clone(),
                }
            })?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(UploadError::Endpoint {
                    endpoint: config.endpoint.clone(),
                });
            }
        };
        let http = reqwest::Client::builder()
            .build()
            .map_err(|source| UploadError::Transport { source })?;
        Ok(Self {
            scheme: endpoint.scheme().to_string(),
            config,
            host,
            http,
            part_size: PART_SIZE,
        })
    }

    /// Upload one object, choosing single or multipart mode by size.
    ///
    /// # Errors
    ///
    /// Propagates the first failing step; nothing is retried and a partial
    /// multipart upload is left to the store's lifecycle rules.
    pub async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        payload: &[u8],
    ) -> Result<(), UploadError> {
        if payload.len() < MULTIPART_THRESHOLD {
            self.put_single(key, content_type, payload).await
        } else {
            self.put_multipart(key, content_type, payload).await
        }
    }

    async fn put_single(
        &self,
        key: &str,
        content_type: &str,
        payload: &[u8],
    ) -> Result<(), UploadError> {
        let response = self
            .send_signed(
                Method::PUT,
                key,
                &[],
                Some(content_type),
                payload.to_vec(),
                "put_object",
            )
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                operation: "put_object",
                status: status.as_u16(),
            });
        }
        debug!(key, size = payload.len(), "single-part upload complete");
        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        content_type: &str,
        payload: &[u8],
    ) -> Result<(), UploadError> {
        let response = self
            .send_signed(
                Method::POST,
                key,
                &[("uploads".to_string(), String::new())],
                Some(content_type),
                Vec::new(),
                "initiate_multipart",
            )
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                operation: "initiate_multipart",
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(|source| UploadError::Http {
            operation: "initiate_multipart",
            source,
        })?;
        let upload_id = parse_upload_id(&body)?;

        let mut parts = Vec::new();
        for (index, chunk) in payload.chunks(self.part_size).enumerate() {
            let part_number = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let query = [
                ("partNumber".to_string(), part_number.to_string()),
                ("uploadId".to_string(), upload_id.clone()),
            ];
            let response = self
                .send_signed(Method::PUT, key, &query, None, chunk.to_vec(), "upload_part")
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(UploadError::PartStatus {
                    part_number,
                    status: status.as_u16(),
                });
            }
            let etag = response
                .headers()
                .get(ETAG)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or(UploadError::MissingEtag { part_number })?;
            parts.push(CompletedPart { part_number, etag });
        }

        let manifest = completion_manifest(&parts);
        let query = [("uploadId".to_string(), upload_id)];
        let response = self
            .send_signed(
                Method::POST,
                key,
                &query,
                Some("application/xml"),
                manifest.into_bytes(),
                "complete_multipart",
            )
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                operation: "complete_multipart",
                status: status.as_u16(),
            });
        }
        info!(key, parts = parts.len(), "multipart upload complete");
        Ok(())
    }

    async fn send_signed(
        &self,
        method: Method,
        key: &str,
        query: &[(String, String)],
        content_type: Option<&str>,
        body: Vec<u8>,
        operation: &'static str,
    ) -> Result<reqwest::Response, UploadError> {
        let canonical_path = format!(
            "/{}/{}",
            uri_encode(&self.config.bucket, true),
            uri_encode(key, false)
        );
        let query_string = canonical_query(query);
        let mut target = format!("{}://{}{canonical_path}", self.scheme, self.host);
        if !query_string.is_empty() {
            target.push('?');
            target.push_str(&query_string);
        }
        let url = Url::parse(&target).map_err(|_| UploadError::Endpoint {
            endpoint: target.clone(),
        })?;

        let payload_hash = sha256_hex(&body);
        let headers = sign_request(&SigningParams {
            access_key_id: &self.config.access_key_id,
            secret_access_key: &self.config.secret_access_key,
            region: REGION,
            method: method.as_str(),
            host: &self.host,
            canonical_path: &canonical_path,
            canonical_query: &query_string,
            content_type,
            payload_hash: &payload_hash,
            timestamp: Utc::now(),
        });

        let mut request = self.http.request(method, url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        request
            .body(body)
            .send()
            .await
            .map_err(|source| UploadError::Http { operation, source })
    }
}
