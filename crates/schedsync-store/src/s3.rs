//! S3 (and S3-compatible) object store backed by the AWS SDK.
//!
//! The SDK is async; every call is driven on the shared runtime so callers
//! stay synchronous.

use std::io::Write;
use std::path::Path;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region, SharedCredentialsProvider};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::operation::put_object::builders::PutObjectFluentBuilder;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use schedsync_core::SHARED_RUNTIME;

use crate::object::{ObjectInfo, ObjectStore, Precondition, PutOptions, StoreError, StoredObject};

/// Connection settings for an S3 endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub region: String,
    /// Custom endpoint for S3-compatible providers; enables path-style addressing
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client for `bucket`.
    ///
    /// Static keys are used when both are set; otherwise the SDK's default
    /// credential chain (environment, profile, instance role) applies.
    pub fn connect(settings: &S3Settings, bucket: &str) -> Result<Self, StoreError> {
        if bucket.is_empty() {
            return Err(StoreError::Client("bucket name is empty".to_string()));
        }

        let sdk_config = SHARED_RUNTIME.handle().block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(settings.region.clone()))
                .load(),
        );

        let mut b = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.endpoint {
            b = b.endpoint_url(endpoint).force_path_style(true);
        }
        if let (Some(ak), Some(sk)) = (&settings.access_key_id, &settings.secret_access_key) {
            let creds = Credentials::new(ak, sk, None, None, "schedsync");
            b = b.credentials_provider(SharedCredentialsProvider::new(creds));
        }

        log::debug!(
            "s3 client: bucket={bucket} region={} endpoint={}",
            settings.region,
            settings.endpoint.as_deref().unwrap_or("default")
        );

        Ok(Self {
            client: Client::from_conf(b.build()),
            bucket: bucket.to_string(),
        })
    }

    /// GET with not-found mapped to `None`.
    async fn get_object(&self, key: &str) -> Result<Option<GetObjectOutput>, StoreError> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        match res {
            Ok(o) => Ok(Some(o)),
            Err(e) => {
                let no_such_key = e.as_service_error().is_some_and(|s| s.is_no_such_key());
                if no_such_key || http_status(&e) == Some(404) {
                    Ok(None)
                } else {
                    Err(backend("GET", key, &e))
                }
            }
        }
    }

    fn apply_precondition(req: PutObjectFluentBuilder, precondition: &Precondition) -> PutObjectFluentBuilder {
        match precondition {
            Precondition::None => req,
            Precondition::IfAbsent => req.if_none_match("*"),
            Precondition::IfMatch(etag) => req.if_match(etag),
        }
    }

    fn send_put(&self, key: &str, body: ByteStream, opts: &PutOptions) -> Result<(), StoreError> {
        let req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(&opts.content_type)
            .body(body);
        let req = Self::apply_precondition(req, &opts.precondition);

        SHARED_RUNTIME
            .handle()
            .block_on(req.send())
            .map(|_| ())
            .map_err(|e| match http_status(&e) {
                // 412 for a failed If-Match/If-None-Match, 409 for a racing conditional write
                Some(412 | 409) if opts.precondition != Precondition::None => {
                    StoreError::PreconditionFailed {
                        key: key.to_string(),
                    }
                }
                _ => backend("PUT", key, &e),
            })
    }
}

fn http_status<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

fn backend<E>(operation: &'static str, key: &str, err: &SdkError<E, HttpResponse>) -> StoreError
where
    E: std::error::Error + 'static,
{
    StoreError::Backend {
        operation,
        key: key.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

impl ObjectStore for S3Store {
    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        SHARED_RUNTIME.handle().block_on(async {
            let Some(output) = self.get_object(key).await? else {
                return Ok(None);
            };
            let etag = output.e_tag().map(str::to_string);
            let body = output
                .body
                .collect()
                .await
                .map_err(|e| StoreError::Backend {
                    operation: "GET",
                    key: key.to_string(),
                    message: e.to_string(),
                })?
                .into_bytes()
                .to_vec();
            Ok(Some(StoredObject { body, etag }))
        })
    }

    fn get_into(&self, key: &str, dest: &mut dyn Write) -> Result<Option<u64>, StoreError> {
        SHARED_RUNTIME.handle().block_on(async {
            let Some(mut output) = self.get_object(key).await? else {
                return Ok(None);
            };
            let mut written = 0u64;
            while let Some(chunk) = output.body.next().await {
                let chunk = chunk.map_err(|e| StoreError::Backend {
                    operation: "GET",
                    key: key.to_string(),
                    message: e.to_string(),
                })?;
                dest.write_all(&chunk).map_err(|source| StoreError::Io {
                    key: key.to_string(),
                    source,
                })?;
                written += chunk.len() as u64;
            }
            Ok(Some(written))
        })
    }

    fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StoreError> {
        let res = SHARED_RUNTIME.handle().block_on(
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send(),
        );
        match res {
            Ok(o) => Ok(Some(ObjectInfo {
                size: o.content_length().unwrap_or(0).max(0) as u64,
                etag: o.e_tag().map(str::to_string),
                last_modified: o.last_modified().and_then(to_chrono),
            })),
            Err(e) => {
                let not_found = e.as_service_error().is_some_and(|s| s.is_not_found());
                if not_found || http_status(&e) == Some(404) {
                    Ok(None)
                } else {
                    Err(backend("HEAD", key, &e))
                }
            }
        }
    }

    fn put_bytes(&self, key: &str, body: &[u8], opts: &PutOptions) -> Result<(), StoreError> {
        self.send_put(key, ByteStream::from(body.to_vec()), opts)
    }

    fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> Result<(), StoreError> {
        let body = SHARED_RUNTIME
            .handle()
            .block_on(ByteStream::from_path(path))
            .map_err(|e| StoreError::Backend {
                operation: "PUT",
                key: key.to_string(),
                message: format!("cannot read {}: {e}", path.display()),
            })?;
        self.send_put(key, body, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_region() {
        let s = S3Settings::default();
        assert_eq!(s.region, "us-east-1");
        assert!(s.endpoint.is_none());
    }

    #[test]
    fn aws_datetime_converts() {
        let dt = aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000);
        let converted = to_chrono(&dt).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }

    #[test]
    fn connect_rejects_empty_bucket() {
        let err = S3Store::connect(&S3Settings::default(), "").err().unwrap();
        assert!(matches!(err, StoreError::Client(_)));
    }

    #[test]
    fn describe_uses_bucket() {
        let settings = S3Settings {
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            access_key_id: Some("minio".to_string()),
            secret_access_key: Some("minio123".to_string()),
            ..Default::default()
        };
        let store = S3Store::connect(&settings, "transit").unwrap();
        assert_eq!(store.describe(), "s3://transit");
    }
}
