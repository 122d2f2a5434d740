//! backsnap-s3
//!
//! `ObjectStore` implementation backed by any S3-compatible endpoint
//! (AWS S3, Tencent COS, MinIO, SeaweedFS).

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use backsnap_core::config::Settings;
use backsnap_core::ports::{ObjectStore, StoreError};

/// ListObjectsV2 の 1 ページあたりの最大件数
pub const MAX_KEYS_PER_PAGE: i32 = 1000;

/// S3 接続設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// 未指定なら AWS のエンドポイント
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub force_path_style: bool,
}

impl From<&Settings> for S3Settings {
    fn from(settings: &Settings) -> Self {
        Self {
            bucket: settings.s3_bucket.clone(),
            region: settings.s3_region.clone(),
            endpoint: settings
                .s3_endpoint
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            access_key: settings.s3_access_key.clone(),
            secret_key: settings.s3_secret_key.clone(),
            force_path_style: settings.s3_force_path_style,
        }
    }
}

pub async fn create_client(settings: &S3Settings) -> Client {
    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .load()
        .await;

    let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config).credentials_provider(Credentials::new(
        settings.access_key.clone(),
        settings.secret_key.clone(),
        None,
        None,
        "backsnap-config",
    ));

    if let Some(endpoint) = &settings.endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    if settings.force_path_style {
        builder = builder.force_path_style(true);
    }

    Client::from_conf(builder.build())
}

/// S3ObjectStore は 1 つのバケットを扱う
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub async fn connect(settings: &S3Settings) -> Self {
        tracing::info!(
            bucket = %settings.bucket,
            region = %settings.region,
            endpoint = settings.endpoint.as_deref().unwrap_or("default"),
            "connecting to object store"
        );
        Self::new(create_client(settings).await, settings.bucket.clone())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .max_keys(MAX_KEYS_PER_PAGE)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StoreError::List {
                    prefix: prefix.to_string(),
                    message: DisplayErrorContext(&e).to_string(),
                })?;

            keys.extend(resp.contents().iter().filter_map(|obj| obj.key()).map(str::to_string));

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    tracing::debug!(listed = keys.len(), "fetching next page");
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Delete {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<u64, StoreError> {
        let local_error = |source| StoreError::LocalFile {
            path: path.display().to_string(),
            source,
        };
        let size = tokio::fs::metadata(path).await.map_err(local_error)?.len();

        let body = ByteStream::from_path(path).await.map_err(|e| StoreError::Put {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(size as i64)
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Put {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(size)
    }

    async fn put_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StoreError::Put {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StoreError::Head {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: Option<&str>) -> Settings {
        Settings {
            s3_bucket: "backups-1250000000".to_string(),
            s3_region: "ap-guangzhou".to_string(),
            s3_endpoint: endpoint.map(str::to_string),
            s3_access_key: "AKID".to_string(),
            s3_secret_key: "secret".to_string(),
            s3_force_path_style: true,
            target_dir: String::new(),
            sources: String::new(),
            schedule_time: None,
            cleanup_enabled: false,
            cleanup_days: None,
            cleanup_whitelist: String::new(),
            log_format: Default::default(),
        }
    }

    #[test]
    fn settings_are_taken_from_core_settings() {
        let s3 = S3Settings::from(&settings(Some("https://cos.ap-guangzhou.myqcloud.com")));
        assert_eq!(s3.bucket, "backups-1250000000");
        assert_eq!(s3.region, "ap-guangzhou");
        assert_eq!(s3.endpoint.as_deref(), Some("https://cos.ap-guangzhou.myqcloud.com"));
        assert!(s3.force_path_style);
    }

    #[test]
    fn blank_endpoint_means_default() {
        let s3 = S3Settings::from(&settings(Some("  ")));
        assert_eq!(s3.endpoint, None);
    }

    #[tokio::test]
    async fn client_is_built_without_network() {
        let s3 = S3Settings::from(&settings(Some("http://127.0.0.1:9000")));
        let store = S3ObjectStore::connect(&s3).await;
        assert_eq!(store.bucket(), "backups-1250000000");
        assert_eq!(
            store.client.config().region().map(|r| r.as_ref()),
            Some("ap-guangzhou")
        );
    }
}
