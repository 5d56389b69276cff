//! S3-compatible destination (AWS S3, MinIO, Ceph RGW)
//!
//! Containers are buckets. The source fingerprint is stored as user metadata
//! on every object so the next run can compare against it with a single
//! `HeadObject`.

use super::config::StorageConfig;
use super::ObjectStore;
use crate::error::StorageError;
use crate::file::FileState;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client,
};
use tracing::{debug, info, instrument};

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    region: String,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store").field("region", &self.region).finish()
    }
}

impl S3Store {
    /// Build the client and authenticate with one `ListBuckets` call
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        debug!(endpoint = ?config.endpoint, region = %config.region, "Connecting to object store");

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let Some((access_key, secret_key)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "mirror-import",
            ));
        }
        if let Some(ref endpoint) = config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style)
            .build();

        let store = Self {
            client: Client::from_conf(s3_config),
            region: config.region.clone(),
        };
        store.authenticate().await?;

        info!(region = %store.region, "Authenticated against object store");
        Ok(store)
    }

    async fn authenticate(&self) -> Result<(), StorageError> {
        self.client
            .list_buckets()
            .send()
            .await
            .map_err(|e| StorageError::Authentication(DisplayErrorContext(e).to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self))]
    async fn ensure_container(&self, container: &str) -> Result<(), StorageError> {
        let mut request = self.client.create_bucket().bucket(container);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                info!("Created container");
                Ok(())
            },
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_bucket_already_owned_by_you()) =>
            {
                debug!("Container already exists");
                Ok(())
            },
            Err(e) => Err(StorageError::CreateContainer {
                container: container.to_string(),
                message: DisplayErrorContext(e).to_string(),
            }),
        }
    }

    async fn object_state(&self, container: &str, object: &str) -> Result<Option<FileState>, StorageError> {
        let response = match self
            .client
            .head_object()
            .bucket(container)
            .key(object)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => return Ok(None),
            Err(e) => {
                return Err(StorageError::ReadObject {
                    container: container.to_string(),
                    object: object.to_string(),
                    message: DisplayErrorContext(e).to_string(),
                })
            },
        };

        let mut state = response
            .metadata()
            .map(FileState::from_metadata)
            .unwrap_or_default();
        state.content_type = response.content_type().map(str::to_string);
        Ok(Some(state))
    }

    #[instrument(skip(self, body, state), fields(size = body.len()))]
    async fn put_object(
        &self,
        container: &str,
        object: &str,
        body: Vec<u8>,
        state: &FileState,
    ) -> Result<(), StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(container)
            .key(object)
            .body(ByteStream::from(body));

        for (key, value) in state.to_metadata() {
            request = request.metadata(key, value);
        }
        if let Some(ref content_type) = state.content_type {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|e| StorageError::WriteObject {
            container: container.to_string(),
            object: object.to_string(),
            message: DisplayErrorContext(e).to_string(),
        })?;

        debug!("Wrote object");
        Ok(())
    }
}
