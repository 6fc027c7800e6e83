//! S3 object storage using the AWS SDK.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use filedrop_common::{Credential, Error, RemoteErrorKind, Result};

use crate::provider::{ObjectStorage, SessionConnector};

/// Region in which buckets are created without a location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Provider name attached to credentials minted by the provisioner.
const CREDENTIALS_PROVIDER: &str = "filedrop-rotated";

fn map_sdk_error<E>(context: &str, err: SdkError<E>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let kind = match &err {
        SdkError::ServiceError(service_err) => RemoteErrorKind::classify(
            Some(service_err.raw().status().as_u16()),
            service_err.err().code(),
        ),
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => RemoteErrorKind::Transient,
        _ => RemoteErrorKind::Unknown,
    };
    Error::remote(kind, format!("{}: {}", context, DisplayErrorContext(&err)))
}

/// S3 bucket operations over one SDK client.
#[derive(Debug, Clone)]
pub struct S3ObjectStorage {
    client: Client,
}

impl S3ObjectStorage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client signing with a fixed access key in `region`.
    pub fn with_credential(credential: &Credential, region: &str) -> Self {
        let credentials = Credentials::new(
            credential.access_key_id.clone(),
            credential.secret.expose().to_string(),
            None, // session token
            None, // expiration
            CREDENTIALS_PROVIDER,
        );

        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .build();

        Self::new(Client::from_conf(config))
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    fn name(&self) -> &str {
        "s3"
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if region != DEFAULT_REGION {
            let configuration = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build();
            request = request.create_bucket_configuration(configuration);
        }

        request
            .send()
            .await
            .map_err(|e| map_sdk_error("create bucket", e))?;
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| map_sdk_error("put object", e))?;

        debug!("Uploaded {} (etag {:?})", key, output.e_tag());
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| map_sdk_error("list objects", e))?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error("delete object", e))?;
        Ok(())
    }
}

/// Opens S3 clients signed with a provisioned credential.
#[derive(Debug, Default, Clone, Copy)]
pub struct S3Connector;

#[async_trait]
impl SessionConnector for S3Connector {
    async fn connect(
        &self,
        credential: &Credential,
        region: &str,
    ) -> Result<Arc<dyn ObjectStorage>> {
        Ok(Arc::new(S3ObjectStorage::with_credential(credential, region)))
    }
}
