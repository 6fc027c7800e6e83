//! IAM access-key management using the AWS SDK.

use async_trait::async_trait;
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_iam::types::StatusType;
use aws_sdk_iam::Client;

use filedrop_common::{
    AccessKeyInfo, AccessKeyStatus, Credential, Error, RemoteErrorKind, Result, SecretKey,
};

use crate::provider::AccessKeyApi;

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

/// Access keys of IAM users, managed with the ambient (operator) credentials.
#[derive(Debug, Clone)]
pub struct IamAccessKeys {
    client: Client,
}

impl IamAccessKeys {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client built from the ambient credential chain.
    pub async fn from_env(region: &str) -> Self {
        let config = super::load_ambient_config(region).await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl AccessKeyApi for IamAccessKeys {
    async fn list_keys(&self, identity: &str) -> Result<Vec<AccessKeyInfo>> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_access_keys()
                .user_name(identity)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| map_sdk_error("list access keys", e))?;

            for metadata in output.access_key_metadata() {
                let Some(id) = metadata.access_key_id() else {
                    continue;
                };
                let status = match metadata.status() {
                    Some(StatusType::Inactive) => AccessKeyStatus::Inactive,
                    _ => AccessKeyStatus::Active,
                };
                keys.push(AccessKeyInfo {
                    id: id.to_string(),
                    status,
                });
            }

            match output.marker() {
                Some(next) => marker = Some(next.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    async fn create_key(&self, identity: &str) -> Result<Credential> {
        let output = self
            .client
            .create_access_key()
            .user_name(identity)
            .send()
            .await
            .map_err(|e| map_sdk_error("create access key", e))?;

        let key = output.access_key().ok_or_else(|| {
            Error::remote(
                RemoteErrorKind::Unknown,
                "create access key: response carried no key",
            )
        })?;

        Ok(Credential {
            identity: identity.to_string(),
            access_key_id: key.access_key_id().to_string(),
            secret: SecretKey::new(key.secret_access_key()),
        })
    }

    async fn delete_key(&self, identity: &str, key_id: &str) -> Result<()> {
        self.client
            .delete_access_key()
            .user_name(identity)
            .access_key_id(key_id)
            .send()
            .await
            .map_err(|e| map_sdk_error("delete access key", e))?;
        Ok(())
    }

    async fn update_key_status(
        &self,
        identity: &str,
        key_id: &str,
        status: AccessKeyStatus,
    ) -> Result<()> {
        self.client
            .update_access_key()
            .user_name(identity)
            .access_key_id(key_id)
            .status(StatusType::from(status.as_str()))
            .send()
            .await
            .map_err(|e| map_sdk_error("update access key", e))?;
        Ok(())
    }
}
