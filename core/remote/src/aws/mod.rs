//! AWS backends: S3 for the mirror, IAM for credential rotation.
//!
//! Key rotation runs with the ambient credential chain (environment,
//! profile, instance role); the S3 session then signs with the freshly
//! minted key only.

pub mod iam;
pub mod s3;

pub use iam::IamAccessKeys;
pub use s3::{S3Connector, S3ObjectStorage};

use aws_config::{BehaviorVersion, Region};
use std::sync::Arc;

use filedrop_common::Config;

use crate::credentials::CredentialProvisioner;

/// Load SDK configuration from the ambient credential chain.
pub async fn load_ambient_config(region: &str) -> aws_config::SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// Provisioner rotating IAM keys and opening S3 sessions.
pub async fn provisioner(config: &Config) -> CredentialProvisioner {
    let keys = IamAccessKeys::from_env(&config.region).await;
    CredentialProvisioner::from_config(Arc::new(keys), Arc::new(S3Connector), config)
}
