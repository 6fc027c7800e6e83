//! Remote object storage for Filedrop.
//!
//! This module provides trait-based interfaces onto an object store and an
//! identity service, AWS and in-memory implementations of both, the
//! credential provisioner that rotates access keys on startup, and the
//! mirror that copies saved files into a bucket.
//!
//! # Design Principles
//! - Remote failures never escape as panics; they are `Error::Remote` with a
//!   classified kind, or `Error::Unavailable` when no session exists
//! - No retries and no backoff: every call is attempted once
//! - Backend isolation: nothing outside `aws` touches the SDK

pub mod aws;
pub mod credentials;
pub mod memory;
pub mod mirror;
pub mod provider;

pub use credentials::{CredentialProvisioner, Session};
pub use memory::{KeyOperation, MemoryAccessKeys, MemoryConnector, MemoryObjectStorage};
pub use mirror::RemoteMirror;
pub use provider::{AccessKeyApi, ObjectStorage, SessionConnector};
