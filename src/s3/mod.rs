//! S3 client module with AWS SigV2 signing
//!
//! This module provides:
//! - AWS Signature Version 2 signing (HMAC-SHA1) for S3 requests
//! - Async bucket and object operations (create, delete, exists, put, get)
//! - A pluggable HTTP transport with a hyper-based default

pub mod client;
pub mod content;
pub mod signer;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{Result, S3Client, S3Error};
pub use content::{sniff_mime, LocalFile};
pub use signer::{S3SignerV2, DEFAULT_HOST};
pub use transport::{
    Diagnostics, HyperTransport, Payload, Transport, TransportConfig, TransportFailure,
    TransportRequest, TransportResponse,
};
pub use types::{
    Acl, BucketOptions, Method, Outcome, RequestHeaders, StorageClass, StoreOptions,
};
