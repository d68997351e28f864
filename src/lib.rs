//! s3mini - Minimal S3 client with SigV2 request signing

pub mod cli;
pub mod config;
pub mod s3;

pub use config::{Config, Profile};
pub use s3::{S3Client, S3Error};
