//! Command implementations for the `s3mini` binary
//!
//! ```bash
//! s3mini mb s3://bucket --region eu-west-1
//! s3mini put ./report.pdf s3://bucket/reports/report.pdf
//! s3mini cat s3://bucket/reports/summary.txt
//! s3mini get s3://bucket/reports/report.pdf ./copy.pdf
//! s3mini stat s3://bucket/reports/report.pdf
//! s3mini rm s3://bucket/reports/report.pdf
//! s3mini rb s3://bucket
//! ```

pub mod args;
pub mod commands;
