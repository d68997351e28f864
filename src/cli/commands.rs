use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::cli::args::{parse_object_path, parse_s3_path};
use crate::s3::{Acl, BucketOptions, Outcome, S3Client, S3Error, StoreOptions, Transport};

/// Make bucket command
pub async fn cmd_mb<T: Transport>(
    client: &mut S3Client<T>,
    bucket: &str,
    acl: Acl,
    region: Option<String>,
) -> Result<()> {
    let (bucket_name, _) = parse_s3_path(bucket)?;
    let options = BucketOptions { acl, region };

    if !client.create_bucket(&bucket_name, &options).await {
        return Err(request_failed(client, &format!("create bucket s3://{}", bucket_name)));
    }

    println!("Bucket created: s3://{}", bucket_name);
    Ok(())
}

/// Remove bucket command
pub async fn cmd_rb<T: Transport>(client: &mut S3Client<T>, bucket: &str) -> Result<()> {
    let (bucket_name, _) = parse_s3_path(bucket)?;

    match client.delete_bucket(&bucket_name).await {
        Outcome::Success(_) => {
            println!("Bucket removed: s3://{}", bucket_name);
            Ok(())
        }
        Outcome::Status(status) if status == hyper::StatusCode::CONFLICT => {
            anyhow::bail!("Bucket s3://{} is not empty", bucket_name)
        }
        _ => Err(request_failed(client, &format!("remove bucket s3://{}", bucket_name))),
    }
}

/// Upload a local file
pub async fn cmd_put<T: Transport>(
    client: &mut S3Client<T>,
    source: &Path,
    destination: &str,
    options: &StoreOptions,
) -> Result<()> {
    let (bucket, key) = parse_object_path(destination)?;

    let stored = client
        .put_file(&bucket, &key, source, options)
        .await
        .with_context(|| format!("Failed to upload {}", source.display()))?;
    if !stored {
        return Err(request_failed(client, &format!("upload to s3://{}/{}", bucket, key)));
    }

    info!(source = %source.display(), bucket = %bucket, key = %key, "Upload complete");
    println!("{} -> s3://{}/{}", source.display(), bucket, key);
    Ok(())
}

/// Write an object's contents to `out`
pub async fn cmd_cat<T: Transport, W: Write>(
    client: &mut S3Client<T>,
    path: &str,
    out: &mut W,
) -> Result<()> {
    let (bucket, key) = parse_object_path(path)?;

    let data = match client.get_object(&bucket, &key).await {
        Some(data) => data,
        None => return Err(request_failed(client, &format!("read s3://{}/{}", bucket, key))),
    };

    out.write_all(&data)?;
    out.flush()?;
    Ok(())
}

/// Download an object to a local file
pub async fn cmd_get<T: Transport>(
    client: &mut S3Client<T>,
    path: &str,
    destination: &Path,
) -> Result<()> {
    let (bucket, key) = parse_object_path(path)?;

    let data = match client.get_object(&bucket, &key).await {
        Some(data) => data,
        None => return Err(request_failed(client, &format!("download s3://{}/{}", bucket, key))),
    };

    tokio::fs::write(destination, &data)
        .await
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    println!(
        "s3://{}/{} -> {} ({})",
        bucket,
        key,
        destination.display(),
        format_bytes(data.len() as u64)
    );
    Ok(())
}

/// Report whether a bucket or object exists
///
/// Returns whether the target was found; a missing target is not an error.
pub async fn cmd_stat<T: Transport>(client: &mut S3Client<T>, path: &str) -> Result<bool> {
    let (bucket, key) = parse_s3_path(path)?;

    let (found, target) = match key {
        Some(key) => (
            client.object_exists(&bucket, &key).await,
            format!("s3://{}/{}", bucket, key),
        ),
        None => (
            client.bucket_exists(&bucket).await,
            format!("s3://{}", bucket),
        ),
    };

    if found {
        println!("{}: exists", target);
    } else {
        // Transport problems are still errors
        if let Some(err @ S3Error::Transport { .. }) = client.last_error() {
            anyhow::bail!("Failed to check {}: {}", target, err);
        }
        println!("{}: not found", target);
    }
    Ok(found)
}

/// Remove an object
pub async fn cmd_rm<T: Transport>(client: &mut S3Client<T>, path: &str) -> Result<()> {
    let (bucket, key) = parse_object_path(path)?;

    if !client.delete_object(&bucket, &key).await {
        return Err(request_failed(client, &format!("remove s3://{}/{}", bucket, key)));
    }

    println!("Removed: s3://{}/{}", bucket, key);
    Ok(())
}

/// Error for a failed request, with the client's last error as detail
fn request_failed<T: Transport>(client: &S3Client<T>, action: &str) -> anyhow::Error {
    match client.last_error() {
        Some(err) => anyhow::anyhow!("Failed to {}: {}", action, err),
        None => anyhow::anyhow!("Failed to {}", action),
    }
}

/// Format bytes in human-readable form (B, KB, MB, GB, TB)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exponent = (bytes_f64.ln() / 1024_f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);

    let value = bytes_f64 / 1024_f64.powi(exponent as i32);

    if exponent == 0 {
        format!("{} {}", bytes, UNITS[exponent])
    } else {
        format!("{:.2} {}", value, UNITS[exponent])
    }
}
