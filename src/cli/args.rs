/// Parse an S3 path into (bucket, key)
///
/// Accepts both `s3://bucket/key` and the mc-style `s3/bucket/key`.
pub fn parse_s3_path(path: &str) -> anyhow::Result<(String, Option<String>)> {
    let path = path.trim();

    let stripped = if let Some(p) = path.strip_prefix("s3://") {
        p
    } else if let Some(p) = path.strip_prefix("s3/") {
        p
    } else {
        anyhow::bail!("Invalid S3 path format. Expected: s3://bucket/key");
    };

    let (bucket, key) = match stripped.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (stripped, ""),
    };

    if bucket.is_empty() {
        anyhow::bail!("Bucket name cannot be empty");
    }

    let key = (!key.is_empty()).then(|| key.to_string());
    Ok((bucket.to_string(), key))
}

/// Parse an S3 path that must name an object
pub fn parse_object_path(path: &str) -> anyhow::Result<(String, String)> {
    match parse_s3_path(path)? {
        (bucket, Some(key)) => Ok((bucket, key)),
        (_, None) => anyhow::bail!("Object key is required: {}", path),
    }
}
