//! AWS Signature Version 2 signer for S3 requests
//!
//! ```text
//! StringToSign = HTTP-Verb + "\n" +
//!                Content-MD5 + "\n" +
//!                Content-Type + "\n" +
//!                Date + "\n" +
//!                CanonicalizedAmzHeaders +
//!                CanonicalizedResource
//!
//! Signature = Base64(HMAC-SHA1(SecretKey, StringToSign))
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fmt;

use crate::s3::types::{Method, RequestHeaders};

type HmacSha1 = Hmac<Sha1>;

/// Default S3 endpoint host
pub const DEFAULT_HOST: &str = "s3.amazonaws.com";

/// AWS Signature Version 2 signer
#[derive(Clone)]
pub struct S3SignerV2 {
    access_key: String,
    secret_key: String,
    /// Base storage host, lowercase. Requests to any other host are treated
    /// as virtual-hosted bucket requests.
    host: String,
}

impl fmt::Debug for S3SignerV2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3SignerV2")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

impl S3SignerV2 {
    pub fn new(access_key: String, secret_key: String, host: impl Into<String>) -> Self {
        Self {
            access_key,
            secret_key,
            host: host.into().to_ascii_lowercase(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn set_host(&mut self, host: &str) {
        self.host = host.to_ascii_lowercase();
    }

    /// Build the string to sign for a request
    ///
    /// Every header line ends with `\n`; the resource line does not.
    pub fn string_to_sign(
        &self,
        method: Method,
        url: &str,
        headers: &RequestHeaders,
        date: &str,
    ) -> String {
        let mut out = String::with_capacity(128);
        out.push_str(method.as_str());
        out.push('\n');
        out.push_str(headers.content_md5().unwrap_or(""));
        out.push('\n');
        out.push_str(headers.content_type().unwrap_or(""));
        out.push('\n');
        out.push_str(date);
        out.push('\n');

        // RequestHeaders keeps these lowercase and sorted
        for (key, value) in headers.amz_headers() {
            out.push_str(key);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }

        out.push_str(&self.canonical_resource(url));
        out
    }

    /// Resource part of the string to sign
    ///
    /// For `https://{bucket}.{host}/{key}` this is `/{bucket}/{key}`. Requests
    /// addressed to the base host itself use the URL path unchanged. The path
    /// is taken verbatim from `url`, dot segments included, so it matches the
    /// request line that is sent.
    fn canonical_resource(&self, url: &str) -> String {
        let (authority, path) = split_url(url);

        if authority == self.host {
            return path.to_string();
        }

        let suffix = format!(".{}", self.host);
        let bucket = authority.strip_suffix(&suffix).unwrap_or(&authority);

        let mut resource = String::with_capacity(bucket.len() + path.len() + 2);
        resource.push('/');
        resource.push_str(bucket);
        resource.push('/');
        if path != "/" {
            resource.push_str(path.strip_prefix('/').unwrap_or(path));
        }
        resource
    }

    /// Base64 of HMAC-SHA1 over the string to sign, keyed by the secret key
    pub fn sign(&self, string_to_sign: &str) -> String {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Assemble the header set to transmit
    ///
    /// `date` must be the same value that goes on the wire, since it is part
    /// of the signature.
    pub fn signed_headers(
        &self,
        method: Method,
        url: &str,
        headers: &RequestHeaders,
        date: &str,
    ) -> Vec<(String, String)> {
        let string_to_sign = self.string_to_sign(method, url, headers, date);
        tracing::trace!(string_to_sign = ?string_to_sign, "Built SigV2 string to sign");
        let signature = self.sign(&string_to_sign);

        let mut out = Vec::with_capacity(4 + headers.amz_headers().count());
        if let Some(content_type) = headers.content_type() {
            out.push(("Content-Type".to_string(), content_type.to_string()));
        }
        if let Some(content_md5) = headers.content_md5() {
            out.push(("Content-MD5".to_string(), content_md5.to_string()));
        }
        out.push(("Date".to_string(), date.to_string()));
        for (key, value) in headers.amz_headers() {
            out.push((key.to_string(), value.to_string()));
        }
        out.push((
            "Authorization".to_string(),
            format!("AWS {}:{}", self.access_key, signature),
        ));
        out
    }
}

/// Lowercase authority and raw path of an absolute URL
///
/// Query and fragment are dropped; an empty path is `/`.
fn split_url(url: &str) -> (String, &str) {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let (authority, path) = match rest.find(|c: char| matches!(c, '/' | '?' | '#')) {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    let path = match path.find(|c: char| matches!(c, '?' | '#')) {
        Some(i) => &path[..i],
        None => path,
    };
    let path = if path.is_empty() { "/" } else { path };
    (authority.to_ascii_lowercase(), path)
}
