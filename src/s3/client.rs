//! S3 client implementation with core operations
//!
//! Every operation builds its signed headers from scratch, sends a single
//! request and classifies the status:
//! - 200, or 204 for DELETE, is success
//! - any other status is recorded in the last error and reported as failure
//! - a request that never gets a status is a transport failure
//!
//! Nothing is retried. Operations take `&mut self`, so one client runs one
//! request at a time; use a client per concurrent caller.

use bytes::Bytes;
use hyper::StatusCode;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::Profile;
use crate::s3::content::{self, LocalFile};
use crate::s3::signer::{S3SignerV2, DEFAULT_HOST};
use crate::s3::transport::{
    Diagnostics, HyperTransport, Payload, Transport, TransportConfig, TransportRequest,
};
use crate::s3::types::{BucketOptions, Method, Outcome, RequestHeaders, StoreOptions};

/// Hex lookup table for URI encoding
static HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Namespace of the CreateBucketConfiguration document
const S3_XML_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

const XML_CONTENT_TYPE: &str = "application/xml";

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3Error {
    /// A local file given for upload is missing or unreadable
    #[error("Cannot access file: {}", .path.display())]
    LocalInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A verb other than GET/PUT/HEAD/DELETE was requested
    #[error("Invalid S3 action: {0}")]
    InvalidOperation(String),

    /// The request never produced a status code
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        diagnostics: Diagnostics,
    },

    /// The service answered with a non-success status
    #[error("S3 error: {status}{}", service_detail(.code.as_deref(), .message.as_deref()))]
    Service {
        status: StatusCode,
        /// `<Code>` from the error document, when there is one
        code: Option<String>,
        /// `<Message>` from the error document, when there is one
        message: Option<String>,
        /// Raw response body
        body: Bytes,
        diagnostics: Diagnostics,
    },

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),
}

impl S3Error {
    /// Status code of a service error
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            S3Error::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transfer metadata of a transport or service error
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            S3Error::Transport { diagnostics, .. } | S3Error::Service { diagnostics, .. } => {
                Some(diagnostics)
            }
            _ => None,
        }
    }
}

fn service_detail(code: Option<&str>, message: Option<&str>) -> String {
    match (code, message) {
        (Some(code), Some(message)) => format!(" - {}: {}", code, message),
        (Some(code), None) => format!(" - {}", code),
        (None, Some(message)) => format!(" - {}", message),
        (None, None) => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, S3Error>;

/// Minimal S3 client
pub struct S3Client<T = HyperTransport> {
    transport: T,
    /// Credentials and base host
    signer: S3SignerV2,
    use_ssl: bool,
    /// Failure detail of the most recent request
    last_error: Option<S3Error>,
}

impl<T> std::fmt::Debug for S3Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("signer", &self.signer)
            .field("use_ssl", &self.use_ssl)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl S3Client<HyperTransport> {
    /// Create a client for the default S3 endpoint over HTTPS
    pub fn new(access_key: String, secret_key: String) -> Result<Self> {
        let transport = HyperTransport::new(&TransportConfig::default())?;
        Ok(Self::with_transport(access_key, secret_key, transport))
    }

    /// Create a client from a configuration profile
    pub fn from_profile(profile: &Profile) -> Result<Self> {
        let transport = HyperTransport::new(&TransportConfig {
            request_timeout: Duration::from_secs(profile.request_timeout),
            insecure_tls: profile.insecure_tls,
            ..TransportConfig::default()
        })?;

        let mut client = Self::with_transport(
            profile.access_key.clone(),
            profile.secret_key.clone(),
            transport,
        )
        .with_ssl(profile.use_ssl);
        client.set_host(&profile.host);
        Ok(client)
    }
}

impl<T: Transport> S3Client<T> {
    /// Create a client that sends requests through `transport`
    pub fn with_transport(access_key: String, secret_key: String, transport: T) -> Self {
        Self {
            transport,
            signer: S3SignerV2::new(access_key, secret_key, DEFAULT_HOST),
            use_ssl: true,
            last_error: None,
        }
    }

    /// Use `https` (default) or plain `http`
    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Point the client at another S3-compatible host, optionally with a port
    pub fn set_host(&mut self, host: &str) {
        self.signer.set_host(host);
    }

    pub fn host(&self) -> &str {
        self.signer.host()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Failure detail of the most recent request
    ///
    /// Cleared when a request starts, so it is `None` after a success.
    pub fn last_error(&self) -> Option<&S3Error> {
        self.last_error.as_ref()
    }

    /// Virtual-hosted URL for a bucket or an object in it
    ///
    /// `build_url("b", None)` is `https://b.{host}/`.
    pub fn build_url(&self, bucket: &str, key: Option<&str>) -> String {
        let scheme = if self.use_ssl { "https://" } else { "http://" };
        let host = self.signer.host();
        let encoded_key = Self::encode_s3_key(key.unwrap_or(""));

        let mut url =
            String::with_capacity(scheme.len() + bucket.len() + host.len() + encoded_key.len() + 2);
        url.push_str(scheme);
        url.push_str(bucket);
        url.push('.');
        url.push_str(host);
        url.push('/');
        url.push_str(&encoded_key);
        url
    }

    /// Encode an S3 key, preserving forward slashes
    /// Returns Cow::Borrowed when no encoding is needed
    fn encode_s3_key(key: &str) -> Cow<'_, str> {
        let is_plain = |b: u8| {
            matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/')
        };

        if key.bytes().all(is_plain) {
            return Cow::Borrowed(key);
        }

        let mut result = String::with_capacity(key.len() + 32);
        for byte in key.bytes() {
            if is_plain(byte) {
                result.push(byte as char);
            } else {
                result.push('%');
                result.push(HEX_UPPER[(byte >> 4) as usize] as char);
                result.push(HEX_UPPER[(byte & 0xf) as usize] as char);
            }
        }
        Cow::Owned(result)
    }

    /// Create a bucket
    ///
    /// With a region, the location constraint document is sent as the body.
    /// The XML content type is declared either way.
    pub async fn create_bucket(&mut self, bucket: &str, options: &BucketOptions) -> bool {
        let headers = RequestHeaders::new()
            .with_content_type(XML_CONTENT_TYPE)
            .with_amz("x-amz-acl", options.acl.as_str());
        let payload = match options.region.as_deref() {
            Some(region) => Payload::Bytes(Bytes::from(location_constraint(region))),
            None => Payload::Empty,
        };

        let url = self.build_url(bucket, None);
        self.execute(Method::Put, &url, &headers, payload)
            .await
            .is_success()
    }

    /// Delete a bucket
    ///
    /// Returns the raw outcome so callers can see why a delete was refused,
    /// e.g. 409 Conflict for a bucket that still holds objects.
    pub async fn delete_bucket(&mut self, bucket: &str) -> Outcome {
        let url = self.build_url(bucket, None);
        self.execute(Method::Delete, &url, &RequestHeaders::new(), Payload::Empty)
            .await
    }

    /// Whether a bucket exists and is accessible. Any non-200 answer is `false`.
    pub async fn bucket_exists(&mut self, bucket: &str) -> bool {
        let url = self.build_url(bucket, None);
        self.execute(Method::Head, &url, &RequestHeaders::new(), Payload::Empty)
            .await
            .is_success()
    }

    /// Store an in-memory payload
    pub async fn put_object(
        &mut self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        options: &StoreOptions,
    ) -> bool {
        let data = data.into();
        let content_type = options
            .content_type
            .clone()
            .or_else(|| content::sniff_mime(&data).map(|m| m.essence_str().to_string()))
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.essence_str().to_string());

        let headers =
            RequestHeaders::for_store(options, content_type, content::content_md5(&data));
        let url = self.build_url(bucket, Some(key));
        self.execute(Method::Put, &url, &headers, Payload::Bytes(data))
            .await
            .is_success()
    }

    /// Store the contents of a local file, streamed from disk
    ///
    /// The file is checked, measured and digested before anything is sent; a
    /// missing or unreadable file is an error rather than a failed upload.
    pub async fn put_file(
        &mut self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
        options: &StoreOptions,
    ) -> Result<bool> {
        let local = LocalFile::open(path).await?;

        let content_type = match options.content_type.clone() {
            Some(content_type) => content_type,
            None => local
                .sniff_mime()
                .await?
                .map(|m| m.essence_str().to_string())
                .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.essence_str().to_string()),
        };

        let headers = RequestHeaders::for_store(options, content_type, local.content_md5());
        let payload = Payload::File {
            file: local.reader().await?,
            length: local.len(),
        };

        let url = self.build_url(bucket, Some(key));
        Ok(self
            .execute(Method::Put, &url, &headers, payload)
            .await
            .is_success())
    }

    /// Retrieve an object's contents
    pub async fn get_object(&mut self, bucket: &str, key: &str) -> Option<Bytes> {
        let url = self.build_url(bucket, Some(key));
        self.execute(Method::Get, &url, &RequestHeaders::new(), Payload::Empty)
            .await
            .into_body()
    }

    /// Whether an object exists. Any non-200 answer is `false`.
    pub async fn object_exists(&mut self, bucket: &str, key: &str) -> bool {
        let url = self.build_url(bucket, Some(key));
        self.execute(Method::Head, &url, &RequestHeaders::new(), Payload::Empty)
            .await
            .is_success()
    }

    /// Delete an object. Deleting a missing key is reported as success by S3.
    pub async fn delete_object(&mut self, bucket: &str, key: &str) -> bool {
        let url = self.build_url(bucket, Some(key));
        self.execute(Method::Delete, &url, &RequestHeaders::new(), Payload::Empty)
            .await
            .is_success()
    }

    /// Sign, send and classify a single request
    pub async fn execute(
        &mut self,
        method: Method,
        url: &str,
        headers: &RequestHeaders,
        payload: Payload,
    ) -> Outcome {
        self.last_error = None;

        // Validate only; signing works on the URL exactly as it is sent
        if let Err(e) = Url::parse(url) {
            self.last_error = Some(S3Error::Transport {
                message: format!("Invalid URL {}: {}", url, e),
                diagnostics: Diagnostics::new(method, url),
            });
            return Outcome::Transport;
        }

        // One timestamp for both the signature and the Date header
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let signed = self.signer.signed_headers(method, url, headers, &date);

        debug!(method = %method, url = %url, length = payload.len(), "Sending S3 request");

        let request = TransportRequest {
            method,
            url: url.to_string(),
            headers: signed,
            body: payload,
        };

        match self.transport.send(request).await {
            Ok(response) => {
                let status = response.status;
                let success = status == StatusCode::OK
                    || (status == StatusCode::NO_CONTENT && method == Method::Delete);

                debug!(
                    method = %method,
                    url = %url,
                    status = status.as_u16(),
                    elapsed_ms = response.diagnostics.elapsed.as_millis() as u64,
                    "S3 request completed"
                );

                if success {
                    if method == Method::Get {
                        Outcome::Success(response.body)
                    } else {
                        Outcome::Success(Bytes::new())
                    }
                } else {
                    let (code, message) = parse_error_document(&response.body);
                    self.last_error = Some(S3Error::Service {
                        status,
                        code,
                        message,
                        body: response.body,
                        diagnostics: response.diagnostics,
                    });
                    Outcome::Status(status)
                }
            }
            Err(failure) => {
                debug!(method = %method, url = %url, error = %failure.message, "S3 request failed");
                self.last_error = Some(S3Error::Transport {
                    message: failure.message,
                    diagnostics: failure.diagnostics,
                });
                Outcome::Transport
            }
        }
    }
}

/// Body for a bucket created outside the default region
fn location_constraint(region: &str) -> String {
    let mut xml = String::with_capacity(160 + region.len());
    xml.push_str("<CreateBucketConfiguration xmlns=\"");
    xml.push_str(S3_XML_NAMESPACE);
    xml.push_str("\"><LocationConstraint>");
    xml_escape_into(&mut xml, region);
    xml.push_str("</LocationConstraint></CreateBucketConfiguration>");
    xml
}

/// Escape a string for XML text content, writing directly into `buf`
fn xml_escape_into(buf: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            '\'' => buf.push_str("&apos;"),
            _ => buf.push(c),
        }
    }
}

/// Pull `<Code>` and `<Message>` out of an S3 error document
///
/// Anything that is not well-formed XML yields `(None, None)`; the raw body
/// is kept separately.
fn parse_error_document(body: &[u8]) -> (Option<String>, Option<String>) {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut code = None;
    let mut message = None;
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                current_text.clear();
                match e.unescape() {
                    Ok(text) => current_text.push_str(&text),
                    Err(_) => return (None, None),
                }
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"Code" => code = Some(std::mem::take(&mut current_text)),
                    b"Message" => message = Some(std::mem::take(&mut current_text)),
                    _ => {}
                }
                current_text.clear();
            }
            Ok(Event::Eof) => break,
            Err(_) => return (None, None),
            _ => {}
        }
    }

    (code, message)
}
