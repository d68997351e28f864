//! HTTP transport used by the S3 client
//!
//! The client talks to the network only through [`Transport`]. The default
//! [`HyperTransport`] is a pooled hyper client with:
//! - HTTP/1.1 only
//! - TCP_NODELAY and TCP keepalive
//! - native-tls (OpenSSL) for TLS
//! - A per-request timeout covering send and body collection
//!
//! Redirects are not followed and nothing is retried.

use bytes::{Bytes, BytesMut};
use futures::stream;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper::{Request, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::s3::client::S3Error;
use crate::s3::types::Method;

/// Read size for streamed file uploads
const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

type RequestBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// Request body handed to the transport
#[derive(Debug, Default)]
pub enum Payload {
    #[default]
    Empty,
    /// In-memory data
    Bytes(Bytes),
    /// File contents streamed from the current position. `length` is the
    /// exact number of bytes to send and is declared as Content-Length.
    File { file: File, length: u64 },
}

impl Payload {
    /// Byte length declared for the request
    pub fn len(&self) -> u64 {
        match self {
            Payload::Empty => 0,
            Payload::Bytes(data) => data.len() as u64,
            Payload::File { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fully signed request ready to send
#[derive(Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Payload,
}

/// Transfer metadata kept for error reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub method: Method,
    /// URL the request was sent to
    pub url: String,
    pub elapsed: Duration,
    /// `x-amz-request-id` response header
    pub request_id: Option<String>,
    /// `x-amz-id-2` response header
    pub host_id: Option<String>,
}

impl Diagnostics {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            elapsed: Duration::ZERO,
            request_id: None,
            host_id: None,
        }
    }
}

/// Response with its body fully collected
#[derive(Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Bytes,
    pub diagnostics: Diagnostics,
}

/// A request that never produced a status code
#[derive(Debug)]
pub struct TransportFailure {
    pub message: String,
    pub diagnostics: Diagnostics,
}

/// Sends signed requests and collects responses
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportFailure>> + Send;
}

/// Settings for [`HyperTransport`]
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// Limit for a whole request including body collection
    pub request_timeout: Duration,
    /// Accept invalid certificates and host names
    pub insecure_tls: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            insecure_tls: false,
        }
    }
}

/// Pooled hyper client
///
/// Clone is cheap - the underlying HTTP client uses Arc internally.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient<HttpsConnector<HttpConnector>, RequestBody>,
    request_timeout: Duration,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, S3Error> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(config.connect_timeout));
        http.set_keepalive(Some(Duration::from_secs(90)));

        let tls = if config.insecure_tls {
            tracing::warn!("INSECURE TLS MODE ENABLED: Certificate verification is disabled!");
            TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?
        } else {
            TlsConnector::new()?
        };

        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .set_host(true)
            .build(https);

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
        })
    }

    async fn send_inner(
        &self,
        request: TransportRequest,
        diagnostics: &mut Diagnostics,
    ) -> Result<(StatusCode, Bytes), String> {
        let declared_length = request.body.len();
        let mut builder = Request::builder()
            .method(hyper::Method::from(request.method))
            .uri(&request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if request.method == Method::Put {
            builder = builder.header(hyper::header::CONTENT_LENGTH, declared_length);
        }

        let http_request = builder
            .body(into_body(request.body))
            .map_err(|e| format!("Request build error: {}", e))?;

        let response = self
            .client
            .request(http_request)
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        diagnostics.request_id = header_string(response.headers(), "x-amz-request-id");
        diagnostics.host_id = header_string(response.headers(), "x-amz-id-2");

        let body = response
            .collect()
            .await
            .map_err(|e| format!("Body error: {}", e))?
            .to_bytes();

        Ok((status, body))
    }
}

impl Transport for HyperTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
        let mut diagnostics = Diagnostics::new(request.method, request.url.clone());
        let started = Instant::now();

        let result =
            tokio::time::timeout(self.request_timeout, self.send_inner(request, &mut diagnostics))
                .await;
        diagnostics.elapsed = started.elapsed();

        match result {
            Ok(Ok((status, body))) => Ok(TransportResponse {
                status,
                body,
                diagnostics,
            }),
            Ok(Err(message)) => Err(TransportFailure {
                message,
                diagnostics,
            }),
            Err(_) => Err(TransportFailure {
                message: format!("Request timed out after {:?}", self.request_timeout),
                diagnostics,
            }),
        }
    }
}

fn header_string(headers: &hyper::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn into_body(payload: Payload) -> RequestBody {
    match payload {
        Payload::Empty => Empty::<Bytes>::new()
            .map_err(|never| match never {})
            .boxed_unsync(),
        Payload::Bytes(data) => Full::new(data)
            .map_err(|never| match never {})
            .boxed_unsync(),
        Payload::File { file, length } => file_body(file, length),
    }
}

/// Stream at most `length` bytes of `file` as body frames
fn file_body(file: File, length: u64) -> RequestBody {
    let frames = stream::try_unfold(file.take(length), |mut reader| async move {
        let mut buf = BytesMut::with_capacity(UPLOAD_CHUNK_SIZE);
        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            Ok::<_, std::io::Error>(None)
        } else {
            Ok(Some((Frame::data(buf.freeze()), reader)))
        }
    });
    StreamBody::new(frames).boxed_unsync()
}
