//! S3 request types, option structures and the request outcome model

use bytes::Bytes;
use hyper::StatusCode;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::s3::client::S3Error;

/// HTTP verbs the client is allowed to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Head,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Head => "HEAD",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = S3Error;

    /// Parse a verb token. Anything outside GET/PUT/HEAD/DELETE is rejected
    /// before a request can be built from it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "PUT" => Ok(Method::Put),
            "HEAD" => Ok(Method::Head),
            "DELETE" => Ok(Method::Delete),
            other => Err(S3Error::InvalidOperation(other.to_string())),
        }
    }
}

impl From<Method> for hyper::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => hyper::Method::GET,
            Method::Put => hyper::Method::PUT,
            Method::Head => hyper::Method::HEAD,
            Method::Delete => hyper::Method::DELETE,
        }
    }
}

/// Canned access control list sent as `x-amz-acl`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Acl {
    #[default]
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
}

impl Acl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
            Acl::PublicReadWrite => "public-read-write",
            Acl::AuthenticatedRead => "authenticated-read",
        }
    }
}

impl FromStr for Acl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Acl::Private),
            "public-read" => Ok(Acl::PublicRead),
            "public-read-write" => Ok(Acl::PublicReadWrite),
            "authenticated-read" => Ok(Acl::AuthenticatedRead),
            other => Err(format!("unknown ACL: {}", other)),
        }
    }
}

/// Storage class sent as `x-amz-storage-class`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageClass {
    #[default]
    Standard,
    ReducedRedundancy,
}

impl StorageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::ReducedRedundancy => "REDUCED_REDUNDANCY",
        }
    }
}

impl FromStr for StorageClass {
    type Err = String;

    /// Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "STANDARD" => Ok(StorageClass::Standard),
            "REDUCED_REDUNDANCY" | "RRS" => Ok(StorageClass::ReducedRedundancy),
            _ => Err(format!("unknown storage class: {}", s)),
        }
    }
}

/// Options for storing an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Explicit content type. When `None` the payload is sniffed, falling
    /// back to `application/octet-stream`.
    pub content_type: Option<String>,
    /// Canned ACL (default: private)
    pub acl: Acl,
    /// Storage class (default: STANDARD)
    pub storage_class: StorageClass,
    /// Request AES256 server-side encryption (default: true)
    pub encrypt: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            content_type: None,
            acl: Acl::Private,
            storage_class: StorageClass::Standard,
            encrypt: true,
        }
    }
}

impl StoreOptions {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = acl;
        self
    }

    pub fn with_storage_class(mut self, storage_class: StorageClass) -> Self {
        self.storage_class = storage_class;
        self
    }

    pub fn with_encryption(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }
}

/// Options for creating a bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketOptions {
    /// Canned ACL (default: private)
    pub acl: Acl,
    /// Location constraint. `None` creates the bucket in the default region
    /// with an empty request body.
    pub region: Option<String>,
}

impl BucketOptions {
    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = acl;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Headers that take part in signing, built fresh for every operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    content_md5: Option<String>,
    content_type: Option<String>,
    /// `x-amz-*` headers keyed by lowercase name, so iteration order is the
    /// canonical order.
    amz: BTreeMap<String, String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers for a PUT of object data
    pub fn for_store(options: &StoreOptions, content_type: String, content_md5: String) -> Self {
        let mut headers = Self::new()
            .with_content_type(content_type)
            .with_content_md5(content_md5)
            .with_amz("x-amz-storage-class", options.storage_class.as_str())
            .with_amz("x-amz-acl", options.acl.as_str());
        if options.encrypt {
            headers = headers.with_amz("x-amz-server-side-encryption", "AES256");
        }
        headers
    }

    pub fn with_content_md5(mut self, value: impl Into<String>) -> Self {
        self.content_md5 = Some(value.into());
        self
    }

    pub fn with_content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    /// Add a service header. The key is stored lowercase.
    pub fn with_amz(mut self, key: &str, value: impl Into<String>) -> Self {
        self.amz.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    pub fn content_md5(&self) -> Option<&str> {
        self.content_md5.as_deref().filter(|v| !v.is_empty())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref().filter(|v| !v.is_empty())
    }

    /// Service headers in ascending key order
    pub fn amz_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.amz.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Classified result of one executed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 200, or 204 on DELETE. Holds the response body for GET, empty otherwise.
    Success(Bytes),
    /// The service answered with any other status. Details are in the
    /// client's last error.
    Status(StatusCode),
    /// No status was received. Details are in the client's last error.
    Transport,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Status code of a failed request, if the service produced one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Outcome::Status(status) => Some(*status),
            _ => None,
        }
    }

    pub fn into_body(self) -> Option<Bytes> {
        match self {
            Outcome::Success(body) => Some(body),
            _ => None,
        }
    }
}
