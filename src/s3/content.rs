//! Local file access and content-type detection for uploads

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mime::Mime;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::s3::client::S3Error;

/// Bytes inspected when sniffing a file's type
const SNIFF_LEN: usize = 512;

const DIGEST_CHUNK_SIZE: usize = 64 * 1024;

/// A local file validated and digested ahead of an upload
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    len: u64,
    md5: [u8; 16],
}

impl LocalFile {
    /// Check that `path` is a readable regular file, record its size and
    /// compute its MD5 digest
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, S3Error> {
        let path = path.as_ref().to_path_buf();
        let local_err = |source: io::Error| S3Error::LocalInput {
            path: path.clone(),
            source,
        };

        let metadata = tokio::fs::metadata(&path).await.map_err(local_err)?;
        if !metadata.is_file() {
            return Err(local_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        let mut file = File::open(&path).await.map_err(local_err)?;
        let mut context = md5::Context::new();
        let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];
        let mut len = 0u64;
        loop {
            let n = file.read(&mut buf).await.map_err(local_err)?;
            if n == 0 {
                break;
            }
            context.consume(&buf[..n]);
            len += n as u64;
        }

        Ok(Self {
            path,
            len,
            md5: context.compute().0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes as read while digesting
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base64 of the raw MD5 digest, as sent in `Content-MD5`
    pub fn content_md5(&self) -> String {
        BASE64.encode(self.md5)
    }

    /// Reopen the file for streaming
    pub async fn reader(&self) -> Result<File, S3Error> {
        File::open(&self.path)
            .await
            .map_err(|source| S3Error::LocalInput {
                path: self.path.clone(),
                source,
            })
    }

    /// Best guess at the file's content type
    ///
    /// Magic numbers win, then the file extension, then a plain-text check
    /// on the leading bytes.
    pub async fn sniff_mime(&self) -> Result<Option<Mime>, S3Error> {
        let mut head = Vec::with_capacity(SNIFF_LEN);
        self.reader()
            .await?
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .await
            .map_err(|source| S3Error::LocalInput {
                path: self.path.clone(),
                source,
            })?;

        if let Some(found) = sniff_magic(&head) {
            return Ok(Some(found));
        }
        if let Some(guessed) = mime_guess::from_path(&self.path).first() {
            return Ok(Some(guessed));
        }
        Ok(looks_like_text(&head).then_some(mime::TEXT_PLAIN))
    }
}

/// Base64 of the raw MD5 digest of `data`
pub fn content_md5(data: &[u8]) -> String {
    BASE64.encode(md5::compute(data).0)
}

/// Best guess at the content type of an in-memory buffer
pub fn sniff_mime(data: &[u8]) -> Option<Mime> {
    sniff_magic(data).or_else(|| looks_like_text(data).then_some(mime::TEXT_PLAIN))
}

fn sniff_magic(data: &[u8]) -> Option<Mime> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b", "application/gzip"),
        (b"<?xml", "text/xml"),
    ];

    for (magic, essence) in SIGNATURES {
        if data.starts_with(magic) {
            return essence.parse().ok();
        }
    }

    let leading = trim_ascii_start(data);
    let prefix = &leading[..leading.len().min(14)];
    if prefix.eq_ignore_ascii_case(b"<!doctype html") || starts_with_ignore_case(leading, b"<html") {
        return Some(mime::TEXT_HTML);
    }
    None
}

/// UTF-8 without control characters other than common whitespace
fn looks_like_text(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    // A multi-byte sequence may be cut at the sniff boundary
    let text = match std::str::from_utf8(data) {
        Ok(text) => text,
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&data[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return false,
    };
    !text.is_empty()
        && text
            .chars()
            .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t' | '\x0c'))
}

fn trim_ascii_start(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

fn starts_with_ignore_case(data: &[u8], prefix: &[u8]) -> bool {
    data.len() >= prefix.len() && data[..prefix.len()].eq_ignore_ascii_case(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_content_md5() {
        assert_eq!(content_md5(b"hello"), "XUFAKrxLKna5cZ2REBfFkg==");
        assert_eq!(content_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
    }

    #[test]
    fn test_sniff_magic_numbers() {
        assert_eq!(sniff_mime(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), Some(mime::IMAGE_PNG));
        assert_eq!(sniff_mime(b"%PDF-1.7\n"), Some(mime::APPLICATION_PDF));
        assert_eq!(
            sniff_mime(b"PK\x03\x04\x14\0").map(|m| m.essence_str().to_string()),
            Some("application/zip".to_string())
        );
        assert_eq!(sniff_mime(b"  <!DOCTYPE HTML><html>"), Some(mime::TEXT_HTML));
    }

    #[test]
    fn test_sniff_text_and_binary() {
        assert_eq!(sniff_mime(b"test 123"), Some(mime::TEXT_PLAIN));
        assert_eq!(sniff_mime("h\u{e9}llo\n".as_bytes()), Some(mime::TEXT_PLAIN));
        assert_eq!(sniff_mime(b"\x00\x01\x02\x03"), None);
        assert_eq!(sniff_mime(b""), None);
    }

    #[test]
    fn test_text_cut_mid_character() {
        // "é" is two bytes; drop the last one
        let data = "abc\u{e9}".as_bytes();
        assert!(looks_like_text(&data[..data.len() - 1]));
    }

    #[tokio::test]
    async fn test_local_file_open() {
        let mut tmp = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        tmp.write_all(b"{\"a\":1}").unwrap();
        tmp.flush().unwrap();

        let file = LocalFile::open(tmp.path()).await.unwrap();
        assert_eq!(file.len(), 7);
        assert_eq!(file.content_md5(), content_md5(b"{\"a\":1}"));
        assert_eq!(file.sniff_mime().await.unwrap(), Some(mime::APPLICATION_JSON));
    }

    #[tokio::test]
    async fn test_local_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt");
        let err = LocalFile::open(&missing).await.unwrap_err();
        assert!(matches!(err, S3Error::LocalInput { ref path, .. } if path == &missing));
    }

    #[tokio::test]
    async fn test_local_file_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFile::open(dir.path()).await.unwrap_err();
        match err {
            S3Error::LocalInput { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
