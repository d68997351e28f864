mod common;

use bytes::Bytes;
use common::FakeS3;
use hyper::StatusCode;
use s3mini::s3::{Acl, BucketOptions, Outcome, StorageClass, StoreOptions};
use s3mini::S3Error;
use std::io::Write;

/// Full bucket and object lifecycle against the fake endpoint
#[tokio::test]
async fn test_bucket_and_object_lifecycle() {
    let mut client = common::client(FakeS3::new());

    assert!(!client.bucket_exists("photos").await);
    assert!(client.create_bucket("photos", &BucketOptions::default()).await);
    assert!(client.bucket_exists("photos").await);

    assert!(
        client
            .put_object("photos", "k.txt", "hello", &StoreOptions::default())
            .await
    );
    assert!(client.object_exists("photos", "k.txt").await);
    assert_eq!(
        client.get_object("photos", "k.txt").await,
        Some(Bytes::from_static(b"hello"))
    );

    assert!(client.delete_object("photos", "k.txt").await);
    assert!(!client.object_exists("photos", "k.txt").await);
    assert_eq!(client.get_object("photos", "k.txt").await, None);

    assert!(client.delete_bucket("photos").await.is_success());
    assert!(!client.bucket_exists("photos").await);
    assert!(!client.transport().has_bucket("photos"));
}

/// Upload options end up on the stored object
#[tokio::test]
async fn test_store_options_are_sent() {
    let mut client = common::client(FakeS3::new());
    assert!(client.create_bucket("b", &BucketOptions::default()).await);

    let options = StoreOptions::default()
        .with_content_type("application/json")
        .with_acl(Acl::PublicRead)
        .with_storage_class(StorageClass::ReducedRedundancy)
        .with_encryption(false);
    assert!(client.put_object("b", "data.json", "{}", &options).await);

    let stored = client.transport().object("b", "data.json").unwrap();
    assert_eq!(stored.headers["content-type"], "application/json");
    assert_eq!(stored.headers["x-amz-acl"], "public-read");
    assert_eq!(stored.headers["x-amz-storage-class"], "REDUCED_REDUNDANCY");
    assert!(!stored.headers.contains_key("x-amz-server-side-encryption"));
}

/// A file upload is streamed with its digest and a sniffed type
#[tokio::test]
async fn test_put_file() {
    let mut client = common::client(FakeS3::new());
    assert!(client.create_bucket("b", &BucketOptions::default()).await);

    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(b"line one\nline two\n").unwrap();
    tmp.flush().unwrap();

    let stored = client
        .put_file("b", "notes/readme", tmp.path(), &StoreOptions::default())
        .await
        .unwrap();
    assert!(stored);

    let object = client.transport().object("b", "notes/readme").unwrap();
    assert_eq!(object.data, Bytes::from_static(b"line one\nline two\n"));
    assert_eq!(object.headers["content-type"], "text/plain");
    assert_eq!(object.headers["x-amz-server-side-encryption"], "AES256");
    assert_eq!(
        client.get_object("b", "notes/readme").await.as_deref(),
        Some(&b"line one\nline two\n"[..])
    );
}

/// A missing local file is an error and nothing is sent
#[tokio::test]
async fn test_put_missing_file() {
    let mut client = common::client(FakeS3::new());
    let dir = tempfile::tempdir().unwrap();

    let err = client
        .put_file("b", "k", dir.path().join("absent"), &StoreOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, S3Error::LocalInput { .. }));
    assert!(err.to_string().contains("absent"));
    assert_eq!(client.transport().request_count(), 0);
}

/// Deleting a bucket that still holds objects is refused with 409
#[tokio::test]
async fn test_delete_non_empty_bucket() {
    let mut client = common::client(FakeS3::new());
    assert!(client.create_bucket("full", &BucketOptions::default()).await);
    assert!(
        client
            .put_object("full", "a", "x", &StoreOptions::default())
            .await
    );

    let outcome = client.delete_bucket("full").await;
    assert_eq!(outcome, Outcome::Status(StatusCode::CONFLICT));
    match client.last_error() {
        Some(S3Error::Service { status, code, .. }) => {
            assert_eq!(*status, StatusCode::CONFLICT);
            assert_eq!(code.as_deref(), Some("BucketNotEmpty"));
        }
        other => panic!("unexpected last error: {other:?}"),
    }
    assert!(client.bucket_exists("full").await);

    assert!(client.delete_object("full", "a").await);
    assert!(client.delete_bucket("full").await.is_success());
}

/// Deleting a key that was never stored still succeeds
#[tokio::test]
async fn test_delete_missing_object() {
    let mut client = common::client(FakeS3::new());
    assert!(client.create_bucket("b", &BucketOptions::default()).await);
    assert!(client.delete_object("b", "never-written").await);
    assert!(client.last_error().is_none());
}

/// Creating a bucket twice fails the second time
#[tokio::test]
async fn test_create_existing_bucket() {
    let mut client = common::client(FakeS3::new());
    assert!(client.create_bucket("b", &BucketOptions::default()).await);
    assert!(!client.create_bucket("b", &BucketOptions::default()).await);
    assert_eq!(
        client.last_error().and_then(S3Error::status),
        Some(StatusCode::CONFLICT)
    );
}

/// A region sends a signed location constraint body
#[tokio::test]
async fn test_create_bucket_in_region() {
    let mut client = common::client(FakeS3::new());
    let options = BucketOptions::default()
        .with_acl(Acl::AuthenticatedRead)
        .with_region("eu-west-1");
    assert!(client.create_bucket("eu-bucket", &options).await);
    assert!(client.bucket_exists("eu-bucket").await);
}

/// Wrong credentials are rejected by the service
#[tokio::test]
async fn test_bad_secret_is_forbidden() {
    let mut client = common::client_with_bad_secret(FakeS3::new());
    assert!(!client.create_bucket("b", &BucketOptions::default()).await);

    match client.last_error() {
        Some(S3Error::Service {
            status, message, ..
        }) => {
            assert_eq!(*status, StatusCode::FORBIDDEN);
            assert!(message.is_some());
        }
        other => panic!("unexpected last error: {other:?}"),
    }
    assert!(client
        .last_error()
        .unwrap()
        .to_string()
        .contains("SignatureDoesNotMatch"));
}

/// Keys with characters outside the unreserved set still verify
#[tokio::test]
async fn test_encoded_key() {
    let mut client = common::client(FakeS3::new());
    assert!(client.create_bucket("b", &BucketOptions::default()).await);
    assert!(
        client
            .put_object("b", "dir/a file+1.txt", "x", &StoreOptions::default())
            .await
    );
    assert!(client.object_exists("b", "dir/a file+1.txt").await);
    assert!(client
        .transport()
        .object("b", "dir/a%20file%2B1.txt")
        .is_some());
}

/// No status at all leaves a transport error behind
#[tokio::test]
async fn test_unreachable_endpoint() {
    let mut client = common::client(FakeS3::unreachable());

    assert!(!client.bucket_exists("b").await);
    assert!(matches!(
        client.last_error(),
        Some(S3Error::Transport { .. })
    ));
    assert_eq!(client.delete_bucket("b").await, Outcome::Transport);
    assert_eq!(client.get_object("b", "k").await, None);
}

/// Keys with `.` and `..` segments are stored and signed verbatim
#[tokio::test]
async fn test_dot_segment_keys() {
    let mut client = common::client(FakeS3::new());
    assert!(client.create_bucket("b", &BucketOptions::default()).await);

    for key in ["a/../k", "./x", "dir/./y/.."] {
        assert!(
            client
                .put_object("b", key, "dots", &StoreOptions::default())
                .await,
            "put {key}: {:?}",
            client.last_error()
        );
        assert_eq!(
            client.get_object("b", key).await,
            Some(Bytes::from_static(b"dots"))
        );
        assert!(client.transport().object("b", key).is_some());
        assert!(client.delete_object("b", key).await);
    }
    assert!(client.transport().object("b", "k").is_none());
}
