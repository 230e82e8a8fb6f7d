//! Upload and download tests against the filesystem backend.

use bytes::Bytes;
use futures::TryStreamExt;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

use bucket_ops_core::storage::StoreBackend;
use bucket_ops_core::{ByteRange, Downloader, ObjectBackend, RetryPolicy, TransferOptions, Uploader};

fn filesystem_backend(dir: &TempDir) -> Arc<dyn ObjectBackend> {
    Arc::new(StoreBackend::filesystem(dir.path().join("bucket")).expect("backend"))
}

#[tokio::test]
async fn upload_then_download_file() {
    let dir = TempDir::new().expect("temp dir");
    let backend = filesystem_backend(&dir);

    let source = dir.path().join("source.bin");
    let content: Vec<u8> = (0..100_000u32).map(|i| (i % 97) as u8).collect();
    tokio::fs::write(&source, &content).await.expect("write source");

    let options = TransferOptions {
        multipart_threshold_bytes: 10_000,
        ..TransferOptions::default()
    };
    Uploader::new(backend.clone(), options)
        .upload_file(&source, "/nested/dir/source.bin")
        .await
        .expect("upload failed");

    let downloader = Downloader::new(backend, RetryPolicy::none());
    let target = dir.path().join("target.bin");
    let mut file = downloader
        .download_file("nested/dir/source.bin", &target)
        .await
        .expect("download failed");

    let mut downloaded = Vec::new();
    file.read_to_end(&mut downloaded).await.expect("read back");
    assert_eq!(downloaded, content);
}

#[tokio::test]
async fn interrupted_download_resumes_from_local_length() {
    let dir = TempDir::new().expect("temp dir");
    let backend = filesystem_backend(&dir);
    backend
        .put("obj", Bytes::from_static(b"hello, resumable world"))
        .await
        .expect("put");

    let target = dir.path().join("partial.bin");
    tokio::fs::write(&target, b"hello, ").await.expect("write partial");

    let downloader = Downloader::new(backend, RetryPolicy::default());
    let mut file = downloader.download_file("obj", &target).await.expect("download failed");

    let mut content = String::new();
    file.read_to_string(&mut content).await.expect("read back");
    assert_eq!(content, "hello, resumable world");
}

#[tokio::test]
async fn range_reads() {
    let dir = TempDir::new().expect("temp dir");
    let backend = filesystem_backend(&dir);
    backend
        .put("digits", Bytes::from_static(b"0123456789"))
        .await
        .expect("put");
    let downloader = Downloader::new(backend, RetryPolicy::none());

    let (len, data) = downloader
        .download_range_bytes("digits", ByteRange::from_offset(-1, 3).expect("range"))
        .await
        .expect("suffix read failed");
    assert_eq!((len, data.as_ref()), (3, &b"789"[..]));

    let (len, data) = downloader
        .download_range_bytes("digits", ByteRange::from_offset(0, 4).expect("range"))
        .await
        .expect("bounded read failed");
    assert_eq!((len, data.as_ref()), (4, &b"0123"[..]));

    assert_eq!(downloader.download_check("digits").await.expect("check failed"), 4);
}

#[tokio::test]
async fn download_of_missing_key_is_not_retried_forever() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = Downloader::new(filesystem_backend(&dir), RetryPolicy::default());

    let start = std::time::Instant::now();
    assert!(downloader.download_bytes("missing").await.is_err());
    // Not-found is final, so no backoff delay was taken
    assert!(start.elapsed() < std::time::Duration::from_millis(100));
}

#[tokio::test]
async fn raw_download_streams_whole_object() {
    let dir = TempDir::new().expect("temp dir");
    let backend = filesystem_backend(&dir);
    let content: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    backend
        .put("blob", Bytes::from(content.clone()))
        .await
        .expect("put");
    backend.put("empty", Bytes::new()).await.expect("put");
    let downloader = Downloader::new(backend, RetryPolicy::none());

    let (stat, body) = downloader.download_raw("blob").await.expect("raw download failed");
    assert_eq!(stat.size, content.len() as u64);
    let chunks: Vec<Bytes> = body.try_collect().await.expect("body failed");
    assert_eq!(chunks.concat(), content);

    let (stat, body) = downloader.download_raw("empty").await.expect("raw download failed");
    assert_eq!(stat.size, 0);
    let chunks: Vec<Bytes> = body.try_collect().await.expect("body failed");
    assert!(chunks.is_empty());
}
