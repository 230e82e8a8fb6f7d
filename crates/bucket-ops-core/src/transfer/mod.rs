//! Single-object uploads and downloads with retry.

mod downloader;
mod retry;
mod uploader;

pub use downloader::Downloader;
pub use retry::with_retry;
pub use uploader::Uploader;
