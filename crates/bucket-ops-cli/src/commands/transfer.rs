use anyhow::Result;
use bucket_ops_core::{ByteRange, Downloader, Uploader};
use futures::TryStreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::Context;

pub async fn upload(ctx: &Context, file: &Path, key: &str) -> Result<()> {
    let uploader = Uploader::new(ctx.backend.clone(), ctx.config.transfer.clone());
    tokio::select! {
        res = uploader.upload_file(file, key) => res?,
        _ = ctx.cancel.cancelled() => anyhow::bail!("upload cancelled"),
    }
    Ok(())
}

pub async fn download(ctx: &Context, key: &str, path: &Path) -> Result<()> {
    let downloader = Downloader::new(ctx.backend.clone(), ctx.config.transfer.retry.clone());
    let file = tokio::select! {
        res = downloader.download_file(key, path) => res?,
        _ = ctx.cancel.cancelled() => anyhow::bail!("download cancelled"),
    };
    let len = file.metadata().await?.len();
    info!("{} is {} bytes", path.display(), len);
    Ok(())
}

pub async fn cat(ctx: &Context, key: &str, offset: Option<i64>, size: Option<u64>) -> Result<()> {
    let downloader = Downloader::new(ctx.backend.clone(), ctx.config.transfer.retry.clone());
    let mut stdout = tokio::io::stdout();
    let mut body = match (offset, size) {
        (None, _) => downloader.download_raw(key).await?.1,
        (Some(offset), Some(size)) => {
            let range = ByteRange::from_offset(offset, size)?;
            downloader.download_range_reader(key, range).await?.1
        }
        (Some(offset), None) if offset >= 0 => {
            let range = ByteRange::From(offset as u64);
            downloader.download_range_reader(key, range).await?.1
        }
        (Some(_), None) => anyhow::bail!("--size is required when --offset is -1"),
    };

    loop {
        let chunk = tokio::select! {
            chunk = body.try_next() => chunk?,
            _ = ctx.cancel.cancelled() => anyhow::bail!("read cancelled"),
        };
        let Some(chunk) = chunk else { break };
        stdout.write_all(&chunk).await?;
    }
    stdout.flush().await?;
    Ok(())
}
