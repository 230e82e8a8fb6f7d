use anyhow::Result;
use bucket_ops_core::{Lister, ListRecord};
use futures::TryStreamExt;
use tracing::info;

use super::{Context, OutputFormat};

pub async fn run(ctx: &Context, prefix: &str, long: bool, format: OutputFormat) -> Result<()> {
    let lister = Lister::new(ctx.backend.clone(), ctx.config.batch);
    info!("Listing keys under '{}'", prefix);

    if !long && matches!(format, OutputFormat::Text) {
        let keys = lister.list_prefix(prefix, &ctx.cancel).await?;
        for key in &keys {
            println!("{}", key);
        }
        return Ok(());
    }

    let records: Vec<ListRecord> = lister
        .list_records(prefix, ctx.cancel.clone())
        .try_collect()
        .await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(&records)?);
        }
        OutputFormat::Text => {
            for record in &records {
                println!(
                    "{:>12}  {}  {}  {}",
                    record.size,
                    record.last_modified.format("%Y-%m-%d %H:%M:%S"),
                    record.hash.as_deref().unwrap_or("-"),
                    record.key
                );
            }
            println!("\n{} objects", records.len());
        }
    }

    Ok(())
}
