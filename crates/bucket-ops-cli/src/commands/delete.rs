use anyhow::Result;
use bucket_ops_core::Lister;
use tracing::{error, info};

use super::Context;

pub async fn run(ctx: &Context, keys: &[String], prefix: Option<&str>) -> Result<()> {
    let lister = Lister::new(ctx.backend.clone(), ctx.config.batch);

    let (requested, failed) = match prefix {
        Some(prefix) => {
            info!("Deleting every key under '{}'", prefix);
            (None, lister.delete_prefix(prefix, &ctx.cancel).await?)
        }
        None => {
            info!("Deleting {} keys", keys.len());
            (Some(keys.len()), lister.delete_keys(keys, &ctx.cancel).await?)
        }
    };

    for outcome in &failed {
        error!("{}: {} ({})", outcome.key, outcome.code, outcome.message);
    }

    if let Some(requested) = requested {
        println!("Deleted {} of {} keys", requested - failed.len(), requested);
    }
    if !failed.is_empty() {
        anyhow::bail!("{} keys failed to delete", failed.len());
    }
    Ok(())
}
