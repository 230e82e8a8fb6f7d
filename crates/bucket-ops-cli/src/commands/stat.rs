use anyhow::Result;
use bucket_ops_core::Lister;

use super::{Context, OutputFormat};

pub async fn run(ctx: &Context, keys: &[String], format: OutputFormat) -> Result<()> {
    let lister = Lister::new(ctx.backend.clone(), ctx.config.batch);

    if let [key] = keys {
        // A single key gets the full metadata
        if matches!(format, OutputFormat::Text) {
            let stat = lister.stat(key).await?;
            println!("Key:           {}", key);
            println!("Size:          {}", stat.size);
            println!("Last Modified: {}", stat.last_modified);
            println!("Hash:          {}", stat.hash.as_deref().unwrap_or("-"));
            println!("MIME Type:     {}", stat.mime_type.as_deref().unwrap_or("-"));
            return Ok(());
        }
    }

    let results = lister.list_stat(keys, &ctx.cancel).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&results)?),
        OutputFormat::Text => {
            for result in &results {
                if result.is_found() {
                    println!("{:>12}  {}", result.size, result.key);
                } else {
                    println!("{:>12}  {} (status {})", "-", result.key, result.status);
                }
            }
        }
    }

    let missing = results.iter().filter(|r| !r.is_found()).count();
    if missing > 0 {
        anyhow::bail!("{} of {} keys could not be read", missing, results.len());
    }
    Ok(())
}
