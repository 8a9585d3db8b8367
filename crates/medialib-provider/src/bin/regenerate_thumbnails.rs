//! Regenerate missing derived files for a list of media documents.
//!
//! Usage: `medialib-thumbs <media.json>` where the file holds a JSON array
//! of media as stored by the repository.

use std::sync::Arc;

use anyhow::{bail, Context as _};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use medialib_models::Media;
use medialib_provider::{build_pool, Collaborators, InMemoryRepository, MediaManager, PoolConfig};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("medialib=info,medialib_provider=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    let Some(input) = std::env::args().nth(1) else {
        bail!("usage: medialib-thumbs <media.json>");
    };

    let config = PoolConfig::from_env().context("loading media configuration")?;
    let collaborators = Collaborators::from_env().context("configuring collaborators")?;
    let pool = build_pool(&config, &collaborators).context("building provider pool")?;
    let manager = MediaManager::new(Arc::new(pool), InMemoryRepository::new());

    let json = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("reading {}", input))?;
    let documents: Vec<Media> =
        serde_json::from_str(&json).with_context(|| format!("parsing {}", input))?;

    info!(count = documents.len(), "Checking derived files");

    let (mut regenerated, mut failed) = (0usize, 0usize);
    for mut media in documents {
        if media.id.is_none() {
            warn!(name = ?media.name, "Skipping media without id");
            continue;
        }

        match manager.regenerate_missing(&mut media).await {
            Ok(formats) if formats.is_empty() => {}
            Ok(formats) => {
                regenerated += formats.len();
                info!(media_id = media.id.map(|id| id.get()), formats = ?formats, "Regenerated");
            }
            Err(e) => {
                failed += 1;
                error!(media_id = media.id.map(|id| id.get()), error = %e, "Regeneration failed");
            }
        }
    }

    info!(regenerated, failed, "Done");
    if failed > 0 {
        bail!("{} media could not be regenerated", failed);
    }
    Ok(())
}
