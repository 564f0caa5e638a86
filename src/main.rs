//! rediz runner
//!
//! Connects to the configured Redis server and records a page visit:
//! - Loads built-in defaults, then `config.toml` and `config.local.toml` on top
//!   when present (`REDIS_URL` overrides the `[redis]` url)
//! - Counts the visit and remembers the visitor
//! - Reads both back through the client's pipe

use std::path::Path;

use anyhow::Result;
use rediz::{observability::init_tracing, prelude::*};
use tracing::info;

const DEFAULT_CONFIG: &str = r#"
[redis]
url = "redis://127.0.0.1:6379"
"#;

struct PageVisits {
    page: String,
}

impl Keyspace for PageVisits {
    const PREFIX: &'static str = "visits";

    fn default_key(&self) -> String {
        self.page.clone()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");

    let config = ConfigStore::layered(
        DEFAULT_CONFIG,
        &[Path::new("config.toml"), Path::new("config.local.toml")],
    )?;
    let store_config: StoreConfig = config.section()?;
    let store_config = store_config.with_env_override();

    let redis = RedisStore::connect(&store_config).await?;
    let store = redis.clone().into_shared();

    let page = std::env::args().nth(1).unwrap_or_else(|| "home".to_string());
    let visitor = std::env::args().nth(2).unwrap_or_else(|| "anonymous".to_string());

    let mut visits = NamespacedClient::for_keyspace(store, &PageVisits { page: page.clone() });
    let total = visits.incr(None).await?;
    let visitors_key = format!("{}:visitors", page);
    visits.add_member(Some(&visitors_key), &visitor).await?;
    visits.expire(Some(&visitors_key), 24 * 60 * 60).await?;

    visits.get_batched(None);
    let replies = visits.flush().await?;
    let unique = visits.members(Some(&visitors_key)).await?.len();

    info!("Page '{}' has {} visits from {} visitors", page, total, unique);
    info!("Pipe replies: {:?}", replies);

    drop(visits);
    redis.shutdown();
    Ok(())
}
