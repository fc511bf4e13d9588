use std::sync::Arc;
use std::time::Duration;

use broadside::prelude::*;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Settings read from the environment.
///
/// - `BROADSIDE_BIND`: listen address, default `0.0.0.0:8080`
/// - `BROADSIDE_IDLE_SECS`: evict sessions idle this long; unset or `0`
///   disables eviction
struct Settings {
    bind: String,
    engine: EngineConfig,
}

impl Settings {
    fn from_env() -> Self {
        Self::from_vars(
            std::env::var("BROADSIDE_BIND").ok(),
            std::env::var("BROADSIDE_IDLE_SECS").ok(),
        )
    }

    fn from_vars(bind: Option<String>, idle_secs: Option<String>) -> Self {
        let idle_timeout = idle_secs
            .and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "ignoring BROADSIDE_IDLE_SECS");
                    None
                }
            })
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            bind: bind.unwrap_or_else(|| DEFAULT_BIND.to_string()),
            engine: EngineConfig {
                idle_timeout,
                ..EngineConfig::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env();
    tracing::info!(bind = %settings.bind, idle_timeout = ?settings.engine.idle_timeout, "starting broadside server");

    let server = BroadsideServerBuilder::new()
        .bind(&settings.bind)
        .engine_config(settings.engine)
        .build(
            FleetCatalog::standard(),
            Arc::new(Scoreboard::new()),
            TrustedTokenAuth,
        )
        .await?;

    server.run().await?;
    Ok(())
}
