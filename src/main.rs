use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use wellness_sync::auth::current_user;
use wellness_sync::remote::HttpRemote;
use wellness_sync::{Config, EngineEvent, LocalClock, SystemClock, Tracker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wellness_sync=debug".into()),
        )
        .json()
        .init();

    let config = Config::from_env()?;
    let clock = LocalClock::new(Arc::new(SystemClock), config.utc_offset())
        .with_week_convention(config.week_convention);

    let user = config
        .session_token
        .as_deref()
        .and_then(|token| current_user(token, &clock));

    let remote = Arc::new(HttpRemote::new(&config)?);
    tracing::info!(
        api = %config.api_base_url,
        reconcile_secs = config.reconcile_interval_secs,
        utc_offset_minutes = config.utc_offset_minutes,
        weeks = ?config.week_convention,
        "wellness-sync starting"
    );

    let mut tracker = Tracker::new(remote, clock, user);
    let mut events = tracker.subscribe();

    if let Err(e) = tracker.refresh_all().await {
        tracing::error!(error = %e, "initial load incomplete");
    }
    tracker.start_reconciler(config.reconcile_interval())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event consumer lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracker.teardown().await;
    Ok(())
}

fn log_event(event: &EngineEvent) {
    match serde_json::to_string(event) {
        Ok(json) => tracing::info!(event = %json, "engine event"),
        Err(e) => tracing::error!(error = %e, "failed to serialize engine event"),
    }
}
