//! Signal Polling Agent
//!
//! Runs the background context: polls the signal API on a schedule, caches the
//! normalized signal and broadcasts it on the message bus. A control-surface
//! listener logs every broadcast signal.

use async_trait::async_trait;
use dotenvy::dotenv;
use signalbridge::agent::{self, PollingAgent, TickOutcome};
use signalbridge::bus::{ContextId, Message, MessageBus, MessageHandler, Response};
use signalbridge::config::{get_redis_url, AgentConfig};
use signalbridge::logging;
use signalbridge::metrics::Metrics;
use signalbridge::storage::{keys, KeyValueStore, MemoryStore, RedisStore};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Logs signals the way the popup would display them
struct SignalLogger;

#[async_trait]
impl MessageHandler for SignalLogger {
    async fn handle(&self, message: Message) -> Option<Response> {
        if let Message::SignalUpdated { signal } = message {
            info!(
                pair = %signal.pair,
                direction = %signal.direction,
                entry_min = signal.entry_min,
                entry_max = signal.entry_max,
                stop_loss = signal.stop_loss,
                confidence = signal.confidence,
                "Signal updated"
            );
        }
        None
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let config = AgentConfig::from_env()?;
    let env = signalbridge::config::get_environment();
    info!("Starting Signal Polling Agent");
    info!(environment = %env, "Environment");
    info!(
        api_url = %config.api_url,
        interval = config.poll_interval_seconds,
        "Polling configuration"
    );

    let storage: Arc<dyn KeyValueStore> = match get_redis_url() {
        Some(url) => {
            info!("Initializing Redis storage...");
            Arc::new(RedisStore::connect(&url, "signalbridge").await?)
        }
        None => {
            warn!("REDIS_URL not set, agent state is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let metrics = Arc::new(Metrics::new()?);
    let bus = MessageBus::new();
    let agent = PollingAgent::new(storage.clone(), bus.clone(), config).with_metrics(metrics);

    let background = agent::listen(&agent, &bus).await;
    let logger = bus.listen(ContextId::ControlSurface, Arc::new(SignalLogger)).await;

    if storage.get(keys::API_URL).await?.is_none() {
        agent.install().await?;
    }
    match agent.startup().await? {
        TickOutcome::Fetched(signal) => info!(pair = %signal.pair, "Initial signal fetched"),
        TickOutcome::Failed(reason) => {
            warn!(error = %reason, "Initial fetch failed, will retry on schedule")
        }
        outcome => info!(outcome = ?outcome, "Initial tick finished"),
    }

    info!("Agent started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down agent...");
            agent.stop().await;
            logger.unload().await;
            background.unload().await;
            info!("Agent stopped");
        }
    }

    Ok(())
}
