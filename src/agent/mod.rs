//! Background polling agent.
//!
//! Fetches the current signal from the HTTP store on a fixed interval,
//! normalizes it, caches it in storage and broadcasts it to every other
//! context on the message bus. A failed fetch only flips `isConnected`; the
//! last good signal is never overwritten. There is no retry: the next tick is
//! the retry.

use crate::bus::{ContextId, Listener, Message, MessageBus, MessageHandler, Response};
use crate::config::AgentConfig;
use crate::metrics::Metrics;
use crate::models::signal::CanonicalSignal;
use crate::signals::normalize;
use crate::storage::{self, keys, KeyValueStore, StorageError};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Upper bound for one fetch so a hung endpoint cannot pin the in-flight flag
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("response body is not JSON: {0}")]
    Body(#[source] reqwest::Error),
    #[error("response body is null")]
    Null,
}

/// What a single poll tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// `autoFetch` is off
    Disabled,
    /// A previous tick is still running
    Skipped,
    Fetched(CanonicalSignal),
    Failed(String),
}

/// The agent's cached view, as persisted in storage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cache {
    pub signal: Option<CanonicalSignal>,
    pub connected: bool,
    /// Unix epoch milliseconds of the last successful fetch
    pub last_fetch: Option<i64>,
}

/// A running schedule task. Cancelling it lets a tick already in progress finish.
struct Schedule {
    task: JoinHandle<()>,
    cancel: watch::Sender<bool>,
}

impl Schedule {
    fn cancel(self) {
        self.cancel.send_replace(true);
    }
}

struct Inner {
    client: reqwest::Client,
    storage: Arc<dyn KeyValueStore>,
    bus: MessageBus,
    config: AgentConfig,
    metrics: Option<Arc<Metrics>>,
    schedule: RwLock<Option<Schedule>>,
    in_flight: AtomicBool,
    completed: watch::Sender<Option<TickOutcome>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(schedule) = self.schedule.get_mut().take() {
            schedule.cancel();
        }
    }
}

/// Clears the in-flight flag when a tick ends, even if its task is aborted
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct PollingAgent {
    inner: Arc<Inner>,
}

impl PollingAgent {
    pub fn new(storage: Arc<dyn KeyValueStore>, bus: MessageBus, config: AgentConfig) -> Self {
        Self::with_client(reqwest::Client::new(), storage, bus, config)
    }

    pub fn with_client(
        client: reqwest::Client,
        storage: Arc<dyn KeyValueStore>,
        bus: MessageBus,
        config: AgentConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                storage,
                bus,
                config,
                metrics: None,
                schedule: RwLock::new(None),
                in_flight: AtomicBool::new(false),
                completed: watch::channel(None).0,
            }),
        }
    }

    /// Attach metrics. Must be called before the agent is cloned or scheduled.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.metrics = Some(metrics);
        } else {
            warn!("PollingAgent: agent already shared, metrics not attached");
        }
        self
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.storage
    }

    /// First run: persist default settings and start the schedule
    pub async fn install(&self) -> Result<(), StorageError> {
        let config = &self.inner.config;
        self.inner
            .storage
            .set_many(vec![
                (keys::API_URL, json!(config.api_url)),
                (keys::REFRESH_INTERVAL, json!(config.poll_interval_seconds)),
                (keys::AUTO_FETCH, json!(config.auto_fetch)),
                (keys::IS_CONNECTED, json!(false)),
            ])
            .await?;
        info!(
            api_url = %config.api_url,
            interval = config.poll_interval_seconds,
            "PollingAgent: installed default settings"
        );
        self.configure_interval(config.poll_interval_seconds).await;
        Ok(())
    }

    /// Every start: restore the persisted interval, schedule, and poll once right away
    pub async fn startup(&self) -> Result<TickOutcome, StorageError> {
        let interval = storage::load::<u64>(self.inner.storage.as_ref(), keys::REFRESH_INTERVAL)
            .await?
            .filter(|s| *s > 0)
            .unwrap_or(self.inner.config.poll_interval_seconds);
        self.configure_interval(interval).await;
        Ok(self.tick().await)
    }

    /// Replace the active schedule. The first tick fires one full interval from now.
    ///
    /// A tick already running on the previous schedule completes; only its
    /// later ticks are dropped.
    pub async fn configure_interval(&self, seconds: u64) {
        let seconds = seconds.max(1);
        let period = Duration::from_secs(seconds);
        let agent: Weak<Inner> = Arc::downgrade(&self.inner);
        let (cancel, mut cancelled) = watch::channel(false);

        let mut schedule = self.inner.schedule.write().await;
        if let Some(previous) = schedule.take() {
            previous.cancel();
            debug!("PollingAgent: previous schedule cancelled");
        }

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.changed() => break,
                    _ = ticker.tick() => {}
                }
                let Some(inner) = agent.upgrade() else {
                    break;
                };
                let outcome = PollingAgent { inner }.tick().await;
                debug!(outcome = ?outcome, "PollingAgent: scheduled tick finished");
            }
        });
        *schedule = Some(Schedule { task, cancel });

        info!(interval = seconds, "PollingAgent: polling every {}s", seconds);
    }

    pub async fn is_scheduled(&self) -> bool {
        self.inner
            .schedule
            .read()
            .await
            .as_ref()
            .map(|s| !s.task.is_finished())
            .unwrap_or(false)
    }

    pub async fn stop(&self) {
        if let Some(schedule) = self.inner.schedule.write().await.take() {
            schedule.cancel();
            info!("PollingAgent: stopped");
        }
    }

    /// One fetch, normalize, cache and broadcast cycle
    pub async fn tick(&self) -> TickOutcome {
        let outcome = {
            let Some(_guard) = InFlight::enter(&self.inner.in_flight) else {
                debug!("PollingAgent: previous tick still in flight, skipping");
                return TickOutcome::Skipped;
            };
            self.poll().await
        };
        // Published after the flag is released: a caller that saw the flag set sees this value.
        self.inner.completed.send_replace(Some(outcome.clone()));
        outcome
    }

    /// Like [`tick`](Self::tick), but when a tick is already running, wait for it
    /// and report its outcome instead of skipping.
    pub async fn fetch_now(&self) -> TickOutcome {
        let mut completed = self.inner.completed.subscribe();
        match self.tick().await {
            TickOutcome::Skipped => {
                debug!("PollingAgent: waiting for the tick in flight");
                match completed.changed().await {
                    Ok(()) => completed
                        .borrow_and_update()
                        .clone()
                        .unwrap_or(TickOutcome::Skipped),
                    Err(_) => TickOutcome::Skipped,
                }
            }
            outcome => outcome,
        }
    }

    async fn poll(&self) -> TickOutcome {
        let store = self.inner.storage.as_ref();
        let auto_fetch = match storage::load::<bool>(store, keys::AUTO_FETCH).await {
            Ok(v) => v.unwrap_or(self.inner.config.auto_fetch),
            Err(e) => return self.fail(format!("settings unavailable: {}", e)).await,
        };
        if !auto_fetch {
            debug!("PollingAgent: auto fetch disabled");
            return TickOutcome::Disabled;
        }

        let api_url = match storage::load::<String>(store, keys::API_URL).await {
            Ok(url) => url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| self.inner.config.api_url.clone()),
            Err(e) => return self.fail(format!("settings unavailable: {}", e)).await,
        };

        if let Some(metrics) = &self.inner.metrics {
            metrics.poll_ticks_total.inc();
        }

        let body = match self.fetch(&api_url).await {
            Ok(body) => body,
            Err(e) => return self.fail(e.to_string()).await,
        };
        let signal = normalize(&body);

        let cached = store
            .set_many(vec![
                (keys::LAST_SIGNAL, serde_json::to_value(&signal).unwrap_or(Value::Null)),
                (keys::LAST_FETCH, json!(chrono::Utc::now().timestamp_millis())),
                (keys::IS_CONNECTED, json!(true)),
            ])
            .await;
        if let Err(e) = cached {
            return self.fail(format!("could not cache signal: {}", e)).await;
        }
        if let Some(metrics) = &self.inner.metrics {
            metrics.agent_connected.set(1.0);
        }

        let delivered = self
            .inner
            .bus
            .broadcast(
                ContextId::Background,
                Message::SignalUpdated {
                    signal: signal.clone(),
                },
            )
            .await;

        info!(
            pair = %signal.pair,
            direction = %signal.direction,
            confidence = signal.confidence,
            delivered,
            "PollingAgent: signal fetched and broadcast"
        );
        TickOutcome::Fetched(signal)
    }

    /// Read the cache back from storage
    pub async fn cache(&self) -> Result<Cache, StorageError> {
        let store = self.inner.storage.as_ref();
        Ok(Cache {
            signal: storage::load(store, keys::LAST_SIGNAL).await?,
            connected: storage::load(store, keys::IS_CONNECTED)
                .await?
                .unwrap_or(false),
            last_fetch: storage::load(store, keys::LAST_FETCH).await?,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        let response = self
            .inner
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        match response.json::<Value>().await.map_err(FetchError::Body)? {
            Value::Null => Err(FetchError::Null),
            body => Ok(body),
        }
    }

    async fn fail(&self, reason: String) -> TickOutcome {
        error!(error = %reason, "PollingAgent: fetch failed");
        if let Some(metrics) = &self.inner.metrics {
            metrics.poll_failures_total.inc();
            metrics.agent_connected.set(0.0);
        }
        if let Err(e) = self.inner.storage.set(keys::IS_CONNECTED, json!(false)).await {
            warn!(error = %e, "PollingAgent: could not record disconnected state");
        }
        TickOutcome::Failed(reason)
    }
}

/// The background context's bus handler
pub struct BackgroundHandler {
    agent: PollingAgent,
}

impl BackgroundHandler {
    pub fn new(agent: PollingAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl MessageHandler for BackgroundHandler {
    async fn handle(&self, message: Message) -> Option<Response> {
        match message {
            Message::Ping => Some(Response::pong()),
            Message::FetchNow => match self.agent.fetch_now().await {
                TickOutcome::Failed(reason) => Some(Response::failed(reason)),
                outcome => {
                    debug!(outcome = ?outcome, "BackgroundHandler: fetchNow handled");
                    Some(Response::ok())
                }
            },
            Message::UpdateInterval { interval } => {
                let persisted = self
                    .agent
                    .storage()
                    .set(keys::REFRESH_INTERVAL, json!(interval))
                    .await;
                if let Err(e) = persisted {
                    warn!(error = %e, "BackgroundHandler: could not persist interval");
                }
                self.agent.configure_interval(interval).await;
                Some(Response::ok())
            }
            other => {
                debug!(action = other.action(), "BackgroundHandler: no response");
                None
            }
        }
    }
}

/// Register the agent as the background context
pub async fn listen(agent: &PollingAgent, bus: &MessageBus) -> Listener {
    bus.listen(
        ContextId::Background,
        Arc::new(BackgroundHandler::new(agent.clone())),
    )
    .await
}
