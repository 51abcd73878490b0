//! Prometheus metrics for the HTTP store and the polling agent

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,
    pub signal_upserts_total: IntCounter,
    pub poll_ticks_total: IntCounter,
    pub poll_failures_total: IntCounter,
    pub agent_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total number of HTTP requests served")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently being served")?;
        let signal_upserts_total =
            IntCounter::new("signal_upserts_total", "Signals written through POST /signal")?;
        let poll_ticks_total =
            IntCounter::new("poll_ticks_total", "Poll ticks that performed a fetch")?;
        let poll_failures_total =
            IntCounter::new("poll_failures_total", "Poll ticks whose fetch failed")?;
        let agent_connected = Gauge::new(
            "agent_connected",
            "1 when the last poll reached the signal endpoint, 0 otherwise",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(signal_upserts_total.clone()))?;
        registry.register(Box::new(poll_ticks_total.clone()))?;
        registry.register(Box::new(poll_failures_total.clone()))?;
        registry.register(Box::new(agent_connected.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            signal_upserts_total,
            poll_ticks_total,
            poll_failures_total,
            agent_connected,
        })
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
