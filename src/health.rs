//! Health endpoints: overall, readiness and liveness.
//!
//! Every request runs fresh probes against the broker and the gateway.
//! Nothing is cached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::gateway::SmsGateway;

/// Result of one connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeStatus {
    pub reachable: bool,
    /// Short status string for the response body ("connected", "not_configured", ...).
    pub detail: String,
}

impl ProbeStatus {
    pub fn up(detail: impl Into<String>) -> Self {
        Self {
            reachable: true,
            detail: detail.into(),
        }
    }

    pub fn down(detail: impl Into<String>) -> Self {
        Self {
            reachable: false,
            detail: detail.into(),
        }
    }
}

/// A dependency the service needs to reach.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Dependency name used in check names ("RabbitMQ", "Twilio").
    fn name(&self) -> &str;

    /// Attempt to reach the dependency right now.
    async fn probe(&self) -> ProbeStatus;
}

/// Probes the SMS gateway with an account fetch.
pub struct GatewayProbe {
    gateway: Option<Arc<dyn SmsGateway>>,
}

impl GatewayProbe {
    /// `None` reports `not_configured` (DOWN).
    pub fn new(gateway: Option<Arc<dyn SmsGateway>>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl ConnectivityProbe for GatewayProbe {
    fn name(&self) -> &str {
        "Twilio"
    }

    async fn probe(&self) -> ProbeStatus {
        let Some(gateway) = &self.gateway else {
            return ProbeStatus::down("not_configured");
        };
        match gateway.check_account().await {
            Ok(()) => ProbeStatus::up("connected"),
            Err(e) => ProbeStatus::down(format!("error: {e}")),
        }
    }
}

// ── Response document ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Up,
    Down,
}

impl CheckStatus {
    fn from_bool(up: bool) -> Self {
        if up { Self::Up } else { Self::Down }
    }
}

#[derive(Debug, Serialize)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct HealthDocument {
    pub status: CheckStatus,
    pub checks: Vec<Check>,
}

impl HealthDocument {
    fn into_http_response(self) -> Response {
        let code = match self.status {
            CheckStatus::Up => StatusCode::OK,
            CheckStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        };
        (code, Json(self)).into_response()
    }
}

// ── State ───────────────────────────────────────────────────────────

/// Application state shared across handlers. Immutable after startup.
#[derive(Clone)]
pub struct HealthState {
    broker: Arc<dyn ConnectivityProbe>,
    gateway: Arc<dyn ConnectivityProbe>,
    started_at: DateTime<Utc>,
    started: Instant,
    version: &'static str,
}

impl HealthState {
    pub fn new(broker: Arc<dyn ConnectivityProbe>, gateway: Arc<dyn ConnectivityProbe>) -> Self {
        Self {
            broker,
            gateway,
            started_at: Utc::now(),
            started: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    fn started_at_text(&self) -> String {
        self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn uptime(&self) -> String {
        format_uptime(self.started.elapsed())
    }

    async fn probe_both(&self) -> (ProbeStatus, ProbeStatus) {
        tokio::join!(self.broker.probe(), self.gateway.probe())
    }

    fn readiness_check(&self, ready: bool) -> Check {
        Check {
            name: "Readiness check".into(),
            status: CheckStatus::from_bool(ready),
            data: json!({
                "from": self.started_at_text(),
                "status": if ready { "READY" } else { "NOT_READY" },
                "version": self.version,
                "uptime": self.uptime(),
            }),
        }
    }

    fn liveness_check(&self) -> Check {
        Check {
            name: "Liveness check".into(),
            status: CheckStatus::Up,
            data: json!({
                "from": self.started_at_text(),
                "status": "ALIVE",
                "version": self.version,
                "uptime": self.uptime(),
            }),
        }
    }
}

/// Build the health router.
pub fn health_routes(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/health/live", get(live))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<HealthState>) -> Response {
    let (broker, gateway) = state.probe_both().await;
    let ready = broker.reachable && gateway.reachable;

    let checks = vec![
        state.readiness_check(ready),
        state.liveness_check(),
        dependency_check(state.broker.name(), &broker),
        dependency_check(state.gateway.name(), &gateway),
    ];
    let all_up = checks.iter().all(|c| c.status == CheckStatus::Up);
    let doc = HealthDocument {
        status: CheckStatus::from_bool(all_up),
        checks,
    };

    info!(status = ?doc.status, "Health check");
    doc.into_http_response()
}

async fn ready(State(state): State<HealthState>) -> Response {
    let (broker, gateway) = state.probe_both().await;
    let ready = broker.reachable && gateway.reachable;

    let mut check = state.readiness_check(ready);
    if let Some(data) = check.data.as_object_mut() {
        data.insert("rabbitmq".into(), json!(broker.detail));
        data.insert("twilio".into(), json!(gateway.detail));
    }

    HealthDocument {
        status: CheckStatus::from_bool(ready),
        checks: vec![check],
    }
    .into_http_response()
}

async fn live(State(state): State<HealthState>) -> Response {
    let mut check = state.liveness_check();
    if let Some(data) = check.data.as_object_mut() {
        data.insert("memory".into(), memory_info());
    }

    HealthDocument {
        status: CheckStatus::Up,
        checks: vec![check],
    }
    .into_http_response()
}

fn dependency_check(name: &str, status: &ProbeStatus) -> Check {
    Check {
        name: format!("{name} check"),
        status: CheckStatus::from_bool(status.reachable),
        data: json!({ "status": status.detail }),
    }
}

/// `{d}d {h}h {m}m {s}s`
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    format!("{days}d {hours}h {minutes}m {seconds}s")
}

/// Resident and virtual memory of this process, in MB.
fn memory_info() -> serde_json::Value {
    let status = std::fs::read_to_string("/proc/self/status").unwrap_or_default();
    let (rss, vms) = parse_proc_status(&status);
    let fmt = |kb: Option<u64>| match kb {
        Some(kb) => format!("{:.2} MB", kb as f64 / 1024.0),
        None => "n/a".to_string(),
    };
    json!({ "rss": fmt(rss), "vms": fmt(vms) })
}

/// Extract `VmRSS` and `VmSize` (kB) from `/proc/<pid>/status` text.
fn parse_proc_status(status: &str) -> (Option<u64>, Option<u64>) {
    let field = |name: &str| {
        status
            .lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse().ok())
    };
    (field("VmRSS:"), field("VmSize:"))
}
