use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

impl HealthResponse {
    pub fn is_unhealthy(&self) -> bool {
        self.status == "unhealthy"
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl ToString) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.to_string(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

/// Reachability check for a neighbouring HTTP service. Any HTTP answer counts as reachable.
pub struct HttpChecker {
    client: reqwest::Client,
    url: String,
}

impl HttpChecker {
    pub fn new(url: String) -> Self {
        let client = crate::clients::http_client(CHECK_TIMEOUT);
        Self { client, url }
    }
}

#[async_trait]
impl DependencyChecker for HttpChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.client.get(&self.url).send().await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

/// A named dependency; `critical` ones make the service unhealthy, the rest only degrade it.
#[derive(Clone)]
pub struct Dependency {
    pub name: String,
    pub critical: bool,
    pub checker: Arc<dyn DependencyChecker>,
}

pub async fn check_health(dependencies: &[Dependency], start_time: Instant) -> HealthResponse {
    let results = futures::future::join_all(
        dependencies
            .iter()
            .map(|dep| timeout(CHECK_TIMEOUT, dep.checker.check())),
    )
    .await;

    let mut statuses = HashMap::new();
    let mut has_critical_failure = false;
    let mut has_non_critical_failure = false;

    for (dep, result) in dependencies.iter().zip(results) {
        let status = result.unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
        if matches!(status, DependencyStatus::Unhealthy { .. }) {
            if dep.critical {
                has_critical_failure = true;
            } else {
                has_non_critical_failure = true;
            }
        }
        statuses.insert(dep.name.clone(), status);
    }

    let overall_status = if has_critical_failure {
        "unhealthy"
    } else if has_non_critical_failure {
        "degraded"
    } else {
        "healthy"
    };

    HealthResponse {
        status: overall_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        dependencies: statuses,
    }
}
