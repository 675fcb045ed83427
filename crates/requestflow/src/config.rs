use crate::executions::backoff::BackoffConfig;

/// Runtime configuration, loaded from environment variables (RFLOW_*
/// with unprefixed fallbacks) into a typed struct.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub api_addr: Option<String>,
    pub migrate_on_startup: bool,

    pub poll_interval_ms: u64,
    pub polling_ceiling: i32,
    pub sweep_batch_size: i64,
    pub launch_backoff: BackoffConfig,

    pub http_timeout_secs: u64,
    pub job_template_runner_url: String,
    pub job_template_runner_token: Option<String>,
    pub flow_runner_url: String,
    pub flow_runner_token: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let api_addr =
            env_or_fallback("RFLOW_API_ADDR", "API_ADDR").and_then(|s| normalize_optional_addr(&s));

        let migrate_on_startup = env_bool("RFLOW_MIGRATE_ON_STARTUP").unwrap_or(false);

        let poll_interval_ms = env_or_fallback("RFLOW_POLL_INTERVAL_MS", "POLL_INTERVAL_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(5_000);

        // 1440 polls at the 5s default interval = 2 hours before timeout.
        let polling_ceiling = env_or_fallback("RFLOW_POLLING_CEILING", "POLLING_CEILING")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_440);

        let sweep_batch_size = env_or_fallback("RFLOW_SWEEP_BATCH_SIZE", "SWEEP_BATCH_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);

        let launch_backoff = BackoffConfig {
            base_seconds: env_or_fallback("RFLOW_LAUNCH_BACKOFF_BASE_SECS", "LAUNCH_BACKOFF_BASE_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            max_seconds: env_or_fallback("RFLOW_LAUNCH_BACKOFF_MAX_SECS", "LAUNCH_BACKOFF_MAX_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(15 * 60),
            jitter_pct: env_or_fallback("RFLOW_LAUNCH_BACKOFF_JITTER_PCT", "LAUNCH_BACKOFF_JITTER_PCT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.10),
        };

        let http_timeout_secs = env_or_fallback("RFLOW_HTTP_TIMEOUT_SECS", "HTTP_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let job_template_runner_url =
            env_or_fallback("RFLOW_JOB_TEMPLATE_RUNNER_URL", "JOB_TEMPLATE_RUNNER_URL")
                .unwrap_or_else(|| "http://localhost:8052".to_string());
        let job_template_runner_token =
            env_or_fallback("RFLOW_JOB_TEMPLATE_RUNNER_TOKEN", "JOB_TEMPLATE_RUNNER_TOKEN");

        let flow_runner_url = env_or_fallback("RFLOW_FLOW_RUNNER_URL", "FLOW_RUNNER_URL")
            .unwrap_or_else(|| "http://localhost:8445".to_string());
        let flow_runner_token = env_or_fallback("RFLOW_FLOW_RUNNER_TOKEN", "FLOW_RUNNER_TOKEN");

        Ok(Self {
            database_url,
            api_addr,
            migrate_on_startup,
            poll_interval_ms,
            polling_ceiling,
            sweep_batch_size,
            launch_backoff,
            http_timeout_secs,
            job_template_runner_url,
            job_template_runner_token,
            flow_runner_url,
            flow_runner_token,
        })
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn normalize_optional_addr(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if matches!(v.to_lowercase().as_str(), "0" | "off" | "false" | "none") {
        return None;
    }
    Some(v.to_string())
}
