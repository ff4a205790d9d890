//! Server configuration
//!
//! Built from Shuttle secrets through a key lookup so it can be exercised
//! without a secret store. Malformed values fall back to defaults.

use std::str::FromStr;
use std::time::Duration;

use callwave::CallStatus;

use crate::application::{DispatchConfig, WatchdogPolicy};

/// Provider REST API settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Required for every provider operation
    pub api_key: Option<String>,
    /// Provider-side agent / assistant that places the calls
    pub agent_id: Option<String>,
    /// Bound on every provider request
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            agent_id: None,
            timeout: Duration::from_secs(15),
            user_agent: "Callwave/0.1".to_string(),
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default)]
pub struct CallwaveConfig {
    /// Bearer token for the management API (auth disabled when absent)
    pub api_key: Option<String>,
    /// Shared secret for provider webhook signatures (verification disabled when absent)
    pub webhook_secret: Option<String>,
    pub provider: ProviderConfig,
    pub dispatch: DispatchConfig,
    pub watchdog: WatchdogPolicy,
}

impl CallwaveConfig {
    /// Build configuration from a secret lookup (e.g. `|k| secrets.get(k)`)
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let provider_defaults = ProviderConfig::default();
        let provider = ProviderConfig {
            base_url: get("PROVIDER_BASE_URL").unwrap_or_default(),
            api_key: get("PROVIDER_API_KEY"),
            agent_id: get("PROVIDER_AGENT_ID"),
            timeout: Duration::from_secs(parse_or(
                &get,
                "PROVIDER_TIMEOUT_SECS",
                provider_defaults.timeout.as_secs(),
            )),
            user_agent: provider_defaults.user_agent,
        };

        let dispatch_defaults = DispatchConfig::default();
        let dispatch = DispatchConfig {
            inter_call_delay: Duration::from_millis(parse_or(
                &get,
                "DISPATCH_DELAY_MS",
                dispatch_defaults.inter_call_delay.as_millis() as u64,
            )),
            trigger_max_retries: parse_or(
                &get,
                "TRIGGER_MAX_RETRIES",
                dispatch_defaults.trigger_max_retries,
            ),
            retry_base_delay: Duration::from_millis(parse_or(
                &get,
                "TRIGGER_RETRY_BASE_MS",
                dispatch_defaults.retry_base_delay.as_millis() as u64,
            )),
            ..dispatch_defaults
        };

        let watchdog_defaults = WatchdogPolicy::default();
        let watchdog = WatchdogPolicy {
            period: Duration::from_secs(parse_positive_or(
                &get,
                "WATCHDOG_PERIOD_SECS",
                watchdog_defaults.period.as_secs(),
            )),
            deadline: Duration::from_secs(parse_or(
                &get,
                "WATCHDOG_DEADLINE_SECS",
                watchdog_defaults.deadline.as_secs(),
            )),
            eligible_statuses: get("WATCHDOG_STATUSES")
                .and_then(|raw| parse_statuses(&raw))
                .unwrap_or(watchdog_defaults.eligible_statuses),
        };

        Self {
            api_key: get("CALLWAVE_API_KEY"),
            webhook_secret: get("PROVIDER_WEBHOOK_SECRET"),
            provider,
            dispatch,
            watchdog,
        }
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("⚠️  Invalid value for {}: {:?}, using default", key, raw);
            default
        }),
    }
}

/// Like [`parse_or`], but zero also falls back to the default
fn parse_positive_or<F>(get: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(get, key, default) {
        0 => {
            tracing::warn!("⚠️  {} must be positive, using default", key);
            default
        }
        value => value,
    }
}

/// Comma-separated non-terminal statuses, e.g. `ringing,active`
fn parse_statuses(raw: &str) -> Option<Vec<CallStatus>> {
    let mut statuses = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<CallStatus>() {
            Ok(status) if !status.is_terminal() => {
                if !statuses.contains(&status) {
                    statuses.push(status);
                }
            }
            _ => {
                tracing::warn!("⚠️  Ignoring invalid WATCHDOG_STATUSES entry: {}", part);
            }
        }
    }
    (!statuses.is_empty()).then_some(statuses)
}
