//! Process-wide configuration, read from the environment knobs in §6.

use std::time::Duration;

/// Durability mode for the write buffer (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// Callback fires only once the batch has committed to the substrate.
    Safe,
    /// Cache updates apply and the callback fires on enqueue; the disk
    /// commit happens in the background.
    Optimistic,
}

/// Process-wide configuration.
///
/// Every field has a documented default and can be overridden by the
/// matching environment variable. Parsing happens once, in
/// `apps/recordhub-server`, producing an immutable `Config` shared by
/// reference across every connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// `MAX_CACHE_SIZE` — max entries held by the LRU cache.
    pub max_cache_size: usize,
    /// `MAX_SCAN_LIMIT` — guardrail on unindexed primary-key scans.
    pub max_scan_limit: usize,
    /// `MAX_BATCH_SIZE` — cap on `/api/batch` request size.
    pub max_batch_size: usize,
    /// `FLUSH_INTERVAL` — write buffer's armed-timer duration.
    pub flush_interval: Duration,
    /// `MAX_BUFFER_SIZE` — ingress size that forces an immediate flush.
    pub max_buffer_size: usize,
    /// Flush-queue depth at which new intents fail fast with `OverloadError`.
    pub overload_threshold: usize,
    /// `OPTIMISTIC_MODE` — write buffer durability mode.
    pub durability_mode: DurabilityMode,
    /// `JWT_SECRET` — signing secret for the (external) login flow.
    pub jwt_secret: String,
    /// `JWT_EXPIRES_IN` — token lifetime for the (external) login flow.
    pub jwt_expires_in: Duration,
    /// `DB_PATH` — on-disk location a persistent `KvStore` would use.
    pub db_path: String,
    /// `PORT` — REST server bind port.
    pub port: u16,
    /// `AUTH_COLLECTIONS` — the collection names the schema registry
    /// auto-materializes an auth schema for (§3: "the two auth
    /// collection names").
    pub auth_collections: Vec<String>,
    /// Timeout for reading an incoming request body.
    pub request_timeout: Duration,
    /// Timeout for awaiting the engine's response to a request.
    pub response_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_cache_size: 10_000,
            max_scan_limit: 100,
            max_batch_size: 100,
            flush_interval: Duration::from_millis(30),
            max_buffer_size: 500,
            overload_threshold: 50,
            durability_mode: DurabilityMode::Safe,
            jwt_secret: "change-me".to_string(),
            jwt_expires_in: Duration::from_secs(60 * 60 * 24 * 7),
            db_path: "./data".to_string(),
            port: 8090,
            auth_collections: vec!["users".to_string(), "_superusers".to_string()],
            request_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Builds a `Config` from defaults overridden by environment
    /// variables, the way `apps/recordhub-server` wires it up at
    /// start-up. Malformed values fall back to the default rather than
    /// aborting — an operator typo in an optional knob should not take
    /// the process down.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_usize("MAX_CACHE_SIZE") {
            cfg.max_cache_size = v;
        }
        if let Some(v) = env_usize("MAX_SCAN_LIMIT") {
            cfg.max_scan_limit = v;
        }
        if let Some(v) = env_usize("MAX_BATCH_SIZE") {
            cfg.max_batch_size = v;
        }
        if let Some(v) = env_usize("FLUSH_INTERVAL") {
            cfg.flush_interval = Duration::from_millis(v as u64);
        }
        if let Some(v) = env_usize("MAX_BUFFER_SIZE") {
            cfg.max_buffer_size = v;
        }
        if let Ok(v) = std::env::var("OPTIMISTIC_MODE") {
            cfg.durability_mode = if v == "1" || v.eq_ignore_ascii_case("true") {
                DurabilityMode::Optimistic
            } else {
                DurabilityMode::Safe
            };
        }
        if let Ok(v) = std::env::var("JWT_SECRET") {
            cfg.jwt_secret = v;
        }
        if let Some(v) = env_usize("JWT_EXPIRES_IN") {
            cfg.jwt_expires_in = Duration::from_secs(v as u64);
        }
        if let Ok(v) = std::env::var("DB_PATH") {
            cfg.db_path = v;
        }
        if let Some(v) = env_usize("PORT") {
            cfg.port = v as u16;
        }
        if let Ok(v) = std::env::var("AUTH_COLLECTIONS") {
            let names: Vec<String> = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
            if !names.is_empty() {
                cfg.auth_collections = names;
            }
        }

        cfg
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_nominal_values() {
        let cfg = Config::default();
        assert_eq!(cfg.max_scan_limit, 100);
        assert_eq!(cfg.overload_threshold, 50);
        assert_eq!(cfg.durability_mode, DurabilityMode::Safe);
    }

    #[test]
    fn malformed_env_value_falls_back_to_default() {
        std::env::set_var("MAX_SCAN_LIMIT", "not-a-number");
        let cfg = Config::from_env();
        assert_eq!(cfg.max_scan_limit, 100);
        std::env::remove_var("MAX_SCAN_LIMIT");
    }
}
