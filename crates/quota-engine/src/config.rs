//! Engine configuration.

use std::time::Duration;

use quota_core::{
    PriceEntry, PriceTable, DEFAULT_INPUT_MICROS_PER_MILLION, DEFAULT_OUTPUT_MICROS_PER_MILLION,
    DEFAULT_REQUEST_MICROS,
};

/// Default decision/snapshot cache TTL in seconds (the bounded-staleness
/// window).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// Default alert thresholds as usage percentages.
pub const DEFAULT_ALERT_THRESHOLDS: [u8; 3] = [80, 90, 100];

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long cached decisions and snapshots stay valid
    /// (default: 30 seconds).
    pub cache_ttl: Duration,

    /// Usage percentages that trigger alerts, ascending
    /// (default: 80, 90, 100).
    pub alert_thresholds: Vec<u8>,

    /// Global default per-unit prices for vendors not present in the
    /// price table.
    pub default_prices: PriceEntry,
}

impl EngineConfig {
    /// Load configuration from `QUOTA_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let cache_ttl_secs = std::env::var("QUOTA_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);

        let alert_thresholds = std::env::var("QUOTA_ALERT_THRESHOLDS")
            .ok()
            .map(|s| {
                let mut thresholds: Vec<u8> =
                    s.split(',').filter_map(|t| t.trim().parse().ok()).collect();
                thresholds.sort_unstable();
                thresholds
            })
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_ALERT_THRESHOLDS.to_vec());

        let default_prices = PriceEntry {
            input_micros_per_million: env_i64(
                "QUOTA_DEFAULT_INPUT_PRICE_MICROS",
                DEFAULT_INPUT_MICROS_PER_MILLION,
            ),
            output_micros_per_million: env_i64(
                "QUOTA_DEFAULT_OUTPUT_PRICE_MICROS",
                DEFAULT_OUTPUT_MICROS_PER_MILLION,
            ),
            per_request_micros: env_i64(
                "QUOTA_DEFAULT_REQUEST_PRICE_MICROS",
                DEFAULT_REQUEST_MICROS,
            ),
            per_image_micros: 0,
            per_page_micros: 0,
        };

        Self {
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            alert_thresholds,
            default_prices,
        }
    }

    /// Build the price table with this configuration's global defaults.
    #[must_use]
    pub fn price_table(&self) -> PriceTable {
        PriceTable::default().with_default_entry(self.default_prices)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            alert_thresholds: DEFAULT_ALERT_THRESHOLDS.to_vec(),
            default_prices: PriceEntry {
                input_micros_per_million: DEFAULT_INPUT_MICROS_PER_MILLION,
                output_micros_per_million: DEFAULT_OUTPUT_MICROS_PER_MILLION,
                per_request_micros: DEFAULT_REQUEST_MICROS,
                per_image_micros: 0,
                per_page_micros: 0,
            },
        }
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.alert_thresholds, vec![80, 90, 100]);
    }

    #[test]
    fn price_table_uses_configured_defaults() {
        let mut config = EngineConfig::default();
        config.default_prices.input_micros_per_million = 42;

        let table = config.price_table();
        let entry = table.resolve("unknown-vendor", "unknown-model");
        assert_eq!(entry.input_micros_per_million, 42);
    }
}
