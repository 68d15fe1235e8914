//! Price table for the quota engine.
//!
//! Resolves a (provider, model) pair to per-unit costs and computes cost
//! breakdowns for completed calls. Resolution never fails: an exact
//! (provider, model) row wins, then the provider's "default" row, then the
//! global default entry, so accounting proceeds even for unknown models.
//!
//! # Money
//!
//! All amounts are integer micro-dollars (`i64`, 1,000,000 micros = $1),
//! i.e. dollars at six decimal places. Token prices are stored as micros
//! per million units so cost computation is pure integer arithmetic with no
//! floating drift in ledger accumulation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model name of a provider's fallback price row.
pub const DEFAULT_MODEL: &str = "default";

/// Global default price per million input tokens ($1.00).
pub const DEFAULT_INPUT_MICROS_PER_MILLION: i64 = 1_000_000;

/// Global default price per million output tokens ($3.00).
pub const DEFAULT_OUTPUT_MICROS_PER_MILLION: i64 = 3_000_000;

/// Global default flat price per request ($0).
pub const DEFAULT_REQUEST_MICROS: i64 = 0;

/// Key for looking up model pricing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    /// Provider name (e.g. "anthropic", "openai", "runway").
    pub provider: String,
    /// Model name (e.g. "claude-sonnet-4", or [`DEFAULT_MODEL`]).
    pub model: String,
}

impl ModelKey {
    /// Create a new model key.
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

/// Per-unit costs for one (provider, model) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    /// Micro-dollars per one million input units (tokens).
    pub input_micros_per_million: i64,

    /// Micro-dollars per one million output units (tokens).
    pub output_micros_per_million: i64,

    /// Flat micro-dollars per request.
    pub per_request_micros: i64,

    /// Micro-dollars per generated image.
    pub per_image_micros: i64,

    /// Micro-dollars per processed page.
    pub per_page_micros: i64,
}

impl PriceEntry {
    /// A token-priced entry (input/output per million).
    #[must_use]
    pub const fn tokens(input_micros_per_million: i64, output_micros_per_million: i64) -> Self {
        Self {
            input_micros_per_million,
            output_micros_per_million,
            per_request_micros: 0,
            per_image_micros: 0,
            per_page_micros: 0,
        }
    }

    /// A flat per-image entry.
    #[must_use]
    pub const fn per_image(per_image_micros: i64) -> Self {
        Self {
            input_micros_per_million: 0,
            output_micros_per_million: 0,
            per_request_micros: 0,
            per_image_micros,
            per_page_micros: 0,
        }
    }

    /// A flat per-request entry.
    #[must_use]
    pub const fn per_request(per_request_micros: i64) -> Self {
        Self {
            input_micros_per_million: 0,
            output_micros_per_million: 0,
            per_request_micros,
            per_image_micros: 0,
            per_page_micros: 0,
        }
    }
}

/// Cost breakdown for one call, in micro-dollars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Cost attributed to input units.
    pub input_micros: i64,

    /// Cost attributed to output units.
    pub output_micros: i64,

    /// Total cost including flat per-request/image/page charges.
    pub total_micros: i64,
}

/// The price table: model rows plus a global default entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTable {
    /// Per-model price rows.
    pub entries: HashMap<ModelKey, PriceEntry>,

    /// Global fallback when neither the model nor the provider is known.
    pub default_entry: PriceEntry,
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut entries = HashMap::new();

        // Text generation
        entries.insert(
            ModelKey::new("anthropic", "claude-sonnet-4"),
            PriceEntry::tokens(3_000_000, 15_000_000),
        );
        entries.insert(
            ModelKey::new("anthropic", "claude-haiku-3-5"),
            PriceEntry::tokens(800_000, 4_000_000),
        );
        entries.insert(
            ModelKey::new("anthropic", DEFAULT_MODEL),
            PriceEntry::tokens(3_000_000, 15_000_000),
        );
        entries.insert(
            ModelKey::new("openai", "gpt-4o"),
            PriceEntry::tokens(2_500_000, 10_000_000),
        );
        entries.insert(
            ModelKey::new("openai", "gpt-4o-mini"),
            PriceEntry::tokens(150_000, 600_000),
        );
        entries.insert(
            ModelKey::new("openai", DEFAULT_MODEL),
            PriceEntry::tokens(2_500_000, 10_000_000),
        );
        entries.insert(
            ModelKey::new("google", "gemini-2-flash"),
            PriceEntry::tokens(100_000, 400_000),
        );
        entries.insert(
            ModelKey::new("google", DEFAULT_MODEL),
            PriceEntry::tokens(1_250_000, 5_000_000),
        );

        // Image generation ($0.04 / $0.08 per image)
        entries.insert(
            ModelKey::new("openai-images", "dall-e-3"),
            PriceEntry::per_image(80_000),
        );
        entries.insert(
            ModelKey::new("openai-images", DEFAULT_MODEL),
            PriceEntry::per_image(40_000),
        );
        entries.insert(
            ModelKey::new("stability", DEFAULT_MODEL),
            PriceEntry::per_image(30_000),
        );

        // Video generation (flat per render request)
        entries.insert(
            ModelKey::new("runway", DEFAULT_MODEL),
            PriceEntry::per_request(500_000),
        );

        Self {
            entries,
            default_entry: PriceEntry {
                input_micros_per_million: DEFAULT_INPUT_MICROS_PER_MILLION,
                output_micros_per_million: DEFAULT_OUTPUT_MICROS_PER_MILLION,
                per_request_micros: DEFAULT_REQUEST_MICROS,
                per_image_micros: 0,
                per_page_micros: 0,
            },
        }
    }
}

impl PriceTable {
    /// Build a table with a custom global default entry.
    #[must_use]
    pub fn with_default_entry(mut self, entry: PriceEntry) -> Self {
        self.default_entry = entry;
        self
    }

    /// Insert or replace a price row.
    pub fn insert(&mut self, key: ModelKey, entry: PriceEntry) {
        self.entries.insert(key, entry);
    }

    /// Resolve the price entry for a (provider, model) pair.
    ///
    /// Resolution order: exact match, then the provider's
    /// [`DEFAULT_MODEL`] row, then the global default entry.
    #[must_use]
    pub fn resolve(&self, provider: &str, model: &str) -> &PriceEntry {
        self.entries
            .get(&ModelKey::new(provider, model))
            .or_else(|| self.entries.get(&ModelKey::new(provider, DEFAULT_MODEL)))
            .unwrap_or(&self.default_entry)
    }

    /// Compute the cost breakdown for one call. Pure; no side effects.
    #[must_use]
    pub fn compute_cost(
        entry: &PriceEntry,
        input_units: u64,
        output_units: u64,
        requests: u64,
        images: u64,
        pages: u64,
    ) -> CostBreakdown {
        let input_micros = per_million_cost(input_units, entry.input_micros_per_million);
        let output_micros = per_million_cost(output_units, entry.output_micros_per_million);
        let flat_micros = saturating_units(requests) * entry.per_request_micros
            + saturating_units(images) * entry.per_image_micros
            + saturating_units(pages) * entry.per_page_micros;

        CostBreakdown {
            input_micros,
            output_micros,
            total_micros: input_micros + output_micros + flat_micros,
        }
    }
}

fn saturating_units(units: u64) -> i64 {
    i64::try_from(units).unwrap_or(i64::MAX)
}

fn per_million_cost(units: u64, micros_per_million: i64) -> i64 {
    saturating_units(units) * micros_per_million / 1_000_000
}
