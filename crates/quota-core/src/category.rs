//! Resource categories for the quota engine.
//!
//! A resource category is a logical bucket of paid capability (text
//! generation, image generation, ...) that may be fulfilled by one or more
//! interchangeable underlying vendors. Categories replace the original
//! system's convention of one ledger column per provider: counters and
//! limits are keyed by this enum instead of by field name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical bucket of paid capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    /// LLM text generation (chat, completion, prompt expansion).
    TextGeneration,

    /// Image generation.
    ImageGeneration,

    /// Video generation and rendering.
    VideoGeneration,

    /// A category not known to this build (forward compatibility).
    Custom(String),
}

impl ResourceCategory {
    /// Get the category name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TextGeneration => "text_generation",
            Self::ImageGeneration => "image_generation",
            Self::VideoGeneration => "video_generation",
            Self::Custom(name) => name,
        }
    }

    /// Whether vendors in this category share one unified call/token budget.
    ///
    /// LLM-style text generation is fulfilled by several interchangeable
    /// backends that draw from a single limit; image and video budgets are
    /// tracked per vendor.
    #[must_use]
    pub const fn is_unified(&self) -> bool {
        matches!(self, Self::TextGeneration)
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ResourceCategory {
    fn from(s: &str) -> Self {
        match s {
            "text_generation" => Self::TextGeneration,
            "image_generation" => Self::ImageGeneration,
            "video_generation" => Self::VideoGeneration,
            other => Self::Custom(other.to_string()),
        }
    }
}
