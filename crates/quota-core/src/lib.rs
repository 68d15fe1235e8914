//! Core types for the quota admission-control engine.
//!
//! This crate provides the foundational types used throughout the quota
//! platform:
//!
//! - **Identifiers**: `UserId`, `LogEntryId`
//! - **Plans**: `Plan`, `CategoryLimits`, `Subscription`, `BillingCycle`
//! - **Categories**: `ResourceCategory`
//! - **Ledger**: `UsageSummary`, `UsageLogEntry`, `UsageAlert`
//! - **Pricing**: `PriceTable`, `PriceEntry`, `CostBreakdown`
//!
//! # Micro-dollar unit
//!
//! **1,000,000 micros = $1** (dollars at six decimal places)
//!
//! - A call costing $0.03 accrues 30,000 micros to the ledger
//! - Stored as `i64` to avoid floating point drift in accumulation
//! - A limit value of 0 always means *unlimited*

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod category;
pub mod error;
pub mod ids;
pub mod plan;
pub mod pricing;
pub mod usage;

pub use category::ResourceCategory;
pub use error::{QuotaError, Result};
pub use ids::{IdError, LogEntryId, UserId};
pub use plan::{
    BillingCycle, CategoryLimits, Plan, Subscription, FREE_TIER, MONTHLY_PERIOD_DAYS,
    YEARLY_PERIOD_DAYS,
};
pub use pricing::{
    CostBreakdown, ModelKey, PriceEntry, PriceTable, DEFAULT_INPUT_MICROS_PER_MILLION,
    DEFAULT_MODEL, DEFAULT_OUTPUT_MICROS_PER_MILLION, DEFAULT_REQUEST_MICROS,
};
pub use usage::{
    AlertSeverity, CategoryUsage, Counters, UsageAlert, UsageLogEntry, UsageStatus, UsageSummary,
    LIMIT_REACHED_PERCENT, WARNING_PERCENT,
};
