//! Resource Priority Scoring
//!
//! Scores how urgently an individual resource should be fetched, from:
//!
//! - its type (styles before scripts before fonts before images)
//! - whether it is visible in the viewport
//! - how often it has been used before
//! - how likely the user is to navigate to a page that uses it
//! - caller-supplied content relevance
//!
//! The scorer is independent of the governors. Usage statistics are keyed by
//! the URL without query string or fragment.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       vassago-priority                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  record_resource_usage ──> UsageTracker ──────┐                 │
//! │          │                 (count, load times) │                 │
//! │          └──> page resources ──┐               ↓                 │
//! │                                ├──> ResourcePriorityScorer       │
//! │  record_navigation ──> NavigationTable         │                 │
//! │                        (rows sum to 1)         ↓                 │
//! │                                     PriorityScore ∈ [0, 1]       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod navigation;
mod resource;
mod scorer;
mod usage;

pub use error::{PriorityError, Result};
pub use navigation::NavigationTable;
pub use resource::{
    normalize_url, ResourcePerformance, ResourceRef, ResourceType, ScoringContext,
};
pub use scorer::{PriorityScore, ResourcePriorityScorer, ScorerConfig};
pub use usage::{ResourceUsageStat, UsageTracker};

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        ResourcePerformance, ResourcePriorityScorer, ResourceRef, ResourceType, Result,
        ScorerConfig, ScoringContext,
    };
}
