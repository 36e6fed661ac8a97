//! Resource priority scorer

use crate::navigation::NavigationTable;
use crate::resource::{normalize_url, ResourcePerformance, ResourceRef, ResourceType, ScoringContext};
use crate::usage::{ResourceUsageStat, UsageTracker};
use crate::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};
use vassago_core::CoreError;

/// Priority scorer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Base priority per resource type
    pub type_weights: HashMap<ResourceType, f64>,
    /// Base priority for types missing from `type_weights`
    pub fallback_weight: f64,
    /// Added when the resource is in the viewport
    pub viewport_boost: f64,
    /// Weight of the usage frequency component
    pub usage_weight: f64,
    /// Usage count at which the usage component saturates
    pub usage_saturation: u64,
    /// Weight of the navigation prediction component
    pub navigation_weight: f64,
    /// Weight of the caller-supplied content relevance
    pub relevance_weight: f64,
    /// Load times kept per resource
    pub load_time_history_size: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        let type_weights = HashMap::from([
            (ResourceType::Script, 0.8),
            (ResourceType::Style, 0.9),
            (ResourceType::Image, 0.6),
            (ResourceType::Font, 0.7),
            (ResourceType::Other, 0.5),
        ]);

        Self {
            type_weights,
            fallback_weight: 0.5,
            viewport_boost: 0.4,
            usage_weight: 0.3,
            usage_saturation: 10,
            navigation_weight: 0.2,
            relevance_weight: 0.1,
            load_time_history_size: 10,
        }
    }
}

impl ScorerConfig {
    /// Parse from JSON, filling gaps with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(CoreError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Base priority for a resource type
    pub fn type_weight(&self, resource_type: ResourceType) -> f64 {
        self.type_weights
            .get(&resource_type)
            .copied()
            .unwrap_or(self.fallback_weight)
    }

    /// Reject negative weights and empty buffers
    pub fn validate(&self) -> Result<()> {
        let result = self.check();
        if let Err(e) = &result {
            warn!("Rejecting scorer config: {}", e);
        }
        result
    }

    fn check(&self) -> Result<()> {
        for (resource_type, &weight) in &self.type_weights {
            CoreError::check_weight(resource_type.as_str(), weight)?;
        }
        CoreError::check_weight("fallback_weight", self.fallback_weight)?;
        CoreError::check_weight("viewport_boost", self.viewport_boost)?;
        CoreError::check_weight("usage_weight", self.usage_weight)?;
        CoreError::check_weight("navigation_weight", self.navigation_weight)?;
        CoreError::check_weight("relevance_weight", self.relevance_weight)?;
        CoreError::check_capacity("usage_saturation", self.usage_saturation as usize)?;
        CoreError::check_capacity("load_time_history_size", self.load_time_history_size)?;
        Ok(())
    }
}

/// Priority with its per-component breakdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityScore {
    /// Resource type base
    pub base: f64,
    /// Viewport boost
    pub viewport: f64,
    /// Usage frequency component
    pub usage: f64,
    /// Navigation prediction component
    pub navigation: f64,
    /// Content relevance component
    pub relevance: f64,
    /// Sum of the components clamped to [0, 1]
    pub total: f64,
}

/// Scores how urgently a resource should be fetched
///
/// Learns from recorded resource usage and page navigation. Resources used
/// while a page is current are associated with that page, so a likely next
/// page raises the priority of its resources.
pub struct ResourcePriorityScorer {
    config: ScorerConfig,
    usage: UsageTracker,
    navigation: RwLock<NavigationTable>,
    page_resources: DashMap<String, HashSet<String>>,
    current_page: RwLock<Option<String>>,
}

impl ResourcePriorityScorer {
    /// Create a scorer
    pub fn new(config: ScorerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            usage: UsageTracker::new(config.load_time_history_size),
            config,
            navigation: RwLock::new(NavigationTable::new()),
            page_resources: DashMap::new(),
            current_page: RwLock::new(None),
        })
    }

    /// Scorer configuration
    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score a resource with its breakdown
    pub fn score(&self, resource: &ResourceRef, context: &ScoringContext) -> PriorityScore {
        let config = &self.config;
        let key = resource.key();

        let base = config.type_weight(resource.resource_type);
        let viewport = if context.in_viewport {
            config.viewport_boost
        } else {
            0.0
        };

        let count = self.usage.usage_count(&key);
        let usage = (count as f64 / config.usage_saturation as f64).min(1.0) * config.usage_weight;

        let from = match &context.current_page {
            Some(page) => Some(normalize_url(page)),
            None => self.current_page(),
        };
        let navigation = from.map_or(0.0, |page| {
            self.navigation_probability(&page, &key) * config.navigation_weight
        });

        let relevance = context
            .content_relevance
            .filter(|r| r.is_finite())
            .map_or(0.0, |r| r.clamp(0.0, 1.0) * config.relevance_weight);

        let total = (base + viewport + usage + navigation + relevance).clamp(0.0, 1.0);

        PriorityScore {
            base,
            viewport,
            usage,
            navigation,
            relevance,
            total,
        }
    }

    /// Priority in [0, 1]
    pub fn calculate_priority_factor(&self, resource: &ResourceRef, context: &ScoringContext) -> f64 {
        self.score(resource, context).total
    }

    /// Sort resources by priority, highest first
    ///
    /// Equal priorities keep their input order.
    pub fn rank(&self, resources: &[ResourceRef], context: &ScoringContext) -> Vec<(ResourceRef, f64)> {
        let mut ranked: Vec<(ResourceRef, f64)> = resources
            .iter()
            .map(|r| (r.clone(), self.calculate_priority_factor(r, context)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Record a resource use on the current page
    pub fn record_resource_usage(&self, url: &str, resource_type: ResourceType, perf: ResourcePerformance) {
        let key = normalize_url(url);
        let count = self.usage.record(&key, resource_type, &perf);

        if let Some(page) = self.current_page() {
            self.page_resources.entry(page).or_default().insert(key.clone());
        }
        debug!("Resource {} used {} times", key, count);
    }

    /// Record a page transition and make `to` the current page
    pub fn record_navigation(&self, from: &str, to: &str) {
        let from = normalize_url(from);
        let to = normalize_url(to);

        self.navigation
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&from, &to);
        debug!("Navigation {} -> {}", from, to);

        *self.current_page.write().unwrap_or_else(PoisonError::into_inner) = Some(to);
    }

    /// Set the page subsequent resource usage is attributed to
    pub fn set_current_page(&self, url: &str) {
        *self.current_page.write().unwrap_or_else(PoisonError::into_inner) = Some(normalize_url(url));
    }

    /// Page resource usage is currently attributed to
    pub fn current_page(&self) -> Option<String> {
        self.current_page
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Usage statistics for a resource
    pub fn usage(&self, url: &str) -> Option<ResourceUsageStat> {
        self.usage.get(&normalize_url(url))
    }

    /// Most used resources, highest count first
    pub fn top_resources(&self, n: usize) -> Vec<(String, u64)> {
        self.usage.top_resources(n)
    }

    /// The `n` most likely pages after `from`
    pub fn predict_next(&self, from: &str, n: usize) -> Vec<(String, f64)> {
        self.navigation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .predict_next(&normalize_url(from), n)
    }

    /// Copy of the transition table
    pub fn navigation_table(&self) -> NavigationTable {
        self.navigation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resources recorded while `page` was current
    pub fn page_resources(&self, page: &str) -> Vec<String> {
        let mut resources: Vec<String> = self
            .page_resources
            .get(&normalize_url(page))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        resources.sort();
        resources
    }

    /// Highest transition probability from `from` to a page using `key`
    fn navigation_probability(&self, from: &str, key: &str) -> f64 {
        let navigation = self.navigation.read().unwrap_or_else(PoisonError::into_inner);
        let Some(transitions) = navigation.transitions(from) else {
            return 0.0;
        };

        transitions
            .iter()
            .filter(|(page, _)| {
                self.page_resources
                    .get(page.as_str())
                    .map_or(false, |set| set.contains(key))
            })
            .map(|(_, &p)| p)
            .fold(0.0, f64::max)
    }
}
