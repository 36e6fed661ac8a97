//! Resource descriptors and URL normalization

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Kind of a fetchable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Script,
    Style,
    Image,
    Font,
    #[default]
    Other,
}

impl ResourceType {
    /// All resource types
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Script,
        ResourceType::Style,
        ResourceType::Image,
        ResourceType::Font,
        ResourceType::Other,
    ];

    /// Guess the type from the URL path extension
    pub fn infer(url: &str) -> Self {
        let path = strip_query_and_fragment(url);
        let extension = path
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("js" | "mjs" | "cjs") => ResourceType::Script,
            Some("css") => ResourceType::Style,
            Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "avif" | "ico") => {
                ResourceType::Image
            }
            Some("woff" | "woff2" | "ttf" | "otf" | "eot") => ResourceType::Font,
            _ => ResourceType::Other,
        }
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Script => "script",
            ResourceType::Style => "style",
            ResourceType::Image => "image",
            ResourceType::Font => "font",
            ResourceType::Other => "other",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource the caller is about to fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource URL, as the caller will request it
    pub url: String,
    /// Resource type
    pub resource_type: ResourceType,
}

impl ResourceRef {
    /// Create a reference with an explicit type
    pub fn new(url: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            url: url.into(),
            resource_type,
        }
    }

    /// Create a reference, inferring the type from the URL
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let resource_type = ResourceType::infer(&url);
        Self { url, resource_type }
    }

    /// Normalized usage key
    pub fn key(&self) -> String {
        normalize_url(&self.url)
    }
}

/// Where and how a resource is about to be used
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringContext {
    /// Resource is visible in the viewport
    pub in_viewport: bool,
    /// Page to predict navigation from; the scorer's current page if unset
    pub current_page: Option<String>,
    /// Caller-supplied relevance to the visible content (0.0 - 1.0)
    pub content_relevance: Option<f64>,
}

impl ScoringContext {
    /// Context for a resource outside the viewport
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark visible
    pub fn in_viewport(mut self) -> Self {
        self.in_viewport = true;
        self
    }

    /// Predict from a specific page
    pub fn with_current_page(mut self, page: impl Into<String>) -> Self {
        self.current_page = Some(page.into());
        self
    }

    /// Set content relevance
    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.content_relevance = Some(relevance);
        self
    }
}

/// Observed fetch of one resource
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourcePerformance {
    /// Fetch time in ms
    pub load_time_ms: f64,
    /// Transferred bytes, if known
    pub transfer_bytes: Option<u64>,
}

impl ResourcePerformance {
    /// Create from a fetch time
    pub fn new(load_time_ms: f64) -> Self {
        Self {
            load_time_ms,
            transfer_bytes: None,
        }
    }

    /// Set transferred bytes
    pub fn with_transfer_bytes(mut self, bytes: u64) -> Self {
        self.transfer_bytes = Some(bytes);
        self
    }
}

/// Usage key for a URL: the URL without query string or fragment
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        // Relative URLs have no base to resolve against
        Err(_) => strip_query_and_fragment(raw.trim()).to_string(),
    }
}

fn strip_query_and_fragment(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_from_extension() {
        assert_eq!(ResourceType::infer("/static/app.js?v=3"), ResourceType::Script);
        assert_eq!(ResourceType::infer("https://cdn.example.com/site.CSS"), ResourceType::Style);
        assert_eq!(ResourceType::infer("/img/hero.webp#top"), ResourceType::Image);
        assert_eq!(ResourceType::infer("/fonts/inter.woff2"), ResourceType::Font);
        assert_eq!(ResourceType::infer("/api/products"), ResourceType::Other);
        assert_eq!(ResourceType::infer("/v1.2/data"), ResourceType::Other);
    }

    #[test]
    fn test_normalize_absolute_url() {
        assert_eq!(
            normalize_url("https://example.com/app.js?v=123#main"),
            "https://example.com/app.js"
        );
        assert_eq!(
            normalize_url("https://example.com/app.js?v=1"),
            normalize_url("https://example.com/app.js?v=2")
        );
    }

    #[test]
    fn test_normalize_relative_url() {
        assert_eq!(normalize_url("/static/logo.png?size=2x"), "/static/logo.png");
        assert_eq!(normalize_url("products#reviews"), "products");
        assert_eq!(normalize_url("  /plain  "), "/plain");
    }

    #[test]
    fn test_resource_type_wire_names() {
        let json = serde_json::to_string(&ResourceType::Style).unwrap();
        assert_eq!(json, "\"style\"");
        assert_eq!(ResourceType::Font.to_string(), "font");
    }
}
