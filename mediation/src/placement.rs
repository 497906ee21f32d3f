//! Placement configuration types.
//!
//! A placement is an ad slot in the host application. It owns the ordered
//! waterfall of [`PriorityRule`]s to try and a [`DeliveryRule`] describing
//! the audience segments it was delivered for.
//!
//! # Example
//!
//! ```
//! use mediation::placement::{AdFormat, PlacementConfig, PriorityRule};
//!
//! let placement = PlacementConfig::new("home_feed", AdFormat::Banner)
//!     .with_rule(PriorityRule::new(1, "feed").with_param("app_token", "abc"))
//!     .with_rule(PriorityRule::new(2, "sandbox").with_param("outcome", "fill"));
//!
//! assert_eq!(placement.priority_rules().len(), 2);
//! assert_eq!(placement.priority_rule(0).unwrap().network_code(), "feed");
//! ```

use std::collections::BTreeMap;
use std::fmt;

/// Creative format served by a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdFormat {
    /// Native ad rendered around its icon.
    Icon,
    /// Native ad rendered around its banner image.
    #[default]
    Banner,
    /// Feed video.
    Video,
}

impl AdFormat {
    pub fn code(&self) -> &'static str {
        match self {
            AdFormat::Icon => "icon",
            AdFormat::Banner => "banner",
            AdFormat::Video => "video",
        }
    }

    /// Parse from a format code, case-insensitively.
    pub fn from_code(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "icon" => Some(AdFormat::Icon),
            "banner" => Some(AdFormat::Banner),
            "video" => Some(AdFormat::Video),
            _ => None,
        }
    }
}

impl fmt::Display for AdFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One waterfall entry: a provider code bound to its request parameters.
///
/// The same provider may appear several times in one waterfall with
/// different parameters (for example two ad spaces of one network).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityRule {
    id: u32,
    network_code: String,
    params: BTreeMap<String, String>,
    segment_ids: Vec<u32>,
}

impl PriorityRule {
    pub fn new(id: u32, network_code: impl Into<String>) -> Self {
        Self {
            id,
            network_code: network_code.into(),
            params: BTreeMap::new(),
            segment_ids: Vec::new(),
        }
    }

    /// Add a provider-specific request parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Attach the priority segments this rule was selected for.
    pub fn with_segments(mut self, segment_ids: Vec<u32>) -> Self {
        self.segment_ids = segment_ids;
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn network_code(&self) -> &str {
        &self.network_code
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Look up a parameter, treating empty values as absent.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn segment_ids(&self) -> &[u32] {
        &self.segment_ids
    }
}

/// Delivery gating data attached to a placement.
///
/// Gating decisions (frequency caps, pacing) happen outside this crate; the
/// segments are carried through so insights can report them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryRule {
    pub segment_ids: Vec<u32>,
}

/// Configuration of one ad slot, immutable for the duration of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementConfig {
    name: String,
    ad_format: AdFormat,
    priority_rules: Vec<PriorityRule>,
    delivery_rule: DeliveryRule,
}

impl PlacementConfig {
    pub fn new(name: impl Into<String>, ad_format: AdFormat) -> Self {
        Self {
            name: name.into(),
            ad_format,
            priority_rules: Vec::new(),
            delivery_rule: DeliveryRule::default(),
        }
    }

    /// Append a rule at the lowest priority.
    pub fn with_rule(mut self, rule: PriorityRule) -> Self {
        self.priority_rules.push(rule);
        self
    }

    pub fn with_delivery_rule(mut self, delivery_rule: DeliveryRule) -> Self {
        self.delivery_rule = delivery_rule;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ad_format(&self) -> AdFormat {
        self.ad_format
    }

    /// Rules in waterfall order; index 0 is tried first.
    pub fn priority_rules(&self) -> &[PriorityRule] {
        &self.priority_rules
    }

    pub fn priority_rule(&self, index: usize) -> Option<&PriorityRule> {
        self.priority_rules.get(index)
    }

    pub fn delivery_rule(&self) -> &DeliveryRule {
        &self.delivery_rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_keep_insertion_order() {
        let placement = PlacementConfig::new("p", AdFormat::Icon)
            .with_rule(PriorityRule::new(10, "a"))
            .with_rule(PriorityRule::new(20, "b"))
            .with_rule(PriorityRule::new(30, "a").with_param("space", "2"));

        let codes: Vec<_> = placement
            .priority_rules()
            .iter()
            .map(|r| r.network_code())
            .collect();
        assert_eq!(codes, vec!["a", "b", "a"]);
        assert!(placement.priority_rule(3).is_none());
    }

    #[test]
    fn test_empty_param_is_absent() {
        let rule = PriorityRule::new(1, "feed")
            .with_param("app_token", "  ")
            .with_param("endpoint", "https://ads.example.com");

        assert_eq!(rule.param("app_token"), None);
        assert_eq!(rule.param("endpoint"), Some("https://ads.example.com"));
        assert_eq!(rule.param("missing"), None);
    }

    #[test]
    fn test_ad_format_from_code() {
        assert_eq!(AdFormat::from_code("ICON"), Some(AdFormat::Icon));
        assert_eq!(AdFormat::from_code("video"), Some(AdFormat::Video));
        assert_eq!(AdFormat::from_code("interstitial"), None);
        assert_eq!(AdFormat::default(), AdFormat::Banner);
    }
}
