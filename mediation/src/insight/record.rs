//! The per-request diagnostic aggregate.

use serde::Serialize;

use crate::context::RequestContext;
use crate::error::AdapterError;
use crate::placement::PriorityRule;

/// Error payload attached to a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrashReport {
    /// Failure kind code, e.g. `network_no_fill`.
    pub error: String,
    /// Human-readable detail from the provider.
    pub details: String,
}

impl From<&AdapterError> for CrashReport {
    fn from(err: &AdapterError) -> Self {
        Self {
            error: err.kind().code().to_string(),
            details: err.to_string(),
        }
    }
}

/// One provider attempt within a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkAttempt {
    pub code: String,
    pub priority_rule_id: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub priority_segment_ids: Vec<u32>,
    /// Response latency in milliseconds.
    pub response_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_report: Option<CrashReport>,
}

/// Diagnostic record describing one placement request.
///
/// Serializes to the flat key/value document handed to the insight
/// transport. Absent scalars and empty lists are omitted.
///
/// Equality is structural over every field, so a record refilled after
/// [`reset`](Self::reset) compares equal to a fresh one built from the same
/// inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsightRecord {
    // Tracking info
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempted_networks: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unreachable_networks: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub delivery_segment_ids: Vec<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_app_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_app_bundle_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_format_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_start: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_complete: Option<bool>,
    pub retry: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_error: Option<String>,

    // User info
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iap_total: Option<f32>,

    /// Epoch milliseconds at which the walk finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<i64>,
}

impl InsightRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one provider attempt to the attempt list.
    pub fn add_network(
        &mut self,
        rule: &PriorityRule,
        response_time_ms: u64,
        crash_report: Option<CrashReport>,
    ) {
        self.networks.push(NetworkAttempt {
            code: rule.network_code().to_string(),
            priority_rule_id: rule.id(),
            priority_segment_ids: rule.segment_ids().to_vec(),
            response_time: response_time_ms,
            crash_report,
        });
    }

    /// Append to `attempted_networks`. Empty codes are ignored.
    pub fn add_attempted_network(&mut self, network: &str) {
        if !network.is_empty() {
            self.attempted_networks.push(network.to_string());
        }
    }

    /// Append to `unreachable_networks`. Empty codes are ignored.
    pub fn add_unreachable_network(&mut self, network: &str) {
        if !network.is_empty() {
            self.unreachable_networks.push(network.to_string());
        }
    }

    /// Populate the static device, app and targeting fields.
    pub fn fill_context(&mut self, context: &RequestContext) {
        let device = &context.device;
        self.os_version = device.os_version.clone();
        self.device_name = device.device_name.clone();
        self.user_uid = device.user_uid.clone();
        self.connection_type = device.connection.map(|c| c.code().to_string());

        let app = &context.app;
        self.pub_app_version = app.version.clone();
        self.pub_app_bundle_id = app.bundle_id.clone();
        self.sdk_version = app.sdk_version.clone();

        if let Some(targeting) = &context.targeting {
            self.age = targeting.age;
            self.education = targeting.education.clone();
            self.interests = targeting.interests.clone();
            self.gender = targeting.gender.clone();
            self.iap = targeting.iap;
            self.iap_total = targeting.iap_total;
        }
    }

    /// Clear every field back to its empty state.
    ///
    /// Context fields are cleared as well; the next walk fills them again.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of provider attempts recorded.
    pub fn attempt_count(&self) -> usize {
        self.networks.len()
    }

    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
