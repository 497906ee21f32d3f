//! Request context supplied by the host application.
//!
//! The context describes the device, the publishing app and optional user
//! targeting. Adapters read it to build provider requests; the insight
//! recorder snapshots it once per walk.

use std::fmt;

/// Active network connection of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Wifi,
    Cellular,
}

impl ConnectionType {
    pub fn code(&self) -> &'static str {
        match self {
            ConnectionType::Wifi => "wifi",
            ConnectionType::Cellular => "cellular",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Static facts about the device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub os_version: Option<String>,
    pub device_name: Option<String>,
    /// Advertising identifier, if the user allows it.
    pub user_uid: Option<String>,
    /// `None` when the device is offline.
    pub connection: Option<ConnectionType>,
}

/// Static facts about the publishing application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppInfo {
    pub version: Option<String>,
    pub bundle_id: Option<String>,
    pub sdk_version: Option<String>,
}

/// Optional user targeting forwarded to providers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Targeting {
    pub age: Option<u32>,
    pub education: Option<String>,
    pub interests: Option<Vec<String>>,
    pub gender: Option<String>,
    /// In-app purchases enabled.
    pub iap: Option<bool>,
    /// Total spent on in-app purchases.
    pub iap_total: Option<f32>,
}

impl Targeting {
    /// Flatten into provider query parameters, skipping absent fields.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(age) = self.age {
            params.push(("age".to_string(), age.to_string()));
        }
        if let Some(education) = &self.education {
            params.push(("education".to_string(), education.clone()));
        }
        if let Some(interests) = &self.interests {
            if !interests.is_empty() {
                params.push(("interests".to_string(), interests.join(",")));
            }
        }
        if let Some(gender) = &self.gender {
            params.push(("gender".to_string(), gender.clone()));
        }
        if let Some(iap) = self.iap {
            params.push(("iap".to_string(), iap.to_string()));
        }
        if let Some(total) = self.iap_total {
            params.push(("iap_total".to_string(), total.to_string()));
        }
        params
    }
}

/// Everything an ad request knows about its environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub device: DeviceInfo,
    pub app: AppInfo,
    pub targeting: Option<Targeting>,
}

impl RequestContext {
    pub fn new(device: DeviceInfo, app: AppInfo) -> Self {
        Self {
            device,
            app,
            targeting: None,
        }
    }

    pub fn with_targeting(mut self, targeting: Targeting) -> Self {
        self.targeting = Some(targeting);
        self
    }

    /// Check the context is usable for a request.
    ///
    /// An app without a bundle identifier cannot be attributed by any
    /// provider, so the request is rejected before the walk starts.
    pub fn validate(&self) -> Result<(), String> {
        match self.app.bundle_id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(()),
            _ => Err("app bundle id is required".to_string()),
        }
    }
}
