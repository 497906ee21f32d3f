//! Error taxonomy for provider attempts and waterfall walks.
//!
//! Two layers of errors exist:
//!
//! - [`AdapterError`]: one provider attempt failed. The waterfall absorbs
//!   these, records them as insight attempts, and moves on to the next rule.
//! - [`WaterfallError`]: the caller-visible terminal outcome. Only pre-walk
//!   configuration problems and full exhaustion surface here.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::insight::InsightRecord;

/// Classification of a failed provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Required rule parameters were absent or empty.
    MissingData,
    /// Caller-supplied context was invalid.
    IllegalArguments,
    /// No adapter is registered for the rule's provider code.
    AdapterMissing,
    /// Transport or network failure.
    Unreachable,
    /// Provider did not answer before the load deadline.
    Timeout,
    /// Provider answered but had nothing to serve.
    NoFill,
    /// Provider-specific error with an opaque payload.
    Unknown,
}

impl FailureKind {
    /// Stable code used in insight crash reports.
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::MissingData => "adapter_missing_data",
            FailureKind::IllegalArguments => "adapter_illegal_arguments",
            FailureKind::AdapterMissing => "adapter_not_found",
            FailureKind::Unreachable => "network_unreachable",
            FailureKind::Timeout => "network_timeout",
            FailureKind::NoFill => "network_no_fill",
            FailureKind::Unknown => "adapter_unknown_error",
        }
    }

    /// Whether the provider should be listed as unreachable in insights.
    ///
    /// A deadline expiry is treated like a transport failure: the provider
    /// never produced an answer.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, FailureKind::Unreachable | FailureKind::Timeout)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Failure reported for a single provider attempt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdapterError {
    #[error("missing required parameter: {0}")]
    MissingData(String),

    #[error("illegal arguments: {0}")]
    IllegalArguments(String),

    #[error("no adapter registered for network '{0}'")]
    AdapterMissing(String),

    #[error("network unreachable: {0}")]
    Unreachable(String),

    #[error("no response within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("no fill")]
    NoFill,

    #[error("provider error {code} ({kind})")]
    Unknown { code: i64, kind: String },
}

impl AdapterError {
    /// Creates an opaque provider error from its native code and type name.
    pub fn unknown(code: i64, kind: impl Into<String>) -> Self {
        AdapterError::Unknown {
            code,
            kind: kind.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AdapterError::MissingData(_) => FailureKind::MissingData,
            AdapterError::IllegalArguments(_) => FailureKind::IllegalArguments,
            AdapterError::AdapterMissing(_) => FailureKind::AdapterMissing,
            AdapterError::Unreachable(_) => FailureKind::Unreachable,
            AdapterError::Timeout(_) => FailureKind::Timeout,
            AdapterError::NoFill => FailureKind::NoFill,
            AdapterError::Unknown { .. } => FailureKind::Unknown,
        }
    }
}

/// Terminal outcome of a waterfall walk that produced no ad.
#[derive(Debug, Error)]
pub enum WaterfallError {
    /// The placement has no priority rules at all.
    #[error("placement '{0}' has no priority rules")]
    EmptyWaterfall(String),

    /// The placement itself is missing required data.
    #[error("missing placement data: {0}")]
    MissingData(String),

    /// The request context is unusable.
    #[error("illegal request arguments: {0}")]
    IllegalArguments(String),

    /// Every rule was tried and none produced an ad.
    #[error("all {attempts} networks failed for placement '{placement}'")]
    Exhausted {
        placement: String,
        attempts: usize,
        insight: Box<InsightRecord>,
    },
}

impl WaterfallError {
    /// Attempt history recorded before the walk gave up, if any walk ran.
    pub fn insight(&self) -> Option<&InsightRecord> {
        match self {
            WaterfallError::Exhausted { insight, .. } => Some(insight),
            _ => None,
        }
    }
}
