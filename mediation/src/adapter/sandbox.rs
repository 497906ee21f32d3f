//! Deterministic in-process network.
//!
//! The sandbox answers every request from its rule parameters, which makes
//! it useful for wiring tests and for simulating a waterfall from the
//! command line.
//!
//! | parameter    | meaning                                              |
//! |--------------|------------------------------------------------------|
//! | `outcome`    | `fill`, `no_fill`, `unreachable` or `error` (required) |
//! | `delay_ms`   | simulated response latency                           |
//! | `error_code` | native code reported with `outcome=error`            |
//! | `title`      | ad title                                             |
//! | `icon_url`   | icon image URL                                       |
//! | `banner_url` | banner image URL                                     |
//! | `rating`     | `"value/scale"` or a plain five-star value           |

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::ad::{rating, AdSignals, AdSurface, Disclosure, NativeAd};
use crate::adapter::NetworkAdapter;
use crate::context::RequestContext;
use crate::error::AdapterError;
use crate::placement::PriorityRule;
use crate::BoxFuture;

const SANDBOX_CODE: &str = "sandbox";

/// Native code reported for `outcome=error` without an `error_code`.
const DEFAULT_ERROR_CODE: i64 = -1;

/// Scripted response of a sandbox rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxOutcome {
    Fill,
    NoFill,
    Unreachable,
    Error,
}

impl SandboxOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            SandboxOutcome::Fill => "fill",
            SandboxOutcome::NoFill => "no_fill",
            SandboxOutcome::Unreachable => "unreachable",
            SandboxOutcome::Error => "error",
        }
    }
}

impl FromStr for SandboxOutcome {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fill" => Ok(SandboxOutcome::Fill),
            "no_fill" | "nofill" => Ok(SandboxOutcome::NoFill),
            "unreachable" => Ok(SandboxOutcome::Unreachable),
            "error" => Ok(SandboxOutcome::Error),
            other => Err(AdapterError::MissingData(format!(
                "unknown sandbox outcome '{}'",
                other
            ))),
        }
    }
}

struct SandboxPlan {
    outcome: SandboxOutcome,
    delay: Option<Duration>,
    error_code: i64,
}

/// Network driven entirely by its rule parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct SandboxAdapter;

impl SandboxAdapter {
    pub fn new() -> Self {
        Self
    }

    fn plan(rule: &PriorityRule) -> Result<SandboxPlan, AdapterError> {
        let outcome = rule
            .param("outcome")
            .ok_or_else(|| {
                AdapterError::MissingData(format!("sandbox rule {} has no outcome", rule.id()))
            })?
            .parse::<SandboxOutcome>()?;

        let delay = rule
            .param("delay_ms")
            .map(|raw| {
                raw.trim().parse::<u64>().map(Duration::from_millis).map_err(|_| {
                    AdapterError::MissingData(format!("malformed delay_ms '{}'", raw))
                })
            })
            .transpose()?;

        let error_code = rule
            .param("error_code")
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_ERROR_CODE);

        Ok(SandboxPlan {
            outcome,
            delay,
            error_code,
        })
    }
}

impl NetworkAdapter for SandboxAdapter {
    fn code(&self) -> &str {
        SANDBOX_CODE
    }

    fn required_params(&self) -> &[&'static str] {
        &["outcome"]
    }

    fn validate(&self, rule: &PriorityRule) -> Result<(), AdapterError> {
        Self::plan(rule).map(|_| ())
    }

    fn load<'a>(
        &'a self,
        rule: &'a PriorityRule,
        _context: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Box<dyn NativeAd>, AdapterError>> {
        Box::pin(async move {
            let plan = Self::plan(rule)?;
            if let Some(delay) = plan.delay {
                tokio::time::sleep(delay).await;
            }

            match plan.outcome {
                SandboxOutcome::Fill => Ok(Box::new(SandboxAd::from_rule(rule)) as Box<dyn NativeAd>),
                SandboxOutcome::NoFill => Err(AdapterError::NoFill),
                SandboxOutcome::Unreachable => Err(AdapterError::Unreachable(format!(
                    "sandbox rule {} simulated a connection failure",
                    rule.id()
                ))),
                SandboxOutcome::Error => Err(AdapterError::unknown(plan.error_code, "SandboxError")),
            }
        })
    }
}

/// Ad served by the sandbox.
///
/// Has no measurement of its own: impressions and clicks come from the
/// surface it is bound to.
pub struct SandboxAd {
    title: Option<String>,
    icon_url: Option<String>,
    banner_url: Option<String>,
    rating: f32,
    surface: Option<Arc<dyn AdSurface>>,
}

impl SandboxAd {
    fn from_rule(rule: &PriorityRule) -> Self {
        let rating = rule
            .param("rating")
            .and_then(|raw| {
                rating::parse_fraction(raw).or_else(|| {
                    raw.trim()
                        .parse::<f64>()
                        .ok()
                        .map(|stars| rating::normalize(stars, f64::from(rating::MAX_STARS)))
                })
            })
            .unwrap_or(0.0);

        Self {
            title: Some(rule.param("title").unwrap_or("Sandbox ad").to_string()),
            icon_url: rule.param("icon_url").map(String::from),
            banner_url: rule.param("banner_url").map(String::from),
            rating,
            surface: None,
        }
    }
}

impl NativeAd for SandboxAd {
    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn description(&self) -> Option<&str> {
        Some("Served by the sandbox network")
    }

    fn icon_url(&self) -> Option<&str> {
        self.icon_url.as_deref()
    }

    fn banner_url(&self) -> Option<&str> {
        self.banner_url.as_deref()
    }

    fn call_to_action(&self) -> Option<&str> {
        Some("Open")
    }

    fn star_rating(&self) -> f32 {
        self.rating
    }

    fn disclosure(&self) -> Option<Disclosure> {
        Some(Disclosure {
            label: "Sandbox".to_string(),
            link_url: None,
        })
    }

    fn start_tracking(&mut self, surface: Arc<dyn AdSurface>, signals: AdSignals) {
        surface.bind(signals);
        self.surface = Some(surface);
    }

    fn stop_tracking(&mut self) {
        if let Some(surface) = self.surface.take() {
            surface.unbind();
        }
    }

    fn destroy(&mut self) {
        self.stop_tracking();
    }
}
