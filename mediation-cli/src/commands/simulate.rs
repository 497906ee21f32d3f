//! Simulate command - run a waterfall and print its insight.
//!
//! Rules are given as `network[:outcome[:delay_ms]][:key=value...]`:
//!
//! ```text
//! mediation simulate --placement home --rule sandbox:unreachable \
//!     --rule sandbox:no_fill:40 --rule sandbox:fill:15:icon_url=https://cdn/i.png
//! ```

use std::sync::Arc;

use clap::{Args, ValueEnum};
use console::style;
use mediation::config::ConfigFile;
use mediation::context::{AppInfo, DeviceInfo, RequestContext};
use mediation::insight::{InsightRecord, LoggingSink};
use mediation::mediator::{MediatedAd, Mediator};
use mediation::placement::{AdFormat, PlacementConfig, PriorityRule};
use mediation::WaterfallError;

use crate::error::CliError;

/// Placement format selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FormatArg {
    Icon,
    Banner,
    Video,
}

impl From<FormatArg> for AdFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Icon => AdFormat::Icon,
            FormatArg::Banner => AdFormat::Banner,
            FormatArg::Video => AdFormat::Video,
        }
    }
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Placement name
    #[arg(long, default_value = "cli_placement")]
    pub placement: String,

    /// Priority rule, tried in the order given
    /// (network[:outcome[:delay_ms]][:key=value...])
    #[arg(long = "rule", value_name = "SPEC")]
    pub rules: Vec<String>,

    /// Placement format
    #[arg(long, value_enum, default_value_t = FormatArg::Banner)]
    pub format: FormatArg,

    /// Per-network load deadline in milliseconds (overrides config)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Skip asset pre-fetch
    #[arg(long)]
    pub no_prefetch: bool,

    /// Bundle identifier reported as the requesting app
    #[arg(long, default_value = "com.example.mediation.cli")]
    pub bundle_id: String,
}

/// Parse one `--rule` value.
///
/// Positional parts after the network code are the sandbox `outcome` and
/// `delay_ms`; any part containing `=` is a raw parameter.
pub fn parse_rule(id: u32, spec: &str) -> Result<PriorityRule, CliError> {
    let mut parts = spec.split(':');
    let network = parts
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| CliError::InvalidArgument(format!("rule '{}' has no network", spec)))?;

    let mut rule = PriorityRule::new(id, network);
    let mut positional = ["outcome", "delay_ms"].into_iter();

    // Values such as URLs contain ':'; rejoin pieces that follow a key=value.
    let mut merged: Vec<String> = Vec::new();
    for part in parts {
        match merged.last_mut() {
            Some(last) if last.contains('=') && !part.contains('=') => {
                last.push(':');
                last.push_str(part);
            }
            _ => merged.push(part.to_string()),
        }
    }

    for part in merged {
        if let Some((key, value)) = part.split_once('=') {
            rule = rule.with_param(key.trim(), value.trim());
        } else if let Some(key) = positional.next() {
            rule = rule.with_param(key, part.trim());
        } else {
            return Err(CliError::InvalidArgument(format!(
                "unexpected part '{}' in rule '{}'",
                part, spec
            )));
        }
    }
    Ok(rule)
}

pub fn build_placement(args: &SimulateArgs) -> Result<PlacementConfig, CliError> {
    args.rules
        .iter()
        .enumerate()
        .try_fold(
            PlacementConfig::new(args.placement.clone(), args.format.into()),
            |placement, (i, spec)| Ok(placement.with_rule(parse_rule(i as u32 + 1, spec)?)),
        )
}

fn build_context(args: &SimulateArgs) -> RequestContext {
    RequestContext::new(
        DeviceInfo {
            os_version: Some(std::env::consts::OS.to_string()),
            ..Default::default()
        },
        AppInfo {
            bundle_id: Some(args.bundle_id.clone()),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            sdk_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        },
    )
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, mut config: ConfigFile) -> Result<(), CliError> {
    if args.rules.is_empty() {
        return Err(CliError::InvalidArgument(
            "at least one --rule is required".to_string(),
        ));
    }
    if let Some(ms) = args.timeout_ms {
        config.waterfall.load_timeout_ms = ms.max(1);
    }
    if args.no_prefetch {
        config.assets.prefetch = false;
    }

    let placement = build_placement(&args)?;
    let context = build_context(&args);
    let mediator = Mediator::from_config_file(&config, Arc::new(LoggingSink))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    tracing::debug!(
        placement = placement.name(),
        rules = placement.priority_rules().len(),
        "Simulating waterfall"
    );
    match runtime.block_on(mediator.request(&placement, &context)) {
        Ok(ad) => {
            print_chosen(&ad)?;
            ad.handle.destroy();
            Ok(())
        }
        Err(e) => {
            if let Some(insight) = e.insight() {
                print_exhausted(&e, insight)?;
            }
            Err(e.into())
        }
    }
}

fn print_chosen(ad: &MediatedAd) -> Result<(), CliError> {
    let handle = &ad.handle;
    println!(
        "{} {}",
        style("Chosen network:").green().bold(),
        handle.network_code()
    );
    if let Some(title) = handle.title() {
        println!("  title:   {}", title);
    }
    println!("  rating:  {:.1}", handle.star_rating());
    println!(
        "  assets:  icon {}, banner {}",
        asset_state(handle.icon_url(), handle.icon().is_some()),
        asset_state(handle.banner_url(), handle.banner().is_some()),
    );
    println!();
    print_insight(&ad.insight)
}

fn print_exhausted(err: &WaterfallError, insight: &InsightRecord) -> Result<(), CliError> {
    println!("{} {}", style("No fill:").red().bold(), err);
    for attempt in &insight.networks {
        let outcome = attempt
            .crash_report
            .as_ref()
            .map(|c| c.details.as_str())
            .unwrap_or("filled");
        println!(
            "  rule {:>3}  {:<12} {:>6}ms  {}",
            attempt.priority_rule_id, attempt.code, attempt.response_time, outcome
        );
    }
    println!();
    print_insight(insight)
}

fn print_insight(insight: &InsightRecord) -> Result<(), CliError> {
    println!("{}", style("Insight:").bold());
    println!("{}", serde_json::to_string_pretty(&insight.to_document()?)?);
    Ok(())
}

fn asset_state(url: Option<&str>, cached: bool) -> &'static str {
    match (url.filter(|u| !u.is_empty()), cached) {
        (None, _) => "none",
        (Some(_), true) => "cached",
        (Some(_), false) => "failed",
    }
}
