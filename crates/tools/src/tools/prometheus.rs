//! Prometheus Tools
//!
//! Query the Prometheus HTTP API (`/api/v1`) for metrics, labels, targets and rules.

use chrono::DateTime;
use lazy_static::lazy_static;
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{bound_tool, validate, NoArgs, ToolRegistry};
use crate::{http::HttpClient, Error, Result};

/// Prometheus API adapter
pub struct Prometheus {
    client: HttpClient,
}

lazy_static! {
    static ref UNIX_SECONDS: Regex = Regex::new(r"^\d+(\.\d+)?$").expect("valid unix seconds pattern");
}

/// Normalise a time argument to unix seconds. Accepts RFC 3339 or a plain decimal unix timestamp.
pub fn format_time(value: &str) -> Result<String> {
    let value = value.trim();
    if UNIX_SECONDS.is_match(value) {
        return Ok(value.to_string());
    }
    let parsed = DateTime::parse_from_rfc3339(value).map_err(|_| {
        Error::Validation(format!(
            "time '{}' must be an RFC 3339 timestamp or unix seconds",
            value
        ))
    })?;

    let nanos = i128::from(parsed.timestamp()) * 1_000_000_000 + i128::from(parsed.timestamp_subsec_nanos());
    let sign = if nanos < 0 { "-" } else { "" };
    let (secs, frac) = (nanos.abs() / 1_000_000_000, nanos.abs() % 1_000_000_000);
    if frac == 0 {
        Ok(format!("{}{}", sign, secs))
    } else {
        let frac = format!("{:09}", frac);
        Ok(format!("{}{}.{}", sign, secs, frac.trim_end_matches('0')))
    }
}

fn optional_time(value: &Option<String>) -> Result<Option<String>> {
    value.as_deref().map(format_time).transpose()
}

fn pretty(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn required_query(query: &str) -> Result<&str> {
    if query.trim().is_empty() {
        return Err(Error::Validation("query must not be empty".to_string()));
    }
    Ok(query)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryArgs {
    /// PromQL expression, e.g. 'rate(http_requests_total[5m])'
    pub query: String,
    /// Evaluation time (RFC 3339 or unix seconds); defaults to now
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RangeQueryArgs {
    /// PromQL expression
    pub query: String,
    /// Range start (RFC 3339 or unix seconds)
    pub start: String,
    /// Range end (RFC 3339 or unix seconds)
    pub end: String,
    /// Resolution step as a duration or float seconds, e.g. '30s'
    #[serde(default)]
    pub step: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct LabelNamesArgs {
    /// Series selector restricting which series the labels are read from
    #[serde(default, rename = "match")]
    pub matcher: Option<String>,
    /// Start of the time window (RFC 3339 or unix seconds)
    #[serde(default)]
    pub start: Option<String>,
    /// End of the time window (RFC 3339 or unix seconds)
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LabelValuesArgs {
    /// Label name to list values for
    pub label: String,
    /// Series selector restricting which series the values are read from
    #[serde(default, rename = "match")]
    pub matcher: Option<String>,
    /// Start of the time window (RFC 3339 or unix seconds)
    #[serde(default)]
    pub start: Option<String>,
    /// End of the time window (RFC 3339 or unix seconds)
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SeriesArgs {
    /// Series selector, e.g. 'up{job="node"}'
    #[serde(rename = "match")]
    pub matcher: String,
    /// Start of the time window (RFC 3339 or unix seconds)
    #[serde(default)]
    pub start: Option<String>,
    /// End of the time window (RFC 3339 or unix seconds)
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    Active,
    Dropped,
    Any,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct TargetsArgs {
    /// Filter targets by state
    #[serde(default)]
    pub state: Option<TargetState>,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Alert,
    Record,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct RulesArgs {
    /// Only return alerting or recording rules
    #[serde(default, rename = "type")]
    pub rule_type: Option<RuleType>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct MetadataArgs {
    /// Metric name to fetch metadata for
    #[serde(default)]
    pub metric: Option<String>,
    /// Maximum number of metrics to return
    #[serde(default)]
    pub limit: Option<u32>,
}

impl Prometheus {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub async fn is_installed(&self) -> Result<String> {
        match self.client.get("status/buildinfo", &[]).await {
            Ok(info) => {
                let version = info
                    .pointer("/data/version")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown version");
                Ok(format!("Prometheus is installed: {}", version))
            }
            Err(e) => Ok(format!("Prometheus is not reachable at {}: {}", self.client.base_url(), e)),
        }
    }

    pub async fn query(&self, args: &QueryArgs) -> Result<String> {
        let params = [
            ("query", Some(required_query(&args.query)?.to_string())),
            ("time", optional_time(&args.time)?),
        ];
        pretty(&self.client.get("query", &params).await?)
    }

    pub async fn query_range(&self, args: &RangeQueryArgs) -> Result<String> {
        let params = [
            ("query", Some(required_query(&args.query)?.to_string())),
            ("start", Some(format_time(&args.start)?)),
            ("end", Some(format_time(&args.end)?)),
            ("step", Some(args.step.clone().unwrap_or_else(|| "15s".to_string()))),
        ];
        pretty(&self.client.get("query_range", &params).await?)
    }

    pub async fn label_names(&self, args: &LabelNamesArgs) -> Result<String> {
        let params = [
            ("match[]", args.matcher.clone()),
            ("start", optional_time(&args.start)?),
            ("end", optional_time(&args.end)?),
        ];
        pretty(&self.client.get("labels", &params).await?)
    }

    pub async fn label_values(&self, args: &LabelValuesArgs) -> Result<String> {
        let label = validate::label_name("label", &args.label)?;
        let params = [
            ("match[]", args.matcher.clone()),
            ("start", optional_time(&args.start)?),
            ("end", optional_time(&args.end)?),
        ];
        let endpoint = format!("label/{}/values", label);
        pretty(&self.client.get(&endpoint, &params).await?)
    }

    pub async fn series(&self, args: &SeriesArgs) -> Result<String> {
        let params = [
            ("match[]", Some(required_query(&args.matcher)?.to_string())),
            ("start", optional_time(&args.start)?),
            ("end", optional_time(&args.end)?),
        ];
        pretty(&self.client.get("series", &params).await?)
    }

    pub async fn targets(&self, args: &TargetsArgs) -> Result<String> {
        let state = args.state.map(|s| {
            match s {
                TargetState::Active => "active",
                TargetState::Dropped => "dropped",
                TargetState::Any => "any",
            }
            .to_string()
        });
        pretty(&self.client.get("targets", &[("state", state)]).await?)
    }

    pub async fn alerts(&self) -> Result<String> {
        pretty(&self.client.get("alerts", &[]).await?)
    }

    pub async fn rules(&self, args: &RulesArgs) -> Result<String> {
        let rule_type = args.rule_type.map(|t| {
            match t {
                RuleType::Alert => "alert",
                RuleType::Record => "record",
            }
            .to_string()
        });
        pretty(&self.client.get("rules", &[("type", rule_type)]).await?)
    }

    pub async fn metadata(&self, args: &MetadataArgs) -> Result<String> {
        let params = [
            ("metric", args.metric.clone()),
            ("limit", args.limit.map(|l| l.to_string())),
        ];
        pretty(&self.client.get("metadata", &params).await?)
    }
}

pub fn register(registry: &mut ToolRegistry, prometheus: Prometheus) -> Result<()> {
    let prom = Arc::new(prometheus);

    registry.register(bound_tool(
        &prom,
        "is_prometheus_installed",
        "Check if Prometheus is installed",
        |p, _: NoArgs| async move { p.is_installed().await },
    ))?;
    registry.register(bound_tool(
        &prom,
        "prometheus_query",
        "Evaluate an instant PromQL query. Returns the raw Prometheus API response.",
        |p, args: QueryArgs| async move { p.query(&args).await },
    ))?;
    registry.register(bound_tool(
        &prom,
        "prometheus_query_range",
        "Evaluate a PromQL query over a range of time.",
        |p, args: RangeQueryArgs| async move { p.query_range(&args).await },
    ))?;
    registry.register(bound_tool(
        &prom,
        "prometheus_label_names",
        "List label names known to Prometheus.",
        |p, args: LabelNamesArgs| async move { p.label_names(&args).await },
    ))?;
    registry.register(bound_tool(
        &prom,
        "prometheus_label_values",
        "List the values of a label.",
        |p, args: LabelValuesArgs| async move { p.label_values(&args).await },
    ))?;
    registry.register(bound_tool(
        &prom,
        "prometheus_series",
        "Find series matching a selector.",
        |p, args: SeriesArgs| async move { p.series(&args).await },
    ))?;
    registry.register(bound_tool(
        &prom,
        "prometheus_targets",
        "List scrape targets and their health.",
        |p, args: TargetsArgs| async move { p.targets(&args).await },
    ))?;
    registry.register(bound_tool(
        &prom,
        "prometheus_alerts",
        "List active alerts.",
        |p, _: NoArgs| async move { p.alerts().await },
    ))?;
    registry.register(bound_tool(
        &prom,
        "prometheus_rules",
        "List alerting and recording rules.",
        |p, args: RulesArgs| async move { p.rules(&args).await },
    ))?;
    registry.register(bound_tool(
        &prom,
        "prometheus_metadata",
        "Get metric metadata (type, help, unit).",
        |p, args: MetadataArgs| async move { p.metadata(&args).await },
    ))?;

    Ok(())
}
