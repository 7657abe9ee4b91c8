//! Grafana Tools
//!
//! Generate dashboard JSON with an LLM and push dashboards through the Grafana HTTP API.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use super::{bound_tool, ToolRegistry};
use crate::{http::HttpClient, llm::LLMProvider, Error, Result};

const DASHBOARD_PROMPT: &str = r#"You are an expert in Grafana dashboard configuration. Produce one valid Grafana dashboard JSON model for the user's request and nothing else.

The dashboard root object must contain:
- "id": null for a new dashboard
- "uid": a short unique string
- "title", "tags" (array), "timezone" ("browser")
- "schemaVersion" (36), "version" (integer)
- "time": {"from": "now-6h", "to": "now"} or a range suited to the request
- "refresh": a refresh interval such as "30s"
- "panels": array of panels
- "templating": {"list": [...]} when variables help reuse

Every panel must contain:
- "id": integer, unique within the dashboard
- "gridPos": {"x", "y", "w", "h"} laid out on the 24 column grid without overlaps
- "title", "type" ("timeseries", "stat", "gauge", "table", ...)
- "datasource": {"type": "prometheus", "uid": "<datasource uid>"}
- "targets": array of queries, each with a unique "refId" (A, B, C...) and an "expr"
- "options" and "fieldConfig" appropriate to the panel type

Timeseries panels set options.tooltip.mode, options.legend.displayMode and
fieldConfig.defaults.custom.lineWidth / fillOpacity. Stat panels set
options.textMode, options.colorMode, options.graphMode and
fieldConfig.defaults.thresholds.

PromQL guidance: wrap counters in rate() or increase(), use label matchers
(=, !=, =~, !~) and aggregate with sum by (...) where the request implies grouping.

Return only the JSON object. Do not wrap it in markdown fences."#;

/// Grafana adapter
pub struct Grafana {
    client: HttpClient,
    llm: Arc<dyn LLMProvider>,
    folder_uid: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateDashboardArgs {
    /// User query that explains what type of a dashboard to generate
    pub user_query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateDashboardArgs {
    /// The dashboard JSON to create in Grafana
    pub dashboard: String,
}

/// Strip a surrounding markdown code fence if the model added one anyway.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

impl Grafana {
    pub fn new(client: HttpClient, llm: Arc<dyn LLMProvider>, folder_uid: Option<String>) -> Self {
        Self {
            client,
            llm,
            folder_uid,
        }
    }

    /// Never fails: model errors are returned as text for the agent to read.
    pub async fn generate_dashboard_json(&self, args: &GenerateDashboardArgs) -> Result<String> {
        match self.llm.complete(DASHBOARD_PROMPT, &args.user_query).await {
            Ok(text) => Ok(strip_code_fence(&text).to_string()),
            Err(e) => {
                warn!("Dashboard generation failed: {}", e);
                Ok(format!("Error generating grafana dashboard json: {}", e))
            }
        }
    }

    pub async fn create_dashboard(&self, args: &CreateDashboardArgs) -> Result<String> {
        if args.dashboard.trim().is_empty() {
            return Err(Error::Validation("dashboard must not be empty".to_string()));
        }
        let dashboard: Value = serde_json::from_str(strip_code_fence(&args.dashboard))
            .unwrap_or_else(|_| Value::String(args.dashboard.clone()));

        let body = json!({
            "dashboard": dashboard,
            "overwrite": true,
            "folderUid": self.folder_uid,
        });
        let response = self.client.post("dashboards/db", &body).await?;
        Ok(serde_json::to_string_pretty(&response)?)
    }
}

pub fn register(registry: &mut ToolRegistry, grafana: Grafana) -> Result<()> {
    let grafana = Arc::new(grafana);

    registry.register(bound_tool(
        &grafana,
        "generate_dashboard_json",
        "Create a Grafana dashboard JSON from user query",
        |g, args: GenerateDashboardArgs| async move { g.generate_dashboard_json(&args).await },
    ))?;
    registry.register(bound_tool(
        &grafana,
        "create_dashboard",
        "Create a new Grafana dashboard from JSON",
        |g, args: CreateDashboardArgs| async move { g.create_dashboard(&args).await },
    ))?;

    Ok(())
}
