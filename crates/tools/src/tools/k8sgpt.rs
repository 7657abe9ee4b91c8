use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

use super::{bound_tool, validate, ToolRegistry};
use crate::{exec::CommandRunner, Result};

/// Runs `k8sgpt analyze`
pub struct K8sgpt {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct AnalyzeArgs {
    /// Namespace of the cluster to analyze
    #[serde(default)]
    pub namespace: Option<String>,
}

impl K8sgpt {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: &str) -> Self {
        Self {
            runner,
            binary: binary.to_string(),
        }
    }

    pub async fn analyze(&self, args: &AnalyzeArgs) -> Result<String> {
        let mut argv = vec!["analyze".to_string()];
        if let Some(ns) = validate::optional_token("namespace", args.namespace.as_deref())? {
            argv.push("-n".to_string());
            argv.push(ns.to_string());
        }
        self.runner.run(&self.binary, &argv).await
    }
}

pub fn register(registry: &mut ToolRegistry, k8sgpt: K8sgpt) -> Result<()> {
    registry.register(bound_tool(
        &Arc::new(k8sgpt),
        "k8sgpt_analyze",
        "This command will find problems within your Kubernetes cluster",
        |k, args: AnalyzeArgs| async move { k.analyze(&args).await },
    ))
}
