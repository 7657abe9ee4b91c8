//! Cilium CLI Tools
//!
//! Install, upgrade, inspect and remove Cilium through the `cilium` binary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{bound_tool, validate, NoArgs, ToolRegistry};
use crate::{exec::CommandRunner, Result};

/// Datapath modes accepted by `cilium install` and `cilium upgrade`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum DatapathMode {
    Tunnel,
    Native,
    AwsEni,
    Gke,
    Azure,
    AksByocni,
}

impl DatapathMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatapathMode::Tunnel => "tunnel",
            DatapathMode::Native => "native",
            DatapathMode::AwsEni => "aws-eni",
            DatapathMode::Gke => "gke",
            DatapathMode::Azure => "azure",
            DatapathMode::AksByocni => "aks-byocni",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct LifecycleArgs {
    /// The name of the cluster to install or upgrade Cilium on
    #[serde(default)]
    pub cluster_name: Option<String>,
    /// The datapath mode to use for Cilium
    #[serde(default)]
    pub datapath_mode: Option<DatapathMode>,
}

impl LifecycleArgs {
    fn argv(&self, verb: &str) -> Result<Vec<String>> {
        let mut argv = vec![verb.to_string()];
        if let Some(name) = validate::optional_token("cluster_name", self.cluster_name.as_deref())? {
            argv.push("--cluster-name".to_string());
            argv.push(name.to_string());
        }
        if let Some(mode) = self.datapath_mode {
            argv.push("--datapath-mode".to_string());
            argv.push(mode.as_str().to_string());
        }
        Ok(argv)
    }
}

/// Runs the `cilium` CLI
pub struct CiliumCli {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

impl CiliumCli {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: &str) -> Self {
        Self {
            runner,
            binary: binary.to_string(),
        }
    }

    async fn run(&self, argv: Vec<String>) -> Result<String> {
        self.runner.run(&self.binary, &argv).await
    }

    pub async fn status(&self) -> Result<String> {
        self.run(vec!["status".to_string()]).await
    }

    pub async fn install(&self, args: &LifecycleArgs) -> Result<String> {
        self.run(args.argv("install")?).await
    }

    pub async fn upgrade(&self, args: &LifecycleArgs) -> Result<String> {
        self.run(args.argv("upgrade")?).await
    }

    pub async fn uninstall(&self) -> Result<String> {
        self.run(vec!["uninstall".to_string()]).await
    }
}

pub fn register(registry: &mut ToolRegistry, cli: CiliumCli) -> Result<()> {
    let cli = Arc::new(cli);

    registry.register(bound_tool(
        &cli,
        "cilium_status",
        "Get the status of Cilium installation.",
        |cli, _: NoArgs| async move { cli.status().await },
    ))?;
    registry.register(bound_tool(
        &cli,
        "install_cilium",
        "Install Cilium on the cluster.",
        |cli, args: LifecycleArgs| async move { cli.install(&args).await },
    ))?;
    registry.register(bound_tool(
        &cli,
        "upgrade_cilium",
        "Upgrade Cilium on the cluster.",
        |cli, args: LifecycleArgs| async move { cli.upgrade(&args).await },
    ))?;
    registry.register(bound_tool(
        &cli,
        "uninstall_cilium",
        "Uninstall Cilium from the cluster.",
        |cli, _: NoArgs| async move { cli.uninstall().await },
    ))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::MockCommandRunner;
    use serde_json::json;

    fn registry_expecting(expected: &'static [&'static str]) -> ToolRegistry {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(move |program, args| program == "cilium" && args == expected)
            .times(1)
            .returning(|_, _| Ok("ok".to_string()));
        let mut registry = ToolRegistry::new();
        register(&mut registry, CiliumCli::new(Arc::new(runner), "cilium")).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_status() {
        let registry = registry_expecting(&["status"]);
        let result = registry.invoke("cilium_status", serde_json::Value::Null).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output, "ok");
    }

    #[tokio::test]
    async fn test_install_without_options_has_no_flags() {
        let registry = registry_expecting(&["install"]);
        assert!(registry.invoke("install_cilium", json!({})).await.success);
    }

    #[tokio::test]
    async fn test_install_with_options() {
        let registry = registry_expecting(&[
            "install",
            "--cluster-name",
            "prod",
            "--datapath-mode",
            "aws-eni",
        ]);
        let result = registry
            .invoke(
                "install_cilium",
                json!({"cluster_name": "prod", "datapath_mode": "aws-eni"}),
            )
            .await;
        assert!(result.success, "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_upgrade_with_datapath_only() {
        let registry = registry_expecting(&["upgrade", "--datapath-mode", "aks-byocni"]);
        assert!(
            registry
                .invoke("upgrade_cilium", json!({"datapath_mode": "aks-byocni"}))
                .await
                .success
        );
    }

    #[tokio::test]
    async fn test_unknown_datapath_rejected() {
        let mut registry = ToolRegistry::new();
        register(
            &mut registry,
            CiliumCli::new(Arc::new(MockCommandRunner::new()), "cilium"),
        )
        .unwrap();
        let result = registry
            .invoke("install_cilium", json!({"datapath_mode": "vxlan"}))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid arguments"));
    }

    #[test]
    fn test_datapath_schema_lists_modes() {
        let mut registry = ToolRegistry::new();
        register(
            &mut registry,
            CiliumCli::new(Arc::new(MockCommandRunner::new()), "cilium"),
        )
        .unwrap();
        let params = registry.get("install_cilium").unwrap().parameters();
        let schema = params["properties"]["datapath_mode"].to_string();
        for mode in ["tunnel", "native", "aws-eni", "gke", "azure", "aks-byocni"] {
            assert!(schema.contains(mode), "{} missing from {}", mode, schema);
        }
    }
}
