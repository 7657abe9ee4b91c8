//! Istioctl Tools
//!
//! Install, verify and inspect an Istio mesh through the `istioctl` binary.

use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

use super::{bound_tool, validate, NoArgs, ToolRegistry};
use crate::{exec::CommandRunner, Result};

const NO_CONTROL_PLANE: &str = "0 Istio control planes detected";

/// Runs the `istioctl` CLI
pub struct Istioctl {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

fn default_profile() -> String {
    "ambient".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InstallArgs {
    /// The Istio profile to install (e.g. default, ambient)
    #[serde(default = "default_profile")]
    pub profile: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UninstallArgs {
    /// Whether to purge Istio resources
    #[serde(default = "default_true")]
    pub purge: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProxyConfigArgs {
    /// The name of the pod to get proxy configuration for
    pub pod_name: String,
    /// The namespace of the pod
    #[serde(default)]
    pub ns: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ProxyStatusArgs {
    /// Only report the proxy of this pod
    #[serde(default)]
    pub pod_name: Option<String>,
    /// The namespace of the pod
    #[serde(default)]
    pub ns: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct AnalyzeArgs {
    /// Namespace to analyze
    #[serde(default)]
    pub ns: Option<String>,
    /// Analyze every namespace; takes precedence over ns
    #[serde(default)]
    pub all_namespaces: bool,
}

impl Istioctl {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: &str) -> Self {
        Self {
            runner,
            binary: binary.to_string(),
        }
    }

    async fn run(&self, argv: Vec<String>) -> Result<String> {
        self.runner.run(&self.binary, &argv).await
    }

    pub async fn verify_install(&self) -> Result<String> {
        let output = self.run(vec!["verify-install".to_string()]).await?;
        if output.contains(NO_CONTROL_PLANE) {
            return Ok("Istio is not installed".to_string());
        }

        let version = self.run(vec!["version".to_string()]).await?;
        Ok(format!("Istio is installed: {}", version))
    }

    pub async fn install(&self, args: &InstallArgs) -> Result<String> {
        let profile = validate::token("profile", &args.profile)?;
        self.run(vec![
            "install".to_string(),
            "--set".to_string(),
            format!("profile={}", profile),
            "-y".to_string(),
        ])
        .await
    }

    pub async fn uninstall(&self, args: &UninstallArgs) -> Result<String> {
        let mut argv = vec!["uninstall".to_string(), "-y".to_string()];
        if args.purge {
            argv.push("--purge".to_string());
        }
        self.run(argv).await
    }

    pub async fn proxy_config(&self, args: &ProxyConfigArgs) -> Result<String> {
        let mut argv = vec!["proxy-config".to_string(), "all".to_string()];
        if let Some(ns) = validate::optional_token("ns", args.ns.as_deref())? {
            argv.push("-n".to_string());
            argv.push(ns.to_string());
        }
        argv.push(validate::token("pod_name", &args.pod_name)?.to_string());
        self.run(argv).await
    }

    pub async fn proxy_status(&self, args: &ProxyStatusArgs) -> Result<String> {
        let mut argv = vec!["proxy-status".to_string()];
        if let Some(ns) = validate::optional_token("ns", args.ns.as_deref())? {
            argv.push("-n".to_string());
            argv.push(ns.to_string());
        }
        if let Some(pod) = validate::optional_token("pod_name", args.pod_name.as_deref())? {
            argv.push(pod.to_string());
        }
        self.run(argv).await
    }

    pub async fn analyze(&self, args: &AnalyzeArgs) -> Result<String> {
        let mut argv = vec!["analyze".to_string()];
        if args.all_namespaces {
            argv.push("-A".to_string());
        } else if let Some(ns) = validate::optional_token("ns", args.ns.as_deref())? {
            argv.push("-n".to_string());
            argv.push(ns.to_string());
        }
        self.run(argv).await
    }
}

pub fn register(registry: &mut ToolRegistry, istioctl: Istioctl) -> Result<()> {
    let istioctl = Arc::new(istioctl);

    registry.register(bound_tool(
        &istioctl,
        "istio_verify_install",
        "Verify Istio installation status",
        |i, _: NoArgs| async move { i.verify_install().await },
    ))?;
    registry.register(bound_tool(
        &istioctl,
        "istio_install",
        "Install Istio",
        |i, args: InstallArgs| async move { i.install(&args).await },
    ))?;
    registry.register(bound_tool(
        &istioctl,
        "istio_uninstall",
        "Uninstall Istio",
        |i, args: UninstallArgs| async move { i.uninstall(&args).await },
    ))?;
    registry.register(bound_tool(
        &istioctl,
        "istio_proxy_config",
        "Get proxy configuration for 1 pod",
        |i, args: ProxyConfigArgs| async move { i.proxy_config(&args).await },
    ))?;
    registry.register(bound_tool(
        &istioctl,
        "istio_proxy_status",
        "Get the sync status of Envoy proxies in the mesh",
        |i, args: ProxyStatusArgs| async move { i.proxy_status(&args).await },
    ))?;
    registry.register(bound_tool(
        &istioctl,
        "istio_analyze",
        "Analyze Istio configuration and report potential issues",
        |i, args: AnalyzeArgs| async move { i.analyze(&args).await },
    ))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::MockCommandRunner;
    use serde_json::{json, Value};

    fn registry_with(runner: MockCommandRunner) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register(&mut registry, Istioctl::new(Arc::new(runner), "istioctl")).unwrap();
        registry
    }

    fn expecting(expected: &'static [&'static str]) -> ToolRegistry {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(move |program, args| program == "istioctl" && args == expected)
            .times(1)
            .returning(|_, _| Ok("ok".to_string()));
        registry_with(runner)
    }

    #[tokio::test]
    async fn test_verify_install_not_installed() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|_, args| args == ["verify-install"])
            .times(1)
            .returning(|_, _| Ok("0 Istio control planes detected, checking --revision \"default\" only".to_string()));
        let result = registry_with(runner).invoke("istio_verify_install", Value::Null).await;
        assert!(result.success);
        assert_eq!(result.output, "Istio is not installed");
    }

    #[tokio::test]
    async fn test_verify_install_reports_version() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|_, args| args == ["verify-install"])
            .times(1)
            .returning(|_, _| Ok("1 Istio control planes detected".to_string()));
        runner
            .expect_run()
            .withf(|_, args| args == ["version"])
            .times(1)
            .returning(|_, _| Ok("1.24.0".to_string()));
        let result = registry_with(runner).invoke("istio_verify_install", Value::Null).await;
        assert_eq!(result.output, "Istio is installed: 1.24.0");
    }

    #[tokio::test]
    async fn test_install_defaults_to_ambient() {
        let registry = expecting(&["install", "--set", "profile=ambient", "-y"]);
        assert!(registry.invoke("istio_install", json!({})).await.success);
    }

    #[tokio::test]
    async fn test_install_custom_profile() {
        let registry = expecting(&["install", "--set", "profile=default", "-y"]);
        assert!(registry.invoke("istio_install", json!({"profile": "default"})).await.success);
    }

    #[tokio::test]
    async fn test_uninstall_purges_by_default() {
        let registry = expecting(&["uninstall", "-y", "--purge"]);
        assert!(registry.invoke("istio_uninstall", Value::Null).await.success);

        let registry = expecting(&["uninstall", "-y"]);
        assert!(registry.invoke("istio_uninstall", json!({"purge": false})).await.success);
    }

    #[tokio::test]
    async fn test_proxy_config() {
        let registry = expecting(&["proxy-config", "all", "-n", "shop", "productpage-v1-abc"]);
        let result = registry
            .invoke("istio_proxy_config", json!({"pod_name": "productpage-v1-abc", "ns": "shop"}))
            .await;
        assert!(result.success, "{:?}", result.error);

        let registry = expecting(&["proxy-config", "all", "productpage-v1-abc"]);
        assert!(
            registry
                .invoke("istio_proxy_config", json!({"pod_name": "productpage-v1-abc"}))
                .await
                .success
        );
    }

    #[tokio::test]
    async fn test_proxy_config_requires_pod() {
        let result = registry_with(MockCommandRunner::new())
            .invoke("istio_proxy_config", json!({"ns": "shop"}))
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_analyze_all_namespaces_wins() {
        let registry = expecting(&["analyze", "-A"]);
        assert!(
            registry
                .invoke("istio_analyze", json!({"ns": "shop", "all_namespaces": true}))
                .await
                .success
        );
    }

    #[tokio::test]
    async fn test_proxy_status() {
        let registry = expecting(&["proxy-status", "-n", "shop", "reviews-v2"]);
        assert!(
            registry
                .invoke("istio_proxy_status", json!({"ns": "shop", "pod_name": "reviews-v2"}))
                .await
                .success
        );
    }
}
