use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::llm::{self, LLMConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub commands: CommandConfig,
    pub prometheus: PrometheusConfig,
    pub grafana: GrafanaConfig,
    pub llm: LLMConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

/// Binaries the CLI adapters shell out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    pub cilium_bin: String,
    pub kubectl_bin: String,
    pub istioctl_bin: String,
    pub k8sgpt_bin: String,
    /// Namespace the Cilium agent pods run in
    pub cilium_namespace: String,
    pub timeout_secs: u64,
}

impl CommandConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            cilium_bin: "cilium".to_string(),
            kubectl_bin: "kubectl".to_string(),
            istioctl_bin: "istioctl".to_string(),
            k8sgpt_bin: "k8sgpt".to_string(),
            cilium_namespace: "kube-system".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    pub url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9090/api/v1".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrafanaConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub folder_uid: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GrafanaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000/api".to_string(),
            api_key: None,
            folder_uid: None,
            timeout_secs: 30,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_secs(key: &str, default: u64) -> crate::Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| crate::Error::Config(format!("{} must be a number of seconds, got '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = Config::default();
        let http_timeout = env_secs("HTTP_TIMEOUT_SECS", defaults.prometheus.timeout_secs)?;
        let llm_provider = env_or("LLM_PROVIDER", &defaults.llm.provider);
        let llm_model = env_opt("LLM_MODEL").unwrap_or_else(|| llm::default_model(&llm_provider).to_string());

        let config = Config {
            server: ServerConfig {
                addr: env_or("SERVER_ADDR", &defaults.server.addr),
            },
            commands: CommandConfig {
                cilium_bin: env_or("CILIUM_BIN", &defaults.commands.cilium_bin),
                kubectl_bin: env_or("KUBECTL_BIN", &defaults.commands.kubectl_bin),
                istioctl_bin: env_or("ISTIOCTL_BIN", &defaults.commands.istioctl_bin),
                k8sgpt_bin: env_or("K8SGPT_BIN", &defaults.commands.k8sgpt_bin),
                cilium_namespace: env_or("CILIUM_NAMESPACE", &defaults.commands.cilium_namespace),
                timeout_secs: env_secs("COMMAND_TIMEOUT_SECS", defaults.commands.timeout_secs)?,
            },
            prometheus: PrometheusConfig {
                url: env_or("PROMETHEUS_URL", &defaults.prometheus.url),
                token: env_opt("PROMETHEUS_TOKEN"),
                timeout_secs: http_timeout,
            },
            grafana: GrafanaConfig {
                url: env_or("GRAFANA_URL", &defaults.grafana.url),
                api_key: env_opt("GRAFANA_API_KEY"),
                folder_uid: env_opt("GRAFANA_FOLDER_UID"),
                timeout_secs: http_timeout,
            },
            llm: LLMConfig {
                provider: llm_provider,
                model: llm_model,
                api_key: env_opt("LLM_API_KEY"),
            },
        };

        config.validate()?;

        if config.grafana.api_key.is_none() {
            tracing::warn!("GRAFANA_API_KEY is not set. Dashboard creation will be unauthenticated.");
        }

        Ok(config)
    }

    /// Check the configured base URLs parse and use an HTTP scheme.
    pub fn validate(&self) -> crate::Result<()> {
        for (key, raw) in [("PROMETHEUS_URL", &self.prometheus.url), ("GRAFANA_URL", &self.grafana.url)] {
            let parsed = Url::parse(raw)
                .map_err(|e| crate::Error::Config(format!("{} is not a valid URL ({}): {}", key, raw, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(crate::Error::Config(format!(
                    "{} must use http or https, got '{}'",
                    key,
                    parsed.scheme()
                )));
            }
        }

        if self.commands.timeout_secs == 0 {
            return Err(crate::Error::Config("COMMAND_TIMEOUT_SECS must be greater than zero".to_string()));
        }
        if self.prometheus.timeout_secs == 0 || self.grafana.timeout_secs == 0 {
            return Err(crate::Error::Config("HTTP_TIMEOUT_SECS must be greater than zero".to_string()));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8084".to_string(),
            },
            commands: CommandConfig::default(),
            prometheus: PrometheusConfig::default(),
            grafana: GrafanaConfig::default(),
            llm: LLMConfig::default(),
        }
    }
}
