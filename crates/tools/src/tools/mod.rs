//! Agent Tools Module
//!
//! Typed function tools that an LLM agent can call, plus the registry that
//! dispatches calls by name.

pub mod cilium;
pub mod cilium_dbg;
pub mod grafana;
pub mod istio;
pub mod k8sgpt;
pub mod prometheus;
pub mod validate;

use async_trait::async_trait;
use rig::completion::ToolDefinition;
use schemars::{gen::SchemaSettings, JsonSchema};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    exec::{CommandRunner, ProcessRunner},
    http::HttpClient,
    llm, metrics, Error, Result,
};

/// Result from tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub metadata: Option<Value>,
}

/// Common trait for all agent tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description for the LLM
    fn description(&self) -> &str;

    /// JSON schema of the argument object
    fn parameters(&self) -> Value;

    /// Execute the tool with JSON arguments
    async fn call(&self, args: Value) -> Result<String>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Argument type for tools that take no parameters.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoArgs {}

/// A tool backed by an async function over a typed argument struct.
pub struct TypedFnTool<A, F> {
    name: String,
    description: String,
    parameters: Value,
    func: F,
    _args: PhantomData<fn(A)>,
}

/// Wrap an async function taking typed arguments into a [`Tool`].
///
/// The parameter schema is generated from `A`, so field doc comments become
/// the parameter descriptions the model sees.
pub fn create_typed_fn_tool<A, F, Fut>(name: &str, description: &str, func: F) -> Arc<dyn Tool>
where
    A: DeserializeOwned + JsonSchema + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    Arc::new(TypedFnTool {
        name: name.to_string(),
        description: description.to_string(),
        parameters: parameters_schema::<A>(),
        func,
        _args: PhantomData,
    })
}

/// Like [`create_typed_fn_tool`], with shared state handed to every call.
pub(crate) fn bound_tool<S, A, F, Fut>(state: &Arc<S>, name: &str, description: &str, func: F) -> Arc<dyn Tool>
where
    S: Send + Sync + 'static,
    A: DeserializeOwned + JsonSchema + Send + 'static,
    F: Fn(Arc<S>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    let state = state.clone();
    create_typed_fn_tool(name, description, move |args: A| func(state.clone(), args))
}

fn parameters_schema<A: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        })
        .into_generator();
    let mut schema = serde_json::to_value(generator.into_root_schema_for::<A>())
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("title");
        obj.remove("definitions");
        obj.entry("properties").or_insert_with(|| serde_json::json!({}));
    }
    schema
}

fn decode_args<A: DeserializeOwned>(tool: &str, args: Value) -> Result<A> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(args).map_err(|e| Error::Validation(format!("invalid arguments for {}: {}", tool, e)))
}

#[async_trait]
impl<A, F, Fut> Tool for TypedFnTool<A, F>
where
    A: DeserializeOwned + JsonSchema + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: A = decode_args(&self.name, args)?;
        (self.func)(args).await
    }
}

/// Tools indexed by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(Error::Validation(format!("tool '{}' is already registered", name)));
        }
        debug!("Registered tool: {}", name);
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool by name. Failures are reported in the result rather than returned.
    pub async fn invoke(&self, name: &str, args: Value) -> ToolResult {
        let Some(tool) = self.get(name) else {
            warn!("Unknown tool requested: {}", name);
            metrics::record_tool_call(name, false);
            return ToolResult {
                success: false,
                output: String::new(),
                error: Some(format!("unknown tool '{}'", name)),
                metadata: None,
            };
        };

        info!("Invoking tool {}", name);
        let started = Instant::now();
        let outcome = tool.call(args).await;
        let metadata = Some(serde_json::json!({
            "tool": name,
            "duration_ms": started.elapsed().as_millis() as u64,
        }));

        metrics::record_tool_call(name, outcome.is_ok());

        match outcome {
            Ok(output) => ToolResult {
                success: true,
                output,
                error: None,
                metadata,
            },
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                ToolResult {
                    success: false,
                    output: String::new(),
                    error: Some(e.to_string()),
                    metadata,
                }
            }
        }
    }
}

/// Build a registry with every adapter, wired to the configured binaries and endpoints.
pub fn default_registry(config: &Config) -> Result<ToolRegistry> {
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new(config.commands.timeout()));
    let mut registry = ToolRegistry::new();

    cilium::register(
        &mut registry,
        cilium::CiliumCli::new(runner.clone(), &config.commands.cilium_bin),
    )?;
    cilium_dbg::register(
        &mut registry,
        cilium_dbg::CiliumDbg::new(
            runner.clone(),
            &config.commands.kubectl_bin,
            &config.commands.cilium_namespace,
        ),
    )?;
    istio::register(
        &mut registry,
        istio::Istioctl::new(runner.clone(), &config.commands.istioctl_bin),
    )?;
    k8sgpt::register(&mut registry, k8sgpt::K8sgpt::new(runner, &config.commands.k8sgpt_bin))?;

    let prometheus_client = HttpClient::new(&config.prometheus.url, config.prometheus.token.clone())
        .with_timeout(std::time::Duration::from_secs(config.prometheus.timeout_secs));
    prometheus::register(&mut registry, prometheus::Prometheus::new(prometheus_client))?;

    let grafana_client = HttpClient::new(&config.grafana.url, config.grafana.api_key.clone())
        .with_timeout(std::time::Duration::from_secs(config.grafana.timeout_secs));
    grafana::register(
        &mut registry,
        grafana::Grafana::new(
            grafana_client,
            llm::create_provider(&config.llm),
            config.grafana.folder_uid.clone(),
        ),
    )?;

    info!("Tool registry ready with {} tools", registry.len());
    Ok(registry)
}
