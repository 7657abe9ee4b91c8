//! Cilium Agent Debug Tools
//!
//! Runs `cilium-dbg` inside a Cilium agent pod via `kubectl exec`.

use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{bound_tool, validate, NoArgs, Tool, ToolRegistry};
use crate::{
    exec::{split_command, CommandRunner},
    Error, Result,
};

const AGENT_SELECTOR: &str = "k8s-app=cilium";

/// Executes `cilium-dbg` in the first Cilium agent pod found
pub struct CiliumDbg {
    runner: Arc<dyn CommandRunner>,
    kubectl: String,
    namespace: String,
}

impl CiliumDbg {
    pub fn new(runner: Arc<dyn CommandRunner>, kubectl: &str, namespace: &str) -> Self {
        Self {
            runner,
            kubectl: kubectl.to_string(),
            namespace: namespace.to_string(),
        }
    }

    async fn pod_name(&self) -> Result<String> {
        let args: Vec<String> = ["get", "pod", "-l", AGENT_SELECTOR, "-o", "name", "-n", self.namespace.as_str()]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = self.runner.run(&self.kubectl, &args).await?;

        output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::NotFound(
                    "No Cilium pod found in the cluster - make sure Cilium is installed and running".to_string(),
                )
            })
    }

    pub async fn exec(&self, argv: Vec<String>) -> Result<String> {
        let pod = self.pod_name().await?;
        debug!("Running cilium-dbg {} in {}", argv.join(" "), pod);

        let mut args = vec![
            "exec".to_string(),
            pod,
            "-n".to_string(),
            self.namespace.clone(),
            "--".to_string(),
            "cilium-dbg".to_string(),
        ];
        args.extend(argv);
        self.runner.run(&self.kubectl, &args).await
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Copy, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Jsonpath,
}

impl OutputFormat {
    fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Jsonpath => "jsonpath",
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EndpointDetailsArgs {
    /// The ID of the endpoint to get details for
    #[serde(default)]
    pub endpoint_id: Option<String>,
    /// Labels selecting the endpoint; used instead of the ID when set
    #[serde(default)]
    pub labels: Option<String>,
    /// The output format of the endpoint details
    #[serde(default)]
    pub output_format: OutputFormat,
}

fn endpoint_details(args: &EndpointDetailsArgs) -> Result<Vec<String>> {
    let mut out = argv(&["endpoint", "get"]);
    if let Some(labels) = validate::optional_token("labels", args.labels.as_deref())? {
        out.extend(argv(&["-l", labels]));
    } else if let Some(id) = validate::optional_token("endpoint_id", args.endpoint_id.as_deref())? {
        out.push(id.to_string());
    } else {
        return Err(Error::Validation("either endpoint_id or labels is required".to_string()));
    }
    out.extend(argv(&["-o", args.output_format.as_str()]));
    Ok(out)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EndpointArgs {
    /// The ID of the endpoint
    pub endpoint_id: String,
}

fn endpoint_logs(args: &EndpointArgs) -> Result<Vec<String>> {
    Ok(argv(&["endpoint", "logs", validate::token("endpoint_id", &args.endpoint_id)?]))
}

fn endpoint_health(args: &EndpointArgs) -> Result<Vec<String>> {
    Ok(argv(&["endpoint", "health", validate::token("endpoint_id", &args.endpoint_id)?]))
}

fn endpoint_disconnect(args: &EndpointArgs) -> Result<Vec<String>> {
    Ok(argv(&["endpoint", "disconnect", validate::token("endpoint_id", &args.endpoint_id)?]))
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LabelAction {
    Add,
    Delete,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EndpointLabelsArgs {
    /// The ID of the endpoint to manage labels for
    pub endpoint_id: String,
    /// The labels to add or delete
    pub labels: BTreeMap<String, String>,
    /// The action to perform on the labels
    pub action: LabelAction,
}

fn endpoint_labels(args: &EndpointLabelsArgs) -> Result<Vec<String>> {
    if args.labels.is_empty() {
        return Err(Error::Validation("labels must not be empty".to_string()));
    }
    let flag = match args.action {
        LabelAction::Add => "--add",
        LabelAction::Delete => "--delete",
    };
    let mut out = argv(&["endpoint", "labels", validate::token("endpoint_id", &args.endpoint_id)?, flag]);
    for (key, value) in &args.labels {
        let pair = format!("{}={}", key, value);
        out.push(validate::key_value("labels", &pair)?.to_string());
    }
    Ok(out)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EndpointConfigArgs {
    /// The ID of the endpoint to manage configuration for
    pub endpoint_id: String,
    /// Configuration as key=value pairs (e.g. ["DropNotification=false", "TraceNotification=false"])
    pub config: Vec<String>,
}

fn endpoint_config(args: &EndpointConfigArgs) -> Result<Vec<String>> {
    if args.config.is_empty() {
        return Err(Error::Validation("config must not be empty".to_string()));
    }
    let mut out = argv(&["endpoint", "config", validate::token("endpoint_id", &args.endpoint_id)?]);
    for entry in &args.config {
        out.push(validate::key_value("config", entry)?.to_string());
    }
    Ok(out)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IdentityArgs {
    /// The ID of the identity to get details for
    pub identity_id: String,
}

fn identity_get(args: &IdentityArgs) -> Result<Vec<String>> {
    Ok(argv(&["identity", "get", validate::token("identity_id", &args.identity_id)?]))
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ShowConfigArgs {
    /// Whether to list all configuration options
    #[serde(default)]
    pub list_all: bool,
    /// Whether to list read-only configuration options
    #[serde(default)]
    pub list_read_only: bool,
    /// Whether to list available options
    #[serde(default)]
    pub list_options: bool,
}

fn show_config(args: &ShowConfigArgs) -> Result<Vec<String>> {
    let mut out = argv(&["endpoint", "config"]);
    if args.list_all {
        out.push("--all".to_string());
    } else if args.list_read_only {
        out.push("-r".to_string());
    } else if args.list_options {
        out.push("--list-options".to_string());
    }
    Ok(out)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ToggleOptionArgs {
    /// The option to toggle
    pub option: String,
    /// Whether to enable the option
    pub value: bool,
}

fn toggle_option(args: &ToggleOptionArgs) -> Result<Vec<String>> {
    let option = validate::token("option", &args.option)?;
    let state = if args.value { "enable" } else { "disable" };
    let setting = format!("{}={}", option, state);
    Ok(argv(&["endpoint", "config", setting.as_str()]))
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EnvoyResource {
    Certs,
    Clusters,
    Config,
    Listeners,
    Logging,
    Metrics,
    Serverinfo,
}

impl EnvoyResource {
    fn as_str(&self) -> &'static str {
        match self {
            EnvoyResource::Certs => "certs",
            EnvoyResource::Clusters => "clusters",
            EnvoyResource::Config => "config",
            EnvoyResource::Listeners => "listeners",
            EnvoyResource::Logging => "logging",
            EnvoyResource::Metrics => "metrics",
            EnvoyResource::Serverinfo => "serverinfo",
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EnvoyConfigArgs {
    /// The name of the Envoy admin resource to list
    pub resource_name: EnvoyResource,
}

fn envoy_config(args: &EnvoyConfigArgs) -> Result<Vec<String>> {
    Ok(argv(&["envoy", "admin", args.resource_name.as_str()]))
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FqdnCommand {
    List,
    Clean,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FqdnCacheArgs {
    /// The command to execute on the FQDN cache
    pub command: FqdnCommand,
}

fn fqdn_cache(args: &FqdnCacheArgs) -> Result<Vec<String>> {
    Ok(match args.command {
        FqdnCommand::List => argv(&["fqdn", "cache", "list"]),
        FqdnCommand::Clean => argv(&["fqdn", "cache", "clean", "-f"]),
    })
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IpCacheArgs {
    /// The CIDR to show information for
    #[serde(default)]
    pub cidr: Option<String>,
    /// Identity labels to look up instead of a CIDR
    #[serde(default)]
    pub labels: Option<String>,
}

fn ip_cache(args: &IpCacheArgs) -> Result<Vec<String>> {
    if let Some(labels) = validate::optional_token("labels", args.labels.as_deref())? {
        Ok(argv(&["ip", "get", "--labels", labels]))
    } else if let Some(cidr) = validate::optional_token("cidr", args.cidr.as_deref())? {
        Ok(argv(&["ip", "get", cidr]))
    } else {
        Err(Error::Validation("either cidr or labels is required".to_string()))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct KvKeyArgs {
    /// The kvstore key
    pub key: String,
}

fn kvstore_delete(args: &KvKeyArgs) -> Result<Vec<String>> {
    Ok(argv(&["kvstore", "delete", validate::token("key", &args.key)?]))
}

fn kvstore_get(args: &KvKeyArgs) -> Result<Vec<String>> {
    Ok(argv(&["kvstore", "get", validate::token("key", &args.key)?]))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct KvSetArgs {
    /// The key to set in the kvstore
    pub key: String,
    /// The value to set the key to
    pub value: String,
}

fn kvstore_set(args: &KvSetArgs) -> Result<Vec<String>> {
    let key = validate::token("key", &args.key)?;
    let pair = format!("{}={}", key, args.value);
    Ok(argv(&["kvstore", "set", pair.as_str()]))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BpfMapArgs {
    /// The name of the BPF map
    pub map_name: String,
}

fn bpf_map_events(args: &BpfMapArgs) -> Result<Vec<String>> {
    Ok(argv(&["bpf", "map", "events", validate::token("map_name", &args.map_name)?]))
}

fn bpf_map_get(args: &BpfMapArgs) -> Result<Vec<String>> {
    Ok(argv(&["bpf", "map", "get", validate::token("map_name", &args.map_name)?]))
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct MetricsArgs {
    /// Only list metrics matching this pattern
    #[serde(default)]
    pub match_pattern: Option<String>,
}

fn metrics_list(args: &MetricsArgs) -> Result<Vec<String>> {
    let mut out = argv(&["metrics", "list"]);
    if let Some(pattern) = validate::optional_token("match_pattern", args.match_pattern.as_deref())? {
        out.extend(argv(&["-p", pattern]));
    }
    Ok(out)
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct PolicyGetArgs {
    /// Space separated labels to display policy information for
    #[serde(default)]
    pub labels: Option<String>,
}

fn policy_get(args: &PolicyGetArgs) -> Result<Vec<String>> {
    let mut out = argv(&["policy", "get"]);
    if let Some(labels) = &args.labels {
        out.extend(labels.split_whitespace().map(str::to_string));
    }
    Ok(out)
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct PolicyDeleteArgs {
    /// Space separated labels of the policy rules to delete
    #[serde(default)]
    pub labels: Option<String>,
    /// Whether to delete all policy rules
    #[serde(default)]
    pub all: bool,
}

fn policy_delete(args: &PolicyDeleteArgs) -> Result<Vec<String>> {
    let mut out = argv(&["policy", "delete"]);
    if args.all {
        out.push("--all".to_string());
        return Ok(out);
    }
    let labels: Vec<String> = args
        .labels
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        return Err(Error::Validation("labels are required unless all is set".to_string()));
    }
    out.extend(labels);
    Ok(out)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PrefilterArgs {
    /// The list of CIDR prefixes
    pub cidr_prefixes: Vec<String>,
    /// The update revision
    #[serde(default)]
    pub revision: Option<i64>,
}

fn prefilter(verb: &str, args: &PrefilterArgs) -> Result<Vec<String>> {
    if args.cidr_prefixes.is_empty() {
        return Err(Error::Validation("cidr_prefixes must not be empty".to_string()));
    }
    let mut out = argv(&["prefilter", verb, "--cidr"]);
    for prefix in &args.cidr_prefixes {
        out.push(validate::token("cidr_prefixes", prefix)?.to_string());
    }
    if let Some(revision) = args.revision {
        out.push("--revision".to_string());
        out.push(revision.to_string());
    }
    Ok(out)
}

fn prefilter_update(args: &PrefilterArgs) -> Result<Vec<String>> {
    prefilter("update", args)
}

fn prefilter_delete(args: &PrefilterArgs) -> Result<Vec<String>> {
    prefilter("delete", args)
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ValidateCnpArgs {
    /// Enable the k8s clientset
    #[serde(default = "default_true")]
    pub enable_k8s: bool,
    /// Enable discovery of Kubernetes API groups and resources with the discovery API
    #[serde(default = "default_true")]
    pub enable_k8s_api_discovery: bool,
}

fn validate_cnp(args: &ValidateCnpArgs) -> Result<Vec<String>> {
    let mut out = argv(&["preflight", "validate-cnp"]);
    if args.enable_k8s {
        out.push("--enable-k8s".to_string());
    }
    if args.enable_k8s_api_discovery {
        out.push("--enable-k8s-api-discovery".to_string());
    }
    Ok(out)
}

/// A tool with a fixed `cilium-dbg` command line.
fn fixed(dbg: &Arc<CiliumDbg>, name: &str, description: &str, command: &'static str) -> Arc<dyn Tool> {
    bound_tool(dbg, name, description, move |dbg, _: NoArgs| async move {
        dbg.exec(split_command(command)).await
    })
}

/// A tool whose `cilium-dbg` command line is built from typed arguments.
fn command<A>(
    dbg: &Arc<CiliumDbg>,
    name: &str,
    description: &str,
    build: fn(&A) -> Result<Vec<String>>,
) -> Arc<dyn Tool>
where
    A: DeserializeOwned + JsonSchema + Send + 'static,
{
    bound_tool(dbg, name, description, move |dbg, args: A| {
        let argv = build(&args);
        async move { dbg.exec(argv?).await }
    })
}

pub fn register(registry: &mut ToolRegistry, dbg: CiliumDbg) -> Result<()> {
    let dbg = Arc::new(dbg);

    let tools = vec![
        fixed(&dbg, "get_endpoints_list", "Get the list of all endpoints in the cluster.", "endpoint list"),
        command(&dbg, "get_endpoint_details", "List the details of an endpoint in the cluster", endpoint_details),
        command(&dbg, "get_endpoint_logs", "Get the logs of an endpoint in the cluster", endpoint_logs),
        command(&dbg, "get_endpoint_health", "Get the health of an endpoint in the cluster", endpoint_health),
        command(
            &dbg,
            "manage_endpoint_labels",
            "Manage the labels (add or delete) of an endpoint in the cluster",
            endpoint_labels,
        ),
        command(
            &dbg,
            "manage_endpoint_configuration",
            "Manage the configuration of an endpoint in the cluster",
            endpoint_config,
        ),
        command(&dbg, "disconnect_endpoint", "Disconnect an endpoint from the network", endpoint_disconnect),
        fixed(&dbg, "list_identities", "List all identities in the cluster", "identity list"),
        command(&dbg, "get_identity_details", "Get the details of an identity in the cluster", identity_get),
        command(&dbg, "show_configuration_options", "Show Cilium configuration options", show_config),
        command(&dbg, "toggle_configuration_option", "Toggle a Cilium configuration option", toggle_option),
        fixed(
            &dbg,
            "request_debugging_information",
            "Request debugging information from Cilium agent",
            "debuginfo",
        ),
        fixed(&dbg, "display_encryption_state", "Display the current encryption state", "encrypt status"),
        fixed(&dbg, "flush_ipsec_state", "Flush the IPsec state", "encrypt flush -f"),
        command(&dbg, "list_envoy_config", "List the Envoy configuration", envoy_config),
        command(&dbg, "fqdn_cache", "Manage the FQDN cache", fqdn_cache),
        fixed(
            &dbg,
            "show_dns_names",
            "Show the internal state Cilium has for DNS names/regexes",
            "dns names",
        ),
        fixed(&dbg, "list_ip_addresses", "List the IP addresses in the userspace IPCache", "ip list"),
        command(&dbg, "show_ip_cache_information", "Show the information of the IP cache", ip_cache),
        command(&dbg, "delete_key_from_kvstore", "Delete a key from the kvstore", kvstore_delete),
        command(&dbg, "get_kvstore_key", "Get a key from the kvstore", kvstore_get),
        command(&dbg, "set_kvstore_key", "Set a key in the kvstore", kvstore_set),
        fixed(&dbg, "show_load_information", "Show the load information", "loadinfo"),
        fixed(&dbg, "list_local_redirect_policies", "List the local redirect policies", "lrp list"),
        command(&dbg, "list_bpf_map_events", "List the events of the BPF maps", bpf_map_events),
        command(&dbg, "get_bpf_map", "Get the BPF map", bpf_map_get),
        fixed(&dbg, "list_bpf_maps", "List all open BPF maps", "bpf map list"),
        command(&dbg, "list_metrics", "List the metrics", metrics_list),
        fixed(&dbg, "list_cluster_nodes", "List the nodes in the cluster", "nodes list"),
        fixed(&dbg, "list_node_ids", "List the node IDs and the associated IP addresses", "nodeid list"),
        command(&dbg, "display_policy_node_information", "Display the policy node information", policy_get),
        command(&dbg, "delete_policy_rules", "Delete the policy rules", policy_delete),
        fixed(&dbg, "display_selectors", "Display cached information about selectors", "policy selectors"),
        fixed(&dbg, "list_xdp_cidr_filters", "List the XDP CIDR filters (prefilter)", "prefilter list"),
        command(&dbg, "update_xdp_cidr_filters", "Update the XDP CIDR filters", prefilter_update),
        command(&dbg, "delete_xdp_cidr_filters", "Delete the XDP CIDR filters", prefilter_delete),
        command(
            &dbg,
            "validate_cilium_network_policies",
            "Validate the Cilium network policies. It's recommended to run this before upgrading Cilium to ensure all policies are valid.",
            validate_cnp,
        ),
    ];

    for tool in tools {
        registry.register(tool)?;
    }
    Ok(())
}
