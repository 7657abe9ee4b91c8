use lazy_static::lazy_static;
use prometheus::{opts, IntCounterVec, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref TOOL_CALLS_TOTAL: IntCounterVec = {
        let counter = IntCounterVec::new(
            opts!("kagent_tool_calls_total", "Total number of tool invocations."),
            &["tool", "outcome"],
        )
        .expect("valid tool call counter definition");
        REGISTRY
            .register(Box::new(counter.clone()))
            .expect("tool call counter registered once");
        counter
    };
}

/// Count one invocation of `tool`.
pub fn record_tool_call(tool: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    TOOL_CALLS_TOTAL.with_label_values(&[tool, outcome]).inc();
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> String {
    TextEncoder::new()
        .encode_to_string(&REGISTRY.gather())
        .unwrap_or_else(|e| format!("# failed to encode metrics: {}\n", e))
}
