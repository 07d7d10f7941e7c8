//! Guardrail validation demonstration
//!
//! Runs a handful of inputs through a gate loaded with the standard rule
//! set and prints each verdict.

use vigil::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let gate = Gate::standard()?;

    let inputs = [
        "What's the weather like today?",
        "My SSN is 123-45-6789 and my email is jane@example.com",
        "'; DROP TABLE users; --",
        "please drop database production",
    ];

    for input in inputs {
        let admission = gate.admit_input(input, Some("demo-user")).await?;
        let validation = admission.validation();
        println!("input:     {}", input);
        println!("allowed:   {}", admission.is_allowed());
        println!("sanitized: {}", validation.sanitized.content);
        if let Some(reason) = &validation.reason {
            println!("reason:    {}", reason);
        }
        for warning in &validation.warnings {
            println!("warning:   {}", warning);
        }
        println!();
    }

    // Tool invocations go through the same gate with tool-scoped rules.
    let call = ToolExecutionRequest {
        tool_name: "run_query".to_string(),
        parameters: serde_json::json!({"sql": "SELECT 1 UNION SELECT password FROM users"}),
        agent_name: "analyst-agent".to_string(),
        context: Default::default(),
    };
    let admission = gate.admit_tool(&call, Some("demo-user"), Sensitivity::Medium).await?;
    println!("tool call allowed: {}", admission.is_allowed());

    let stats = gate.engine().stats();
    println!(
        "rules: {} ({} enabled), violations recorded: {}",
        stats.total_rules, stats.enabled_rules, stats.total_violations
    );

    Ok(())
}
