use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use toolgate_kernel::{CoordinatorBuilder, StrategyOutcome, ToolCoordinator, load_config};
use toolgate_protocol::{
    ContextCondition, CoordinatorConfig, Dependency, DependencyGroup, ExecutionContext,
    ExecutionOptions, ExternalResult, StrategyKind, ToolDefinition, handler_fn,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "toolgated")]
#[command(about = "Dependency-gated tool coordinator demo daemon")]
struct Cli {
    /// JSON config file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured default strategy.
    #[arg(long)]
    strategy: Option<StrategyKind>,
    #[arg(long)]
    json_logs: bool,
    #[arg(long, default_value = "demo")]
    session: String,
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).compact().init();
    }
}

fn pipeline() -> Result<Vec<ToolDefinition>> {
    let fetch = ToolDefinition::builder("fetch")
        .description("Fetch a document by URL")
        .input_schema(json!({
            "type": "object",
            "properties": { "url": { "type": "string" } },
            "required": ["url"]
        }))
        .tag("io")
        .handler(handler_fn(|input, _context| async move {
            let url = input["url"].as_str().unwrap_or_default().to_owned();
            Ok(json!({
                "url": url,
                "body": "Tools unlock one another as their dependencies execute successfully."
            }))
        }))
        .build()?;

    let summarize = ToolDefinition::builder("summarize")
        .description("Summarize fetched text")
        .input_schema(json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        }))
        .dependency_group(DependencyGroup::requires(["fetch"]).describe("needs a document"))
        .handler(handler_fn(|input, _context| async move {
            let text = input["text"].as_str().unwrap_or_default();
            let summary: Vec<&str> = text.split_whitespace().take(4).collect();
            Ok(json!({ "summary": summary.join(" ") }))
        }))
        .build()?;

    let publish = ToolDefinition::builder("publish")
        .description("Publish a reviewed summary")
        .security_label("external-write")
        .dependency_group(DependencyGroup::sequence(vec![
            Dependency::required("fetch"),
            Dependency::required("summarize")
                .when(ContextCondition::metadata_equals("review", "passed")),
        ]))
        .handler(handler_fn(|input, context| async move {
            Ok(json!({
                "published": true,
                "session": context.session_id,
                "payload": input
            }))
        }))
        .build()?;

    Ok(vec![fetch, summarize, publish])
}

/// Stands in for an out-of-process executor: runs dispatched calls with the
/// registered handler and reports the result back.
fn spawn_outside_actor(coordinator: ToolCoordinator) -> tokio::task::JoinHandle<()> {
    let mut dispatch = coordinator.subscribe_dispatch();
    tokio::spawn(async move {
        while let Ok(call) = dispatch.recv().await {
            let outcome = match coordinator.registry().get(&call.tool_name) {
                Some(definition) => match definition
                    .handler
                    .call(call.args.clone(), call.context.clone())
                    .await
                {
                    Ok(data) => ExternalResult::ok(data),
                    Err(error) => ExternalResult::err(format!("{error:#}")),
                },
                None => ExternalResult::err(format!("unknown tool {}", call.tool_name)),
            };
            if let Err(error) = coordinator.resolve_external_result(&call.id, outcome) {
                warn!(call_id = %call.id, %error, "external result rejected");
            }
        }
    })
}

fn log_outcome(outcome: &StrategyOutcome) {
    match outcome {
        StrategyOutcome::Completed(result) if result.success => info!(
            tool = %result.tool_name,
            from_cache = result.from_cache,
            elapsed_ms = result.execution_time_ms,
            "tool succeeded"
        ),
        StrategyOutcome::Completed(result) => warn!(
            tool = %result.tool_name,
            error = %result.error_message().unwrap_or_default(),
            "tool failed"
        ),
        StrategyOutcome::Pending(call) => {
            info!(tool = %call.tool_name, call_id = %call.id, "tool call pending")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = match &cli.config {
        Some(path) => load_config(path).await?,
        None => CoordinatorConfig::default(),
    };
    let mut builder = CoordinatorBuilder::new().config(config);
    if let Some(strategy) = cli.strategy {
        builder = builder.default_strategy(strategy);
    }
    let coordinator = builder.build();

    coordinator.on_any_event(|event| {
        let rendered = serde_json::to_string(event)?;
        info!(event = %rendered, "tool.event");
        Ok(())
    });

    for definition in pipeline()? {
        coordinator
            .register(definition)
            .context("failed to register pipeline tool")?;
    }

    let actor = (coordinator.default_strategy() == StrategyKind::Outside)
        .then(|| spawn_outside_actor(coordinator.clone()));

    let context = ExecutionContext::for_session(cli.session.clone());
    let fetched = coordinator
        .invoke(
            "fetch",
            json!({ "url": "https://example.org/notes" }),
            ExecutionOptions::new().with_context(context.clone()),
        )
        .await;
    log_outcome(&fetched);

    let body = fetched
        .result()
        .and_then(|result| result.data.as_ref())
        .and_then(|data| data["body"].as_str())
        .unwrap_or_default()
        .to_owned();
    let reviewed = context.clone().with_metadata("review", "passed");
    let summarized = coordinator
        .invoke(
            "summarize",
            json!({ "text": body }),
            ExecutionOptions::new().with_context(reviewed),
        )
        .await;
    log_outcome(&summarized);

    let summary = summarized
        .result()
        .and_then(|result| result.data.clone())
        .unwrap_or_default();
    let published = coordinator
        .invoke(
            "publish",
            summary,
            ExecutionOptions::new().with_context(context),
        )
        .await;
    log_outcome(&published);

    if let Some(path) = coordinator.execution_path("publish") {
        info!(path = %path.join(" -> "), "execution path");
    }

    let report = json!({
        "strategy": coordinator.default_strategy(),
        "tools": coordinator.registration_statuses(),
        "status": coordinator.tool_statuses(),
        "executions": coordinator.execution_stats(),
        "cache": coordinator.cache_stats(),
        "pending": coordinator.pending_calls(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(actor) = actor {
        actor.abort();
        if let Err(error) = actor.await
            && !error.is_cancelled()
        {
            warn!(%error, "outside actor stopped");
        }
    }

    Ok(())
}
