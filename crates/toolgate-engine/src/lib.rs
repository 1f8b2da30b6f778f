use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonschema::JSONSchema;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use toolgate_cache::ExecutionCache;
use toolgate_protocol::{
    ExecutionContext, ExecutionDefaults, ExecutionError, ExecutionOptions, ExecutionResult,
    ToolDefinition, ToolHandler,
};
use tracing::{debug, instrument, warn};

/// Delay before retry number `attempt` (0-based): `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Runs tool handlers with cache consultation, input validation, a timeout
/// race and exponential-backoff retries.
///
/// The engine never consults dependency availability; gating is the
/// registry's job. Concurrent calls for the same key are not coalesced.
pub struct ExecutionEngine {
    cache: Arc<ExecutionCache>,
    defaults: ExecutionDefaults,
    validators: Mutex<HashMap<String, Arc<JSONSchema>>>,
}

impl ExecutionEngine {
    pub fn new(cache: Arc<ExecutionCache>, defaults: ExecutionDefaults) -> Self {
        Self {
            cache,
            defaults,
            validators: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<ExecutionCache> {
        &self.cache
    }

    pub fn defaults(&self) -> &ExecutionDefaults {
        &self.defaults
    }

    /// Drop memoized schema and cached results for a tool.
    pub fn forget_tool(&self, tool_name: &str) {
        self.validators.lock().remove(tool_name);
        let removed = self.cache.invalidate_tool(tool_name);
        debug!(tool = %tool_name, removed, "engine state for tool dropped");
    }

    fn validator_for(&self, definition: &ToolDefinition) -> Result<Arc<JSONSchema>, ExecutionError> {
        if let Some(validator) = self.validators.lock().get(&definition.name) {
            return Ok(validator.clone());
        }

        let compiled = JSONSchema::compile(&definition.input_schema).map_err(|error| {
            ExecutionError::Validation {
                message: format!("input schema does not compile: {error}"),
            }
        })?;
        let compiled = Arc::new(compiled);
        self.validators
            .lock()
            .insert(definition.name.clone(), compiled.clone());
        Ok(compiled)
    }

    pub fn validate_input(
        &self,
        definition: &ToolDefinition,
        input: &Value,
    ) -> Result<(), ExecutionError> {
        let validator = self.validator_for(definition)?;
        if let Err(errors) = validator.validate(input) {
            let message = errors
                .map(|error| error.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ExecutionError::Validation { message });
        }
        Ok(())
    }

    #[instrument(
        name = "tool.execute",
        skip(self, definition, input, options),
        fields(tool = %definition.name)
    )]
    pub async fn execute(
        &self,
        definition: &ToolDefinition,
        input: Value,
        options: &ExecutionOptions,
    ) -> ExecutionResult {
        let started = Instant::now();
        let use_cache = options.use_cache.unwrap_or(true);
        let cache_key = ExecutionCache::key(&definition.name, &input, options.context.as_ref());

        if use_cache && let Some(cached) = self.cache.get(&cache_key) {
            debug!("cache hit");
            return ExecutionResult::cached(&definition.name, cached);
        }

        if let Err(error) = self.validate_input(definition, &input) {
            warn!(%error, "input rejected by schema");
            return ExecutionResult::failure(&definition.name, error, elapsed_ms(started));
        }

        let retries = options.retries.unwrap_or(self.defaults.retries);
        let base_delay = options
            .retry_base_delay
            .unwrap_or_else(|| self.defaults.retry_base_delay());
        let limit = options.timeout.or_else(|| self.defaults.timeout());
        let context = options.context_or_default();

        let max_attempts = retries.saturating_add(1);
        let mut attempt = 0_u32;
        let last_error = loop {
            attempt += 1;
            match run_handler(
                definition.handler.clone(),
                input.clone(),
                context.clone(),
                limit,
            )
            .await
            {
                Ok(output) => {
                    if use_cache {
                        self.cache
                            .insert(cache_key, &definition.name, output.clone());
                    }
                    let elapsed = elapsed_ms(started);
                    debug!(attempt, elapsed_ms = elapsed, "handler succeeded");
                    return ExecutionResult::success(&definition.name, output, elapsed)
                        .with_attempts(attempt);
                }
                Err(error) => {
                    if attempt >= max_attempts || !error.is_retryable() {
                        break error;
                    }
                    let delay = backoff_delay(base_delay, attempt - 1);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "handler failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        };

        warn!(attempts = attempt, error = %last_error, "execution failed");
        ExecutionResult::failure(&definition.name, last_error, elapsed_ms(started))
            .with_attempts(attempt)
    }
}

/// One handler invocation, raced against `limit` when set.
///
/// The handler runs on its own task. When the timer wins, the task is
/// detached, not aborted, and may keep running after the caller has moved on.
async fn run_handler(
    handler: Arc<dyn ToolHandler>,
    input: Value,
    context: ExecutionContext,
    limit: Option<Duration>,
) -> Result<Value, ExecutionError> {
    let task = tokio::spawn(async move { handler.call(input, context).await });

    let joined = match limit {
        Some(limit) => match timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "handler timed out; task left running"
                );
                return Err(ExecutionError::Timeout {
                    after_ms: limit.as_millis() as u64,
                });
            }
        },
        None => task.await,
    };

    match joined {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(error)) => Err(ExecutionError::Handler {
            message: format!("{error:#}"),
        }),
        Err(join_error) if join_error.is_panic() => Err(ExecutionError::Handler {
            message: "handler panicked".to_owned(),
        }),
        Err(_) => Err(ExecutionError::Handler {
            message: "handler task was cancelled".to_owned(),
        }),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
