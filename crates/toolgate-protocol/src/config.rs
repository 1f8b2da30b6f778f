//! Coordinator configuration.
//!
//! Every field has a default, so a partial JSON document is a valid config.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which execution strategy handles an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Run the handler in-process through the execution engine.
    #[default]
    Internal,
    /// Hand the call to an external actor and await its result.
    Outside,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => f.write_str("internal"),
            Self::Outside => f.write_str("outside"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "internal" => Ok(Self::Internal),
            "outside" | "external" => Ok(Self::Outside),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_size: usize,
    pub ttl_ms: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionDefaults {
    /// `None` disables the timeout race.
    pub timeout_ms: Option<u64>,
    pub retries: u32,
    pub retry_base_delay_ms: u64,
}

impl ExecutionDefaults {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl Default for ExecutionDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: Some(30_000),
            retries: 0,
            retry_base_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub failure_threshold: u32,
    /// How long a tool stays failed before a sweep may recover it.
    pub failure_duration_ms: u64,
    /// Delay between tripping and the one-shot recovery sweep.
    pub rebind_delay_ms: u64,
}

impl StatusConfig {
    pub fn failure_duration(&self) -> Duration {
        Duration::from_millis(self.failure_duration_ms)
    }

    pub fn rebind_delay(&self) -> Duration {
        Duration::from_millis(self.rebind_delay_ms)
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_duration_ms: 60_000,
            rebind_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutsideConfig {
    pub wait_for_result: bool,
    pub timeout_ms: u64,
    /// How many resolved call ids are remembered for duplicate detection.
    /// Older ids are forgotten and then report as unknown.
    pub resolved_history: usize,
}

impl OutsideConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for OutsideConfig {
    fn default() -> Self {
        Self {
            wait_for_result: true,
            timeout_ms: 30_000,
            resolved_history: 1_024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub cache: CacheConfig,
    pub execution: ExecutionDefaults,
    pub status: StatusConfig,
    pub outside: OutsideConfig,
    pub default_strategy: StrategyKind,
    /// Refuse to invoke tools whose dependencies are unmet.
    pub enforce_availability: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            execution: ExecutionDefaults::default(),
            status: StatusConfig::default(),
            outside: OutsideConfig::default(),
            default_strategy: StrategyKind::Internal,
            enforce_availability: true,
        }
    }
}
