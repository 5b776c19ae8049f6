//! Recovery chain: try configured strategies in order until one succeeds
//!
//! ```text
//! NotStarted -> TryingStrategy(0) -> TryingStrategy(1) -> ... -> ExhaustedFailed
//!                      |                    |
//!                      +--------------------+----------------> Succeeded
//! ```
//!
//! Transitions are linear. A strategy is attempted once; there is no retry
//! and no backtracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::strategies::{RecoveryEnv, StrategyRegistry};
use crate::config::validate_strategies;
use crate::error::{Result, WeatherError};

/// Audit record of one recovery invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub attempts: Vec<RecoveryAttempt>,
}

impl RecoveryResult {
    /// Strategy that restored the context, if any
    pub fn recovered_by(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.success)
            .map(|a| a.strategy.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub strategy: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    NotStarted,
    /// About to attempt the strategy at this index of the configured order
    TryingStrategy(usize),
    Succeeded,
    ExhaustedFailed,
}

impl ChainState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChainState::Succeeded | ChainState::ExhaustedFailed)
    }
}

/// One pass over the configured strategy order
#[derive(Debug)]
pub struct RecoveryChain {
    order: Vec<String>,
    state: ChainState,
    started: DateTime<Utc>,
    attempts: Vec<RecoveryAttempt>,
}

impl RecoveryChain {
    /// Fails only for an empty order or a blank strategy name
    pub fn new(order: Vec<String>) -> Result<Self> {
        validate_strategies(&order)?;
        Ok(Self {
            order,
            state: ChainState::NotStarted,
            started: Utc::now(),
            attempts: Vec::new(),
        })
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn attempts(&self) -> &[RecoveryAttempt] {
        &self.attempts
    }

    /// Perform one transition and return the new state
    pub fn step(&mut self, registry: &StrategyRegistry, env: &RecoveryEnv<'_>) -> ChainState {
        self.state = match self.state {
            ChainState::NotStarted => ChainState::TryingStrategy(0),
            ChainState::TryingStrategy(index) => {
                if self.try_strategy(index, registry, env) {
                    ChainState::Succeeded
                } else if index + 1 < self.order.len() {
                    ChainState::TryingStrategy(index + 1)
                } else {
                    ChainState::ExhaustedFailed
                }
            }
            terminal => terminal,
        };
        self.state
    }

    /// Step until a terminal state and produce the audit record
    pub fn run(mut self, registry: &StrategyRegistry, env: &RecoveryEnv<'_>) -> RecoveryResult {
        while !self.state.is_terminal() {
            self.step(registry, env);
        }
        self.into_result()
    }

    pub fn into_result(self) -> RecoveryResult {
        RecoveryResult {
            success: self.state == ChainState::Succeeded,
            timestamp: self.started,
            attempts: self.attempts,
        }
    }

    fn try_strategy(
        &mut self,
        index: usize,
        registry: &StrategyRegistry,
        env: &RecoveryEnv<'_>,
    ) -> bool {
        let name = self.order[index].clone();
        let timestamp = Utc::now();

        let outcome = match registry.get(&name) {
            Some(strategy) => strategy.attempt(env),
            None => Err(WeatherError::UnknownStrategy(name.clone())),
        };

        let attempt = match outcome {
            Ok(()) => {
                tracing::info!(strategy = %name, "recovery succeeded");
                RecoveryAttempt {
                    message: Some(format!("Successfully recovered using {} strategy", name)),
                    strategy: name,
                    success: true,
                    timestamp,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(strategy = %name, error = %e, "recovery strategy failed");
                RecoveryAttempt {
                    strategy: name,
                    success: false,
                    timestamp,
                    message: None,
                    error: Some(e.to_string()),
                }
            }
        };

        let success = attempt.success;
        self.attempts.push(attempt);
        success
    }
}
