//! Context tracker - token usage against a fixed budget.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TOKENS: u64 = 100_000;

/// Usage ratio above which the coordinator is warned.
pub const WARNING_THRESHOLD: f64 = 0.8;

/// Transferable tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    #[serde(default)]
    pub tokens: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
}

fn default_max_tokens() -> u64 {
    DEFAULT_MAX_TOKENS
}

impl Default for ContextSnapshot {
    fn default() -> Self {
        Self {
            tokens: 0,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Tracks accumulated token usage for one worker.
///
/// # Invariants
/// - `tokens` never decreases except through [`ContextTracker::load_state`]
/// - usage is not clamped; a ratio above 1.0 means the budget was overrun
#[derive(Debug, Clone, PartialEq)]
pub struct ContextTracker {
    tokens: u64,
    max_tokens: u64,
}

impl ContextTracker {
    pub fn new(max_tokens: u64) -> Self {
        Self { tokens: 0, max_tokens }
    }

    /// Adds `tokens` to the running total.
    ///
    /// Returns `true` when this increment moved usage above
    /// [`WARNING_THRESHOLD`]; later increments that stay above it return
    /// `false`, so each crossing is reported once.
    pub fn add_usage(&mut self, tokens: u64) -> bool {
        let before = self.usage();
        self.tokens = self.tokens.saturating_add(tokens);
        before <= WARNING_THRESHOLD && self.usage() > WARNING_THRESHOLD
    }

    /// Running total divided by budget.
    pub fn usage(&self) -> f64 {
        if self.max_tokens == 0 {
            return if self.tokens == 0 { 0.0 } else { f64::INFINITY };
        }
        self.tokens as f64 / self.max_tokens as f64
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn max_tokens(&self) -> u64 {
        self.max_tokens
    }

    pub fn serialize(&self) -> ContextSnapshot {
        ContextSnapshot {
            tokens: self.tokens,
            max_tokens: self.max_tokens,
        }
    }

    /// Replaces the running total and budget.
    pub fn load_state(&mut self, snapshot: ContextSnapshot) {
        self.tokens = snapshot.tokens;
        self.max_tokens = snapshot.max_tokens;
    }
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}
