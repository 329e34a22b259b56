use std::net::SocketAddr;
use std::str::FromStr;

use crate::agents::context::DEFAULT_MAX_TOKENS;
use crate::agents::worker::{WorkerSettings, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_MODEL};
use crate::agents::{AgentError, AgentResult, ConductorSettings};
use crate::llm::DEFAULT_BASE_URL;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Process configuration, read from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub context_budget: u64,
    pub max_output_tokens: u32,
    pub auto_handoff: bool,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Load from process environment variables.
    ///
    /// Call `dotenv::dotenv()` first so a local `.env` file is honored.
    pub fn from_env() -> AgentResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> AgentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENROUTER_API_KEY");
        if api_key.is_none() {
            tracing::warn!("OPENROUTER_API_KEY not set, tasks will fail until one is provided");
        }

        Ok(Self {
            api_key,
            base_url: get("OPENROUTER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: get("AGENT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            context_budget: parse_or(get("CONTEXT_BUDGET"), "CONTEXT_BUDGET", DEFAULT_MAX_TOKENS)?,
            max_output_tokens: parse_or(get("MAX_OUTPUT_TOKENS"), "MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS)?,
            auto_handoff: parse_or(get("AUTO_HANDOFF"), "AUTO_HANDOFF", true)?,
            bind_addr: parse_or(
                Some(get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())),
                "BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 3000)),
            )?,
        })
    }

    pub fn conductor_settings(&self) -> ConductorSettings {
        ConductorSettings {
            worker: WorkerSettings {
                model: self.model.clone(),
                max_output_tokens: self.max_output_tokens,
                context_budget: self.context_budget,
            },
            api_key: self.api_key.clone(),
            auto_handoff: self.auto_handoff,
            ..ConductorSettings::default()
        }
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> AgentResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| AgentError::ConfigError(format!("{}={:?}: {}", key, value, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AgentResult<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config(&[]).unwrap();

        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.context_budget, 100_000);
        assert_eq!(config.max_output_tokens, 3000);
        assert!(config.auto_handoff);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("OPENROUTER_API_KEY", "sk-live"),
            ("AGENT_MODEL", "openai/gpt-4o"),
            ("CONTEXT_BUDGET", "5000"),
            ("AUTO_HANDOFF", "false"),
            ("BIND_ADDR", "127.0.0.1:8080"),
        ])
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("sk-live"));
        assert_eq!(config.context_budget, 5000);
        assert!(!config.auto_handoff);

        let settings = config.conductor_settings();
        assert_eq!(settings.worker.model, "openai/gpt-4o");
        assert_eq!(settings.worker.context_budget, 5000);
        assert!(!settings.auto_handoff);
    }

    #[test]
    fn blank_api_key_counts_as_unset() {
        let config = config(&[("OPENROUTER_API_KEY", "  ")]).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn unparseable_value_is_a_config_error() {
        let err = config(&[("CONTEXT_BUDGET", "-10")]).unwrap_err();
        assert!(matches!(err, AgentError::ConfigError(ref msg) if msg.contains("CONTEXT_BUDGET")));
    }
}
