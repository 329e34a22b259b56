// Transferable agent state
//
// A handoff snapshot carries no specialization-specific fields so any
// worker can load it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::ContextSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    #[serde(default)]
    pub context: ContextSnapshot,
    #[serde(default)]
    pub working_memory: serde_json::Value,
    pub last_checkpoint: DateTime<Utc>,
    #[serde(default)]
    pub files_in_progress: Vec<String>,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
}

impl AgentState {
    pub fn new(context: ContextSnapshot) -> Self {
        Self {
            context,
            working_memory: serde_json::Value::Null,
            last_checkpoint: Utc::now(),
            files_in_progress: Vec::new(),
            completed_tasks: Vec::new(),
        }
    }
}
