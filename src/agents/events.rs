// Conductor activity events
//
// The dashboard reads these from a bounded log to show what happened to
// each agent.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::Specialization;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ConductorEvent {
    #[serde(rename_all = "camelCase")]
    WorkerSpawned {
        agent_id: String,
        specialization: Specialization,
    },
    #[serde(rename_all = "camelCase")]
    TaskQueued { agent_id: String, task_id: String },
    #[serde(rename_all = "camelCase")]
    TaskDispatched { agent_id: String, task_id: String },
    #[serde(rename_all = "camelCase")]
    TaskCompleted { agent_id: String, task_id: String },
    #[serde(rename_all = "camelCase")]
    TaskFailed {
        agent_id: String,
        task_id: Option<String>,
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    ContextLimitApproaching { agent_id: String, usage: f64 },
    #[serde(rename_all = "camelCase")]
    HandoffCompleted { agent_id: String, successor_id: String },
    #[serde(rename_all = "camelCase")]
    WorkerRetired { agent_id: String },
}

impl ConductorEvent {
    /// Returns the agent this event is about
    pub fn agent_id(&self) -> &str {
        match self {
            ConductorEvent::WorkerSpawned { agent_id, .. }
            | ConductorEvent::TaskQueued { agent_id, .. }
            | ConductorEvent::TaskDispatched { agent_id, .. }
            | ConductorEvent::TaskCompleted { agent_id, .. }
            | ConductorEvent::TaskFailed { agent_id, .. }
            | ConductorEvent::ContextLimitApproaching { agent_id, .. }
            | ConductorEvent::HandoffCompleted { agent_id, .. }
            | ConductorEvent::WorkerRetired { agent_id } => agent_id,
        }
    }
}

/// A logged event with the time the conductor observed it
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ConductorEvent,
}

impl ActivityEntry {
    pub fn now(event: ConductorEvent) -> Self {
        Self { at: Utc::now(), event }
    }
}
