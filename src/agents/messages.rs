// Protocol envelopes exchanged between the conductor and its workers
//
// Every message is one-shot and fire-and-forget. There is no correlation id;
// replies are matched by per-channel ordering and local state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::AgentState;
use super::types::{Task, TaskSummary};

const INBOUND_TYPES: [&str; 4] = ["initialize", "initializeWithState", "task", "prepareHandoff"];

/// Conductor -> worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum CoordinatorMessage {
    #[serde(rename_all = "camelCase")]
    Initialize {
        agent_id: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    InitializeWithState {
        agent_id: String,
        #[serde(default)]
        api_key: Option<String>,
        state: AgentState,
        #[serde(default)]
        continuation_point: serde_json::Value,
    },
    Task {
        task: Task,
    },
    PrepareHandoff,
    /// A message whose type tag the worker does not recognize
    #[serde(skip)]
    Unknown(String),
}

impl CoordinatorMessage {
    /// Parses a raw envelope, mapping unrecognized type tags to `Unknown`
    /// instead of failing.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let tag = value
            .get("type")
            .and_then(|t| t.as_str())
            .map(str::to_owned);

        match tag {
            Some(tag) if !INBOUND_TYPES.contains(&tag.as_str()) => Ok(Self::Unknown(tag)),
            _ => serde_json::from_value(value),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::InitializeWithState { .. } => "initializeWithState",
            Self::Task { .. } => "task",
            Self::PrepareHandoff => "prepareHandoff",
            Self::Unknown(tag) => tag,
        }
    }
}

/// Worker -> conductor, stamped with sender identity and send time
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerMessage {
    /// Absent only for errors raised before `initialize`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: WorkerEvent,
}

impl WorkerMessage {
    pub fn new(agent_id: Option<String>, event: WorkerEvent) -> Self {
        Self {
            agent_id,
            timestamp: Utc::now(),
            event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum WorkerEvent {
    #[serde(rename_all = "camelCase")]
    Initialized { agent_id: String },
    #[serde(rename_all = "camelCase")]
    StateLoaded {
        agent_id: String,
        continuation_point: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    Progress { task_id: String, progress: u8 },
    #[serde(rename_all = "camelCase")]
    FileUpdate {
        task_id: String,
        path: String,
        content: String,
        language: String,
        #[serde(rename = "type")]
        category: String,
    },
    ContextLimitApproaching { usage: f64, state: AgentState },
    #[serde(rename_all = "camelCase")]
    Complete { task_id: String, result: TaskSummary },
    #[serde(rename_all = "camelCase")]
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
    },
    HandoffReady { state: AgentState },
}

impl WorkerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Initialized { .. } => "initialized",
            Self::StateLoaded { .. } => "stateLoaded",
            Self::Progress { .. } => "progress",
            Self::FileUpdate { .. } => "fileUpdate",
            Self::ContextLimitApproaching { .. } => "contextLimitApproaching",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
            Self::HandoffReady { .. } => "handoffReady",
        }
    }

    /// The task this event refers to, if any
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Progress { task_id, .. }
            | Self::FileUpdate { task_id, .. }
            | Self::Complete { task_id, .. } => Some(task_id),
            Self::Error { task_id, .. } => task_id.as_deref(),
            _ => None,
        }
    }

    /// `complete` and `error` end a task
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { task_id: Some(_), .. })
    }
}
