use serde::{Deserialize, Serialize};

/// A unit of work assigned to exactly one worker.
///
/// Tasks are never mutated after dispatch; completion and failure are
/// reported through worker messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub requirements: TaskRequirements,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, requirements: TaskRequirements) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            requirements,
        }
    }

    /// The specialization this task is tagged for
    pub fn task_type(&self) -> Specialization {
        self.requirements.specialization()
    }
}

/// Type-specific requirements, tagged by the task type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TaskRequirements {
    FrontendArchitect(FrontendRequirements),
    Backend(BackendRequirements),
    Database(DatabaseRequirements),
    Testing(TestingRequirements),
}

impl TaskRequirements {
    pub fn specialization(&self) -> Specialization {
        match self {
            TaskRequirements::FrontendArchitect(_) => Specialization::FrontendArchitect,
            TaskRequirements::Backend(_) => Specialization::Backend,
            TaskRequirements::Database(_) => Specialization::Database,
            TaskRequirements::Testing(_) => Specialization::Testing,
        }
    }
}

/// A UI component request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendRequirements {
    pub component_name: String,
    pub description: String,
    #[serde(default)]
    pub props: Vec<String>,
    #[serde(default)]
    pub styling: Option<String>,
}

/// A server endpoint request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendRequirements {
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    pub description: String,
    #[serde(default)]
    pub framework: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// A schema request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseRequirements {
    pub schema_name: String,
    pub entities: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub dialect: Option<String>,
}

/// A test suite request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestingRequirements {
    pub target: String,
    pub description: String,
    #[serde(default)]
    pub framework: Option<String>,
}

/// Worker specialization types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Specialization {
    FrontendArchitect,
    Backend,
    Database,
    Testing,
}

impl std::fmt::Display for Specialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Specialization::FrontendArchitect => write!(f, "frontend-architect"),
            Specialization::Backend => write!(f, "backend"),
            Specialization::Database => write!(f, "database"),
            Specialization::Testing => write!(f, "testing"),
        }
    }
}

/// Lifecycle status of a worker
///
/// # Status Transitions
/// ```text
/// Uninitialized -> Initialized -> Busy <-> Idle
///               \-> StateLoaded -^
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkerStatus {
    Uninitialized,
    Initialized,
    StateLoaded,
    Busy,
    Idle,
}

impl WorkerStatus {
    /// Checks if a transition from current status to next status is valid
    ///
    /// # Example
    /// ```
    /// use agent_conductor::agents::types::WorkerStatus;
    ///
    /// assert!(WorkerStatus::Uninitialized.can_transition_to(WorkerStatus::Initialized));
    /// assert!(!WorkerStatus::Uninitialized.can_transition_to(WorkerStatus::Busy));
    /// ```
    pub fn can_transition_to(&self, next: WorkerStatus) -> bool {
        use WorkerStatus::*;
        matches!(
            (self, next),
            (Uninitialized, Initialized)
                | (Uninitialized, StateLoaded)
                | (Initialized, Busy)
                | (StateLoaded, Busy)
                | (Idle, Busy)
                | (Busy, Idle)
        )
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Uninitialized => write!(f, "uninitialized"),
            WorkerStatus::Initialized => write!(f, "initialized"),
            WorkerStatus::StateLoaded => write!(f, "stateLoaded"),
            WorkerStatus::Busy => write!(f, "busy"),
            WorkerStatus::Idle => write!(f, "idle"),
        }
    }
}

/// Result summary carried by a `complete` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub path: String,
    pub line_count: usize,
    pub features: Vec<String>,
    pub repaired: bool,
    /// Tokens consumed by this task, repair included
    pub tokens: u64,
}
