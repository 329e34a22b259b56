// Agent system modules
//
// Specialist workers that turn tasks into generated files through an LLM,
// and the conductor that spawns them, routes tasks and hands off context.

pub mod conductor;
pub mod context;
pub mod errors;
pub mod events;
pub mod messages;
pub mod payload;
pub mod prompts;
pub mod specialists;
pub mod state;
pub mod types;
pub mod worker;

// Re-export main types
pub use conductor::{AgentView, Conductor, ConductorSettings, Dashboard};
pub use context::ContextTracker;
pub use errors::{AgentError, AgentResult};
pub use messages::{CoordinatorMessage, WorkerEvent, WorkerMessage};
pub use state::AgentState;
pub use types::{Specialization, Task, TaskRequirements, TaskSummary, WorkerStatus};
pub use worker::{AgentWorker, WorkerHandle, WorkerSettings};
