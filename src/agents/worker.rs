use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinHandle};

use super::context::{ContextTracker, DEFAULT_MAX_TOKENS};
use super::errors::{AgentError, AgentResult};
use super::messages::{CoordinatorMessage, WorkerEvent, WorkerMessage};
use super::payload::extract_payload;
use super::prompts::library;
use super::specialists::Specialist;
use super::state::AgentState;
use super::types::{Task, TaskSummary, WorkerStatus};
use crate::llm::{ChatMessage, ClientFactory, CompletionClient, CompletionRequest};

pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 3000;

/// Progress checkpoints reported while a task runs
const PROGRESS_ACCEPTED: u8 = 10;
const PROGRESS_GENERATED: u8 = 80;
const PROGRESS_DONE: u8 = 100;

/// Settings shared by every worker a conductor spawns
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub model: String,
    pub max_output_tokens: u32,
    pub context_budget: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            context_budget: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Identity and credentials produced by initialization
#[derive(Clone)]
pub struct WorkerConfig {
    pub agent_id: String,
    pub client: Option<Arc<dyn CompletionClient>>,
}

/// Progress data that survives a handoff
struct Ledger {
    tracker: ContextTracker,
    working_memory: serde_json::Value,
    files_in_progress: Vec<String>,
    completed_tasks: Vec<String>,
}

impl Ledger {
    fn new(context_budget: u64) -> Self {
        Self {
            tracker: ContextTracker::new(context_budget),
            working_memory: serde_json::Value::Null,
            files_in_progress: Vec::new(),
            completed_tasks: Vec::new(),
        }
    }

    fn snapshot(&self) -> AgentState {
        let mut state = AgentState::new(self.tracker.serialize());
        state.working_memory = self.working_memory.clone();
        state.files_in_progress = self.files_in_progress.clone();
        state.completed_tasks = self.completed_tasks.clone();
        state
    }

    /// Last generated file, kept under `working_memory` for a successor
    fn remember_output(&mut self, task_id: &str, path: &str) {
        if !self.working_memory.is_object() {
            self.working_memory = serde_json::json!({});
        }
        if let Some(memory) = self.working_memory.as_object_mut() {
            memory.insert("lastTask".to_string(), task_id.into());
            memory.insert("lastFile".to_string(), path.into());
        }
    }

    fn restore(&mut self, state: AgentState) {
        self.tracker.load_state(state.context);
        self.working_memory = state.working_memory;
        self.files_in_progress = state.files_in_progress;
        self.completed_tasks = state.completed_tasks;
    }
}

/// Sending half of the worker -> conductor channel
#[derive(Clone)]
struct Outbox {
    tx: mpsc::UnboundedSender<WorkerMessage>,
    agent_id: Option<String>,
}

impl Outbox {
    fn emit(&self, event: WorkerEvent) {
        let kind = event.kind();
        if self
            .tx
            .send(WorkerMessage::new(self.agent_id.clone(), event))
            .is_err()
        {
            tracing::debug!(agent_id = ?self.agent_id, kind, "conductor channel closed, dropping message");
        }
    }
}

/// Conductor-side handle to a spawned worker
pub struct WorkerHandle {
    inbox: mpsc::UnboundedSender<CoordinatorMessage>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn send(&self, message: CoordinatorMessage) -> AgentResult<()> {
        self.inbox
            .send(message)
            .map_err(|e| AgentError::MessageDeliveryFailed(format!("worker inbox closed ({})", e.0.kind())))
    }

    /// Deliver a raw JSON envelope; unknown types reach the worker as `Unknown`
    pub fn post_json(&self, value: serde_json::Value) -> AgentResult<()> {
        self.send(CoordinatorMessage::from_value(value)?)
    }

    /// Close the inbox and wait for the worker loop to exit.
    ///
    /// Any in-flight task is aborted.
    pub async fn shutdown(self) {
        drop(self.inbox);
        if let Err(e) = self.join.await {
            tracing::warn!("worker loop ended abnormally: {}", e);
        }
    }
}

/// Agent Worker: one isolated execution unit per agent.
///
/// Receives [`CoordinatorMessage`]s, runs one task at a time through its
/// [`Specialist`], and reports back with [`WorkerMessage`]s.
///
/// # Invariants
/// - at most one task is in flight; a second `task` is rejected with `error`
/// - every accepted task ends with exactly one `complete` or `error`
/// - failures never end the worker loop
pub struct AgentWorker {
    specialist: Arc<dyn Specialist>,
    factory: ClientFactory,
    settings: WorkerSettings,
    status: WorkerStatus,
    config: Option<WorkerConfig>,
    ledger: Arc<Mutex<Ledger>>,
    outbox: Outbox,
}

type RunningTask = (String, JoinHandle<AgentResult<TaskSummary>>);

impl AgentWorker {
    pub fn new(
        specialist: Arc<dyn Specialist>,
        factory: ClientFactory,
        settings: WorkerSettings,
        outbox: mpsc::UnboundedSender<WorkerMessage>,
    ) -> Self {
        let ledger = Ledger::new(settings.context_budget);
        Self {
            specialist,
            factory,
            settings,
            status: WorkerStatus::Uninitialized,
            config: None,
            ledger: Arc::new(Mutex::new(ledger)),
            outbox: Outbox {
                tx: outbox,
                agent_id: None,
            },
        }
    }

    /// Spawn a worker loop on the runtime.
    pub fn spawn(
        specialist: Arc<dyn Specialist>,
        factory: ClientFactory,
        settings: WorkerSettings,
    ) -> (WorkerHandle, mpsc::UnboundedReceiver<WorkerMessage>) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();

        let worker = Self::new(specialist, factory, settings, outbox_tx);
        let join = tokio::spawn(worker.run(inbox_rx));

        (WorkerHandle { inbox: inbox_tx, join }, outbox_rx)
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    /// Process messages until the inbox closes.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<CoordinatorMessage>) {
        let mut running: Option<RunningTask> = None;

        loop {
            tokio::select! {
                joined = async {
                    match running.as_mut() {
                        Some((_, handle)) => handle.await,
                        None => std::future::pending::<Result<AgentResult<TaskSummary>, JoinError>>().await,
                    }
                } => {
                    if let Some((task_id, _)) = running.take() {
                        self.finish_task(task_id, joined).await;
                    }
                }
                message = inbox.recv() => match message {
                    Some(message) => self.dispatch(message, &mut running).await,
                    None => break,
                },
            }
        }

        if let Some((task_id, handle)) = running {
            tracing::info!(agent_id = ?self.outbox.agent_id, %task_id, "inbox closed, aborting in-flight task");
            handle.abort();
        }
        tracing::debug!(agent_id = ?self.outbox.agent_id, "worker loop stopped");
    }

    async fn dispatch(&mut self, message: CoordinatorMessage, running: &mut Option<RunningTask>) {
        let task_id = match &message {
            CoordinatorMessage::Task { task } => Some(task.id.clone()),
            _ => None,
        };
        let kind = message.kind().to_string();

        let result = match message {
            CoordinatorMessage::Initialize { agent_id, api_key } => self.initialize(agent_id, api_key),
            CoordinatorMessage::InitializeWithState {
                agent_id,
                api_key,
                state,
                continuation_point,
            } => {
                self.initialize_with_state(agent_id, api_key, state, continuation_point)
                    .await
            }
            CoordinatorMessage::Task { task } => self.accept_task(task, running).await,
            CoordinatorMessage::PrepareHandoff => {
                self.prepare_handoff().await;
                Ok(())
            }
            CoordinatorMessage::Unknown(tag) => {
                tracing::warn!(agent_id = ?self.outbox.agent_id, message_type = %tag, "ignoring unknown message type");
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!(agent_id = ?self.outbox.agent_id, message_type = %kind, "rejected message: {}", e);
            self.outbox.emit(WorkerEvent::Error {
                error: e.to_string(),
                task_id,
            });
        }
    }

    fn transition(&mut self, next: WorkerStatus) -> AgentResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AgentError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    fn configure(&mut self, agent_id: String, api_key: Option<String>) {
        let client = api_key
            .filter(|key| !key.is_empty())
            .map(|key| (self.factory)(key.as_str()));
        if client.is_none() {
            tracing::warn!(%agent_id, "initialized without an API key; tasks will fail");
        }

        self.outbox.agent_id = Some(agent_id.clone());
        self.config = Some(WorkerConfig { agent_id, client });
    }

    fn initialize(&mut self, agent_id: String, api_key: Option<String>) -> AgentResult<()> {
        self.transition(WorkerStatus::Initialized)?;
        self.configure(agent_id.clone(), api_key);

        tracing::info!(%agent_id, specialization = %self.specialist.specialization(), "worker initialized");
        self.outbox.emit(WorkerEvent::Initialized { agent_id });
        Ok(())
    }

    async fn initialize_with_state(
        &mut self,
        agent_id: String,
        api_key: Option<String>,
        state: AgentState,
        continuation_point: serde_json::Value,
    ) -> AgentResult<()> {
        self.transition(WorkerStatus::StateLoaded)?;
        self.configure(agent_id.clone(), api_key);

        let completed = state.completed_tasks.len();
        self.ledger.lock().await.restore(state);

        tracing::info!(%agent_id, completed, "worker restored from handoff state");
        self.outbox.emit(WorkerEvent::StateLoaded {
            agent_id,
            continuation_point,
        });
        Ok(())
    }

    async fn accept_task(&mut self, task: Task, running: &mut Option<RunningTask>) -> AgentResult<()> {
        let config = self.config.clone().ok_or(AgentError::NotInitialized)?;
        if let Some((current, _)) = running.as_ref() {
            return Err(AgentError::WorkerBusy(current.clone()));
        }
        if task.task_type() != self.specialist.specialization() {
            return Err(AgentError::UnsupportedTask {
                expected: self.specialist.specialization().to_string(),
                actual: task.task_type().to_string(),
            });
        }
        self.transition(WorkerStatus::Busy)?;

        tracing::info!(agent_id = %config.agent_id, task_id = %task.id, title = %task.title, "task accepted");

        let ctx = TaskContext {
            config,
            settings: self.settings.clone(),
            specialist: Arc::clone(&self.specialist),
            ledger: Arc::clone(&self.ledger),
            outbox: self.outbox.clone(),
        };
        let task_id = task.id.clone();
        let handle = tokio::spawn(async move { ctx.execute_task(&task).await });
        *running = Some((task_id, handle));
        Ok(())
    }

    async fn finish_task(&mut self, task_id: String, joined: Result<AgentResult<TaskSummary>, JoinError>) {
        let outcome = joined.unwrap_or_else(|e| {
            let reason = if e.is_panic() { "task panicked" } else { "task was cancelled" };
            Err(AgentError::TaskExecutionFailed(reason.to_string()))
        });

        {
            let mut ledger = self.ledger.lock().await;
            ledger.files_in_progress.clear();
            if let Ok(summary) = &outcome {
                ledger.completed_tasks.push(task_id.clone());
                ledger.remember_output(&task_id, &summary.path);
            }
        }

        match outcome {
            Ok(summary) => {
                tracing::info!(agent_id = ?self.outbox.agent_id, %task_id, lines = summary.line_count, "task complete");
                self.outbox.emit(WorkerEvent::Progress {
                    task_id: task_id.clone(),
                    progress: PROGRESS_DONE,
                });
                self.outbox.emit(WorkerEvent::Complete {
                    task_id,
                    result: summary,
                });
            }
            Err(e) => {
                tracing::warn!(agent_id = ?self.outbox.agent_id, %task_id, "task failed: {}", e);
                self.outbox.emit(WorkerEvent::Error {
                    error: e.to_string(),
                    task_id: Some(task_id),
                });
            }
        }

        if let Err(e) = self.transition(WorkerStatus::Idle) {
            tracing::error!(agent_id = ?self.outbox.agent_id, "{}", e);
        }
    }

    async fn prepare_handoff(&self) {
        let state = self.ledger.lock().await.snapshot();
        tracing::info!(
            agent_id = ?self.outbox.agent_id,
            tokens = state.context.tokens,
            completed = state.completed_tasks.len(),
            "handoff snapshot prepared"
        );
        self.outbox.emit(WorkerEvent::HandoffReady { state });
    }
}

/// Everything one task execution needs, moved into its own tokio task
struct TaskContext {
    config: WorkerConfig,
    settings: WorkerSettings,
    specialist: Arc<dyn Specialist>,
    ledger: Arc<Mutex<Ledger>>,
    outbox: Outbox,
}

impl TaskContext {
    /// Runs the execution contract up to and including `fileUpdate`.
    ///
    /// The caller reports the outcome: `progress` 100 plus `complete` on
    /// `Ok`, a single `error` on `Err`.
    async fn execute_task(&self, task: &Task) -> AgentResult<TaskSummary> {
        self.progress(task, PROGRESS_ACCEPTED);

        let client = self
            .config
            .client
            .clone()
            .ok_or(AgentError::NoCompletionClient)?;
        let artifact = self.specialist.artifact(task)?;
        self.ledger
            .lock()
            .await
            .files_in_progress
            .push(artifact.path.clone());

        let messages = self.specialist.prompt(task)?;
        let completion = client
            .complete(self.request(messages, self.specialist.temperature()))
            .await?;
        self.record_usage(completion.usage.total_tokens).await;
        let mut tokens = completion.usage.total_tokens;

        let mut code = extract_payload(&completion.content);
        let issues = self.specialist.validate(&code);
        let repaired = !issues.is_empty();

        if repaired {
            tracing::info!(agent_id = %self.config.agent_id, task_id = %task.id, ?issues, "payload failed validation, requesting one repair");
            let completion = client
                .complete(self.request(repair_messages(&code, &issues), self.specialist.repair_temperature()))
                .await?;
            self.record_usage(completion.usage.total_tokens).await;
            tokens += completion.usage.total_tokens;
            code = extract_payload(&completion.content);
        }

        self.progress(task, PROGRESS_GENERATED);
        self.outbox.emit(WorkerEvent::FileUpdate {
            task_id: task.id.clone(),
            path: artifact.path.clone(),
            content: code.clone(),
            language: artifact.language.to_string(),
            category: artifact.category.to_string(),
        });

        Ok(TaskSummary {
            path: artifact.path,
            line_count: code.lines().count(),
            features: self.specialist.features(&code),
            repaired,
            tokens,
        })
    }

    fn progress(&self, task: &Task, progress: u8) {
        self.outbox.emit(WorkerEvent::Progress {
            task_id: task.id.clone(),
            progress,
        });
    }

    fn request(&self, messages: Vec<ChatMessage>, temperature: f32) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages,
            temperature,
            max_tokens: self.settings.max_output_tokens,
        }
    }

    async fn record_usage(&self, tokens: u64) {
        let warning = {
            let mut ledger = self.ledger.lock().await;
            if ledger.tracker.add_usage(tokens) {
                Some((ledger.tracker.usage(), ledger.snapshot()))
            } else {
                None
            }
        };

        if let Some((usage, state)) = warning {
            tracing::warn!(agent_id = %self.config.agent_id, usage, "context budget above threshold");
            self.outbox
                .emit(WorkerEvent::ContextLimitApproaching { usage, state });
        }
    }
}

fn repair_messages(code: &str, issues: &[String]) -> Vec<ChatMessage> {
    let template = library::repair();
    let issues = issues
        .iter()
        .map(|issue| format!("- {}", issue))
        .collect::<Vec<_>>()
        .join("\n");
    let variables = HashMap::from([
        ("issues".to_string(), issues),
        ("code".to_string(), code.to_string()),
    ]);
    let user = template.render(&variables);
    tracing::debug!(template = %template.label(), "repair prompt rendered");
    vec![ChatMessage::system(template.system), ChatMessage::user(user)]
}
