use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use super::errors::{AgentError, AgentResult};
use super::events::{ActivityEntry, ConductorEvent};
use super::messages::{CoordinatorMessage, WorkerEvent, WorkerMessage};
use super::specialists::specialist_for;
use super::state::AgentState;
use super::types::{Specialization, Task, WorkerStatus};
use super::worker::{AgentWorker, WorkerHandle, WorkerSettings};
use crate::llm::ClientFactory;

const FEED_CAPACITY: usize = 256;

/// Conductor configuration
#[derive(Debug, Clone)]
pub struct ConductorSettings {
    pub worker: WorkerSettings,
    /// Credential handed to every worker in `initialize`
    pub api_key: Option<String>,
    /// Replace a worker whose context crossed the warning threshold once
    /// its current task ends
    pub auto_handoff: bool,
    pub activity_capacity: usize,
}

impl Default for ConductorSettings {
    fn default() -> Self {
        Self {
            worker: WorkerSettings::default(),
            api_key: None,
            auto_handoff: true,
            activity_capacity: 200,
        }
    }
}

/// A file reported through `fileUpdate`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFile {
    pub task_id: String,
    pub path: String,
    pub language: String,
    pub category: String,
    pub content: String,
}

/// Dashboard view of one agent, built from the messages it reported
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    pub agent_id: String,
    pub specialization: Specialization,
    pub status: WorkerStatus,
    pub progress: u8,
    pub current_task: Option<String>,
    pub queued: usize,
    pub tokens_used: u64,
    pub context_usage: f64,
    /// Counters and files include work inherited through handoffs
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub files: Vec<GeneratedFile>,
    pub last_error: Option<String>,
    pub last_snapshot: Option<AgentState>,
    pub created_at: DateTime<Utc>,
}

/// Totals across all live agents
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardTotals {
    pub agents: usize,
    pub busy: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub files_generated: usize,
    pub tokens_used: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub agents: Vec<AgentView>,
    pub totals: DashboardTotals,
}

struct AgentSlot {
    handle: WorkerHandle,
    view: AgentView,
    max_tokens: u64,
    /// tracker tokens when the in-flight task was sent
    task_baseline: u64,
    queue: VecDeque<Task>,
    in_flight: Option<String>,
    /// context crossed the threshold; hand off after the current task
    handoff_due: bool,
    /// `prepareHandoff` was sent to retire this worker
    retiring: bool,
}

impl AgentSlot {
    fn update_context(&mut self, state: &AgentState) {
        self.view.tokens_used = state.context.tokens;
        self.max_tokens = state.context.max_tokens;
        self.refresh_usage();
    }

    fn refresh_usage(&mut self) {
        self.view.context_usage = if self.max_tokens == 0 {
            0.0
        } else {
            self.view.tokens_used as f64 / self.max_tokens as f64
        };
    }

    fn send_task(&mut self, task: Task) -> AgentResult<()> {
        let task_id = task.id.clone();
        self.handle.send(CoordinatorMessage::Task { task })?;
        self.task_baseline = self.view.tokens_used;
        self.in_flight = Some(task_id.clone());
        self.view.current_task = Some(task_id);
        self.view.progress = 0;
        Ok(())
    }
}

struct Registry {
    agents: HashMap<String, AgentSlot>,
    activity: VecDeque<ActivityEntry>,
    activity_capacity: usize,
}

impl Registry {
    fn record(&mut self, event: ConductorEvent) {
        if self.activity.len() == self.activity_capacity {
            self.activity.pop_front();
        }
        self.activity.push_back(ActivityEntry::now(event));
    }
}

/// What to do once the registry lock is released
enum FollowUp {
    None,
    Handoff {
        retired: AgentSlot,
        state: AgentState,
    },
}

struct Inner {
    settings: ConductorSettings,
    factory: ClientFactory,
    registry: RwLock<Registry>,
    feed: broadcast::Sender<WorkerMessage>,
}

/// Conductor: creates workers, feeds them tasks, aggregates what they
/// report and decides when a worker is replaced.
///
/// The conductor is the only authority on whether a reported error is
/// fatal; workers just report.
#[derive(Clone)]
pub struct Conductor {
    inner: Arc<Inner>,
}

impl Conductor {
    pub fn new(settings: ConductorSettings, factory: ClientFactory) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        let registry = Registry {
            agents: HashMap::new(),
            activity: VecDeque::new(),
            activity_capacity: settings.activity_capacity.max(1),
        };

        Self {
            inner: Arc::new(Inner {
                settings,
                factory,
                registry: RwLock::new(registry),
                feed,
            }),
        }
    }

    pub fn settings(&self) -> &ConductorSettings {
        &self.inner.settings
    }

    /// Every message any worker sends, in per-worker order
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerMessage> {
        self.inner.feed.subscribe()
    }

    /// Spawn a fresh worker and send it `initialize`.
    pub async fn spawn_agent(&self, specialization: Specialization) -> AgentResult<String> {
        let agent_id = new_agent_id(specialization);
        let init = CoordinatorMessage::Initialize {
            agent_id: agent_id.clone(),
            api_key: self.inner.settings.api_key.clone(),
        };
        self.launch(agent_id, specialization, init, None).await
    }

    /// Start the replacement for `predecessor`, which inherits its
    /// counters and files so dashboard totals survive the handoff.
    async fn spawn_successor(&self, predecessor: &AgentView, state: AgentState) -> AgentResult<String> {
        let specialization = predecessor.specialization;
        let agent_id = new_agent_id(specialization);
        let continuation_point = json!({
            "from": predecessor.agent_id,
            "completedTasks": state.completed_tasks.len(),
        });
        let init = CoordinatorMessage::InitializeWithState {
            agent_id: agent_id.clone(),
            api_key: self.inner.settings.api_key.clone(),
            state,
            continuation_point,
        };
        self.launch(agent_id, specialization, init, Some(predecessor)).await
    }

    async fn launch(
        &self,
        agent_id: String,
        specialization: Specialization,
        init: CoordinatorMessage,
        predecessor: Option<&AgentView>,
    ) -> AgentResult<String> {
        let (max_tokens, tokens_used) = match &init {
            CoordinatorMessage::InitializeWithState { state, .. } => (state.context.max_tokens, state.context.tokens),
            _ => (self.inner.settings.worker.context_budget, 0),
        };

        let (handle, outbox) = AgentWorker::spawn(
            specialist_for(specialization),
            Arc::clone(&self.inner.factory),
            self.inner.settings.worker.clone(),
        );
        handle.send(init)?;

        let mut slot = AgentSlot {
            handle,
            view: AgentView {
                agent_id: agent_id.clone(),
                specialization,
                status: WorkerStatus::Uninitialized,
                progress: 0,
                current_task: None,
                queued: 0,
                tokens_used,
                context_usage: 0.0,
                tasks_completed: predecessor.map_or(0, |p| p.tasks_completed),
                tasks_failed: predecessor.map_or(0, |p| p.tasks_failed),
                files: predecessor.map(|p| p.files.clone()).unwrap_or_default(),
                last_error: predecessor.and_then(|p| p.last_error.clone()),
                last_snapshot: None,
                created_at: Utc::now(),
            },
            max_tokens,
            task_baseline: tokens_used,
            queue: VecDeque::new(),
            in_flight: None,
            handoff_due: false,
            retiring: false,
        };
        slot.refresh_usage();

        {
            let mut registry = self.inner.registry.write().await;
            registry.agents.insert(agent_id.clone(), slot);
            registry.record(ConductorEvent::WorkerSpawned {
                agent_id: agent_id.clone(),
                specialization,
            });
        }

        tokio::spawn(self.clone().pump(agent_id.clone(), outbox));
        tracing::info!(%agent_id, %specialization, "worker spawned");
        Ok(agent_id)
    }

    /// Feed one worker's outbox into `observe` until the worker exits.
    ///
    /// Boxed because a handoff spawns the successor's pump from inside this one.
    fn pump(
        self,
        agent_id: String,
        mut outbox: mpsc::UnboundedReceiver<WorkerMessage>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            while let Some(message) = outbox.recv().await {
                self.observe(&agent_id, message).await;
            }
            tracing::debug!(%agent_id, "worker outbox closed");
        })
    }

    /// Send a task now, or queue it behind the agent's current work.
    ///
    /// Returns `true` when the task was queued.
    pub async fn dispatch(&self, agent_id: &str, task: Task) -> AgentResult<bool> {
        let mut registry = self.inner.registry.write().await;
        let slot = registry
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| AgentError::AgentNotFound(agent_id.to_string()))?;

        let task_id = task.id.clone();
        let queued = slot.in_flight.is_some() || slot.handoff_due || slot.retiring;
        if queued {
            slot.queue.push_back(task);
            slot.view.queued = slot.queue.len();
        } else {
            slot.send_task(task)?;
        }

        let event = if queued {
            ConductorEvent::TaskQueued {
                agent_id: agent_id.to_string(),
                task_id,
            }
        } else {
            ConductorEvent::TaskDispatched {
                agent_id: agent_id.to_string(),
                task_id,
            }
        };
        tracing::debug!(?event, "task routed");
        registry.record(event);
        Ok(queued)
    }

    /// Ask a worker for a state snapshot without retiring it.
    pub async fn request_handoff(&self, agent_id: &str) -> AgentResult<()> {
        let registry = self.inner.registry.read().await;
        let slot = registry
            .agents
            .get(agent_id)
            .ok_or_else(|| AgentError::AgentNotFound(agent_id.to_string()))?;
        slot.handle.send(CoordinatorMessage::PrepareHandoff)
    }

    /// Remove a worker, aborting any task it is running.
    pub async fn retire(&self, agent_id: &str) -> AgentResult<()> {
        let slot = {
            let mut registry = self.inner.registry.write().await;
            let slot = registry
                .agents
                .remove(agent_id)
                .ok_or_else(|| AgentError::AgentNotFound(agent_id.to_string()))?;
            registry.record(ConductorEvent::WorkerRetired {
                agent_id: agent_id.to_string(),
            });
            slot
        };

        if !slot.queue.is_empty() {
            tracing::warn!(%agent_id, dropped = slot.queue.len(), "retiring worker with queued tasks");
        }
        slot.handle.shutdown().await;
        tracing::info!(%agent_id, "worker retired");
        Ok(())
    }

    pub async fn agent(&self, agent_id: &str) -> Option<AgentView> {
        let registry = self.inner.registry.read().await;
        registry.agents.get(agent_id).map(|slot| slot.view.clone())
    }

    pub async fn dashboard(&self) -> Dashboard {
        let registry = self.inner.registry.read().await;
        let mut agents: Vec<AgentView> = registry
            .agents
            .values()
            .map(|slot| slot.view.clone())
            .collect();
        agents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.agent_id.cmp(&b.agent_id)));

        let totals = agents.iter().fold(DashboardTotals::default(), |mut totals, agent| {
            totals.agents += 1;
            if agent.status == WorkerStatus::Busy {
                totals.busy += 1;
            }
            totals.tasks_completed += agent.tasks_completed;
            totals.tasks_failed += agent.tasks_failed;
            totals.files_generated += agent.files.len();
            totals.tokens_used += agent.tokens_used;
            totals
        });

        Dashboard { agents, totals }
    }

    pub async fn activity(&self) -> Vec<ActivityEntry> {
        let registry = self.inner.registry.read().await;
        registry.activity.iter().cloned().collect()
    }

    async fn observe(&self, agent_id: &str, message: WorkerMessage) {
        // no subscribers is fine
        let _ = self.inner.feed.send(message.clone());

        let follow_up = {
            let mut registry = self.inner.registry.write().await;
            let auto_handoff = self.inner.settings.auto_handoff;
            let Some(slot) = registry.agents.get_mut(agent_id) else {
                return;
            };

            let mut events = Vec::new();
            let mut task_ended = false;
            let mut follow_up = FollowUp::None;

            match message.event {
                WorkerEvent::Initialized { .. } => slot.view.status = WorkerStatus::Initialized,
                WorkerEvent::StateLoaded { .. } => slot.view.status = WorkerStatus::StateLoaded,
                WorkerEvent::Progress { progress, .. } => {
                    slot.view.status = WorkerStatus::Busy;
                    slot.view.progress = progress;
                }
                WorkerEvent::FileUpdate {
                    task_id,
                    path,
                    content,
                    language,
                    category,
                } => slot.view.files.push(GeneratedFile {
                    task_id,
                    path,
                    language,
                    category,
                    content,
                }),
                WorkerEvent::ContextLimitApproaching { usage, state } => {
                    slot.update_context(&state);
                    if auto_handoff {
                        slot.handoff_due = true;
                    }
                    events.push(ConductorEvent::ContextLimitApproaching {
                        agent_id: agent_id.to_string(),
                        usage,
                    });
                }
                WorkerEvent::Complete { task_id, result } => {
                    slot.view.tasks_completed += 1;
                    if slot.in_flight.as_deref() == Some(task_id.as_str()) {
                        slot.view.tokens_used = slot.task_baseline + result.tokens;
                        slot.refresh_usage();
                    }
                    slot.view.progress = 100;
                    if slot.in_flight.as_deref() == Some(task_id.as_str()) {
                        task_ended = true;
                    }
                    events.push(ConductorEvent::TaskCompleted {
                        agent_id: agent_id.to_string(),
                        task_id,
                    });
                }
                WorkerEvent::Error { error, task_id } => {
                    slot.view.last_error = Some(error.clone());
                    if task_id.is_some() && slot.in_flight == task_id {
                        slot.view.tasks_failed += 1;
                        task_ended = true;
                    }
                    tracing::warn!(%agent_id, ?task_id, "worker reported error: {}", error);
                    events.push(ConductorEvent::TaskFailed {
                        agent_id: agent_id.to_string(),
                        task_id,
                        error,
                    });
                }
                WorkerEvent::HandoffReady { state } => {
                    slot.update_context(&state);
                    slot.view.last_snapshot = Some(state.clone());
                    if slot.retiring {
                        if let Some(retired) = registry.agents.remove(agent_id) {
                            follow_up = FollowUp::Handoff { retired, state };
                        }
                    }
                }
            }

            if task_ended {
                if let Some(slot) = registry.agents.get_mut(agent_id) {
                    slot.in_flight = None;
                    slot.view.current_task = None;
                    slot.view.status = WorkerStatus::Idle;
                    advance(agent_id, slot, &mut events);
                }
            }

            for event in events {
                registry.record(event);
            }
            follow_up
        };

        if let FollowUp::Handoff { retired, state } = follow_up {
            self.complete_handoff(retired, state).await;
        }
    }

    async fn complete_handoff(&self, retired: AgentSlot, state: AgentState) {
        let from = retired.view.agent_id.clone();

        match self.spawn_successor(&retired.view, state).await {
            Ok(successor_id) => {
                tracing::info!(agent_id = %from, %successor_id, pending = retired.queue.len(), "handing off to successor");
                {
                    let mut registry = self.inner.registry.write().await;
                    registry.record(ConductorEvent::HandoffCompleted {
                        agent_id: from.clone(),
                        successor_id: successor_id.clone(),
                    });
                }
                for task in retired.queue {
                    let task_id = task.id.clone();
                    if let Err(e) = self.dispatch(&successor_id, task).await {
                        tracing::error!(%successor_id, %task_id, "failed to move queued task: {}", e);
                    }
                }
            }
            Err(e) => {
                tracing::error!(agent_id = %from, "handoff failed, queued tasks dropped: {}", e);
            }
        }

        retired.handle.shutdown().await;
    }
}

/// Start the next step for an agent whose task just ended: a pending
/// handoff first, otherwise the next queued task.
fn advance(agent_id: &str, slot: &mut AgentSlot, events: &mut Vec<ConductorEvent>) {
    if slot.handoff_due {
        slot.handoff_due = false;
        match slot.handle.send(CoordinatorMessage::PrepareHandoff) {
            Ok(()) => {
                slot.retiring = true;
                tracing::info!(%agent_id, "context budget nearly spent, requesting handoff");
            }
            Err(e) => tracing::error!(%agent_id, "could not request handoff: {}", e),
        }
        return;
    }

    if let Some(task) = slot.queue.pop_front() {
        slot.view.queued = slot.queue.len();
        let task_id = task.id.clone();
        match slot.send_task(task) {
            Ok(()) => events.push(ConductorEvent::TaskDispatched {
                agent_id: agent_id.to_string(),
                task_id,
            }),
            Err(e) => tracing::error!(%agent_id, %task_id, "could not dispatch queued task: {}", e),
        }
    }
}

fn new_agent_id(specialization: Specialization) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", specialization, &suffix[..8])
}
