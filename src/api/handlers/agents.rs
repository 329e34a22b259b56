use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::agents::events::ActivityEntry;
use crate::agents::{AgentView, Conductor, Dashboard, Specialization, Task};
use crate::api::errors::ApiError;

/// Request body for spawning an agent
#[derive(Debug, Deserialize)]
pub struct SpawnAgentRequest {
    pub specialization: Specialization,
}

#[derive(Debug, Serialize)]
pub struct SpawnAgentResponse {
    pub agent_id: String,
}

/// Response from task submission
#[derive(Debug, Serialize)]
pub struct SubmitTaskResponse {
    pub task_id: String,
    /// `true` when the task waits behind the agent's current work
    pub queued: bool,
}

/// List all agents with aggregate totals
///
/// GET /api/agents
pub async fn dashboard(State(conductor): State<Conductor>) -> Json<Dashboard> {
    Json(conductor.dashboard().await)
}

/// Spawn a new agent
///
/// POST /api/agents
pub async fn spawn_agent(
    State(conductor): State<Conductor>,
    Json(req): Json<SpawnAgentRequest>,
) -> Result<(StatusCode, Json<SpawnAgentResponse>), ApiError> {
    let agent_id = conductor.spawn_agent(req.specialization).await?;
    Ok((StatusCode::CREATED, Json(SpawnAgentResponse { agent_id })))
}

/// Get an agent by ID
///
/// GET /api/agents/:id
pub async fn get_agent(
    State(conductor): State<Conductor>,
    Path(id): Path<String>,
) -> Result<Json<AgentView>, ApiError> {
    conductor
        .agent(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Agent not found: {}", id)))
}

/// Assign a task to an agent
///
/// POST /api/agents/:id/tasks
pub async fn submit_task(
    State(conductor): State<Conductor>,
    Path(id): Path<String>,
    Json(task): Json<Task>,
) -> Result<(StatusCode, Json<SubmitTaskResponse>), ApiError> {
    if task.id.trim().is_empty() {
        return Err(ApiError::bad_request("Task id must not be empty"));
    }

    let task_id = task.id.clone();
    let queued = conductor.dispatch(&id, task).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitTaskResponse { task_id, queued })))
}

/// Ask an agent for a handoff snapshot
///
/// POST /api/agents/:id/handoff
pub async fn request_handoff(
    State(conductor): State<Conductor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    conductor.request_handoff(&id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Retire an agent
///
/// DELETE /api/agents/:id
pub async fn retire_agent(
    State(conductor): State<Conductor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    conductor.retire(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Recent conductor activity, oldest first
///
/// GET /api/events
pub async fn activity(State(conductor): State<Conductor>) -> Json<Vec<ActivityEntry>> {
    Json(conductor.activity().await)
}
