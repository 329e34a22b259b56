//! Worker message protocol tests
//!
//! Drive a single worker over its channels with a scripted completion
//! client and check the messages it reports.

mod common;

use agent_conductor::agents::context::ContextSnapshot;
use agent_conductor::agents::specialists::specialist_for;
use agent_conductor::agents::{
    AgentState, AgentWorker, CoordinatorMessage, Specialization, WorkerEvent, WorkerSettings,
};
use common::*;
use serde_json::json;

fn settings(budget: u64) -> WorkerSettings {
    WorkerSettings {
        context_budget: budget,
        ..WorkerSettings::default()
    }
}

fn initialize(agent_id: &str) -> CoordinatorMessage {
    CoordinatorMessage::Initialize {
        agent_id: agent_id.to_string(),
        api_key: Some("sk-test".to_string()),
    }
}

fn progress_values(messages: &[agent_conductor::agents::WorkerMessage]) -> Vec<u8> {
    messages
        .iter()
        .filter_map(|m| match m.event {
            WorkerEvent::Progress { progress, .. } => Some(progress),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_clean_payload_needs_no_repair() {
    let client = ScriptedClient::new(vec![Reply::text(CLEAN_ENDPOINT, 120)]);
    let (handle, mut rx) = AgentWorker::spawn(
        specialist_for(Specialization::Backend),
        client.factory(),
        WorkerSettings::default(),
    );

    handle.send(initialize("backend-1")).unwrap();
    let init = next_message(&mut rx).await;
    assert_eq!(init.agent_id.as_deref(), Some("backend-1"));
    assert_eq!(init.event, WorkerEvent::Initialized { agent_id: "backend-1".to_string() });

    handle
        .send(CoordinatorMessage::Task { task: backend_task("t1", "/api/users/:id") })
        .unwrap();
    let messages = until_terminal(&mut rx).await;

    let kinds: Vec<&str> = messages.iter().map(|m| m.event.kind()).collect();
    assert_eq!(kinds, ["progress", "progress", "fileUpdate", "progress", "complete"]);
    assert_eq!(progress_values(&messages), vec![10, 80, 100]);
    assert!(messages.iter().all(|m| m.agent_id.as_deref() == Some("backend-1")));

    match &messages[2].event {
        WorkerEvent::FileUpdate { path, content, language, category, task_id } => {
            assert_eq!(task_id, "t1");
            assert_eq!(path, "src/api/users-id.ts");
            assert_eq!(language, "typescript");
            assert_eq!(category, "api");
            assert!(content.starts_with("export async function handler"));
            assert!(!content.contains("```"));
        }
        other => panic!("expected fileUpdate, got {:?}", other),
    }

    match &messages[4].event {
        WorkerEvent::Complete { task_id, result } => {
            assert_eq!(task_id, "t1");
            assert_eq!(result.line_count, 3);
            assert!(!result.repaired);
            assert_eq!(result.tokens, 120);
        }
        other => panic!("expected complete, got {:?}", other),
    }

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].temperature, 0.2);
    assert_eq!(requests[0].max_tokens, 3000);
    assert!(requests[0].messages[1].content.contains("/api/users/:id"));
    assert_eq!(client.keys(), vec!["sk-test".to_string()]);
}

#[tokio::test]
async fn test_todo_marker_triggers_exactly_one_repair() {
    let client = ScriptedClient::new(vec![
        Reply::text("```ts\nexport function handler() {\n  // TODO: implement\n}\n```", 100),
        Reply::text("```ts\nexport function handler() {\n  return 42;\n}\n```", 80),
    ]);
    let (handle, mut rx) = AgentWorker::spawn(
        specialist_for(Specialization::Backend),
        client.factory(),
        WorkerSettings::default(),
    );

    handle.send(initialize("backend-1")).unwrap();
    next_message(&mut rx).await;
    handle
        .send(CoordinatorMessage::Task { task: backend_task("t1", "/api/answer") })
        .unwrap();
    let messages = until_terminal(&mut rx).await;

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].temperature, 0.1);
    assert!(requests[1].messages[1].content.contains("TODO"));

    let file = messages
        .iter()
        .find_map(|m| match &m.event {
            WorkerEvent::FileUpdate { content, .. } => Some(content.clone()),
            _ => None,
        })
        .expect("fileUpdate emitted");
    assert!(file.contains("return 42"));

    match &messages.last().unwrap().event {
        WorkerEvent::Complete { result, .. } => {
            assert!(result.repaired);
            assert_eq!(result.tokens, 180);
        }
        other => panic!("expected complete, got {:?}", other),
    }
}

#[tokio::test]
async fn test_repair_runs_once_even_if_still_invalid() {
    let client = ScriptedClient::new(vec![
        Reply::text("```tsx\nconst Nav = () => null; // TODO\n```", 10),
        Reply::text("```tsx\nconst Nav = () => null; // FIXME\n```", 10),
    ]);
    let (handle, mut rx) = AgentWorker::spawn(
        specialist_for(Specialization::FrontendArchitect),
        client.factory(),
        WorkerSettings::default(),
    );

    handle.send(initialize("fe-1")).unwrap();
    next_message(&mut rx).await;
    handle
        .send(CoordinatorMessage::Task { task: component_task("t1", "Nav") })
        .unwrap();
    let messages = until_terminal(&mut rx).await;

    assert_eq!(client.requests().len(), 2);
    assert_eq!(messages.last().unwrap().event.kind(), "complete");
}

#[tokio::test]
async fn test_context_warning_fires_once_on_crossing() {
    // budget 1000: 500 -> 0.5, then 400 -> 0.9
    let client = ScriptedClient::new(vec![
        Reply::text("```tsx\nexport const Nav = () => <nav>placeholder</nav>;\n```", 500),
        Reply::text(CLEAN_COMPONENT, 400),
        Reply::text(CLEAN_COMPONENT, 50),
    ]);
    let (handle, mut rx) = AgentWorker::spawn(
        specialist_for(Specialization::FrontendArchitect),
        client.factory(),
        settings(1000),
    );

    handle.send(initialize("fe-1")).unwrap();
    next_message(&mut rx).await;
    handle
        .send(CoordinatorMessage::Task { task: component_task("t1", "Nav") })
        .unwrap();
    let first = until_terminal(&mut rx).await;

    let warnings: Vec<_> = first
        .iter()
        .filter_map(|m| match &m.event {
            WorkerEvent::ContextLimitApproaching { usage, state } => Some((*usage, state.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!((warnings[0].0 - 0.9).abs() < 1e-9);
    assert_eq!(warnings[0].1.context.tokens, 900);
    assert_eq!(warnings[0].1.context.max_tokens, 1000);

    // already above the threshold: no second warning
    handle
        .send(CoordinatorMessage::Task { task: component_task("t2", "Footer") })
        .unwrap();
    let second = until_terminal(&mut rx).await;
    assert!(second.iter().all(|m| m.event.kind() != "contextLimitApproaching"));
    assert_eq!(second.last().unwrap().event.kind(), "complete");
}

#[tokio::test]
async fn test_provider_error_is_reported_once() {
    let client = ScriptedClient::new(vec![Reply::Fail(429, "rate limited".to_string())]);
    let (handle, mut rx) = AgentWorker::spawn(
        specialist_for(Specialization::Backend),
        client.factory(),
        WorkerSettings::default(),
    );

    handle.send(initialize("backend-1")).unwrap();
    next_message(&mut rx).await;
    handle
        .send(CoordinatorMessage::Task { task: backend_task("t1", "/api/users") })
        .unwrap();
    let messages = until_terminal(&mut rx).await;

    let kinds: Vec<&str> = messages.iter().map(|m| m.event.kind()).collect();
    assert_eq!(kinds, ["progress", "error"]);
    match &messages[1].event {
        WorkerEvent::Error { error, task_id } => {
            assert_eq!(task_id.as_deref(), Some("t1"));
            assert!(error.contains("rate limited"));
        }
        other => panic!("expected error, got {:?}", other),
    }

    // the worker keeps serving after a failure
    handle.send(CoordinatorMessage::PrepareHandoff).unwrap();
    match next_message(&mut rx).await.event {
        WorkerEvent::HandoffReady { state } => {
            assert!(state.completed_tasks.is_empty());
            assert!(state.files_in_progress.is_empty());
        }
        other => panic!("expected handoffReady, got {:?}", other),
    }
}

#[tokio::test]
async fn test_handoff_snapshot_matches_tracker() {
    let client = ScriptedClient::new(vec![Reply::text(CLEAN_ENDPOINT, 250)]);
    let (handle, mut rx) = AgentWorker::spawn(
        specialist_for(Specialization::Backend),
        client.factory(),
        settings(5000),
    );

    handle.send(initialize("backend-1")).unwrap();
    next_message(&mut rx).await;

    handle.send(CoordinatorMessage::PrepareHandoff).unwrap();
    match next_message(&mut rx).await.event {
        WorkerEvent::HandoffReady { state } => {
            assert_eq!(state.context, ContextSnapshot { tokens: 0, max_tokens: 5000 });
        }
        other => panic!("expected handoffReady, got {:?}", other),
    }

    handle
        .send(CoordinatorMessage::Task { task: backend_task("t1", "/api/users") })
        .unwrap();
    until_terminal(&mut rx).await;

    handle.send(CoordinatorMessage::PrepareHandoff).unwrap();
    let ready = next_message(&mut rx).await;
    let value = serde_json::to_value(&ready).unwrap();
    assert_eq!(value["type"], "handoffReady");
    assert_eq!(value["payload"]["state"]["context"]["tokens"], 250);
    assert_eq!(value["payload"]["state"]["context"]["maxTokens"], 5000);
    assert_eq!(value["payload"]["state"]["completedTasks"], json!(["t1"]));
    assert_eq!(value["payload"]["state"]["workingMemory"]["lastFile"], "src/api/users.ts");
}

#[tokio::test]
async fn test_initialize_with_state_restores_progress() {
    let client = ScriptedClient::new(vec![]);
    let (handle, mut rx) = AgentWorker::spawn(
        specialist_for(Specialization::Backend),
        client.factory(),
        WorkerSettings::default(),
    );

    let mut state = AgentState::new(ContextSnapshot { tokens: 700, max_tokens: 1000 });
    state.completed_tasks = vec!["t1".to_string(), "t2".to_string()];
    state.working_memory = json!({ "routes": ["/api/users"] });

    handle
        .send(CoordinatorMessage::InitializeWithState {
            agent_id: "backend-2".to_string(),
            api_key: Some("sk-test".to_string()),
            state,
            continuation_point: json!({ "from": "backend-1" }),
        })
        .unwrap();

    let loaded = next_message(&mut rx).await;
    assert_eq!(loaded.agent_id.as_deref(), Some("backend-2"));
    assert_eq!(
        loaded.event,
        WorkerEvent::StateLoaded {
            agent_id: "backend-2".to_string(),
            continuation_point: json!({ "from": "backend-1" }),
        }
    );

    handle.send(CoordinatorMessage::PrepareHandoff).unwrap();
    match next_message(&mut rx).await.event {
        WorkerEvent::HandoffReady { state } => {
            assert_eq!(state.context, ContextSnapshot { tokens: 700, max_tokens: 1000 });
            assert_eq!(state.completed_tasks, vec!["t1".to_string(), "t2".to_string()]);
            assert_eq!(state.working_memory, json!({ "routes": ["/api/users"] }));
        }
        other => panic!("expected handoffReady, got {:?}", other),
    }
}

#[tokio::test]
async fn test_raw_envelopes_reach_the_worker() {
    let client = ScriptedClient::new(vec![]);
    let (handle, mut rx) = AgentWorker::spawn(
        specialist_for(Specialization::Testing),
        client.factory(),
        WorkerSettings::default(),
    );

    handle
        .post_json(json!({
            "type": "initialize",
            "payload": { "agentId": "testing-1", "apiKey": "sk-raw" }
        }))
        .unwrap();
    assert_eq!(next_message(&mut rx).await.event.kind(), "initialized");
    assert_eq!(client.keys(), vec!["sk-raw".to_string()]);

    assert!(handle.post_json(json!({ "payload": {} })).is_err());
}
