//! Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_conductor::agents::types::{BackendRequirements, FrontendRequirements, TaskRequirements};
use agent_conductor::agents::{Task, WorkerMessage};
use agent_conductor::llm::{ClientFactory, Completion, CompletionClient, CompletionRequest, LlmError, TokenUsage};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One scripted reply from the fake provider
pub enum Reply {
    Text { content: String, tokens: u64 },
    Fail(u16, String),
}

impl Reply {
    pub fn text(content: &str, tokens: u64) -> Self {
        Reply::Text {
            content: content.to_string(),
            tokens,
        }
    }
}

/// In-memory completion client that plays back a script and records
/// every request it receives
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    keys: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    /// Factory that hands out this client and records the credential used
    pub fn factory(self: &Arc<Self>) -> ClientFactory {
        let client = Arc::clone(self);
        Arc::new(move |key: &str| {
            client.keys.lock().unwrap().push(key.to_string());
            Arc::clone(&client) as Arc<dyn CompletionClient>
        })
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();

        match reply {
            Some(Reply::Text { content, tokens }) => Ok(Completion {
                content,
                usage: TokenUsage { total_tokens: tokens },
            }),
            Some(Reply::Fail(status, body)) => Err(LlmError::Status { status, body }),
            None => Err(LlmError::InvalidResponse("script exhausted".to_string())),
        }
    }
}

pub fn backend_task(id: &str, endpoint: &str) -> Task {
    Task::new(
        id,
        format!("Endpoint {}", endpoint),
        TaskRequirements::Backend(BackendRequirements {
            endpoint: endpoint.to_string(),
            method: "GET".to_string(),
            description: "Return the requested resource".to_string(),
            framework: Some("express".to_string()),
        }),
    )
}

pub fn component_task(id: &str, name: &str) -> Task {
    Task::new(
        id,
        format!("{} component", name),
        TaskRequirements::FrontendArchitect(FrontendRequirements {
            component_name: name.to_string(),
            description: "Render a navigation bar".to_string(),
            props: vec!["links".to_string()],
            styling: None,
        }),
    )
}

pub const CLEAN_ENDPOINT: &str = "```typescript\nexport async function handler(req, res) {\n  res.json({ ok: true });\n}\n```";

pub const CLEAN_COMPONENT: &str = "```tsx\ninterface NavProps { links: string[] }\n\nexport const Nav = ({ links }: NavProps) => <nav>{links.length}</nav>;\n```";

pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<WorkerMessage>) -> WorkerMessage {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for worker message")
        .expect("worker channel closed")
}

/// Collect messages until a terminal `complete`/`error` for a task
pub async fn until_terminal(rx: &mut mpsc::UnboundedReceiver<WorkerMessage>) -> Vec<WorkerMessage> {
    let mut messages = Vec::new();
    loop {
        let message = next_message(rx).await;
        let done = message.event.is_terminal();
        messages.push(message);
        if done {
            return messages;
        }
    }
}

/// Poll until `check` holds or a few seconds pass
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}
