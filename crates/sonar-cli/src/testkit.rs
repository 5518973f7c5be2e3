//! Shared fixtures for the in-crate tests: a stub chat client that records
//! every request, and a ready-made `SessionContext` rooted in a temp dir.

use crate::session::SessionContext;
use anyhow::Result;
use sonar_core::{ChatReply, ChatRequest, TokenUsage};
use sonar_llm::LlmClient;
use sonar_observe::Observer;
use sonar_store::Store;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub(crate) type RecordedCalls = Arc<Mutex<Vec<ChatRequest>>>;

pub(crate) struct StubClient {
    pub calls: RecordedCalls,
    pub reply: String,
}

impl LlmClient for StubClient {
    fn complete(&self, req: &ChatRequest) -> Result<ChatReply> {
        self.calls.lock().unwrap().push(req.clone());
        Ok(ChatReply {
            text: self.reply.clone(),
            usage: TokenUsage {
                prompt_tokens: 12,
                completion_tokens: 7,
            },
        })
    }
}

/// A fresh context in an empty temp root, with permission prompts disabled
/// so tests never block on stdin.
pub(crate) fn test_ctx() -> (SessionContext, TempDir, RecordedCalls) {
    let dir = TempDir::new().unwrap();
    let calls: RecordedCalls = Arc::new(Mutex::new(Vec::new()));
    let client = StubClient {
        calls: Arc::clone(&calls),
        reply: "stub reply".to_string(),
    };
    let store = Store::new(dir.path()).unwrap();
    let observer = Observer::new(dir.path()).unwrap();
    let mut ctx = SessionContext::new(
        dir.path().to_path_buf(),
        store,
        observer,
        Box::new(client),
    )
    .unwrap();
    ctx.settings.ask_permission = false;
    ctx.settings.auto_suggest = false;
    (ctx, dir, calls)
}
