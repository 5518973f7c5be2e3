use anyhow::Result;
use regex::RegexSet;
use serde_json::{Value, json};
use sonar_core::{
    ChatReply, ChatRequest, Role, SONAR_REASONING_MODEL, SonarError, TokenUsage,
};
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Chat-completion collaborator: one synchronous request per call.
///
/// Failed calls are not retried; the caller surfaces the error and leaves
/// conversation state untouched so the user can re-issue the request.
pub trait LlmClient {
    fn complete(&self, req: &ChatRequest) -> Result<ChatReply>;
}

#[derive(Debug, Clone)]
pub struct SonarClient {
    api_key: String,
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl SonarClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client,
        })
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_payload(req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req
            .turns
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({"role": role, "content": turn.content})
            })
            .collect();
        json!({
            "model": req.model,
            "messages": messages,
            "temperature": req.temperature,
        })
    }
}

impl LlmClient for SonarClient {
    fn complete(&self, req: &ChatRequest) -> Result<ChatReply> {
        let payload = Self::build_payload(req);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|e| SonarError::Api {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(SonarError::Api {
                message: upstream_error_message(&body, status.as_u16()),
            }
            .into());
        }
        parse_reply(&body)
    }
}

/// Pull the upstream error message out of a non-2xx body, falling back to
/// the HTTP status when the body is not the documented error shape.
fn upstream_error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("request failed with HTTP {status}"))
}

fn parse_reply(body: &str) -> Result<ChatReply> {
    let value: Value = serde_json::from_str(body).map_err(|_| SonarError::Api {
        message: "malformed response body".to_string(),
    })?;
    let text = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SonarError::Api {
            message: "response carried no message content".to_string(),
        })?;
    let usage = TokenUsage {
        prompt_tokens: value
            .pointer("/usage/prompt_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        completion_tokens: value
            .pointer("/usage/completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    };
    Ok(ChatReply { text, usage })
}

// ── Semantic router ─────────────────────────────────────────────────────

fn complex_query_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)fix.*bug",
            r"(?i)debug",
            r"(?i)why.*fail",
            r"(?i)root cause",
            r"(?i)complex",
            r"(?i)architecture",
            r"(?i)design pattern",
            r"(?i)optimize",
            r"(?i)refactor",
            r"(?i)security",
            r"(?i)memory leak",
        ])
        .expect("router patterns are valid")
    })
}

/// Suggest a stronger model for queries that look like deep debugging or
/// design work. Returns `None` when the configured default should be used.
pub fn route_model(query: &str) -> Option<&'static str> {
    if complex_query_patterns().is_match(query) {
        Some(SONAR_REASONING_MODEL)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonar_core::ConversationTurn;

    #[test]
    fn payload_carries_roles_in_order() {
        let req = ChatRequest {
            model: "sonar-pro".to_string(),
            temperature: 0.2,
            turns: vec![
                ConversationTurn::system("be brief"),
                ConversationTurn::user("hi"),
                ConversationTurn::assistant("hello"),
            ],
        };
        let payload = SonarClient::build_payload(&req);
        assert_eq!(payload["model"], "sonar-pro");
        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[1]["content"], "hi");
    }

    #[test]
    fn parse_reply_reads_content_and_usage() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "42"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3}
        }"#;
        let reply = parse_reply(body).unwrap();
        assert_eq!(reply.text, "42");
        assert_eq!(reply.usage.prompt_tokens, 10);
        assert_eq!(reply.usage.completion_tokens, 3);
    }

    #[test]
    fn parse_reply_without_content_is_api_error() {
        let err = parse_reply(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SonarError>(),
            Some(SonarError::Api { .. })
        ));
    }

    #[test]
    fn upstream_message_prefers_error_body() {
        let body = r#"{"error": {"message": "invalid model"}}"#;
        assert_eq!(upstream_error_message(body, 400), "invalid model");
        assert_eq!(
            upstream_error_message("not json", 502),
            "request failed with HTTP 502"
        );
    }

    #[test]
    fn router_upgrades_complex_queries_only() {
        assert_eq!(
            route_model("please debug this memory leak"),
            Some(SONAR_REASONING_MODEL)
        );
        assert_eq!(route_model("refactor the parser module"), Some(SONAR_REASONING_MODEL));
        assert_eq!(route_model("what does this file do?"), None);
    }
}
