//! Mock backend for testing
//!
//! Answers categorization prompts from a keyword table, or replays scripted
//! replies. Clones share state, so a test can keep a handle and inspect the
//! prompts the pipeline sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};

use super::AIBackend;

/// Keyword → category rule for the mock
#[derive(Debug, Clone, PartialEq)]
pub struct MockRule {
    /// Matched as a substring of the group's short description
    pub keyword: String,
    pub category: String,
    pub confidence: f64,
}

impl MockRule {
    pub fn new(keyword: &str, category: &str, confidence: f64) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            category: category.to_string(),
            confidence,
        }
    }
}

/// A scripted reply
#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    /// Simulated transport failure (retryable)
    Fail(String),
}

#[derive(Default)]
struct MockState {
    script: VecDeque<Scripted>,
    prompts: Vec<String>,
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    rules: Arc<Vec<MockRule>>,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default, no rules)
    pub fn new() -> Self {
        Self {
            healthy: true,
            rules: Arc::new(Vec::new()),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Answer groups whose short description contains a rule keyword
    pub fn with_rules(rules: Vec<MockRule>) -> Self {
        Self {
            rules: Arc::new(rules),
            ..Self::new()
        }
    }

    /// Queue a literal reply, used before falling back to the rules
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .script
            .push_back(Scripted::Reply(reply.into()));
    }

    /// Queue a transport failure
    pub fn push_failure(&self, message: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .script
            .push_back(Scripted::Fail(message.into()));
    }

    /// Every prompt received so far
    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().unwrap().prompts.clone()
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().prompts.len()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn complete(&self, _system: Option<&str>, prompt: &str) -> Result<String> {
        let scripted = {
            let mut state = self.state.lock().unwrap();
            state.prompts.push(prompt.to_string());
            state.script.pop_front()
        };

        match scripted {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Fail(message)) => Err(Error::Model(message)),
            None => Ok(keyword_reply(prompt, &self.rules)),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

/// Short descriptions of the groups embedded in a categorization prompt
pub(crate) fn prompt_group_keys(prompt: &str) -> Vec<String> {
    const FIELD: &str = "\"short_description\": \"";
    let mut keys = Vec::new();
    let mut rest = prompt;
    while let Some(pos) = rest.find(FIELD) {
        rest = &rest[pos + FIELD.len()..];
        match rest.find('"') {
            Some(end) => {
                keys.push(rest[..end].to_string());
                rest = &rest[end..];
            }
            None => break,
        }
    }
    keys
}

/// JSON array answering every group that matches a rule
pub(crate) fn keyword_reply(prompt: &str, rules: &[MockRule]) -> String {
    let results: Vec<_> = prompt_group_keys(prompt)
        .into_iter()
        .filter_map(|key| {
            rules
                .iter()
                .find(|rule| key.contains(&rule.keyword))
                .map(|rule| {
                    json!({
                        "short_description": key,
                        "llm_category": rule.category,
                        "llm_confidence": rule.confidence,
                    })
                })
        })
        .collect();
    serde_json::Value::Array(results).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = r#"Transaction Groups:
[
  {
    "short_description": "zelle to maria",
    "amounts": [-50.0]
  },
  {
    "short_description": "square inc",
    "amounts": [300.0]
  }
]"#;

    #[test]
    fn test_prompt_group_keys() {
        assert_eq!(prompt_group_keys(PROMPT), vec!["zelle to maria", "square inc"]);
        assert!(prompt_group_keys("no groups").is_empty());
    }

    #[tokio::test]
    async fn test_keyword_rules() {
        let mock = MockBackend::with_rules(vec![MockRule::new("square", "Revenue: Sales", 0.9)]);
        let reply = mock.complete(None, PROMPT).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();

        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["short_description"], "square inc");
        assert_eq!(value[0]["llm_category"], "Revenue: Sales");
    }

    #[tokio::test]
    async fn test_script_then_rules() {
        let mock = MockBackend::new();
        let handle = mock.clone();
        mock.push_failure("connection reset");
        mock.push_reply("not json");

        assert!(mock.complete(None, PROMPT).await.unwrap_err().is_transient());
        assert_eq!(mock.complete(None, PROMPT).await.unwrap(), "not json");
        assert_eq!(mock.complete(None, PROMPT).await.unwrap(), "[]");
        assert_eq!(handle.calls(), 3);
    }

    #[tokio::test]
    async fn test_health() {
        assert!(MockBackend::new().health_check().await);
        assert!(!MockBackend::unhealthy().health_check().await);
    }
}
