use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved model id for the gold-standard answer. Never paired.
pub const IDEAL_MODEL_ID: &str = "IDEAL_MODEL_ID";

/// Layout tag written on every task record by this generation.
pub const TASK_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Conversational context of a prompt as recorded by the evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptContext {
    Text(String),
    Messages(Vec<ChatMessage>),
}

impl PromptContext {
    /// A bare string becomes a single user turn; turn lists pass through.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        match self {
            PromptContext::Text(s) => vec![ChatMessage::user(s.clone())],
            PromptContext::Messages(m) => m.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPrompt {
    #[serde(default)]
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairwiseTask {
    pub task_id: String,
    pub prompt: TaskPrompt,
    pub response_a: String,
    pub response_b: String,
    pub model_id_a: String,
    pub model_id_b: String,
    pub config_id: String,
    /// 0 for records from the unversioned legacy store.
    #[serde(default)]
    pub schema_version: u32,
}

impl PairwiseTask {
    pub fn is_legacy(&self) -> bool {
        self.schema_version < TASK_SCHEMA_VERSION
    }
}

/// Configuration block of an evaluation run. Only the id matters here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(alias = "configId")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A completed evaluation run, as produced by the upstream pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRun {
    #[serde(default)]
    pub config: Option<RunConfig>,
    #[serde(default)]
    pub prompt_ids: Vec<String>,
    #[serde(default)]
    pub prompt_contexts: Option<BTreeMap<String, PromptContext>>,
    /// promptId -> modelId -> final assistant response
    #[serde(default)]
    pub all_final_assistant_responses: Option<BTreeMap<String, BTreeMap<String, String>>>,
    #[serde(default)]
    pub model_system_prompts: BTreeMap<String, Option<String>>,
}

impl EvaluationRun {
    pub fn config_id(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.id.as_str()).filter(|s| !s.is_empty())
    }

    /// Prompt ids in run order; falls back to the response map order when the
    /// run did not record an explicit ordering.
    pub fn ordered_prompt_ids(&self) -> Vec<String> {
        if !self.prompt_ids.is_empty() {
            return self.prompt_ids.clone();
        }
        self.all_final_assistant_responses
            .as_ref()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn system_prompt_for(&self, model_id: &str) -> Option<String> {
        self.model_system_prompts.get(model_id).cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_context_coercion() {
        let text: PromptContext = serde_json::from_str(r#""What is Rust?""#).unwrap();
        assert_eq!(text.to_messages(), vec![ChatMessage::user("What is Rust?")]);

        let turns: PromptContext = serde_json::from_str(
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"},{"role":"user","content":"bye"}]"#,
        )
        .unwrap();
        let msgs = turns.to_messages();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].role, "assistant");
    }

    #[test]
    fn test_legacy_record_has_no_schema_version() {
        let raw = serde_json::json!({
            "taskId": "abc",
            "prompt": { "system": null, "messages": [{"role": "user", "content": "q"}] },
            "responseA": "r1",
            "responseB": "r2",
            "modelIdA": "A",
            "modelIdB": "B",
            "configId": "cfg"
        });
        let task: PairwiseTask = serde_json::from_value(raw).unwrap();
        assert_eq!(task.schema_version, 0);
        assert!(task.is_legacy());
    }

    #[test]
    fn test_run_accepts_config_id_alias() {
        let run: EvaluationRun = serde_json::from_value(serde_json::json!({
            "config": { "configId": "cfg-1" },
            "modelSystemPrompts": { "A": "be brief", "B": null }
        }))
        .unwrap();
        assert_eq!(run.config_id(), Some("cfg-1"));
        assert_eq!(run.system_prompt_for("A").as_deref(), Some("be brief"));
        assert_eq!(run.system_prompt_for("B"), None);
        assert!(run.ordered_prompt_ids().is_empty());
    }
}
