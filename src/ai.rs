//! Classifier gateway and insight narrator, backed by an external
//! text-completion service.
//!
//! Both entry points are total: every transport or parse failure collapses
//! into a usable default, so a task write or stats request never fails
//! because the AI call did.

use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::models::task::{Priority, Task};

/// Hard fallback used whenever classification cannot be performed.
pub const DEFAULT_CATEGORY: &str = "uncategorized";
pub const DEFAULT_PRIORITY: Priority = Priority::Medium;

/// Insight strings returned without (or instead of) a service call.
pub const NO_TASKS_INSIGHT: &str = "No tasks available for analysis.";
pub const INSIGHT_FALLBACK: &str = "Unable to generate insights at this time.";

/// Bound on how many tasks end up in an insight prompt.
const INSIGHT_SAMPLE_LIMIT: usize = 10;

/// Vocabulary the classifier is prompted with. Responses outside this list
/// are still accepted verbatim; the list only shapes the prompt.
const CATEGORY_VOCABULARY: &str =
    "work, personal, shopping, health, learning, finance, home, social, travel, uncategorized";

/// A guess at a task's category and priority, parsed from the service's
/// JSON reply. Consumed by the field resolver and discarded.
#[derive(Debug, Clone, Deserialize)]
pub struct Classification {
    pub category: String,
    pub priority: Priority,
    #[serde(rename = "suggestedDueDate")]
    pub suggested_due_date: Option<String>,
}

impl Default for Classification {
    fn default() -> Self {
        Classification {
            category: DEFAULT_CATEGORY.to_string(),
            priority: DEFAULT_PRIORITY,
            suggested_due_date: None,
        }
    }
}

/// Capability seam for the text-completion service: one production
/// implementation over HTTP, one canned double for tests.
#[async_trait]
pub trait TaskClassifier: Send + Sync {
    /// Guess category/priority for a task. Never fails; falls back to
    /// `{uncategorized, medium}` when the service cannot be used.
    async fn classify(&self, title: &str, description: &str) -> Classification;

    /// Produce a short prose summary of a task list. Never fails; returns
    /// a static sentence when the service cannot be used, and a fixed
    /// "no tasks" sentence for an empty list without any outbound call.
    async fn summarize(&self, tasks: &[Task]) -> String;
}

/// Chat-completions client. Constructed once at startup and shared through
/// `AppState`; a missing API key is tolerated and routes every call to the
/// fallback path.
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiClassifier {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.ai_timeout_secs))
            .build()
            .expect("reqwest client");
        OpenAiClassifier {
            client,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
            model: config.openai_model.clone(),
        }
    }

    /// Single completion attempt. `None` covers every failure mode: missing
    /// credential, transport error, non-2xx, or an unexpected body shape.
    async fn complete(&self, prompt: &str) -> Option<String> {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => {
                debug!("No AI credential configured, skipping completion call");
                return None;
            }
        };

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.2,
        });

        let resp = match self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!("AI service returned status {}", resp.status());
                return None;
            }
            Err(e) => {
                warn!("AI service unreachable: {}", e);
                return None;
            }
        };

        let body: Value = match resp.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("AI response was not valid JSON: {}", e);
                return None;
            }
        };
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
    }
}

#[async_trait]
impl TaskClassifier for OpenAiClassifier {
    async fn classify(&self, title: &str, description: &str) -> Classification {
        let prompt = classification_prompt(title, description);
        match self.complete(&prompt).await {
            Some(text) => parse_classification(&text).unwrap_or_else(|| {
                warn!("AI classification reply could not be parsed");
                Classification::default()
            }),
            None => Classification::default(),
        }
    }

    async fn summarize(&self, tasks: &[Task]) -> String {
        if tasks.is_empty() {
            return NO_TASKS_INSIGHT.to_string();
        }
        match self.complete(&insight_prompt(tasks)).await {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => INSIGHT_FALLBACK.to_string(),
        }
    }
}

fn classification_prompt(title: &str, description: &str) -> String {
    format!(
        "Categorize the following task and assess its priority.\n\
         Title: {}\n\
         Description: {}\n\n\
         Respond with a single JSON object and nothing else, shaped as\n\
         {{\"category\": \"...\", \"priority\": \"...\", \"suggestedDueDate\": \"YYYY-MM-DD\"}}.\n\
         category must be one of: {}.\n\
         priority must be one of: low, medium, high.\n\
         suggestedDueDate may be omitted if no deadline is implied.",
        title, description, CATEGORY_VOCABULARY
    )
}

fn insight_prompt(tasks: &[Task]) -> String {
    let mut lines = String::new();
    for task in tasks.iter().take(INSIGHT_SAMPLE_LIMIT) {
        let due = task
            .due_date
            .map(|d| format!(", due {}", d.format("%Y-%m-%d")))
            .unwrap_or_default();
        lines.push_str(&format!(
            "- {} [{} priority, category: {}, completed: {}{}]\n",
            task.title,
            task.priority.as_str(),
            task.category,
            task.completed,
            due,
        ));
    }
    format!(
        "Here is a snapshot of a user's task list:\n{}\n\
         Write an actionable summary in at most three sentences, covering \
         what to focus on next and anything overdue or at risk.",
        lines
    )
}

/// Models wrap their JSON in markdown fences often enough that we strip
/// them before parsing.
fn strip_code_fences(text: &str) -> String {
    let fenced = Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$").expect("fence regex");
    match fenced.captures(text) {
        Some(caps) => caps[1].to_string(),
        None => text.trim().to_string(),
    }
}

fn parse_classification(text: &str) -> Option<Classification> {
    serde_json::from_str::<Classification>(&strip_code_fences(text)).ok()
}

#[cfg(test)]
pub mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    /// Canned classifier that records how often each method is invoked.
    pub struct MockClassifier {
        pub result: Classification,
        pub insight: String,
        pub classify_calls: AtomicUsize,
        pub summarize_calls: AtomicUsize,
        pub last_sample_len: AtomicUsize,
    }

    impl MockClassifier {
        pub fn returning(category: &str, priority: Priority) -> Self {
            MockClassifier {
                result: Classification {
                    category: category.to_string(),
                    priority,
                    suggested_due_date: None,
                },
                insight: "Focus on the overdue items first.".to_string(),
                classify_calls: AtomicUsize::new(0),
                summarize_calls: AtomicUsize::new(0),
                last_sample_len: AtomicUsize::new(0),
            }
        }

        pub fn classify_count(&self) -> usize {
            self.classify_calls.load(Ordering::SeqCst)
        }

        pub fn summarize_count(&self) -> usize {
            self.summarize_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskClassifier for MockClassifier {
        async fn classify(&self, _title: &str, _description: &str) -> Classification {
            self.classify_calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }

        async fn summarize(&self, tasks: &[Task]) -> String {
            self.summarize_calls.fetch_add(1, Ordering::SeqCst);
            self.last_sample_len.store(tasks.len(), Ordering::SeqCst);
            if tasks.is_empty() {
                return NO_TASKS_INSIGHT.to_string();
            }
            self.insight.clone()
        }
    }

    /// A task with sensible defaults for tests.
    pub fn task_fixture(title: &str) -> Task {
        let now = Utc::now();
        Task {
            task_id: Uuid::new_v4().to_string(),
            user_id: "user-1".to_string(),
            title: title.to_string(),
            description: None,
            due_date: None,
            priority: Priority::Medium,
            category: DEFAULT_CATEGORY.to_string(),
            completed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::task_fixture;
    use super::*;

    fn test_config() -> Config {
        Config {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            database_name: "taskpilot_test".to_string(),
            jwt_secret: "secret".to_string(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            ai_timeout_secs: 1,
        }
    }

    #[test]
    fn strips_json_fences() {
        let fenced = "```json\n{\"category\": \"work\", \"priority\": \"high\"}\n```";
        assert_eq!(
            strip_code_fences(fenced),
            "{\"category\": \"work\", \"priority\": \"high\"}"
        );
    }

    #[test]
    fn strips_bare_fences_and_whitespace() {
        let fenced = "  ```\n{\"a\": 1}\n```  \n";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn parses_plain_classification() {
        let parsed = parse_classification(
            "{\"category\": \"finance\", \"priority\": \"high\", \"suggestedDueDate\": \"2026-09-01\"}",
        )
        .unwrap();
        assert_eq!(parsed.category, "finance");
        assert_eq!(parsed.priority, Priority::High);
        assert_eq!(parsed.suggested_due_date.as_deref(), Some("2026-09-01"));
    }

    #[test]
    fn parses_fenced_classification_without_due_date() {
        let parsed =
            parse_classification("```json\n{\"category\": \"home\", \"priority\": \"low\"}\n```")
                .unwrap();
        assert_eq!(parsed.category, "home");
        assert_eq!(parsed.priority, Priority::Low);
        assert!(parsed.suggested_due_date.is_none());
    }

    #[test]
    fn accepts_out_of_vocabulary_category() {
        // Permissive on purpose: the vocabulary only shapes the prompt.
        let parsed =
            parse_classification("{\"category\": \"yak-shaving\", \"priority\": \"medium\"}")
                .unwrap();
        assert_eq!(parsed.category, "yak-shaving");
    }

    #[test]
    fn rejects_garbage_and_partial_replies() {
        assert!(parse_classification("I think this is a work task.").is_none());
        assert!(parse_classification("{\"category\": \"work\"}").is_none());
        assert!(parse_classification("{\"category\": \"work\", \"priority\": \"urgent\"}").is_none());
    }

    #[tokio::test]
    async fn classify_is_total_without_credential() {
        let classifier = OpenAiClassifier::new(&test_config());
        let result = classifier.classify("Buy milk", "").await;
        assert_eq!(result.category, DEFAULT_CATEGORY);
        assert_eq!(result.priority, DEFAULT_PRIORITY);

        let empty_inputs = classifier.classify("", "").await;
        assert_eq!(empty_inputs.category, DEFAULT_CATEGORY);
        assert_eq!(empty_inputs.priority, DEFAULT_PRIORITY);
    }

    #[tokio::test]
    async fn summarize_short_circuits_on_empty_list() {
        let classifier = OpenAiClassifier::new(&test_config());
        assert_eq!(classifier.summarize(&[]).await, NO_TASKS_INSIGHT);
    }

    #[tokio::test]
    async fn summarize_falls_back_without_credential() {
        let classifier = OpenAiClassifier::new(&test_config());
        let tasks = vec![task_fixture("Renew passport")];
        assert_eq!(classifier.summarize(&tasks).await, INSIGHT_FALLBACK);
    }

    #[test]
    fn insight_prompt_is_bounded() {
        let tasks: Vec<Task> = (0..25)
            .map(|i| task_fixture(&format!("task-number-{}", i)))
            .collect();
        let prompt = insight_prompt(&tasks);
        assert!(prompt.contains("task-number-9"));
        assert!(!prompt.contains("task-number-10"));
    }
}
