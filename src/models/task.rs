use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority levels a task can carry. Serialized lowercase so stored
/// documents match the classifier vocabulary and the frontend enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// A user-owned task as stored in the `tasks` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Primary key, kept as a UUID string for portability.
    #[serde(rename = "_id")]
    pub task_id: String,
    pub user_id: String,

    pub title: String,
    pub description: Option<String>,

    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub category: String,

    pub completed: bool,
    /// Set when `completed` flips to true, cleared when it flips back.
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for creating a task. Category and priority are optional;
/// gaps are filled by the classifier.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
}

/// Request payload for updating a task
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub completed: Option<bool>,
}
