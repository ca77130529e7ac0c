//! Todo Models
//! Mission: todo item, label, and request/response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Todo priority levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Priority {
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "LOW")]
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "HIGH" => Some(Priority::High),
            "MEDIUM" => Some(Priority::Medium),
            "LOW" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// A shared label todos can reference
#[derive(Debug, Clone, Serialize)]
pub struct Label {
    pub id: Uuid,
    pub title: String,
}

/// A stored todo item, with its label joined in
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub is_done: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub label: Option<Label>,
    pub created_at: DateTime<Utc>,
}

/// Validated field set written by create and update.
///
/// Update uses replace semantics: every field here is written as-is, so an
/// optional field left as `None` overwrites any previously stored value.
#[derive(Debug, Clone)]
pub struct TodoDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub is_done: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub label_id: Option<Uuid>,
}

/// Create request body - POST /api/todos
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub label_id: Option<String>,
}

/// Update request body - PUT /api/todos/:id
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub is_done: Option<bool>,
    pub due_date: Option<String>,
    pub label_id: Option<String>,
}
