//! Todo API Endpoints
//! Mission: owner-scoped CRUD over todo items

use crate::auth::models::Claims;
use crate::todos::{
    models::{CreateTodoRequest, Priority, TodoDraft, TodoRecord, UpdateTodoRequest},
    store::{DeleteOutcome, TodoStore},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

/// Shared todo state
#[derive(Clone)]
pub struct TodoState {
    pub store: Arc<TodoStore>,
}

impl TodoState {
    pub fn new(store: Arc<TodoStore>) -> Self {
        Self { store }
    }
}

/// List todos - GET /api/todos
pub async fn list_todos(
    State(state): State<TodoState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<TodoRecord>>, TodoApiError> {
    let owner = subject_id(&claims)?;
    let todos = state.store.list_for_owner(&owner)?;
    Ok(Json(todos))
}

/// Get todo - GET /api/todos/:id
pub async fn get_todo(
    State(state): State<TodoState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<TodoRecord>, TodoApiError> {
    let owner = subject_id(&claims)?;
    let todo_id = parse_todo_id(&id).ok_or(TodoApiError::NotFound)?;

    state
        .store
        .get_for_owner(&owner, &todo_id)?
        .map(Json)
        .ok_or(TodoApiError::NotFound)
}

/// Create todo - POST /api/todos
pub async fn create_todo(
    State(state): State<TodoState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTodoRequest>,
) -> Result<(StatusCode, Json<TodoRecord>), TodoApiError> {
    let owner = subject_id(&claims)?;
    let draft = validate_draft(
        &state,
        payload.title,
        payload.description,
        payload.priority,
        false,
        payload.due_date,
        payload.label_id,
    )?;

    let todo = state.store.create(&owner, &draft)?;
    Ok((StatusCode::CREATED, Json(todo)))
}

/// Update todo - PUT /api/todos/:id
///
/// Replace semantics: every mutable field is written from the request body,
/// so omitting an optional field clears it rather than preserving it.
pub async fn update_todo(
    State(state): State<TodoState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTodoRequest>,
) -> Result<Json<TodoRecord>, TodoApiError> {
    let owner = subject_id(&claims)?;
    let todo_id = parse_todo_id(&id).ok_or(TodoApiError::NotYours)?;

    let draft = validate_draft(
        &state,
        payload.title,
        payload.description,
        payload.priority,
        payload.is_done.unwrap_or(false),
        payload.due_date,
        payload.label_id,
    )?;

    state
        .store
        .update_for_owner(&owner, &todo_id, &draft)?
        .map(Json)
        .ok_or_else(|| {
            warn!("Rejected update of inaccessible todo {}", todo_id);
            TodoApiError::NotYours
        })
}

/// Delete todo - DELETE /api/todos/:id
pub async fn delete_todo(
    State(state): State<TodoState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, TodoApiError> {
    let owner = subject_id(&claims)?;
    let todo_id = parse_todo_id(&id).ok_or(TodoApiError::NotYours)?;

    match state.store.delete_for_owner(&owner, &todo_id)? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NotAccessible => {
            warn!("Rejected delete of inaccessible todo {}", todo_id);
            Err(TodoApiError::NotYours)
        }
        DeleteOutcome::AlreadyGone => Err(TodoApiError::AlreadyGone),
    }
}

/// The authenticated caller's id, from the verified token claims
fn subject_id(claims: &Claims) -> Result<Uuid, TodoApiError> {
    Uuid::parse_str(&claims.sub)
        .map_err(|e| TodoApiError::Internal(anyhow::anyhow!("Malformed subject claim: {}", e)))
}

/// A path id that is not a UUID cannot name any row; treat it exactly like
/// an unknown id instead of revealing that it is malformed.
fn parse_todo_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

fn validate_draft(
    state: &TodoState,
    title: Option<String>,
    description: Option<String>,
    priority: Option<String>,
    is_done: bool,
    due_date: Option<String>,
    label_id: Option<String>,
) -> Result<TodoDraft, TodoApiError> {
    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| TodoApiError::Validation("Title is required".into()))?;

    let priority = match priority {
        Some(p) => Priority::from_str(&p).ok_or_else(|| {
            TodoApiError::Validation("Priority must be one of HIGH, MEDIUM, LOW".into())
        })?,
        None => Priority::Low,
    };

    let due_date = due_date
        .map(|d| {
            DateTime::parse_from_rfc3339(&d)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| {
                    TodoApiError::Validation("dueDate must be an RFC 3339 timestamp".into())
                })
        })
        .transpose()?;

    let label_id = label_id
        .map(|l| {
            let id = Uuid::parse_str(&l)
                .map_err(|_| TodoApiError::Validation("Unknown label id".into()))?;
            match state.store.get_label(&id)? {
                Some(label) => Ok(label.id),
                None => Err(TodoApiError::Validation("Unknown label id".into())),
            }
        })
        .transpose()?;

    Ok(TodoDraft {
        title,
        description,
        priority,
        is_done,
        due_date,
        label_id,
    })
}

/// Todo API errors.
///
/// `NotFound` and `NotYours` cover both a genuinely missing row and a row
/// owned by another user; callers cannot tell the cases apart.
#[derive(Debug)]
pub enum TodoApiError {
    Validation(String),
    NotFound,
    NotYours,
    AlreadyGone,
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for TodoApiError {
    fn from(err: anyhow::Error) -> Self {
        TodoApiError::Internal(err)
    }
}

impl IntoResponse for TodoApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            TodoApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            TodoApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "Todo not found or you do not have access".into(),
            ),
            TodoApiError::NotYours => (
                StatusCode::FORBIDDEN,
                "Todo not found or you are not authorized to modify this todo".into(),
            ),
            TodoApiError::AlreadyGone => {
                (StatusCode::NOT_FOUND, "Todo not found or already deleted".into())
            }
            TodoApiError::Internal(err) => {
                error!("Internal error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err = anyhow::anyhow!("Test error");
        let api_err: TodoApiError = err.into();

        match api_err {
            TodoApiError::Internal(_) => (),
            _ => panic!("Expected Internal error"),
        }
    }

    #[test]
    fn test_error_status_codes() {
        let validation = TodoApiError::Validation("Title is required".into()).into_response();
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);

        let not_found = TodoApiError::NotFound.into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let not_yours = TodoApiError::NotYours.into_response();
        assert_eq!(not_yours.status(), StatusCode::FORBIDDEN);

        let gone = TodoApiError::AlreadyGone.into_response();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_malformed_ids_look_like_unknown_ids() {
        assert!(parse_todo_id("not-a-uuid").is_none());
        assert!(parse_todo_id("").is_none());
        assert!(parse_todo_id(&Uuid::new_v4().to_string()).is_some());
    }
}
