//! Authentication API Endpoints
//! Mission: registration, login, and role listing

use crate::auth::{
    jwt::JwtHandler,
    models::{
        CreateRoleRequest, LoginRequest, LoginResponse, RegisterRequest, RoleRecord, UserResponse,
    },
    user_store::UserStore,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, jwt_handler: Arc<JwtHandler>) -> Self {
        Self {
            user_store,
            jwt_handler,
        }
    }
}

/// Register endpoint - POST /api/register
pub async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthApiError> {
    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            AuthApiError::Validation("Username is required and must be a non-empty string".into())
        })?
        .to_string();

    let password = payload.password.filter(|p| p.len() >= 6).ok_or_else(|| {
        AuthApiError::Validation(
            "Password is required and must be a string of at least 6 characters".into(),
        )
    })?;

    let role_id = payload
        .role_id
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .and_then(|r| Uuid::parse_str(r).ok())
        .ok_or_else(|| {
            AuthApiError::Validation("Role ID is required and must be a valid role id".into())
        })?;

    if state.user_store.get_role(&role_id)?.is_none() {
        return Err(AuthApiError::Validation("Unknown role id".into()));
    }

    // bcrypt hashing is CPU-bound; keep it off the async workers
    let store = state.user_store.clone();
    let user = tokio::task::spawn_blocking(move || store.create_user(&username, &password, &role_id))
        .await
        .map_err(|e| AuthApiError::Internal(e.into()))??
        .ok_or(AuthApiError::UsernameTaken)?;

    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&user))))
}

/// Login endpoint - POST /api/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            AuthApiError::Validation("Username is required and must be a non-empty string".into())
        })?
        .to_string();

    let password = payload.password.filter(|p| !p.is_empty()).ok_or_else(|| {
        AuthApiError::Validation("Password is required and must be a non-empty string".into())
    })?;

    info!("Login attempt: {}", username);

    // Password verification is CPU-bound; keep it off the async workers
    let store = state.user_store.clone();
    let attempted = username.clone();
    let user = tokio::task::spawn_blocking(move || store.verify_credentials(&attempted, &password))
        .await
        .map_err(|e| AuthApiError::Internal(e.into()))??
        .ok_or_else(|| {
            warn!("Failed login attempt: {}", username);
            AuthApiError::InvalidCredentials
        })?;

    let (token, expires_in) = state.jwt_handler.generate_token(&user)?;

    info!("Login successful: {} ({})", user.username, user.role.as_str());

    Ok(Json(LoginResponse {
        token,
        expires_in,
        role: user.role.clone(),
        user: UserResponse::from_user(&user),
    }))
}

/// List roles - GET /api/roles
pub async fn list_roles(
    State(state): State<AuthState>,
) -> Result<Json<Vec<RoleRecord>>, AuthApiError> {
    let roles = state.user_store.list_roles()?;
    Ok(Json(roles))
}

/// Create role - POST /api/roles
pub async fn create_role(
    State(state): State<AuthState>,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleRecord>), AuthApiError> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            AuthApiError::Validation("Role name is required and must be a non-empty string".into())
        })?;

    let role = state
        .user_store
        .create_role(name)?
        .ok_or_else(|| AuthApiError::Validation("Role with this name already exists".into()))?;

    Ok((StatusCode::CREATED, Json(role)))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    Validation(String),
    InvalidCredentials,
    UsernameTaken,
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AuthApiError {
    fn from(err: anyhow::Error) -> Self {
        AuthApiError::Internal(err)
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password".into())
            }
            AuthApiError::UsernameTaken => (StatusCode::CONFLICT, "Username already exists".into()),
            AuthApiError::Internal(err) => {
                error!("Internal error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
