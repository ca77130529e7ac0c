use axum::{
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{api as auth_api, auth_middleware, AuthState};
use crate::todos::{api as todo_api, TodoState};

/// Create the API router
///
/// Registration, login, and role listing are public; everything under
/// `/api/todos` sits behind the bearer-token middleware.
pub fn create_router(auth_state: AuthState, todo_state: TodoState) -> Router {
    let jwt_handler = auth_state.jwt_handler.clone();

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/register", post(auth_api::register))
        .route("/api/login", post(auth_api::login))
        .route(
            "/api/roles",
            get(auth_api::list_roles).post(auth_api::create_role),
        )
        .with_state(auth_state);

    let todo_routes = Router::new()
        .route(
            "/api/todos",
            get(todo_api::list_todos).post(todo_api::create_todo),
        )
        .route(
            "/api/todos/:id",
            get(todo_api::get_todo)
                .put(todo_api::update_todo)
                .delete(todo_api::delete_todo),
        )
        .route_layer(middleware::from_fn_with_state(jwt_handler, auth_middleware))
        .with_state(todo_state);

    Router::new()
        .merge(public_routes)
        .merge(todo_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}
