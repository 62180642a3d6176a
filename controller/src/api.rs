use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::registry::GroupRegistry;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub fn router(registry: GroupRegistry) -> Router {
    Router::new()
        .route("/api/groups", get(handle_list_groups))
        .route("/api/groups/{id}", get(handle_get_group))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

async fn handle_list_groups(State(registry): State<GroupRegistry>) -> impl IntoResponse {
    Json(registry.statuses().await)
}

async fn handle_get_group(
    State(registry): State<GroupRegistry>,
    Path(id): Path<i32>,
) -> axum::response::Response {
    match registry.status(id).await {
        Some(status) => Json(status).into_response(),
        None => error_response(StatusCode::NOT_FOUND, &format!("group {id} not found")),
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use switch_common::GroupConfig;

    use super::*;
    use crate::{store::testing::MemoryStore, transport::testing::RecordingTransport};

    fn registry() -> GroupRegistry {
        GroupRegistry::new(
            Arc::new(RecordingTransport::default()),
            Arc::new(MemoryStore::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_group_is_not_found() {
        let response = handle_get_group(State(registry()), Path(12)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn known_group_is_served() {
        let registry = registry();
        registry.create(GroupConfig::new(12), None).await;

        let response = handle_get_group(State(registry.clone()), Path(12)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = handle_list_groups(State(registry.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        registry.shutdown().await;
    }
}
