use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::net::client::spawn_object_serializer;
use crate::interface_adapters::state::AppState;
use crate::use_cases::ObjectError;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

#[derive(Debug, serde::Deserialize)]
pub struct ObjectInitRequest {
    // Identifier nodes use when connecting.
    object_id: String,
    // Expected proxy count for incoming batches.
    #[serde(default)]
    width: Option<usize>,
}

#[derive(Debug, serde::Serialize)]
struct ObjectInitResponse {
    object_id: String,
}

pub async fn create_object_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ObjectInitRequest>,
) -> impl IntoResponse {
    let object_id = payload.object_id.trim().to_string();
    if object_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "object_id is required".to_string(),
            }),
        )
            .into_response();
    }

    match state
        .object_registry
        .create_object(object_id.clone(), payload.width)
        .await
    {
        Ok(object) => {
            // Serializer first so connections can subscribe to shared bytes immediately.
            spawn_object_serializer(&object);
            (StatusCode::CREATED, Json(ObjectInitResponse { object_id })).into_response()
        }
        Err(ObjectError::AlreadyExists) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "object already exists".to_string(),
            }),
        )
            .into_response(),
    }
}

pub async fn delete_object_handler(
    State(state): State<Arc<AppState>>,
    Path(object_id): Path<String>,
) -> impl IntoResponse {
    if state.object_registry.remove_object(&object_id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "object not found".to_string(),
            }),
        )
            .into_response()
    }
}
