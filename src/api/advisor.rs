use super::{
    AppState,
    error::{ApiError, ApiResult},
};
use crate::core::advisor::{BatchSuggestions, ChatReply, ReorderSuggestion};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderRequest {
    product_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reorder-suggestion", post(reorder_suggestion))
        .route("/batch-reorder-suggestions", post(batch_reorder_suggestions))
        .route("/chat", post(chat))
}

async fn reorder_suggestion(
    State(state): State<AppState>,
    body: Result<Json<ReorderRequest>, JsonRejection>,
) -> ApiResult<Json<ReorderSuggestion>> {
    let Json(request) = body?;
    let product_id = request
        .product_id
        .ok_or_else(|| ApiError::bad_request("Product ID is required"))?;
    Ok(Json(
        state
            .advisor
            .reorder_suggestion(&state.db, &product_id)
            .await?,
    ))
}

async fn batch_reorder_suggestions(
    State(state): State<AppState>,
) -> ApiResult<Json<BatchSuggestions>> {
    Ok(Json(
        state.advisor.batch_reorder_suggestions(&state.db).await?,
    ))
}

async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatReply>> {
    let Json(request) = body?;
    let message = request
        .message
        .ok_or_else(|| ApiError::bad_request("Message is required"))?;
    Ok(Json(state.advisor.chat(&state.db, &message).await?))
}
