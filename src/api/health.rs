use super::AppState;
use crate::entities::Product;
use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::{Value, json};
use tracing::error;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let check = async {
        state.db.ping().await?;
        Product::find().count(&state.db).await
    };

    match check.await {
        Ok(products) => (
            StatusCode::OK,
            Json(json!({
                "status": "OK",
                "message": "Inventory ledger is running",
                "database": "Connected",
                "products": products,
            })),
        ),
        Err(e) => {
            error!("Health check failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "ERROR",
                    "message": "Database connection failed",
                })),
            )
        }
    }
}
