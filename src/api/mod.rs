//! HTTP API - JSON routes over the core operations.
//!
//! Handlers only extract input, call into `core`, and serialize the result; all
//! rules live in the core modules. Everything is mounted under `/api`.

mod advisor;
pub mod error;
mod health;
mod products;
mod reports;
mod suppliers;
mod transactions;

use crate::core::{advisor::Advisor, ledger::StockLedger};
use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub ledger: StockLedger,
    pub advisor: Advisor,
    /// Default for `threshold` query parameters and analytics
    pub low_stock_threshold: i64,
}

impl AppState {
    /// Builds the state around a ledger; the database handle is the ledger's.
    #[must_use]
    pub fn new(ledger: StockLedger, advisor: Advisor) -> Self {
        Self {
            db: ledger.connection().clone(),
            low_stock_threshold: advisor.low_stock_threshold(),
            ledger,
            advisor,
        }
    }
}

/// Builds the complete application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/products", products::router())
        .nest("/suppliers", suppliers::router())
        .nest("/transactions", transactions::router())
        .nest("/reports", reports::router())
        .nest("/ai", advisor::router())
        .merge(health::router());

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{errors::Result, test_utils::*};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn app() -> Result<(Router, StockLedger, crate::entities::ProductModel)> {
        let (_db, ledger, product) = setup_with_product().await?;
        let state = AppState::new(ledger.clone(), Advisor::new(10));
        Ok((router(state), ledger, product))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_transaction_lifecycle_over_http() -> Result<()> {
        let (app, _ledger, product) = app().await?;

        let (status, body) = send(
            &app,
            "POST",
            "/api/transactions",
            Some(json!({
                "product_id": product.id,
                "quantity": 20,
                "type": "purchase",
                "date": "2024-01-15",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["type"], "purchase");

        let (status, body) = send(
            &app,
            "POST",
            "/api/transactions",
            Some(json!({
                "product_id": product.id,
                "quantity": 25,
                "type": "sale",
                "date": "2024-01-16",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Insufficient stock"));

        let (status, body) = send(
            &app,
            "POST",
            "/api/transactions",
            Some(json!({
                "product_id": product.id,
                "quantity": 5,
                "type": "sale",
                "date": "2024-01-16",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let sale_id = body["id"].as_str().unwrap().to_string();

        let (_, body) = send(&app, "GET", &format!("/api/products/{}", product.id), None).await;
        assert_eq!(body["stock"], 15);
        assert_eq!(body["supplier_name"], "Test Supplier");

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/transactions/{sale_id}"),
            Some(json!({ "quantity": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], sale_id.as_str());

        let (status, _) = send(&app, "DELETE", &format!("/api/transactions/{sale_id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "DELETE", &format!("/api/transactions/{sale_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&app, "GET", "/api/transactions", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["product_name"], "Test Product");

        Ok(())
    }

    #[tokio::test]
    async fn test_bad_input_is_400() -> Result<()> {
        let (app, _ledger, product) = app().await?;

        let (status, body) = send(
            &app,
            "POST",
            "/api/transactions",
            Some(json!({
                "product_id": product.id,
                "quantity": 1,
                "type": "refund",
                "date": "2024-01-15",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/products/{}", product.id),
            Some(json!({ "stock": 1000 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "POST", "/api/ai/chat", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        Ok(())
    }

    #[tokio::test]
    async fn test_referential_deletes_are_400() -> Result<()> {
        let (app, ledger, product) = app().await?;
        purchase(&ledger, &product.id, 1).await?;

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/suppliers/{}", product.supplier_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "DELETE", &format!("/api/products/{}", product.id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        Ok(())
    }

    #[tokio::test]
    async fn test_supplier_and_product_crud() -> Result<()> {
        let (app, _ledger, _product) = app().await?;

        let (status, supplier) = send(
            &app,
            "POST",
            "/api/suppliers",
            Some(json!({ "name": "Globex", "contact": "Hank" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, created) = send(
            &app,
            "POST",
            "/api/products",
            Some(json!({
                "name": "Widget",
                "category": "Parts",
                "price": 4.5,
                "supplier_id": supplier["id"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["stock"], 0);

        let (_, low) = send(&app, "GET", "/api/products/low-stock", None).await;
        assert_eq!(low.as_array().unwrap().len(), 2);

        let (status, _) = send(&app, "GET", "/api/products/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/products/{}", created["id"].as_str().unwrap()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        Ok(())
    }

    #[tokio::test]
    async fn test_reports_advice_and_health() -> Result<()> {
        let (app, ledger, product) = app().await?;
        purchase(&ledger, &product.id, 4).await?;

        let (status, body) = send(&app, "GET", "/api/reports/dashboard", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalProducts"], 1);
        assert_eq!(body["inventoryValue"], 40.0);

        let (_, body) = send(&app, "GET", "/api/reports/low-stock?threshold=3", None).await;
        assert_eq!(body["count"], 0);

        let (status, _) = send(&app, "GET", "/api/reports/trends/monthly?months=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/api/ai/reorder-suggestion",
            Some(json!({ "productId": product.id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentStock"], 4);
        assert_eq!(body["source"], "fallback");

        let (status, _) = send(
            &app,
            "POST",
            "/api/ai/reorder-suggestion",
            Some(json!({ "productId": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["products"], 1);

        Ok(())
    }
}
