use super::{AppState, error::ApiResult, products::ThresholdParams};
use crate::core::report::{
    self, CategoryAnalytics, DashboardStats, InventoryValueReport, LowStockReport, MonthlyTrends,
    SalesReport, SupplierPerformance, SupplierProducts,
};
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use serde::Deserialize;

const DEFAULT_TREND_MONTHS: u32 = 6;

#[derive(Debug, Deserialize)]
struct TrendParams {
    months: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/inventory-value", get(inventory_value))
        .route("/products-by-supplier", get(products_by_supplier))
        .route("/low-stock", get(low_stock))
        .route("/sales", get(sales))
        .route("/trends/monthly", get(monthly_trends))
        .route("/analytics/categories", get(category_analytics))
        .route("/analytics/suppliers", get(supplier_performance))
}

async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(report::dashboard(&state.db).await?))
}

async fn inventory_value(State(state): State<AppState>) -> ApiResult<Json<InventoryValueReport>> {
    Ok(Json(report::inventory_value(&state.db).await?))
}

async fn products_by_supplier(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SupplierProducts>>> {
    Ok(Json(report::products_by_supplier(&state.db).await?))
}

async fn low_stock(
    State(state): State<AppState>,
    params: Result<Query<ThresholdParams>, QueryRejection>,
) -> ApiResult<Json<LowStockReport>> {
    let Query(params) = params?;
    let threshold = params.threshold.unwrap_or(state.low_stock_threshold);
    Ok(Json(report::low_stock(&state.db, threshold).await?))
}

async fn sales(State(state): State<AppState>) -> ApiResult<Json<SalesReport>> {
    Ok(Json(report::sales(&state.db).await?))
}

async fn monthly_trends(
    State(state): State<AppState>,
    params: Result<Query<TrendParams>, QueryRejection>,
) -> ApiResult<Json<MonthlyTrends>> {
    let Query(params) = params?;
    // Zero months would be an empty window; treat it like no value
    let months = params
        .months
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_TREND_MONTHS);
    Ok(Json(report::monthly_trends(&state.db, months).await?))
}

async fn category_analytics(State(state): State<AppState>) -> ApiResult<Json<CategoryAnalytics>> {
    Ok(Json(
        report::category_analytics(&state.db, state.low_stock_threshold).await?,
    ))
}

async fn supplier_performance(
    State(state): State<AppState>,
) -> ApiResult<Json<SupplierPerformance>> {
    Ok(Json(
        report::supplier_performance(&state.db, state.low_stock_threshold).await?,
    ))
}
