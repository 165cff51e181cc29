use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use insight_core::{CheckOutcome, JobRequest, ResourceKind, ResourceStatus};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{resource_status, start_resource, AppError, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct TradingInsightRequest {
    /// Stock ticker, case-insensitive
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InsightStatusQuery {
    pub symbol: Option<String>,
}

pub fn insight_routes() -> Router<AppState> {
    Router::new()
        .route("/api/trading-insights", post(start_trading_insight))
        .route("/api/trading-insights/status", get(trading_insight_status))
}

/// Return a trading insight for a symbol or start generating it
#[utoipa::path(
    post,
    path = "/api/trading-insights",
    request_body = TradingInsightRequest,
    responses(
        (status = 200, description = "Fresh insight cached", body = CheckOutcome),
        (status = 202, description = "Insight job started or already running", body = CheckOutcome),
        (status = 400, description = "Missing symbol"),
        (status = 500, description = "Storage or dispatch failure")
    ),
    tag = "Trading insights"
)]
pub async fn start_trading_insight(
    State(state): State<AppState>,
    Json(req): Json<TradingInsightRequest>,
) -> Result<(StatusCode, Json<CheckOutcome>), AppError> {
    let symbol = req
        .symbol
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("symbol is required"))?;

    start_resource(&state, JobRequest::trading_insight(symbol)).await
}

/// Poll the insight status of a symbol
#[utoipa::path(
    get,
    path = "/api/trading-insights/status",
    params(InsightStatusQuery),
    responses(
        (status = 200, description = "pending, complete or failed", body = ResourceStatus),
        (status = 400, description = "Missing symbol")
    ),
    tag = "Trading insights"
)]
pub async fn trading_insight_status(
    State(state): State<AppState>,
    Query(query): Query<InsightStatusQuery>,
) -> Result<Json<ResourceStatus>, AppError> {
    resource_status(&state, ResourceKind::TradingInsight, query.symbol.as_deref()).await
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::http::StatusCode;
    use insight_core::{CacheStore, ResourceKind};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_aapl_end_to_end() {
        let app = test_app();

        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/trading-insights",
                serde_json::json!({ "symbol": "aapl" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "status": "pending" })
        );

        let response = app
            .router
            .clone()
            .oneshot(get_request("/api/trading-insights/status?symbol=AAPL"))
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "status": "pending" })
        );

        let job = app.trigger.jobs.lock().unwrap().remove(0);
        assert_eq!(job.resource_key, "AAPL");
        app.runner.run(&job).await.unwrap();
        assert!(app.model.prompts.lock().unwrap()[0].contains("AAPL"));

        let response = app
            .router
            .clone()
            .oneshot(get_request("/api/trading-insights/status?symbol=aapl"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "status": "complete", "payload": "Insight text" })
        );

        // Served from cache from now on.
        let response = app
            .router
            .oneshot(json_request(
                "POST",
                "/api/trading-insights",
                serde_json::json!({ "symbol": "AAPL" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(app.trigger.jobs.lock().unwrap().is_empty());
        assert_eq!(
            app.store
                .get_any(ResourceKind::TradingInsight, "AAPL")
                .await
                .unwrap()
                .unwrap()
                .payload,
            "Insight text"
        );
    }

    #[tokio::test]
    async fn test_blank_symbol_is_400() {
        let app = test_app();
        let response = app
            .router
            .oneshot(json_request(
                "POST",
                "/api/trading-insights",
                serde_json::json!({ "symbol": "  " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
