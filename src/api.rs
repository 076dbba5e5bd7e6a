//! HTTP surface for the price table and balance-card rates.
//!
//! - `GET /api/markets` - markets + executions, fallback payload on upstream failure
//! - `GET /api/exchange-rates` - USDT/BTC fiat quotes, constants on failure
//! - `GET /health` - liveness

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::markets::{ExchangeRates, MarketService, MarketsResponse};

#[derive(Clone)]
pub struct ApiState {
    pub markets: Arc<MarketService>,
}

/// GET /api/markets
///
/// Always 200: callers tell live from fallback data only by `timestamp`.
pub async fn get_markets(State(state): State<ApiState>) -> Json<MarketsResponse> {
    Json(state.markets.fetch_markets().await)
}

/// GET /api/exchange-rates
pub async fn get_exchange_rates(State(state): State<ApiState>) -> Json<ExchangeRates> {
    Json(state.markets.fetch_exchange_rates().await)
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/markets", get(get_markets))
        .route("/api/exchange-rates", get(get_exchange_rates))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until ctrl-c
pub async fn serve(addr: &str, state: ApiState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("✓ API listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(ApiState {
            markets: Arc::new(MarketService::new("http://127.0.0.1:9")),
        })
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_markets_route_serves_fallback_with_ok() {
        let (status, body) = get_json("/api/markets").await;

        assert_eq!(status, StatusCode::OK);
        let markets = body["markets"].as_array().unwrap();
        assert_eq!(markets.len(), 7);
        assert_eq!(markets[0]["pair"], "BTC/USDT");
        assert_eq!(markets[0]["price"].as_f64(), Some(37268.0));
        assert!(body["executions"].is_array());
        assert!(body["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_exchange_rates_route_shape() {
        let (status, body) = get_json("/api/exchange-rates").await;

        assert_eq!(status, StatusCode::OK);
        for asset in ["USDT", "BTC"] {
            for currency in ["USD", "AED", "GBP", "EUR", "CAD"] {
                assert!(body[asset][currency].is_number(), "{}/{}", asset, currency);
            }
        }
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
