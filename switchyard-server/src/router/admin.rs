use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::app::AppState;

/// 当前路由表
pub async fn list_routes(State(state): State<AppState>) -> impl IntoResponse {
    match state.locator.routes().await {
        Ok(table) => Json(json!({
            "routes": table.routes(),
            "count": table.len(),
        }))
        .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": {
                    "message": e.to_string(),
                    "type": "refresh_failure",
                    "status": 502,
                }
            })),
        )
            .into_response(),
    }
}

/// 强制重建路由表并刷新所有实例池
pub async fn reset_routes(State(state): State<AppState>) -> impl IntoResponse {
    info!("Route table reset requested via admin endpoint");
    state.locator.reset_routes();
    state.lb_client.refresh_all().await;

    Json(json!({
        "status": "reset",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// 每台服务器的负载均衡统计
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let balancers = state.lb_client.balancers().await;
    let mut services = serde_json::Map::new();

    for balancer in balancers {
        let snapshot = balancer.stats().snapshot();
        let servers: Vec<_> = balancer
            .pool_snapshot()
            .iter()
            .map(|server| {
                let entry = snapshot.get(&server.id);
                json!({
                    "id": server.id,
                    "host": server.host,
                    "port": server.port,
                    "zone": server.zone,
                    "active_requests": entry.map(|s| s.active_requests()).unwrap_or(0),
                    "total_requests": entry.map(|s| s.total_requests()).unwrap_or(0),
                    "average_response_time_ms": entry
                        .and_then(|s| s.average_response_time())
                        .map(|d| d.as_millis() as u64),
                })
            })
            .collect();
        services.insert(
            balancer.name().to_string(),
            json!({ "servers": servers }),
        );
    }

    Json(json!({
        "services": services,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
