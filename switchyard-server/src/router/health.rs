use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::app::AppState;

/// 健康检查处理器
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let balancers = state.lb_client.balancers().await;
    let services: Vec<_> = balancers
        .iter()
        .map(|b| {
            json!({
                "service": b.name(),
                "servers": b.pool_snapshot().len(),
            })
        })
        .collect();

    Json(json!({
        "status": "ok",
        "services": services,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
