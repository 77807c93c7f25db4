use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::net::SocketAddr;
use tracing::debug;

use switchyard_proxy::RequestContext;

use crate::app::AppState;

/// 请求体缓冲上限
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// 捕获所有未显式注册路径的代理处理器
///
/// 把axum请求摊平成流水线上下文，跑完三个阶段后按原样回写
/// 最终响应。Post阶段保证响应一定存在。
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            debug!("Failed to buffer request body for '{}': {}", path, e);
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({
                    "error": {
                        "message": "request body too large",
                        "type": "payload_too_large",
                        "status": 413,
                    }
                })),
            )
                .into_response();
        }
    };

    let ctx = RequestContext::new(parts.method, path, query, parts.headers, body, client_ip);
    let ctx = state.pipeline.handle(ctx).await;

    match ctx.response {
        Some(response) => (response.status, response.headers, response.body).into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": {
                    "message": "pipeline produced no response",
                    "type": "config_error",
                    "status": 500,
                }
            })),
        )
            .into_response(),
    }
}
