use async_trait::async_trait;
use axum::http::header::{HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use serde_json::json;

use switchyard_core::error::GatewayError;

use crate::transport::UpstreamResponse;

use super::{FilterStage, GatewayFilter, RequestContext};

/// 响应定稿过滤器
///
/// 无条件执行：有上游响应时原样保留，有错误时翻译成对应的
/// 状态码和JSON错误体。两者都没有视为流水线缺陷，回500。
pub struct SendResponseFilter;

impl SendResponseFilter {
    pub fn new() -> Self {
        Self
    }

    fn status_for(error: &GatewayError) -> StatusCode {
        match error {
            GatewayError::NoServersAvailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::RefreshFailure(_) => StatusCode::BAD_GATEWAY,
            GatewayError::InvalidUri(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_kind(error: &GatewayError) -> &'static str {
        match error {
            GatewayError::NoServersAvailable { .. } => "no_servers_available",
            GatewayError::Upstream { .. } => "upstream_failure",
            GatewayError::RouteNotFound { .. } => "route_not_found",
            GatewayError::RefreshFailure(_) => "refresh_failure",
            GatewayError::InvalidUri(_) => "invalid_uri",
            GatewayError::Config(_) => "config_error",
        }
    }

    fn error_response(error: &GatewayError) -> UpstreamResponse {
        let status = Self::status_for(error);
        let body = json!({
            "error": {
                "message": error.to_string(),
                "type": Self::error_kind(error),
                "status": status.as_u16(),
            }
        });

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        UpstreamResponse::new(status, headers, Bytes::from(body.to_string()))
    }
}

impl Default for SendResponseFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayFilter for SendResponseFilter {
    fn name(&self) -> &'static str {
        "send_response"
    }

    fn stage(&self) -> FilterStage {
        FilterStage::Post
    }

    fn order(&self) -> i32 {
        10
    }

    async fn run(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        if let Some(error) = ctx.error.take() {
            tracing::warn!(
                "Request {} '{}' failed: {}",
                ctx.method,
                ctx.path,
                error
            );
            ctx.response = Some(Self::error_response(&error));
            return Ok(());
        }

        if ctx.response.is_none() {
            tracing::error!(
                "Request {} '{}' produced neither response nor error",
                ctx.method,
                ctx.path
            );
            ctx.response = Some(Self::error_response(&GatewayError::Config(
                "no route filter produced a response".to_string(),
            )));
        }
        Ok(())
    }
}
