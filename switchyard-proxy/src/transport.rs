use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode};
use bytes::Bytes;
use std::time::Duration;

use switchyard_core::error::GatewayError;

/// 上游返回的完整响应
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }
}

/// 上游HTTP传输抽象
///
/// 负载均衡路由和直连路由共用同一个发送入口。超时以普通的
/// 上游错误形式返回，没有独立的取消信号。
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(
        &self,
        url: reqwest::Url,
        method: Method,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse, GatewayError>;
}

/// 逐跳头不进入转发，由每一跳自行协商
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// 请求方向还要去掉host和content-length，交给客户端重新生成
fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str();
            !HOP_BY_HOP_HEADERS.contains(&name) && name != "host" && name != "content-length"
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// reqwest实现的上游传输
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// 构建失败原样上抛，不降级成没有超时的客户端
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                GatewayError::Config(format!("failed to build upstream HTTP client: {e}"))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        url: reqwest::Url,
        method: Method,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse, GatewayError> {
        tracing::debug!("Dispatching {} {}", method, url);

        let response = self
            .client
            .request(method, url.clone())
            .headers(filter_request_headers(&headers))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                GatewayError::upstream_with_source(format!("request to '{url}' failed"), e.into())
            })?;

        let status = response.status();
        let response_headers = filter_response_headers(response.headers());
        let body = response.bytes().await.map_err(|e| {
            GatewayError::upstream_with_source(
                format!("failed to read response body from '{url}'"),
                e.into(),
            )
        })?;

        tracing::debug!("Upstream '{}' answered {}", url, status);
        Ok(UpstreamResponse::new(status, response_headers, body))
    }
}
