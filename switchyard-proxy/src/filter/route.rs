use async_trait::async_trait;
use std::sync::Arc;

use switchyard_core::error::GatewayError;
use switchyard_loadbalance::LoadBalancerClient;

use crate::routes::RouteTarget;
use crate::transport::HttpTransport;

use super::{FilterStage, GatewayFilter, RequestContext};

/// 负载均衡路由过滤器
///
/// 处理service_id目标：先用服务名占位构造URI，再用选中的
/// 服务器重写scheme/host/port后发出。统计记账由客户端的
/// `execute` 保证。
pub struct LoadBalancedRoutingFilter {
    lb_client: Arc<LoadBalancerClient>,
    transport: Arc<dyn HttpTransport>,
}

impl LoadBalancedRoutingFilter {
    pub fn new(lb_client: Arc<LoadBalancerClient>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            lb_client,
            transport,
        }
    }
}

#[async_trait]
impl GatewayFilter for LoadBalancedRoutingFilter {
    fn name(&self) -> &'static str {
        "load_balanced_routing"
    }

    fn stage(&self) -> FilterStage {
        FilterStage::Route
    }

    fn order(&self) -> i32 {
        10
    }

    fn should_run(&self, ctx: &RequestContext) -> bool {
        ctx.error.is_none()
            && matches!(
                ctx.route.as_ref().map(|r| &r.target),
                Some(RouteTarget::ServiceId(_))
            )
    }

    async fn run(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        let service_id = match ctx.route.as_ref().map(|r| &r.target) {
            Some(RouteTarget::ServiceId(service_id)) => service_id.clone(),
            _ => return Ok(()),
        };

        let placeholder = format!("http://{}{}", service_id, ctx.forward_path_and_query());
        let original = reqwest::Url::parse(&placeholder)
            .map_err(|e| GatewayError::InvalidUri(format!("'{placeholder}': {e}")))?;

        let method = ctx.method.clone();
        let headers = ctx.headers.clone();
        let body = ctx.body.clone();
        let transport = self.transport.clone();

        let response = self
            .lb_client
            .execute(&service_id, move |server| async move {
                let url = LoadBalancerClient::reconstruct_uri(&server, &original)?;
                tracing::debug!("Forwarding to server '{}' at {}", server.id, url);
                let response = transport.send(url, method, headers, body).await?;
                Ok(response)
            })
            .await?;

        ctx.response = Some(response);
        Ok(())
    }
}

/// 直连路由过滤器
///
/// 处理字面URL目标：转发路径拼在配置URL的路径之后，不走
/// 负载均衡，不记统计。
pub struct DirectRoutingFilter {
    transport: Arc<dyn HttpTransport>,
}

impl DirectRoutingFilter {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl GatewayFilter for DirectRoutingFilter {
    fn name(&self) -> &'static str {
        "direct_routing"
    }

    fn stage(&self) -> FilterStage {
        FilterStage::Route
    }

    fn order(&self) -> i32 {
        20
    }

    fn should_run(&self, ctx: &RequestContext) -> bool {
        ctx.error.is_none()
            && matches!(
                ctx.route.as_ref().map(|r| &r.target),
                Some(RouteTarget::Url(_))
            )
    }

    async fn run(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        let base = match ctx.route.as_ref().map(|r| &r.target) {
            Some(RouteTarget::Url(url)) => url.clone(),
            _ => return Ok(()),
        };

        let mut url = reqwest::Url::parse(&base)
            .map_err(|e| GatewayError::InvalidUri(format!("'{base}': {e}")))?;

        let forward = ctx.forward_path.as_deref().unwrap_or(&ctx.path);
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base_path}{forward}"));
        url.set_query(ctx.query.as_deref());

        tracing::debug!("Forwarding directly to {}", url);
        let response = self
            .transport
            .send(url, ctx.method.clone(), ctx.headers.clone(), ctx.body.clone())
            .await?;

        ctx.response = Some(response);
        Ok(())
    }
}
