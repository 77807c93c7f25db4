use async_trait::async_trait;
use axum::http::header::HeaderValue;
use std::sync::Arc;

use switchyard_core::config::model::Config;
use switchyard_core::error::GatewayError;

use crate::routes::RouteLocator;

use super::{FilterStage, GatewayFilter, RequestContext};

/// 路由解析过滤器
///
/// 最先执行：查路由表，把命中的路由和转发路径写入上下文。
/// 不命中记录RouteNotFound并短路，后续Pre过滤器不再执行。
pub struct RouteResolutionFilter {
    locator: Arc<RouteLocator>,
}

impl RouteResolutionFilter {
    pub fn new(locator: Arc<RouteLocator>) -> Self {
        Self { locator }
    }
}

#[async_trait]
impl GatewayFilter for RouteResolutionFilter {
    fn name(&self) -> &'static str {
        "route_resolution"
    }

    fn stage(&self) -> FilterStage {
        FilterStage::Pre
    }

    fn order(&self) -> i32 {
        5
    }

    async fn run(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        match self.locator.resolve(&ctx.path).await? {
            Some((route, forward_path)) => {
                tracing::debug!(
                    "Path '{}' matched route '{}', forwarding as '{}'",
                    ctx.path,
                    route.id,
                    forward_path
                );
                ctx.route = Some(route);
                ctx.forward_path = Some(forward_path);
            }
            None => {
                ctx.record_error(GatewayError::RouteNotFound {
                    path: ctx.path.clone(),
                });
                ctx.set_short_circuit();
            }
        }
        Ok(())
    }
}

/// 代理头过滤器
///
/// 在转发头里追加X-Forwarded-*，让上游看到原始客户端信息。
/// 路由级开关优先于全局开关。
pub struct ProxyHeadersFilter {
    config: Arc<Config>,
}

impl ProxyHeadersFilter {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl GatewayFilter for ProxyHeadersFilter {
    fn name(&self) -> &'static str {
        "proxy_headers"
    }

    fn stage(&self) -> FilterStage {
        FilterStage::Pre
    }

    fn order(&self) -> i32 {
        10
    }

    fn should_run(&self, ctx: &RequestContext) -> bool {
        ctx.route
            .as_ref()
            .map(|route| route.add_proxy_headers)
            .unwrap_or(self.config.proxy.add_proxy_headers)
    }

    async fn run(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        if let Some(client_ip) = ctx.client_ip.clone() {
            // 已有X-Forwarded-For时在尾部追加本跳看到的地址
            let forwarded_for = match ctx.headers.get("x-forwarded-for") {
                Some(existing) => match existing.to_str() {
                    Ok(existing) => format!("{existing}, {client_ip}"),
                    Err(_) => client_ip,
                },
                None => client_ip,
            };
            if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
                ctx.headers.insert("x-forwarded-for", value);
            }
        }

        if !ctx.headers.contains_key("x-forwarded-proto") {
            ctx.headers
                .insert("x-forwarded-proto", HeaderValue::from_static("http"));
        }

        if let Some(host) = ctx.headers.get("host").cloned() {
            ctx.headers.insert("x-forwarded-host", host);
        }

        if let Some(route) = &ctx.route {
            if route.strip_prefix && route.is_wildcard() && !route.prefix().is_empty() {
                if let Ok(value) = HeaderValue::from_str(route.prefix()) {
                    ctx.headers.insert("x-forwarded-prefix", value);
                }
            }
        }

        Ok(())
    }
}
