pub mod post;
pub mod pre;
pub mod route;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use std::sync::Arc;

use switchyard_core::config::model::Config;
use switchyard_core::error::GatewayError;
use switchyard_loadbalance::LoadBalancerClient;

use crate::routes::{RouteLocator, ServiceRoute};
use crate::transport::{HttpTransport, UpstreamResponse};

pub use post::SendResponseFilter;
pub use pre::{ProxyHeadersFilter, RouteResolutionFilter};
pub use route::{DirectRoutingFilter, LoadBalancedRoutingFilter};

/// 一次入站请求的贯穿上下文
///
/// 每个请求独占一份，过滤器串行修改，不存在跨请求共享的可变
/// 状态。
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: Option<String>,

    /// Pre阶段解析出的路由
    pub route: Option<ServiceRoute>,
    /// 剥离前缀后的转发路径
    pub forward_path: Option<String>,
    /// Route阶段的上游响应
    pub response: Option<UpstreamResponse>,
    /// 流程中记录的错误；由Post阶段翻译
    pub error: Option<GatewayError>,

    short_circuit: bool,
}

impl RequestContext {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: Option<String>,
        headers: HeaderMap,
        body: Bytes,
        client_ip: Option<String>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            query,
            headers,
            body,
            client_ip,
            route: None,
            forward_path: None,
            response: None,
            error: None,
            short_circuit: false,
        }
    }

    /// Pre过滤器设置后跳过剩余Pre和整个Route阶段
    pub fn set_short_circuit(&mut self) {
        self.short_circuit = true;
    }

    pub fn is_short_circuited(&self) -> bool {
        self.short_circuit
    }

    /// 转发路径加上原始query
    pub fn forward_path_and_query(&self) -> String {
        let path = self.forward_path.as_deref().unwrap_or(&self.path);
        match &self.query {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        }
    }

    /// 记录错误；Route阶段的失败经此流向Post的错误翻译
    pub fn record_error(&mut self, error: GatewayError) {
        tracing::debug!("Request error recorded: {}", error);
        self.error = Some(error);
    }
}

/// 过滤器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    Pre,
    Route,
    Post,
}

/// 网关过滤器
///
/// 同阶段内按order从小到大执行；order相同时按注册顺序，排序
/// 稳定。
#[async_trait]
pub trait GatewayFilter: Send + Sync {
    fn name(&self) -> &'static str;

    fn stage(&self) -> FilterStage;

    fn order(&self) -> i32;

    fn should_run(&self, _ctx: &RequestContext) -> bool {
        true
    }

    async fn run(&self, ctx: &mut RequestContext) -> anyhow::Result<()>;
}

/// 三阶段过滤器流水线
///
/// Pre（装饰请求上下文）-> Route（恰好一个路由过滤器执行转发）
/// -> Post（回写响应或翻译错误）。Route阶段的失败不跳过Post。
pub struct FilterPipeline {
    pre: Vec<Arc<dyn GatewayFilter>>,
    route: Vec<Arc<dyn GatewayFilter>>,
    post: Vec<Arc<dyn GatewayFilter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self {
            pre: Vec::new(),
            route: Vec::new(),
            post: Vec::new(),
        }
    }

    /// 注册过滤器；order相同时先注册者先执行
    pub fn register(&mut self, filter: Arc<dyn GatewayFilter>) {
        let filters = match filter.stage() {
            FilterStage::Pre => &mut self.pre,
            FilterStage::Route => &mut self.route,
            FilterStage::Post => &mut self.post,
        };
        filters.push(filter);
        filters.sort_by_key(|f| f.order());
    }

    /// 驱动一次完整的请求生命周期
    pub async fn handle(&self, mut ctx: RequestContext) -> RequestContext {
        for filter in &self.pre {
            if ctx.is_short_circuited() {
                break;
            }
            if !filter.should_run(&ctx) {
                continue;
            }
            if let Err(e) = filter.run(&mut ctx).await {
                tracing::error!("Pre filter '{}' failed: {}", filter.name(), e);
                ctx.record_error(into_gateway_error(e));
            }
        }

        if !ctx.is_short_circuited() {
            // 恰好一个路由过滤器执行
            for filter in &self.route {
                if !filter.should_run(&ctx) {
                    continue;
                }
                if let Err(e) = filter.run(&mut ctx).await {
                    tracing::error!("Route filter '{}' failed: {}", filter.name(), e);
                    ctx.record_error(into_gateway_error(e));
                }
                break;
            }
        }

        for filter in &self.post {
            if !filter.should_run(&ctx) {
                continue;
            }
            if let Err(e) = filter.run(&mut ctx).await {
                tracing::error!("Post filter '{}' failed: {}", filter.name(), e);
                ctx.record_error(into_gateway_error(e));
            }
        }

        ctx
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// 保留原始的网关错误分类；其他错误归入上游失败
fn into_gateway_error(error: anyhow::Error) -> GatewayError {
    match error.downcast::<GatewayError>() {
        Ok(gateway_error) => gateway_error,
        Err(other) => GatewayError::upstream_with_source("filter execution failed", other),
    }
}

/// 组装默认过滤器集
pub fn default_pipeline(
    config: Arc<Config>,
    locator: Arc<RouteLocator>,
    lb_client: Arc<LoadBalancerClient>,
    transport: Arc<dyn HttpTransport>,
) -> FilterPipeline {
    let mut pipeline = FilterPipeline::new();
    pipeline.register(Arc::new(RouteResolutionFilter::new(locator)));
    pipeline.register(Arc::new(ProxyHeadersFilter::new(config)));
    pipeline.register(Arc::new(LoadBalancedRoutingFilter::new(
        lb_client,
        transport.clone(),
    )));
    pipeline.register(Arc::new(DirectRoutingFilter::new(transport)));
    pipeline.register(Arc::new(SendResponseFilter::new()));
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_context() -> RequestContext {
        RequestContext::new(
            Method::GET,
            "/simple/bar",
            None,
            HeaderMap::new(),
            Bytes::new(),
            Some("10.0.0.9".to_string()),
        )
    }

    /// 把执行顺序记到共享日志里的探针过滤器
    struct ProbeFilter {
        name: &'static str,
        stage: FilterStage,
        order: i32,
        log: Arc<parking_lot::Mutex<Vec<&'static str>>>,
        short_circuit: bool,
        fail: bool,
    }

    #[async_trait]
    impl GatewayFilter for ProbeFilter {
        fn name(&self) -> &'static str {
            self.name
        }

        fn stage(&self) -> FilterStage {
            self.stage
        }

        fn order(&self) -> i32 {
            self.order
        }

        async fn run(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
            self.log.lock().push(self.name);
            if self.short_circuit {
                ctx.set_short_circuit();
            }
            if self.fail {
                anyhow::bail!("probe failure");
            }
            Ok(())
        }
    }

    fn probe(
        name: &'static str,
        stage: FilterStage,
        order: i32,
        log: &Arc<parking_lot::Mutex<Vec<&'static str>>>,
    ) -> Arc<ProbeFilter> {
        Arc::new(ProbeFilter {
            name,
            stage,
            order,
            log: log.clone(),
            short_circuit: false,
            fail: false,
        })
    }

    #[tokio::test]
    async fn test_stage_and_order_execution() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut pipeline = FilterPipeline::new();
        pipeline.register(probe("post", FilterStage::Post, 10, &log));
        pipeline.register(probe("pre-late", FilterStage::Pre, 10, &log));
        pipeline.register(probe("pre-early", FilterStage::Pre, 5, &log));
        pipeline.register(probe("route", FilterStage::Route, 10, &log));

        pipeline.handle(test_context()).await;
        assert_eq!(*log.lock(), vec!["pre-early", "pre-late", "route", "post"]);
    }

    #[tokio::test]
    async fn test_equal_order_runs_in_registration_order() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut pipeline = FilterPipeline::new();
        pipeline.register(probe("first", FilterStage::Pre, 10, &log));
        pipeline.register(probe("second", FilterStage::Pre, 10, &log));

        pipeline.handle(test_context()).await;
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_route_but_not_post() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut pipeline = FilterPipeline::new();
        pipeline.register(Arc::new(ProbeFilter {
            name: "pre-cutoff",
            stage: FilterStage::Pre,
            order: 1,
            log: log.clone(),
            short_circuit: true,
            fail: false,
        }));
        pipeline.register(probe("pre-after", FilterStage::Pre, 2, &log));
        pipeline.register(probe("route", FilterStage::Route, 10, &log));
        pipeline.register(probe("post", FilterStage::Post, 10, &log));

        let ctx = pipeline.handle(test_context()).await;
        assert!(ctx.is_short_circuited());
        assert_eq!(*log.lock(), vec!["pre-cutoff", "post"]);
    }

    #[tokio::test]
    async fn test_route_failure_still_reaches_post() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut pipeline = FilterPipeline::new();
        pipeline.register(Arc::new(ProbeFilter {
            name: "route-fail",
            stage: FilterStage::Route,
            order: 10,
            log: log.clone(),
            short_circuit: false,
            fail: true,
        }));
        pipeline.register(probe("post", FilterStage::Post, 10, &log));

        let ctx = pipeline.handle(test_context()).await;
        assert!(ctx.error.is_some());
        assert_eq!(*log.lock(), vec!["route-fail", "post"]);
    }

    #[tokio::test]
    async fn test_exactly_one_route_filter_runs() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut pipeline = FilterPipeline::new();
        pipeline.register(probe("route-a", FilterStage::Route, 10, &log));
        pipeline.register(probe("route-b", FilterStage::Route, 20, &log));

        pipeline.handle(test_context()).await;
        assert_eq!(*log.lock(), vec!["route-a"]);
    }

    #[tokio::test]
    async fn test_should_run_is_honored() {
        struct ConditionalFilter {
            counter: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl GatewayFilter for ConditionalFilter {
            fn name(&self) -> &'static str {
                "conditional"
            }
            fn stage(&self) -> FilterStage {
                FilterStage::Pre
            }
            fn order(&self) -> i32 {
                1
            }
            fn should_run(&self, ctx: &RequestContext) -> bool {
                ctx.path.starts_with("/match")
            }
            async fn run(&self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
                self.counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let mut pipeline = FilterPipeline::new();
        pipeline.register(Arc::new(ConditionalFilter {
            counter: counter.clone(),
        }));

        pipeline.handle(test_context()).await;
        assert_eq!(counter.load(Ordering::Relaxed), 0);

        let ctx = RequestContext::new(
            Method::GET,
            "/match/x",
            None,
            HeaderMap::new(),
            Bytes::new(),
            None,
        );
        pipeline.handle(ctx).await;
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_gateway_error_category_survives_filter_boundary() {
        struct NoServersFilter;

        #[async_trait]
        impl GatewayFilter for NoServersFilter {
            fn name(&self) -> &'static str {
                "no-servers"
            }
            fn stage(&self) -> FilterStage {
                FilterStage::Route
            }
            fn order(&self) -> i32 {
                10
            }
            async fn run(&self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
                Err(GatewayError::NoServersAvailable {
                    service: "simple".to_string(),
                }
                .into())
            }
        }

        let mut pipeline = FilterPipeline::new();
        pipeline.register(Arc::new(NoServersFilter));

        let ctx = pipeline.handle(test_context()).await;
        assert!(matches!(
            ctx.error,
            Some(GatewayError::NoServersAvailable { .. })
        ));
    }

    #[test]
    fn test_forward_path_and_query() {
        let mut ctx = RequestContext::new(
            Method::GET,
            "/simple/bar",
            Some("a=1".to_string()),
            HeaderMap::new(),
            Bytes::new(),
            None,
        );
        assert_eq!(ctx.forward_path_and_query(), "/simple/bar?a=1");

        ctx.forward_path = Some("/bar".to_string());
        assert_eq!(ctx.forward_path_and_query(), "/bar?a=1");
    }
}
