use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use switchyard_core::config::loader::load_config;
use switchyard_core::config::model::Config;
use switchyard_core::discovery::{DiscoveryClient, StaticDiscoveryClient};
use switchyard_loadbalance::{LoadBalanceService, LoadBalancerClient};
use switchyard_proxy::transport::ReqwestTransport;
use switchyard_proxy::{default_pipeline, FilterPipeline, RouteLocator};

use crate::router;

/// 应用状态
///
/// 路由定位器、负载均衡服务和过滤器流水线的装配点。
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub discovery: Arc<dyn DiscoveryClient>,
    pub locator: Arc<RouteLocator>,
    pub lb_service: Arc<LoadBalanceService>,
    pub lb_client: Arc<LoadBalancerClient>,
    pub pipeline: Arc<FilterPipeline>,
}

impl AppState {
    /// 用给定配置和发现客户端装配应用状态
    pub fn new(config: Config, discovery: Arc<dyn DiscoveryClient>) -> Result<Self> {
        let config = Arc::new(config);
        let locator = Arc::new(RouteLocator::new(config.clone(), discovery.clone()));
        let lb_service = Arc::new(LoadBalanceService::new(
            discovery.clone(),
            config.loadbalance.clone(),
        ));
        let lb_client = lb_service.client();
        let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(
            config.proxy.request_timeout_seconds,
        ))?);
        let pipeline = Arc::new(default_pipeline(
            config.clone(),
            locator.clone(),
            lb_client.clone(),
            transport,
        ));

        Ok(Self {
            config,
            discovery,
            locator,
            lb_service,
            lb_client,
            pipeline,
        })
    }

    /// 启动后台任务：池刷新服务和路由表失效监听
    pub async fn start(&self) {
        self.lb_service.start().await;
        info!("Load balance service started");

        // 注册中心变更时路由定位器独立消费同一事件流；没有事件时
        // 按发现轮询间隔兜底失效，错过的变更最迟一个周期后生效
        let locator = self.locator.clone();
        let mut events = self.discovery.subscribe();
        let poll_interval = Duration::from_secs(self.config.discovery.poll_interval_seconds);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            // 第一次tick立即返回，跳过以免刚建表就失效
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tracing::debug!("Discovery poll fallback, resetting route table");
                        locator.reset_routes();
                    }
                    event = events.recv() => {
                        match event {
                            Ok(_) => {
                                info!("Registry changed, resetting route table");
                                locator.reset_routes();
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                                warn!("Missed {} registry notifications, resetting route table", missed);
                                locator.reset_routes();
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                                // 事件源没了，只剩轮询兜底
                                ticker.tick().await;
                                locator.reset_routes();
                            }
                        }
                    }
                }
            }
        });
    }

    /// 停止应用
    pub async fn shutdown(&self) {
        info!("Shutting down application...");
        self.lb_service.stop().await;
        info!("Application shutdown complete");
    }
}

/// 创建应用路由
///
/// 管理端点显式注册，其余一切路径落入代理fallback。
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(router::health::health_check))
        .route("/admin/routes", get(router::admin::list_routes))
        .route("/admin/routes/reset", post(router::admin::reset_routes))
        .route("/admin/stats", get(router::admin::stats))
        .fallback(router::proxy::proxy_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 启动应用服务器
pub async fn start_server() -> Result<()> {
    // 初始化日志 - 完全依赖RUST_LOG环境变量
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Switchyard gateway...");

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    info!("Configuration loaded successfully");

    let discovery = Arc::new(StaticDiscoveryClient::new());
    let app_state = AppState::new(config, discovery)?;
    app_state.start().await;

    let app = create_app(app_state.clone());

    let listener = tokio::net::TcpListener::bind(&app_state.config.server.bind_address).await?;
    let addr = listener.local_addr()?;

    info!("Gateway listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  GET  /health              - Health check");
    info!("  GET  /admin/routes        - Current route table");
    info!("  POST /admin/routes/reset  - Force route table rebuild");
    info!("  GET  /admin/stats         - Per-server load balancer statistics");
    info!("  *    /*                   - Proxied to configured routes");

    let shutdown_signal = async {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("Failed to install CTRL+C signal handler");
        }
        info!("Shutdown signal received");
    };

    // 带上对端地址，代理头过滤器才拿得到客户端IP
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal);

    if let Err(e) = server.await {
        error!("Server error: {}", e);
        app_state.shutdown().await;
        return Err(e.into());
    }

    app_state.shutdown().await;
    Ok(())
}
