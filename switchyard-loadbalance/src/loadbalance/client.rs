use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use switchyard_core::config::model::LoadBalanceSettings;
use switchyard_core::discovery::DiscoveryClient;
use switchyard_core::error::GatewayError;

use super::balancer::LoadBalancer;
use super::server::Server;
use super::server_list::DiscoveryServerList;
use super::stats::ServerStats;

/// 按逻辑服务名工作的负载均衡客户端
///
/// 每个服务名惰性创建一个负载均衡器并复用至进程结束。
/// `execute` 保证围绕调用的统计记账：调用前活跃数+1，调用结束
/// 后-1并记录耗时，无论成功失败。
pub struct LoadBalancerClient {
    discovery: Arc<dyn DiscoveryClient>,
    settings: LoadBalanceSettings,
    balancers: RwLock<HashMap<String, Arc<LoadBalancer>>>,
}

impl LoadBalancerClient {
    pub fn new(discovery: Arc<dyn DiscoveryClient>, settings: LoadBalanceSettings) -> Self {
        Self {
            discovery,
            settings,
            balancers: RwLock::new(HashMap::new()),
        }
    }

    /// 获取（必要时创建并初始化）指定服务的负载均衡器
    pub async fn balancer(&self, service_id: &str) -> Result<Arc<LoadBalancer>, GatewayError> {
        if let Some(balancer) = self.balancers.read().await.get(service_id) {
            return Ok(balancer.clone());
        }

        let mut balancers = self.balancers.write().await;
        // 写锁下二次检查，避免并发重复建池
        if let Some(balancer) = balancers.get(service_id) {
            return Ok(balancer.clone());
        }

        let server_list = Arc::new(DiscoveryServerList::new(
            service_id,
            self.discovery.clone(),
            self.settings.clone(),
        ));
        let balancer = Arc::new(LoadBalancer::new(
            service_id,
            self.settings.strategy,
            self.settings.local_zone.clone(),
            server_list,
            self.settings.stats_window_size,
        ));
        balancer.initialize().await?;
        tracing::info!("Created load balancer for service '{}'", service_id);

        balancers.insert(service_id.to_string(), balancer.clone());
        Ok(balancer)
    }

    /// 为指定服务选一台服务器
    pub async fn choose(&self, service_id: &str) -> Result<Server, GatewayError> {
        let balancer = self.balancer(service_id).await?;
        balancer.choose_server()
    }

    /// 选择服务器并执行请求，带统计记账
    ///
    /// `request_fn` 的错误在记账完成后原样传出，绝不会被记账
    /// 逻辑吞掉或替换。归还记账挂在守卫的Drop上，调用方中途
    /// 取消（future被丢弃）时活跃计数同样归还。
    pub async fn execute<T, F, Fut>(&self, service_id: &str, request_fn: F) -> Result<T>
    where
        F: FnOnce(Server) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let balancer = self.balancer(service_id).await?;
        let server = balancer.choose_server()?;
        let stats = balancer.stats().server_stats(&server);

        stats.increment_active();
        stats.increment_total();
        let guard = InFlightGuard {
            stats,
            started: Instant::now(),
        };

        let result = request_fn(server).await;
        drop(guard);

        result
    }

    /// 刷新所有已创建的负载均衡器的池
    ///
    /// 单个服务刷新失败只记日志，不影响其他服务。
    pub async fn refresh_all(&self) {
        let balancers: Vec<Arc<LoadBalancer>> =
            self.balancers.read().await.values().cloned().collect();
        for balancer in balancers {
            if balancer.refresh().await.is_err() {
                tracing::warn!(
                    "Refresh failed for service '{}', will retry next cycle",
                    balancer.name()
                );
            }
        }
    }

    /// 所有已创建的负载均衡器
    pub async fn balancers(&self) -> Vec<Arc<LoadBalancer>> {
        self.balancers.read().await.values().cloned().collect()
    }

    /// 用选中的服务器重写URI的scheme/host/port，其余部分原样保留
    pub fn reconstruct_uri(
        server: &Server,
        original: &reqwest::Url,
    ) -> Result<reqwest::Url, GatewayError> {
        let mut uri = original.clone();
        uri.set_scheme(server.scheme()).map_err(|_| {
            GatewayError::InvalidUri(format!(
                "cannot set scheme '{}' on '{original}'",
                server.scheme()
            ))
        })?;
        uri.set_host(Some(&server.host))
            .map_err(|e| GatewayError::InvalidUri(format!("invalid host '{}': {e}", server.host)))?;
        uri.set_port(Some(server.port))
            .map_err(|_| GatewayError::InvalidUri(format!("cannot set port on '{original}'")))?;
        Ok(uri)
    }
}

/// 在途请求守卫
///
/// Drop时记录耗时并归还活跃计数；请求future中途被丢弃时同样
/// 执行，计数不会泄漏。
struct InFlightGuard {
    stats: Arc<ServerStats>,
    started: Instant,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.stats.record_response_time(self.started.elapsed());
        self.stats.decrement_active();
    }
}
