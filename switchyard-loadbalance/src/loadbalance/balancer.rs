use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use switchyard_core::config::model::LoadBalanceStrategy;
use switchyard_core::error::GatewayError;

use super::server::Server;
use super::server_list::ServerList;
use super::stats::LoadBalancerStats;

/// 一个逻辑服务名的负载均衡器
///
/// 持有该服务的实例池快照和私有统计。刷新整体换入新快照，
/// 并发选择要么看到旧池要么看到新池。
pub struct LoadBalancer {
    name: String,
    strategy: LoadBalanceStrategy,
    local_zone: Option<String>,
    server_list: Arc<dyn ServerList>,
    pool: RwLock<Arc<Vec<Server>>>,
    position: AtomicUsize,
    stats: LoadBalancerStats,
}

impl LoadBalancer {
    pub fn new(
        name: impl Into<String>,
        strategy: LoadBalanceStrategy,
        local_zone: Option<String>,
        server_list: Arc<dyn ServerList>,
        stats_window_size: usize,
    ) -> Self {
        Self {
            name: name.into(),
            strategy,
            local_zone,
            server_list,
            pool: RwLock::new(Arc::new(Vec::new())),
            position: AtomicUsize::new(0),
            stats: LoadBalancerStats::new(stats_window_size),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &LoadBalancerStats {
        &self.stats
    }

    /// 当前池快照
    pub fn pool_snapshot(&self) -> Arc<Vec<Server>> {
        self.pool.read().clone()
    }

    /// 初次建池
    pub async fn initialize(&self) -> Result<(), GatewayError> {
        let servers = self
            .server_list
            .initial_servers()
            .await
            .map_err(GatewayError::RefreshFailure)?;
        tracing::debug!(
            "Load balancer '{}' initialized with {} servers",
            self.name,
            servers.len()
        );
        self.swap_pool(servers);
        Ok(())
    }

    /// 重新拉取服务器列表
    ///
    /// 拉取失败时保留旧池继续服务，下个周期再试；瞬时的发现
    /// 抖动不会造成选择中断。
    pub async fn refresh(&self) -> Result<(), GatewayError> {
        match self.server_list.updated_servers().await {
            Ok(servers) => {
                tracing::debug!(
                    "Load balancer '{}' refreshed: {} servers",
                    self.name,
                    servers.len()
                );
                self.swap_pool(servers);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    "Load balancer '{}' refresh failed, keeping stale pool of {} servers: {}",
                    self.name,
                    self.pool.read().len(),
                    e
                );
                Err(GatewayError::RefreshFailure(e))
            }
        }
    }

    fn swap_pool(&self, servers: Vec<Server>) {
        let live_ids: HashSet<String> = servers.iter().map(|s| s.id.clone()).collect();
        *self.pool.write() = Arc::new(servers);
        // 统计条目随池刷新裁剪，消失的服务器不再占内存
        self.stats.retain(&live_ids);
    }

    /// 从当前池中选一台服务器
    ///
    /// 本进程配置了local_zone且池中存在同zone实例时，只在同zone
    /// 候选里选；否则退回全池（多zone无本地命中时不做任何偏向）。
    /// 永不阻塞；池为空直接失败。
    pub fn choose_server(&self) -> Result<Server, GatewayError> {
        let pool = self.pool_snapshot();
        if pool.is_empty() {
            return Err(GatewayError::NoServersAvailable {
                service: self.name.clone(),
            });
        }

        let candidates: Vec<&Server> = match &self.local_zone {
            Some(zone) if pool.iter().any(|s| s.zone.as_deref() == Some(zone)) => {
                let zoned: Vec<&Server> = pool
                    .iter()
                    .filter(|s| s.zone.as_deref() == Some(zone))
                    .collect();
                tracing::debug!(
                    "Load balancer '{}' restricting selection to zone '{}' ({} of {} servers)",
                    self.name,
                    zone,
                    zoned.len(),
                    pool.len()
                );
                zoned
            }
            _ => pool.iter().collect(),
        };

        let chosen = match self.strategy {
            LoadBalanceStrategy::RoundRobin => self.select_round_robin(&candidates),
            LoadBalanceStrategy::WeightedRandom => self.select_weighted_random(&candidates),
        };

        tracing::debug!("Load balancer '{}' chose server {}", self.name, chosen);
        Ok(chosen)
    }

    fn select_round_robin(&self, candidates: &[&Server]) -> Server {
        let index = self.position.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates[index].clone()
    }

    /// 按当前活跃请求数反比加权的随机选择；负载越高被选中概率越低
    fn select_weighted_random(&self, candidates: &[&Server]) -> Server {
        let weights: Vec<f64> = candidates
            .iter()
            .map(|server| {
                let active = self.stats.server_stats(server).active_requests().max(0);
                1.0 / (1.0 + active as f64)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let mut rng = rand::rng();
        let mut remaining = rng.random_range(0.0..total);
        for (server, weight) in candidates.iter().zip(&weights) {
            remaining -= weight;
            if remaining <= 0.0 {
                return (*server).clone();
            }
        }

        // 浮点边界兜底
        candidates[candidates.len() - 1].clone()
    }
}
