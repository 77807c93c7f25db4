use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use switchyard_core::config::model::LoadBalanceSettings;
use switchyard_core::discovery::DiscoveryClient;

use super::client::LoadBalancerClient;

/// 负载均衡后台服务
///
/// 持有客户端并负责池的持续刷新：定时兜底刷新，叠加注册中心
/// 变更事件触发的即时刷新。
pub struct LoadBalanceService {
    client: Arc<LoadBalancerClient>,
    discovery: Arc<dyn DiscoveryClient>,
    refresh_interval: Duration,
    is_running: Arc<RwLock<bool>>,
}

impl LoadBalanceService {
    pub fn new(discovery: Arc<dyn DiscoveryClient>, settings: LoadBalanceSettings) -> Self {
        let refresh_interval = Duration::from_secs(settings.refresh_interval_seconds);
        let client = Arc::new(LoadBalancerClient::new(discovery.clone(), settings));
        Self {
            client,
            discovery,
            refresh_interval,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn client(&self) -> Arc<LoadBalancerClient> {
        self.client.clone()
    }

    /// 启动后台刷新任务；重复调用是空操作
    pub async fn start(&self) {
        {
            let mut running = self.is_running.write().await;
            if *running {
                return;
            }
            *running = true;
        }

        info!(
            "Starting load balance service (refresh interval: {:?})",
            self.refresh_interval
        );

        let client = self.client.clone();
        let is_running = self.is_running.clone();
        let mut events = self.discovery.subscribe();
        let refresh_interval = self.refresh_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresh_interval);
            // 第一次tick立即返回，跳过以免刚建池就刷新
            ticker.tick().await;

            while *is_running.read().await {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Periodic pool refresh");
                        client.refresh_all().await;
                    }
                    event = events.recv() => {
                        match event {
                            Ok(_) => {
                                debug!("Registry change notification, refreshing pools");
                                client.refresh_all().await;
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                                warn!("Missed {} registry notifications, refreshing pools", missed);
                                client.refresh_all().await;
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                                debug!("Registry event channel closed, falling back to periodic refresh only");
                                ticker.tick().await;
                                client.refresh_all().await;
                            }
                        }
                    }
                }
            }

            info!("Load balance service refresh task stopped");
        });
    }

    /// 停止后台刷新任务
    pub async fn stop(&self) {
        let mut running = self.is_running.write().await;
        *running = false;
        info!("Load balance service stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::discovery::{ServiceInstance, StaticDiscoveryClient};

    #[tokio::test]
    async fn test_registry_event_triggers_pool_refresh() {
        let discovery = Arc::new(StaticDiscoveryClient::new());
        discovery
            .register(ServiceInstance::new("simple", "host1", 8080))
            .await;

        let service = LoadBalanceService::new(discovery.clone(), LoadBalanceSettings::default());
        service.start().await;

        let client = service.client();
        let balancer = client.balancer("simple").await.unwrap();
        assert_eq!(balancer.pool_snapshot().len(), 1);

        // 注册第二个实例并等事件驱动的刷新生效
        discovery
            .register(ServiceInstance::new("simple", "host2", 8080))
            .await;
        let mut refreshed = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if balancer.pool_snapshot().len() == 2 {
                refreshed = true;
                break;
            }
        }
        assert!(refreshed, "pool was not refreshed after registry change");

        service.stop().await;
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let discovery = Arc::new(StaticDiscoveryClient::new());
        let service = LoadBalanceService::new(discovery, LoadBalanceSettings::default());
        service.start().await;
        service.start().await;
        service.stop().await;
    }
}
