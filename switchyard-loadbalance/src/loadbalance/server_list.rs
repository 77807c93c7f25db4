use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use switchyard_core::config::model::LoadBalanceSettings;
use switchyard_core::discovery::{DiscoveryClient, ServiceInstance};

use super::server::Server;

/// 服务器列表来源抽象
///
/// `initial_servers` 在负载均衡器建池时调用一次，之后的刷新
/// 走 `updated_servers`。
#[async_trait]
pub trait ServerList: Send + Sync {
    async fn initial_servers(&self) -> Result<Vec<Server>>;

    async fn updated_servers(&self) -> Result<Vec<Server>>;
}

/// 从主机名近似推导zone：剥掉第一个DNS标签
///
/// `"myhost.zone.example.com"` -> `"zone.example.com"`；
/// 主机名不含点时zone就是整个主机名。
pub fn approximate_zone(host: &str) -> String {
    match host.split_once('.') {
        Some((_, rest)) => rest.to_string(),
        None => host.to_string(),
    }
}

/// 发现支撑的zone感知服务器列表
///
/// 把原始发现快照逐条后处理为 `Server`：
/// 1. 实例携带显式zone元数据时原样使用；
/// 2. 否则在开启近似推导时从主机名推导zone；
/// 3. id取元数据instanceId，缺省为 host:port；
/// 4. 开启IP偏好时，可连接地址换成发现上报的IP；
/// 5. 声明了安全端口的实例使用该端口并标记为https。
/// 对给定输入是纯函数，除读取原始列表外无副作用。
pub struct DiscoveryServerList {
    service_id: String,
    discovery: Arc<dyn DiscoveryClient>,
    settings: LoadBalanceSettings,
}

impl DiscoveryServerList {
    pub fn new(
        service_id: impl Into<String>,
        discovery: Arc<dyn DiscoveryClient>,
        settings: LoadBalanceSettings,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            discovery,
            settings,
        }
    }

    async fn fetch(&self) -> Result<Vec<Server>> {
        let instances = self.discovery.instances(&self.service_id).await?;
        Ok(instances
            .into_iter()
            .map(|instance| self.server_from_instance(instance))
            .collect())
    }

    fn server_from_instance(&self, instance: ServiceInstance) -> Server {
        let zone = match instance.metadata.get("zone") {
            Some(zone) => Some(zone.clone()),
            None if self.settings.approximate_zone_from_hostname => {
                Some(approximate_zone(&instance.host))
            }
            None => None,
        };

        let host = if self.settings.prefer_ip_address {
            instance.ip_address.clone()
        } else {
            instance.host.clone()
        };

        let port = match (instance.secure, instance.secure_port) {
            (true, Some(secure_port)) => secure_port,
            _ => instance.port,
        };

        let id = match instance.metadata.get("instanceId") {
            Some(instance_id) => instance_id.clone(),
            None => format!("{host}:{port}"),
        };

        Server {
            id,
            host,
            port,
            secure: instance.secure,
            zone,
            metadata: instance.metadata,
        }
    }
}

#[async_trait]
impl ServerList for DiscoveryServerList {
    async fn initial_servers(&self) -> Result<Vec<Server>> {
        self.fetch().await
    }

    async fn updated_servers(&self) -> Result<Vec<Server>> {
        self.fetch().await
    }
}

/// 静态配置的服务器列表；条目原样透传，不做zone处理
pub struct ConfiguredServerList {
    servers: Vec<Server>,
}

impl ConfiguredServerList {
    pub fn new(servers: Vec<Server>) -> Self {
        Self { servers }
    }
}

#[async_trait]
impl ServerList for ConfiguredServerList {
    async fn initial_servers(&self) -> Result<Vec<Server>> {
        Ok(self.servers.clone())
    }

    async fn updated_servers(&self) -> Result<Vec<Server>> {
        Ok(self.servers.clone())
    }
}
