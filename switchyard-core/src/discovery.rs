use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// 注册中心上报的单个服务实例
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInstance {
    pub service_id: String,
    pub host: String,
    pub port: u16,
    /// 实例声明的HTTPS端口；仅在secure为true时生效
    pub secure_port: Option<u16>,
    pub secure: bool,
    pub ip_address: String,
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    pub fn new(service_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            service_id: service_id.into(),
            ip_address: host.clone(),
            host,
            port,
            secure_port: None,
            secure: false,
            metadata: HashMap::new(),
        }
    }

    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = ip_address.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_secure_port(mut self, secure_port: u16) -> Self {
        self.secure_port = Some(secure_port);
        self.secure = true;
        self
    }
}

/// 注册中心变更事件
///
/// 路由定位器和负载均衡刷新任务各自订阅一份，独立触发自己的刷新。
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    RegistryChanged,
}

/// 服务发现客户端抽象
///
/// 网关只依赖这三个操作；具体的注册/心跳协议由实现方负责。
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// 当前已知的所有服务名
    async fn service_names(&self) -> Result<Vec<String>>;

    /// 指定服务的当前实例快照
    async fn instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>>;

    /// 订阅注册中心变更通知
    fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent>;
}

/// 内存版服务发现实现
///
/// 用于内嵌场景和测试：注册/注销立即生效并广播变更事件。
pub struct StaticDiscoveryClient {
    services: Arc<RwLock<HashMap<String, Vec<ServiceInstance>>>>,
    events: broadcast::Sender<DiscoveryEvent>,
}

impl StaticDiscoveryClient {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    /// 注册一个实例并广播变更
    pub async fn register(&self, instance: ServiceInstance) {
        {
            let mut services = self.services.write().await;
            services
                .entry(instance.service_id.clone())
                .or_default()
                .push(instance);
        }
        self.notify();
    }

    /// 注销某服务的全部实例并广播变更
    pub async fn deregister(&self, service_id: &str) {
        let removed = {
            let mut services = self.services.write().await;
            services.remove(service_id).is_some()
        };
        if removed {
            self.notify();
        }
    }

    fn notify(&self) {
        // 没有订阅者时发送会失败，属正常情况
        if self.events.send(DiscoveryEvent::RegistryChanged).is_err() {
            tracing::debug!("Registry changed but no subscribers are listening");
        }
    }
}

impl Default for StaticDiscoveryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiscoveryClient for StaticDiscoveryClient {
    async fn service_names(&self) -> Result<Vec<String>> {
        let services = self.services.read().await;
        let mut names: Vec<String> = services.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>> {
        let services = self.services.read().await;
        Ok(services.get(service_id).cloned().unwrap_or_default())
    }

    fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.events.subscribe()
    }
}
