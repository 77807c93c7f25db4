use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// 显式路由表：路由名 -> 路由定义
    #[serde(default)]
    pub routes: HashMap<String, RouteConfig>,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub proxy: ProxySettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub loadbalance: LoadBalanceSettings,
}

/// 单条显式路由定义
///
/// 每条路由必须且只能指定 `service_id`（走负载均衡）或 `url`（直连后端）之一。
/// `path` 缺省时使用 `/<路由名>/**`。
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RouteConfig {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// 转发前是否剥离匹配到的路径前缀
    #[serde(default = "default_true")]
    pub strip_prefix: bool,
    /// 按路由覆盖全局的转发头开关
    #[serde(default)]
    pub add_proxy_headers: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// 代理层全局设置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProxySettings {
    /// 全局路径前缀，例如 "/api"；空字符串表示无前缀
    #[serde(default)]
    pub mapping: String,
    /// 路由匹配前是否剥离全局前缀
    #[serde(default)]
    pub strip_mapping: bool,
    /// 是否附加 X-Forwarded-* 转发头
    #[serde(default = "default_true")]
    pub add_proxy_headers: bool,
    /// 不参与自动建路由的服务名
    #[serde(default)]
    pub ignored_services: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DiscoverySettings {
    /// 没有注册中心事件时的兜底轮询间隔
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

/// 负载均衡设置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoadBalanceSettings {
    #[serde(default)]
    pub strategy: LoadBalanceStrategy,
    /// 实例未携带zone元数据时，是否从主机名近似推导zone
    #[serde(default = "default_true")]
    pub approximate_zone_from_hostname: bool,
    /// 是否优先使用注册中心上报的IP而非主机名
    #[serde(default)]
    pub prefer_ip_address: bool,
    /// 本进程所在zone；设置后选择时优先同zone实例
    #[serde(default)]
    pub local_zone: Option<String>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    /// 每台服务器保留的响应时间样本数
    #[serde(default = "default_stats_window_size")]
    pub stats_window_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// 轮询（默认）
    #[default]
    RoundRobin,
    /// 按当前负载反比加权的随机选择
    WeightedRandom,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            path: None,
            service_id: None,
            url: None,
            strip_prefix: true,
            add_proxy_headers: None,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            mapping: String::new(),
            strip_mapping: false,
            add_proxy_headers: true,
            ignored_services: Vec::new(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

impl Default for LoadBalanceSettings {
    fn default() -> Self {
        Self {
            strategy: LoadBalanceStrategy::default(),
            approximate_zone_from_hostname: true,
            prefer_ip_address: false,
            local_zone: None,
            refresh_interval_seconds: default_refresh_interval(),
            stats_window_size: default_stats_window_size(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    30
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_stats_window_size() -> usize {
    100
}

impl Config {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        for (route_id, route) in &self.routes {
            self.validate_route_config(route_id, route)?;
        }

        self.validate_proxy_settings()?;
        self.validate_discovery_settings()?;
        self.validate_loadbalance_settings()?;

        Ok(())
    }

    fn validate_discovery_settings(&self) -> Result<()> {
        if self.discovery.poll_interval_seconds == 0 {
            anyhow::bail!("discovery.poll_interval_seconds cannot be 0");
        }
        Ok(())
    }

    /// 验证单条路由配置的有效性
    fn validate_route_config(&self, route_id: &str, route: &RouteConfig) -> Result<()> {
        if route_id.is_empty() {
            anyhow::bail!("Route has empty name");
        }

        match (&route.service_id, &route.url) {
            (None, None) => {
                anyhow::bail!(
                    "Route '{}' must define either 'service_id' or 'url'",
                    route_id
                );
            }
            (Some(_), Some(_)) => {
                anyhow::bail!(
                    "Route '{}' defines both 'service_id' and 'url'; exactly one is allowed",
                    route_id
                );
            }
            _ => {}
        }

        if let Some(service_id) = &route.service_id {
            if service_id.is_empty() {
                anyhow::bail!("Route '{}' has empty service_id", route_id);
            }
            if service_id.contains('/') || service_id.contains(' ') {
                anyhow::bail!(
                    "Route '{}' has invalid service_id format: '{}'",
                    route_id,
                    service_id
                );
            }
        }

        if let Some(url) = &route.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!(
                    "Route '{}' has invalid url: '{}'. Must start with http:// or https://",
                    route_id,
                    url
                );
            }
        }

        if let Some(path) = &route.path {
            if !path.starts_with('/') {
                anyhow::bail!(
                    "Route '{}' has invalid path: '{}'. Must start with '/'",
                    route_id,
                    path
                );
            }
        }

        Ok(())
    }

    fn validate_proxy_settings(&self) -> Result<()> {
        if !self.proxy.mapping.is_empty() && !self.proxy.mapping.starts_with('/') {
            anyhow::bail!(
                "proxy.mapping must start with '/': '{}'",
                self.proxy.mapping
            );
        }

        if self.proxy.mapping.ends_with('/') {
            anyhow::bail!(
                "proxy.mapping must not end with '/': '{}'",
                self.proxy.mapping
            );
        }

        if self.proxy.request_timeout_seconds == 0 {
            anyhow::bail!("proxy.request_timeout_seconds cannot be 0");
        }

        if self.proxy.request_timeout_seconds > 300 {
            anyhow::bail!(
                "proxy.request_timeout_seconds too large: {} (maximum 300 seconds)",
                self.proxy.request_timeout_seconds
            );
        }

        for service in &self.proxy.ignored_services {
            if service.is_empty() {
                anyhow::bail!("proxy.ignored_services contains an empty service name");
            }
        }

        Ok(())
    }

    fn validate_loadbalance_settings(&self) -> Result<()> {
        if self.loadbalance.refresh_interval_seconds == 0 {
            anyhow::bail!("loadbalance.refresh_interval_seconds cannot be 0");
        }

        if self.loadbalance.stats_window_size == 0 {
            anyhow::bail!("loadbalance.stats_window_size cannot be 0");
        }

        if let Some(zone) = &self.loadbalance.local_zone {
            if zone.is_empty() {
                anyhow::bail!("loadbalance.local_zone cannot be empty when set");
            }
        }

        Ok(())
    }

    /// 获取指定路由的配置
    pub fn get_route(&self, route_id: &str) -> Option<&RouteConfig> {
        self.routes.get(route_id)
    }

    /// 检查服务是否在自动路由的忽略列表中
    pub fn is_ignored_service(&self, service_id: &str) -> bool {
        self.proxy
            .ignored_services
            .iter()
            .any(|s| s == service_id)
    }
}

impl RouteConfig {
    /// 路由的有效路径模式；缺省时为 `/<路由名>/**`
    pub fn effective_path(&self, route_id: &str) -> String {
        match &self.path {
            Some(path) => path.clone(),
            None => format!("/{route_id}/**"),
        }
    }
}
