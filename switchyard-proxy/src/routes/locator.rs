use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use switchyard_core::config::model::Config;
use switchyard_core::discovery::DiscoveryClient;
use switchyard_core::error::GatewayError;

use super::table::{RouteTable, RouteTarget, ServiceRoute};

/// 路由定位器
///
/// 路由表首次访问时惰性构建，`reset_routes` 强制失效后下次访问
/// 重建。重建整表换入，与并发查找互不阻塞。
pub struct RouteLocator {
    config: Arc<Config>,
    discovery: Arc<dyn DiscoveryClient>,
    table: RwLock<Option<Arc<RouteTable>>>,
}

impl RouteLocator {
    pub fn new(config: Arc<Config>, discovery: Arc<dyn DiscoveryClient>) -> Self {
        Self {
            config,
            discovery,
            table: RwLock::new(None),
        }
    }

    /// 当前路由表；未构建时构建
    pub async fn routes(&self) -> Result<Arc<RouteTable>, GatewayError> {
        if let Some(table) = self.table.read().clone() {
            return Ok(table);
        }

        let built = Arc::new(self.build_table().await?);
        tracing::info!("Route table built with {} routes", built.len());

        let mut table = self.table.write();
        // 并发构建时保留先完成的那份，保证读方视图一致
        if let Some(existing) = table.clone() {
            return Ok(existing);
        }
        *table = Some(built.clone());
        Ok(built)
    }

    /// 最具体匹配查找；不命中返回None
    pub async fn get_target_for_path(
        &self,
        path: &str,
    ) -> Result<Option<ServiceRoute>, GatewayError> {
        let table = self.routes().await?;
        Ok(table.lookup(path).cloned())
    }

    /// 查找路由并计算转发路径
    pub async fn resolve(
        &self,
        path: &str,
    ) -> Result<Option<(ServiceRoute, String)>, GatewayError> {
        let table = self.routes().await?;
        Ok(table.resolve(path))
    }

    /// 强制失效路由表
    ///
    /// 可与任意数量的并发查找同时调用；在途查找继续使用旧表。
    /// 注册中心无变化时连续reset构建出内容相等的表。
    pub fn reset_routes(&self) {
        *self.table.write() = None;
        tracing::info!("Route table reset");
    }

    /// 构建路由表：显式配置路由 + 每个未显式映射的发现服务一条
    /// 默认路由（忽略列表除外），再套全局前缀
    async fn build_table(&self) -> Result<RouteTable, GatewayError> {
        let mut routes = Vec::new();
        let mut mapped_services = HashSet::new();

        for (route_id, route_config) in &self.config.routes {
            let target = match (&route_config.service_id, &route_config.url) {
                (Some(service_id), _) => {
                    mapped_services.insert(service_id.clone());
                    RouteTarget::ServiceId(service_id.clone())
                }
                (None, Some(url)) => RouteTarget::Url(url.clone()),
                (None, None) => {
                    // validate()拦截过；防御性跳过
                    tracing::warn!("Skipping route '{}' with no target", route_id);
                    continue;
                }
            };

            routes.push(ServiceRoute {
                id: route_id.clone(),
                path: route_config.effective_path(route_id),
                target,
                strip_prefix: route_config.strip_prefix,
                add_proxy_headers: route_config
                    .add_proxy_headers
                    .unwrap_or(self.config.proxy.add_proxy_headers),
            });
        }

        let services = self
            .discovery
            .service_names()
            .await
            .map_err(GatewayError::RefreshFailure)?;

        for service_id in services {
            if mapped_services.contains(&service_id) {
                continue;
            }
            if self.config.is_ignored_service(&service_id) {
                tracing::debug!("Skipping ignored service '{}'", service_id);
                continue;
            }
            routes.push(ServiceRoute {
                id: service_id.clone(),
                path: format!("/{service_id}/**"),
                target: RouteTarget::ServiceId(service_id),
                strip_prefix: true,
                add_proxy_headers: self.config.proxy.add_proxy_headers,
            });
        }

        Ok(RouteTable::new(
            self.config.proxy.mapping.clone(),
            self.config.proxy.strip_mapping,
            routes,
        ))
    }
}
