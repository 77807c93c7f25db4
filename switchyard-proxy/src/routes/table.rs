use serde::Serialize;

/// 路由目标：逻辑服务名（走负载均衡）或字面URL（直连）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    ServiceId(String),
    Url(String),
}

/// 一条已构建的路由
///
/// `path` 是匹配模式，支持 `/**` 尾部通配；不带通配时精确匹配。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRoute {
    pub id: String,
    pub path: String,
    pub target: RouteTarget,
    pub strip_prefix: bool,
    pub add_proxy_headers: bool,
}

impl ServiceRoute {
    /// 模式的字面前缀（去掉尾部 `/**`）
    pub fn prefix(&self) -> &str {
        self.path.strip_suffix("/**").unwrap_or(&self.path)
    }

    pub fn is_wildcard(&self) -> bool {
        self.path.ends_with("/**")
    }

    pub fn matches(&self, path: &str) -> bool {
        if !self.is_wildcard() {
            return path == self.path;
        }
        let prefix = self.prefix();
        if prefix.is_empty() {
            // "/**" 匹配一切
            return true;
        }
        path == prefix || path.starts_with(&format!("{prefix}/"))
    }

    /// 计算转发路径：按配置剥离匹配到的前缀
    pub fn forward_path(&self, path: &str) -> String {
        if !self.strip_prefix || !self.is_wildcard() {
            return path.to_string();
        }
        let remainder = &path[self.prefix().len()..];
        if remainder.is_empty() {
            "/".to_string()
        } else {
            remainder.to_string()
        }
    }

    /// 模式特异性：字面前缀越长越具体
    fn specificity(&self) -> usize {
        self.prefix().len()
    }
}

/// 有序路由表
///
/// 整表重建、按特异性排序；读方持有的快照要么是旧表要么是
/// 新表，不会见到半构建状态。查找是全函数：每个路径要么恰好
/// 命中一条路由，要么不命中。
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct RouteTable {
    /// 全局路径前缀；空字符串表示无前缀
    mapping: String,
    /// 转发时是否剥离全局前缀
    strip_mapping: bool,
    routes: Vec<ServiceRoute>,
}

impl RouteTable {
    pub fn new(mapping: String, strip_mapping: bool, mut routes: Vec<ServiceRoute>) -> Self {
        // 最长字面前缀优先；同特异性按id排序保证重建结果稳定
        routes.sort_by(|a, b| {
            b.specificity()
                .cmp(&a.specificity())
                .then_with(|| a.id.cmp(&b.id))
        });
        Self {
            mapping,
            strip_mapping,
            routes,
        }
    }

    pub fn routes(&self) -> &[ServiceRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// 去掉全局前缀后的匹配路径；不以前缀开头时无路由
    fn mapped_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.mapping.is_empty() {
            return Some(path);
        }
        let remainder = path.strip_prefix(&self.mapping)?;
        if remainder.is_empty() {
            Some("/")
        } else if remainder.starts_with('/') {
            Some(remainder)
        } else {
            // "/apifoo" 不算命中 "/api"
            None
        }
    }

    /// 最具体匹配查找
    pub fn lookup(&self, path: &str) -> Option<&ServiceRoute> {
        let mapped = self.mapped_path(path)?;
        self.routes.iter().find(|route| route.matches(mapped))
    }

    /// 查找路由并计算转发路径
    pub fn resolve(&self, path: &str) -> Option<(ServiceRoute, String)> {
        let mapped = self.mapped_path(path)?;
        let route = self.routes.iter().find(|route| route.matches(mapped))?;
        let mut forward = route.forward_path(mapped);
        if !self.strip_mapping && !self.mapping.is_empty() {
            forward = format!("{}{}", self.mapping, forward);
        }
        Some((route.clone(), forward))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url_route(id: &str, path: &str, url: &str) -> ServiceRoute {
        ServiceRoute {
            id: id.to_string(),
            path: path.to_string(),
            target: RouteTarget::Url(url.to_string()),
            strip_prefix: true,
            add_proxy_headers: true,
        }
    }

    fn service_route(id: &str, path: &str, service: &str) -> ServiceRoute {
        ServiceRoute {
            id: id.to_string(),
            path: path.to_string(),
            target: RouteTarget::ServiceId(service.to_string()),
            strip_prefix: true,
            add_proxy_headers: true,
        }
    }

    fn sample_table() -> RouteTable {
        RouteTable::new(
            String::new(),
            false,
            vec![
                url_route("local", "/test/**", "http://localhost:7777/local"),
                service_route("simple", "/simple/**", "simple"),
            ],
        )
    }

    #[test]
    fn test_lookup_matches_url_and_service_routes() {
        let table = sample_table();

        let route = table.lookup("/test/foo").unwrap();
        assert_eq!(
            route.target,
            RouteTarget::Url("http://localhost:7777/local".to_string())
        );

        let route = table.lookup("/simple/bar").unwrap();
        assert_eq!(route.target, RouteTarget::ServiceId("simple".to_string()));

        assert!(table.lookup("/other").is_none());
    }

    #[test]
    fn test_prefix_itself_matches_wildcard() {
        let table = sample_table();
        assert!(table.lookup("/simple").is_some());
        // 前缀只是另一个路径的开头时不算命中
        assert!(table.lookup("/simpler").is_none());
    }

    #[test]
    fn test_most_specific_route_wins() {
        let table = RouteTable::new(
            String::new(),
            false,
            vec![
                service_route("all", "/**", "fallback"),
                service_route("api", "/api/**", "api-service"),
                service_route("api-users", "/api/users/**", "users-service"),
            ],
        );

        assert_eq!(
            table.lookup("/api/users/42").unwrap().target,
            RouteTarget::ServiceId("users-service".to_string())
        );
        assert_eq!(
            table.lookup("/api/orders").unwrap().target,
            RouteTarget::ServiceId("api-service".to_string())
        );
        assert_eq!(
            table.lookup("/anything").unwrap().target,
            RouteTarget::ServiceId("fallback".to_string())
        );
    }

    #[test]
    fn test_forward_path_stripping() {
        let route = service_route("simple", "/simple/**", "simple");
        assert_eq!(route.forward_path("/simple/bar"), "/bar");
        assert_eq!(route.forward_path("/simple"), "/");

        let mut unstripped = route.clone();
        unstripped.strip_prefix = false;
        assert_eq!(unstripped.forward_path("/simple/bar"), "/simple/bar");
    }

    #[test]
    fn test_exact_route_without_wildcard() {
        let route = url_route("ping", "/ping", "http://localhost:1/ping");
        assert!(route.matches("/ping"));
        assert!(!route.matches("/ping/deep"));
        assert_eq!(route.forward_path("/ping"), "/ping");
    }

    #[test]
    fn test_global_mapping_prefix() {
        let table = RouteTable::new(
            "/api".to_string(),
            true,
            vec![service_route("simple", "/simple/**", "simple")],
        );

        let (route, forward) = table.resolve("/api/simple/bar").unwrap();
        assert_eq!(route.id, "simple");
        assert_eq!(forward, "/bar");

        // 前缀不匹配时不代理
        assert!(table.resolve("/simple/bar").is_none());
        assert!(table.resolve("/apifoo/simple/bar").is_none());
    }

    #[test]
    fn test_global_mapping_retained_when_not_stripped() {
        let table = RouteTable::new(
            "/api".to_string(),
            false,
            vec![service_route("simple", "/simple/**", "simple")],
        );

        let (_, forward) = table.resolve("/api/simple/bar").unwrap();
        assert_eq!(forward, "/api/bar");
    }
}
