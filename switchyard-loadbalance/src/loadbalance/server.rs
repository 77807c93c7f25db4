use std::collections::HashMap;
use std::fmt;

/// 单个可连接的后端服务器
///
/// 由一次服务发现快照构造，构造后不可变；新的快照总是产生新的
/// `Server` 值，避免并发选择读到撕裂状态。
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    /// 服务器标识；来自发现元数据的instanceId，或默认的 host:port
    pub id: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
    /// 粗粒度位置标签；未知时为None
    pub zone: Option<String>,
    /// 原始发现记录的元数据
    pub metadata: HashMap<String, String>,
}

impl Server {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            id: format!("{host}:{port}"),
            host,
            port,
            secure: false,
            zone: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.host, self.port)
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let server = Server::new("myhost", 8080);
        assert_eq!(server.id, "myhost:8080");
        assert_eq!(server.host_port(), "myhost:8080");
        assert_eq!(server.scheme(), "http");
        assert_eq!(server.base_url(), "http://myhost:8080");
        assert!(server.zone.is_none());
    }

    #[test]
    fn test_secure_server_scheme() {
        let mut server = Server::new("myhost", 8443);
        server.secure = true;
        assert_eq!(server.scheme(), "https");
        assert_eq!(server.base_url(), "https://myhost:8443");
    }
}
