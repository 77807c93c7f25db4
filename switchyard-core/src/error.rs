use thiserror::Error;

/// 网关核心错误分类
///
/// 选择失败、上游失败、路由未命中和刷新失败各自独立，
/// 互相之间绝不转换，避免掩盖真实原因。
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 选择时刻服务的实例池为空；不自动重试，由调用方决定
    #[error("No servers available for service '{service}'")]
    NoServersAvailable { service: String },

    /// 上游传输层失败或返回了网关无法转发的结果
    #[error("Upstream request failed: {message}")]
    Upstream {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 没有任何路由模式命中该路径；请求不会被代理
    #[error("No route matches path '{path}'")]
    RouteNotFound { path: String },

    /// 服务发现刷新失败；调用方继续使用旧快照
    #[error("Discovery refresh failed: {0}")]
    RefreshFailure(#[source] anyhow::Error),

    /// 重建目标URI失败
    #[error("Failed to reconstruct URI: {0}")]
    InvalidUri(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            source: None,
        }
    }

    pub fn upstream_with_source(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Upstream {
            message: message.into(),
            source: Some(source),
        }
    }
}
