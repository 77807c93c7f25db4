use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::server::Server;

/// 单台服务器的请求统计
///
/// 活跃计数和累计计数用原子操作并发更新；响应时间保留固定
/// 数量的最近样本。
pub struct ServerStats {
    active_requests: AtomicI64,
    total_requests: AtomicU64,
    response_times: Mutex<VecDeque<Duration>>,
    window_size: usize,
}

impl ServerStats {
    pub fn new(window_size: usize) -> Self {
        Self {
            active_requests: AtomicI64::new(0),
            total_requests: AtomicU64::new(0),
            response_times: Mutex::new(VecDeque::with_capacity(window_size)),
            window_size,
        }
    }

    pub fn increment_active(&self) {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active(&self) {
        self.active_requests.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn increment_total(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response_time(&self, elapsed: Duration) {
        let mut samples = self.response_times.lock();
        if samples.len() == self.window_size {
            samples.pop_front();
        }
        samples.push_back(elapsed);
    }

    pub fn active_requests(&self) -> i64 {
        self.active_requests.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn average_response_time(&self) -> Option<Duration> {
        let samples = self.response_times.lock();
        if samples.is_empty() {
            return None;
        }
        let total: Duration = samples.iter().sum();
        Some(total / samples.len() as u32)
    }
}

/// 一个负载均衡器私有的统计注册表
///
/// 按服务器id惰性建条目；每次成功刷新后裁剪掉已从发现结果中
/// 消失的服务器，统计条目不会跨刷新周期存活。
pub struct LoadBalancerStats {
    window_size: usize,
    entries: RwLock<HashMap<String, Arc<ServerStats>>>,
}

impl LoadBalancerStats {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 获取（必要时创建）指定服务器的统计条目
    pub fn server_stats(&self, server: &Server) -> Arc<ServerStats> {
        if let Some(stats) = self.entries.read().get(&server.id) {
            return stats.clone();
        }

        let mut entries = self.entries.write();
        entries
            .entry(server.id.clone())
            .or_insert_with(|| Arc::new(ServerStats::new(self.window_size)))
            .clone()
    }

    /// 只保留仍在当前池里的服务器的统计条目
    pub fn retain(&self, live_ids: &HashSet<String>) {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|id, _| live_ids.contains(id));
        let pruned = before - entries.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} stale server stats entries", pruned);
        }
    }

    pub fn snapshot(&self) -> HashMap<String, Arc<ServerStats>> {
        self.entries.read().clone()
    }
}
