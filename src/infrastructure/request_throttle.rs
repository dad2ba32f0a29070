//! 请求节流器 - 基础设施层
//!
//! 持有全局唯一的"发请求许可"，保证 NCBI 请求串行且间隔不小于固定延迟

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::sleep;

/// 请求节流器
///
/// 职责：
/// - 每次请求前固定等待 `delay`，与响应耗时无关
/// - 持锁期间发出请求，所有 NCBI 流量串行
/// - 不可重入：持有许可时不要再次 `acquire`
pub struct RequestThrottle {
    delay: Duration,
    gate: Mutex<()>,
    issued: AtomicU64,
}

/// 持有期间独占请求通道
pub struct ThrottlePermit<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl RequestThrottle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            gate: Mutex::new(()),
            issued: AtomicU64::new(0),
        }
    }

    pub fn from_millis(delay_ms: u64) -> Self {
        Self::new(Duration::from_millis(delay_ms))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 已发放的许可数
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// 等待轮到自己并完成固定延迟
    pub async fn acquire(&self) -> ThrottlePermit<'_> {
        let guard = self.gate.lock().await;
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.issued.fetch_add(1, Ordering::Relaxed);
        ThrottlePermit { _guard: guard }
    }
}

impl Default for RequestThrottle {
    /// 约每秒 3 次请求
    fn default() -> Self {
        Self::from_millis(400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_each_request_waits_the_delay() {
        let throttle = RequestThrottle::from_millis(20);
        let start = Instant::now();
        for _ in 0..3 {
            let _permit = throttle.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert_eq!(throttle.issued(), 3);
    }

    #[test]
    fn test_zero_delay_does_not_sleep() {
        let throttle = RequestThrottle::from_millis(0);
        tokio_test::block_on(async {
            let _permit = throttle.acquire().await;
        });
        assert!(throttle.delay().is_zero());
    }
}
