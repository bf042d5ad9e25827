//! 限流服务 - 业务能力层
//!
//! 请求级别使用令牌桶；阶段之间使用固定冷却时间。
//! 两者都可以配置为 0 来关闭。

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;

struct Bucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

/// 补全服务限流器，在所有 worker 之间共享
pub struct RateLimiter {
    bucket: Option<Mutex<Bucket>>,
    phase_cooldown: Duration,
}

impl RateLimiter {
    /// `requests_per_minute == 0` 表示不限流；`burst` 至少为 1
    pub fn new(requests_per_minute: u32, burst: u32, phase_cooldown: Duration) -> Self {
        let bucket = (requests_per_minute > 0).then(|| {
            let capacity = f64::from(burst.max(1));
            Mutex::new(Bucket {
                capacity,
                tokens: capacity,
                refill_per_sec: f64::from(requests_per_minute) / 60.0,
                last_refill: Instant::now(),
            })
        });

        Self {
            bucket,
            phase_cooldown,
        }
    }

    /// 不限流、无冷却
    pub fn unlimited() -> Self {
        Self::new(0, 1, Duration::ZERO)
    }

    /// 获取一个请求令牌，必要时等待
    pub async fn acquire(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };

        loop {
            let wait = {
                let mut bucket = bucket.lock().await;
                bucket.refill();
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / bucket.refill_per_sec)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// 阶段之间的冷却
    pub async fn cooldown(&self, next_phase: &str) {
        if self.phase_cooldown.is_zero() {
            return;
        }
        info!(
            "⏳ 冷却 {} 秒后开始: {}",
            self.phase_cooldown.as_secs(),
            next_phase
        );
        tokio::time::sleep(self.phase_cooldown).await;
    }
}
