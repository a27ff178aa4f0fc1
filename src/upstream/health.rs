use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{ENDPOINT_COOLDOWN_MS, MAX_CONSECUTIVE_FAILURES};

/// 单个上游端点的健康状态
#[derive(Debug, Clone, Default)]
struct EndpointState {
    /// 连续失败次数
    consecutive_failures: u32,
    /// 冷却截止时间，None表示未冷却
    cooldown_until: Option<Instant>,
}

/// 端点健康跟踪器
///
/// 按base URL记录连续失败次数，达到阈值后进入固定时长的冷却期，
/// 冷却中的端点会被回退链直接跳过。状态存活于整个进程生命周期。
pub struct EndpointHealth {
    states: Mutex<HashMap<String, EndpointState>>,
    cooldown: Duration,
    max_failures: u32,
}

impl Default for EndpointHealth {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(ENDPOINT_COOLDOWN_MS),
            MAX_CONSECUTIVE_FAILURES,
        )
    }
}

impl EndpointHealth {
    /// 创建跟踪器，冷却时长与失败阈值可配置
    ///
    /// 默认阈值为1：单次失败即冷却两分钟。上游镜像一旦出错往往会持续
    /// 一段时间，立即切换比逐步退避体验更好，这里保留该策略。
    pub fn new(cooldown: Duration, max_failures: u32) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            cooldown,
            max_failures: max_failures.max(1),
        }
    }

    /// 该端点当前是否处于冷却期
    pub fn is_cooling_down(&self, base_url: &str) -> bool {
        let states = self.states.lock().unwrap();
        states
            .get(base_url)
            .and_then(|s| s.cooldown_until)
            .is_some_and(|until| until > Instant::now())
    }

    /// 记录一次成功，清零失败计数与冷却
    pub fn record_success(&self, base_url: &str) {
        let mut states = self.states.lock().unwrap();
        states.insert(base_url.to_string(), EndpointState::default());
    }

    /// 记录一次失败；达到阈值则进入冷却并重置计数
    pub fn record_failure(&self, base_url: &str, reason: &str) {
        let mut states = self.states.lock().unwrap();
        let state = states.entry(base_url.to_string()).or_default();
        let failures = state.consecutive_failures + 1;

        if failures >= self.max_failures {
            state.consecutive_failures = 0;
            state.cooldown_until = Some(Instant::now() + self.cooldown);
            warn!("端点进入冷却: {} ({})", base_url, reason);
            return;
        }

        state.consecutive_failures = failures;
        state.cooldown_until = None;
        debug!(
            "端点失败 ({}/{}): {} ({})",
            failures, self.max_failures, base_url, reason
        );
    }
}
