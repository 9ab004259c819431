// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 运行统计
use std::fmt;
use std::time::{Duration, Instant};

/// 每秒速率统计 (计数 / 经过时间, 每满一秒刷新一次)
#[derive(Debug, Clone)]
pub struct FpsCounter {
    count: u64,
    last: Instant,
    current_fps: f64,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    pub fn new() -> Self {
        Self {
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }

    /// 记一次; 满一秒时返回新的速率
    pub fn tick(&mut self) -> Option<f64> {
        self.count += 1;
        self.refresh(Instant::now())
    }

    /// 不计数, 只检查是否满一秒 (空闲时速率归零)
    pub fn poll(&mut self) -> Option<f64> {
        self.refresh(Instant::now())
    }

    fn refresh(&mut self, now: Instant) -> Option<f64> {
        let elapsed = now.duration_since(self.last);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        self.current_fps = self.count as f64 / elapsed.as_secs_f64();
        self.count = 0;
        self.last = now;
        Some(self.current_fps)
    }

    pub fn fps(&self) -> f64 {
        self.current_fps
    }
}

/// 编排器计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// 进入 Capturing 的轮数
    pub cycles: u64,
    pub presented: u64,
    /// 其中带标注呈现
    pub annotated: u64,
    pub abandoned_capture: u64,
    pub abandoned_inference: u64,
    pub abandoned_present: u64,
    /// 推理失败后按策略呈现原始帧
    pub inference_fallbacks: u64,
    /// 结果格式异常, 按无标注呈现
    pub render_fallbacks: u64,
    /// 非 Idle 时的重入请求
    pub skipped: u64,
}

impl CycleStats {
    pub fn abandoned(&self) -> u64 {
        self.abandoned_capture + self.abandoned_inference + self.abandoned_present
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycles {} | presented {} (annotated {}) | abandoned {} (capture {}, infer {}, present {}) | fallbacks infer {} render {} | skipped {}",
            self.cycles,
            self.presented,
            self.annotated,
            self.abandoned(),
            self.abandoned_capture,
            self.abandoned_inference,
            self.abandoned_present,
            self.inference_fallbacks,
            self.render_fallbacks,
            self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_refreshes_after_one_second() {
        let mut fps = FpsCounter::new();
        let start = fps.last;
        fps.count = 10;
        assert!(fps.refresh(start + Duration::from_millis(500)).is_none());
        let rate = fps.refresh(start + Duration::from_secs(2)).unwrap();
        assert!((rate - 5.0).abs() < 1e-9);
        assert_eq!(fps.count, 0);
        assert!((fps.fps() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_abandoned_total() {
        let stats = CycleStats {
            abandoned_capture: 2,
            abandoned_inference: 1,
            abandoned_present: 1,
            ..Default::default()
        };
        assert_eq!(stats.abandoned(), 4);
        assert!(stats.to_string().contains("abandoned 4"));
    }
}
