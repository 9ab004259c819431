// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 单轮编排 (Cycle Orchestrator)
//!
//! ```text
//! Idle → Capturing → Inferring → Rendering → Presenting → Idle
//!            │           │                        │
//!            └── 失败 ───┴──── (按策略) ───────────┴──→ Idle
//! ```
//! 整轮都在 UI 线程上同步执行, 同一时刻最多一轮在途.
//! 任何可恢复错误只影响本轮: 记录到 `last_failure` 后回到 Idle.
use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, warn};
use thiserror::Error;

use crate::config::AppConfig;
use crate::error::{CaptureError, ConfigError, InferenceError, PresentError};
use crate::frame::Region;
use crate::guard::ThreadGuard;
use crate::input::{self, FrameSource};
use crate::models::{self, FailurePolicy, ModelHandle};
use crate::overlay::OverlayRenderer;
use crate::present::PresentationSink;
use crate::stats::CycleStats;

/// 单轮状态 (瞬态, 不持久化)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Capturing,
    Inferring,
    Rendering,
    Presenting,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Capturing => "capturing",
            CycleState::Inferring => "inferring",
            CycleState::Rendering => "rendering",
            CycleState::Presenting => "presenting",
        };
        f.write_str(name)
    }
}

/// 导致本轮提前结束的失败
#[derive(Debug, Error)]
pub enum CycleFailure {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("present failed: {0}")]
    Present(#[from] PresentError),
}

/// 单轮结果
#[derive(Debug)]
pub enum CycleOutcome {
    /// 已呈现; `annotated` 为 false 表示呈现的是原始帧
    Presented { annotated: bool },
    /// 放弃本轮, 没有呈现任何内容
    Abandoned(CycleFailure),
    /// 上一轮尚未结束, 本次请求被跳过
    Skipped,
}

impl CycleOutcome {
    pub fn is_presented(&self) -> bool {
        matches!(self, CycleOutcome::Presented { .. })
    }
}

pub struct CycleOrchestrator<K: PresentationSink> {
    guard: ThreadGuard,
    source: Box<dyn FrameSource>,
    model: ModelHandle,
    renderer: OverlayRenderer,
    sink: K,
    region: Region,
    target: Option<Region>,
    state: CycleState,
    stats: CycleStats,
    last_failure: Option<String>,
    last_latency: Duration,
}

impl<K: PresentationSink> CycleOrchestrator<K> {
    /// 必须在 UI 线程上创建, 之后只能在该线程上驱动
    pub fn new(
        source: Box<dyn FrameSource>,
        model: ModelHandle,
        renderer: OverlayRenderer,
        sink: K,
        region: Region,
    ) -> Self {
        Self {
            guard: ThreadGuard::current("CycleOrchestrator"),
            source,
            model,
            renderer,
            sink,
            region,
            target: None,
            state: CycleState::Idle,
            stats: CycleStats::default(),
            last_failure: None,
            last_latency: Duration::ZERO,
        }
    }

    /// 按配置构造输入源 / 适配器 / 渲染器
    pub fn from_config(config: &AppConfig, sink: K) -> Result<Self, ConfigError> {
        let source = input::build_source(&config.capture)?;
        let model = models::build_adapter(&config.model)?;
        let renderer = OverlayRenderer::new(
            config.overlay.clone(),
            config.model.background_class,
            model.adapter.class_count(),
        )?;
        Ok(Self::new(source, model, renderer, sink, config.capture.region).with_target(config.target))
    }

    /// 固定呈现区域; 不设置时每轮取 sink 的整个客户区
    pub fn with_target(mut self, target: Option<Region>) -> Self {
        self.target = target;
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// 上一轮耗时 (capture → present)
    pub fn last_latency(&self) -> Duration {
        self.last_latency
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// 执行一轮 capture → infer → render → present
    pub fn run_cycle(&mut self) -> CycleOutcome {
        self.guard.check();
        if self.state != CycleState::Idle {
            self.stats.skipped += 1;
            debug!("⏭️ cycle 仍在 {} 阶段, 跳过本次请求", self.state);
            return CycleOutcome::Skipped;
        }

        let started = Instant::now();
        self.stats.cycles += 1;
        let outcome = self.drive();
        self.state = CycleState::Idle;
        self.last_latency = started.elapsed();

        match &outcome {
            CycleOutcome::Presented { annotated } => {
                self.stats.presented += 1;
                if *annotated {
                    self.stats.annotated += 1;
                }
                debug!(
                    "🎯 cycle #{} 呈现完成 (标注: {}, 耗时 {:.1}ms)",
                    self.stats.cycles,
                    annotated,
                    self.last_latency.as_secs_f64() * 1000.0
                );
            }
            CycleOutcome::Abandoned(failure) => {
                match failure {
                    CycleFailure::Capture(_) => self.stats.abandoned_capture += 1,
                    CycleFailure::Inference(_) => self.stats.abandoned_inference += 1,
                    CycleFailure::Present(_) => self.stats.abandoned_present += 1,
                }
                warn!("⚠️ cycle #{} 放弃: {}", self.stats.cycles, failure);
                self.last_failure = Some(failure.to_string());
            }
            CycleOutcome::Skipped => {}
        }
        outcome
    }

    fn drive(&mut self) -> CycleOutcome {
        self.state = CycleState::Capturing;
        let frame = match self.source.capture(self.region) {
            Ok(frame) => frame,
            Err(e) => return CycleOutcome::Abandoned(e.into()),
        };

        self.state = CycleState::Inferring;
        let result = match self.model.adapter.infer(&frame) {
            Ok(result) => Some(result),
            Err(e) => match self.model.policy {
                FailurePolicy::Abandon => return CycleOutcome::Abandoned(e.into()),
                FailurePolicy::PresentUnannotated => {
                    warn!("⚠️ 推理失败, 呈现原始帧: {}", e);
                    self.stats.inference_fallbacks += 1;
                    self.last_failure = Some(CycleFailure::Inference(e).to_string());
                    None
                }
            },
        };

        self.state = CycleState::Rendering;
        let (rendered, annotated) = match result {
            Some(result) => match self.renderer.try_render(&frame, &result) {
                Ok(out) => (out, true),
                Err(e) => {
                    warn!("⚠️ 检测结果格式异常, 按无标注呈现: {}", e);
                    self.stats.render_fallbacks += 1;
                    self.last_failure = Some(e.to_string());
                    (frame, false)
                }
            },
            None => (frame, false),
        };

        self.state = CycleState::Presenting;
        let target = self.target.unwrap_or_else(|| self.sink.target());
        match self.sink.present(&rendered, target) {
            Ok(()) => CycleOutcome::Presented { annotated },
            Err(e) => CycleOutcome::Abandoned(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BBox, Detection, DetectionResult, ResultKind};
    use crate::frame::FrameBuffer;
    use crate::input::PatternSource;
    use crate::models::{FixedAdapter, InferenceAdapter};
    use crate::overlay::OverlayStyle;
    use crate::present::SurfaceBuffer;

    struct FailingAdapter;

    impl InferenceAdapter for FailingAdapter {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn output_kind(&self) -> ResultKind {
            ResultKind::Detections
        }

        fn infer(&mut self, _frame: &FrameBuffer) -> Result<DetectionResult, InferenceError> {
            Err(InferenceError::Backend {
                adapter: "failing",
                reason: "boom".to_string(),
            })
        }
    }

    fn orchestrator(
        adapter: Box<dyn InferenceAdapter>,
        policy: FailurePolicy,
        region: Region,
    ) -> CycleOrchestrator<SurfaceBuffer> {
        let class_count = adapter.class_count();
        CycleOrchestrator::new(
            Box::new(PatternSource::new(320, 240, 0).unwrap()),
            ModelHandle::new(adapter, policy),
            OverlayRenderer::new(OverlayStyle::default(), Some(91), class_count).unwrap(),
            SurfaceBuffer::new(region.width(), region.height()).unwrap(),
            region,
        )
    }

    #[test]
    fn test_noop_cycle_presents_captured_pixels() {
        let region = Region::new(10, 10, 100, 50).unwrap();
        let mut orch = orchestrator(
            Box::new(FixedAdapter::noop()),
            FailurePolicy::Abandon,
            region,
        );
        let outcome = orch.run_cycle();
        assert!(matches!(outcome, CycleOutcome::Presented { annotated: true }));
        assert_eq!(orch.state(), CycleState::Idle);

        let mut reference = PatternSource::new(320, 240, 0).unwrap();
        let expected = reference.capture(region).unwrap();
        assert_eq!(orch.sink().image().as_raw(), expected.pixels());
    }

    #[test]
    fn test_capture_failure_abandons_without_presenting() {
        let region = Region::new(300, 0, 100, 50).unwrap();
        let mut orch = orchestrator(
            Box::new(FixedAdapter::noop()),
            FailurePolicy::PresentUnannotated,
            region,
        );
        let outcome = orch.run_cycle();
        assert!(matches!(
            outcome,
            CycleOutcome::Abandoned(CycleFailure::Capture(_))
        ));
        assert_eq!(orch.sink().presented(), 0);
        assert_eq!(orch.stats().abandoned_capture, 1);
        assert!(orch.last_failure().is_some());
        assert_eq!(orch.state(), CycleState::Idle);
    }

    #[test]
    fn test_inference_failure_policy() {
        let region = Region::sized(64, 64).unwrap();

        let mut abandon = orchestrator(Box::new(FailingAdapter), FailurePolicy::Abandon, region);
        assert!(matches!(
            abandon.run_cycle(),
            CycleOutcome::Abandoned(CycleFailure::Inference(_))
        ));
        assert_eq!(abandon.sink().presented(), 0);

        let mut raw = orchestrator(
            Box::new(FailingAdapter),
            FailurePolicy::PresentUnannotated,
            region,
        );
        assert!(matches!(
            raw.run_cycle(),
            CycleOutcome::Presented { annotated: false }
        ));
        assert_eq!(raw.sink().presented(), 1);
        assert_eq!(raw.stats().inference_fallbacks, 1);
        assert!(raw.last_failure().unwrap().contains("boom"));
    }

    #[test]
    fn test_render_error_presents_unannotated() {
        let region = Region::sized(64, 64).unwrap();
        let bad = FixedAdapter::new(
            vec![Detection::new(500, "ghost", BBox::normalized(0.5, 0.5, 0.2, 0.2))],
            crate::detection::LabelMap::coco91(),
        );
        let mut orch = orchestrator(Box::new(bad), FailurePolicy::Abandon, region);
        assert!(matches!(
            orch.run_cycle(),
            CycleOutcome::Presented { annotated: false }
        ));
        assert_eq!(orch.stats().render_fallbacks, 1);
    }

    #[test]
    fn test_reentrant_request_is_skipped() {
        let region = Region::sized(32, 32).unwrap();
        let mut orch = orchestrator(
            Box::new(FixedAdapter::noop()),
            FailurePolicy::Abandon,
            region,
        );
        orch.state = CycleState::Inferring;
        assert!(matches!(orch.run_cycle(), CycleOutcome::Skipped));
        assert_eq!(orch.stats().skipped, 1);
        assert_eq!(orch.stats().cycles, 0);
    }

    #[test]
    fn test_from_default_config() {
        let config = AppConfig::default();
        let sink = SurfaceBuffer::new(400, 300).unwrap();
        let mut orch = CycleOrchestrator::from_config(&config, sink).unwrap();
        assert_eq!(orch.region(), config.capture.region);
        // motion 适配器首帧只建立基线
        assert!(matches!(
            orch.run_cycle(),
            CycleOutcome::Presented { annotated: true }
        ));
        assert_eq!(orch.sink().presented(), 1);
    }

    #[test]
    fn test_present_failure_abandons() {
        let region = Region::sized(32, 32).unwrap();
        let mut orch = orchestrator(
            Box::new(FixedAdapter::noop()),
            FailurePolicy::Abandon,
            region,
        )
        .with_target(Some(Region::new(16, 16, 32, 32).unwrap()));
        assert!(matches!(
            orch.run_cycle(),
            CycleOutcome::Abandoned(CycleFailure::Present(_))
        ));
        assert_eq!(orch.stats().abandoned_present, 1);
    }
}
