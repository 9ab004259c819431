// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 推理适配器统一接口与实现
///
/// # 架构说明
///
/// 编排器只通过 [`InferenceAdapter`] 与模型交互:
/// ```text
/// FrameBuffer → infer → DetectionResult (Detections | SegmentationMask)
/// ```
/// 每个适配器实例固定产出一种结果变体 (`output_kind`).
/// 模型加载/阈值等配置只在构造时读取一次, 不属于逐帧契约.
///
/// ## 内置适配器
/// - **fixed**:  每轮返回配置中的固定检测框 (空列表即 no-op 适配器)
/// - **motion**: 网格帧差运动检测 → 检测框
/// - **luma**:   亮度阈值分割 → 分割掩码
///
/// ## 失败策略
/// 推理失败时丢弃本帧还是呈现未标注画面, 由 [`FailurePolicy`] 在配置里逐适配器指定,
/// 对同一实例始终一致.
use log::info;
use serde::{Deserialize, Serialize};

use crate::detection::{Detection, DetectionResult, LabelMap, LabelSet, ResultKind, COCO91_NO_OBJECT};
use crate::error::{ConfigError, InferenceError};
use crate::frame::FrameBuffer;

pub mod fixed;
pub mod luma;
pub mod motion;

pub use fixed::FixedAdapter;
pub use luma::{LumaConfig, LumaSegmenter};
pub use motion::{MotionConfig, MotionDetector};

/// 推理适配器 (外部协作者边界)
///
/// 编排器保证同一时刻只有一轮 cycle 调用 `infer`, 实现无需自行加锁.
pub trait InferenceAdapter {
    /// 适配器标识
    fn name(&self) -> &'static str;

    /// 本实例固定产出的结果变体
    fn output_kind(&self) -> ResultKind;

    /// 模型声明的类别数 (用于渲染时校验 class id), 分割模型返回 None
    fn class_count(&self) -> Option<usize> {
        None
    }

    /// 对一帧执行推理
    fn infer(&mut self, frame: &FrameBuffer) -> Result<DetectionResult, InferenceError>;

    /// 可选预热
    fn warm_up(&mut self) -> Result<(), InferenceError> {
        Ok(())
    }
}

/// 推理失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 放弃本轮, 不呈现
    Abandon,
    /// 呈现未标注的原始帧
    #[default]
    PresentUnannotated,
}

/// 模型类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Fixed,
    #[default]
    Motion,
    Luma,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Fixed => "fixed",
            ModelKind::Motion => "motion",
            ModelKind::Luma => "luma",
        }
    }
}

/// 模型配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// 推理失败策略
    pub on_error: FailurePolicy,
    /// 类别表 (fixed 适配器使用)
    pub labels: LabelSet,
    /// 模型声明的类别数, None 时取类别表长度
    pub num_classes: Option<usize>,
    /// 背景 / "无目标" 类, 渲染时跳过
    pub background_class: Option<u32>,
    /// fixed 适配器每轮返回的检测
    pub fixed_detections: Vec<Detection>,
    pub motion: MotionConfig,
    pub luma: LumaConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::default(),
            on_error: FailurePolicy::default(),
            labels: LabelSet::Coco91,
            num_classes: None,
            background_class: Some(COCO91_NO_OBJECT),
            fixed_detections: Vec::new(),
            motion: MotionConfig::default(),
            luma: LumaConfig::default(),
        }
    }
}

/// 已构造的适配器 + 其失败策略
pub struct ModelHandle {
    pub adapter: Box<dyn InferenceAdapter>,
    pub policy: FailurePolicy,
}

impl ModelHandle {
    pub fn new(adapter: Box<dyn InferenceAdapter>, policy: FailurePolicy) -> Self {
        Self { adapter, policy }
    }
}

/// 根据配置构造适配器 (只在窗口创建时调用一次)
pub fn build_adapter(config: &ModelConfig) -> Result<ModelHandle, ConfigError> {
    let mut adapter: Box<dyn InferenceAdapter> = match config.kind {
        ModelKind::Fixed => {
            let labels = LabelMap::from_set(&config.labels, config.num_classes)?;
            Box::new(FixedAdapter::new(config.fixed_detections.clone(), labels))
        }
        ModelKind::Motion => Box::new(MotionDetector::new(config.motion.clone())?),
        ModelKind::Luma => Box::new(LumaSegmenter::new(config.luma.clone())?),
    };

    adapter.warm_up().map_err(|e| ConfigError::Adapter {
        adapter: config.kind.name(),
        reason: e.to_string(),
    })?;

    info!(
        "✅ 推理适配器就绪: {} (输出 {:?}, 失败策略 {:?})",
        adapter.name(),
        adapter.output_kind(),
        config.on_error
    );
    Ok(ModelHandle::new(adapter, config.on_error))
}
