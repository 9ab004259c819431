// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型 (Error taxonomy)
//!
//! 每种可恢复错误都只影响当前一轮 cycle, 不会波及调度器状态或后续 cycle.
//! 线程归属违规 (SchedulerViolation) 不在这里: 它是编程错误, 由 `ThreadGuard` 直接 panic.

use std::path::PathBuf;

use thiserror::Error;

use crate::frame::Region;

/// 捕获失败: 目标表面不可用或越界
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture region {region} is outside the addressable surface ({surface})")]
    OutOfBounds { region: Region, surface: String },

    #[error("capture surface unavailable: {0}")]
    Unavailable(String),

    #[error("captured raster has unexpected size {width}x{height}")]
    BadRaster { width: u32, height: u32 },
}

/// 推理失败: 适配器内部任何错误
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("frame {width}x{height} is too small for adapter `{adapter}`")]
    FrameTooSmall {
        adapter: &'static str,
        width: u32,
        height: u32,
    },

    #[error("adapter `{adapter}` failed: {reason}")]
    Backend {
        adapter: &'static str,
        reason: String,
    },
}

/// 渲染失败: 检测结果格式异常 (按"无标注"处理)
#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("class id {class_id} out of range (declared {class_count} classes)")]
    ClassOutOfRange { class_id: u32, class_count: usize },

    #[error("detection #{index} has a non-finite or empty box")]
    InvalidBox { index: usize },

    #[error("mask {mask_w}x{mask_h} does not fit frame {frame_w}x{frame_h}")]
    MaskTooLarge {
        mask_w: u32,
        mask_h: u32,
        frame_w: u32,
        frame_h: u32,
    },

    #[error("mask has zero size")]
    EmptyMask,

    #[error("mask buffer holds {actual} bytes, expected {expected}")]
    MaskLength { expected: usize, actual: usize },
}

/// 呈现失败
#[derive(Debug, Error)]
pub enum PresentError {
    #[error("target region {0} lies outside the surface")]
    TargetOutOfBounds(Region),

    #[error("stretch failed: {0}")]
    Resize(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid region {width}x{height}: width and height must be positive")]
    EmptyRegion { width: u32, height: u32 },

    #[error("refresh interval must be greater than zero")]
    ZeroInterval,

    #[error("label set has {actual} entries but the model declares {declared} classes")]
    LabelCount { declared: usize, actual: usize },

    #[error("adapter `{adapter}` misconfigured: {reason}")]
    Adapter {
        adapter: &'static str,
        reason: String,
    },

    #[error("missing required setting `{0}`")]
    MissingSetting(&'static str),

    #[error("source `{0}` is not available in this build")]
    SourceUnavailable(&'static str),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot spawn scheduler thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid font {0}")]
    Font(PathBuf),

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
