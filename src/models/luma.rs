// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

// 亮度阈值分割
// 灰度化 → 缩小到掩码分辨率 → 阈值化 (或直接输出亮度作为概率)

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::detection::{DetectionResult, MaskEncoding, ResultKind, SegmentationMask};
use crate::error::{ConfigError, InferenceError};
use crate::frame::FrameBuffer;
use crate::models::InferenceAdapter;

/// 分割参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LumaConfig {
    pub mask_width: u32,
    pub mask_height: u32,
    pub threshold: u8,
    /// 暗部置位而不是亮部
    pub invert: bool,
    /// 输出 0~255 亮度概率, 由渲染器阈值化
    pub probability: bool,
}

impl Default for LumaConfig {
    fn default() -> Self {
        Self {
            mask_width: 64,
            mask_height: 64,
            threshold: 96,
            invert: false,
            probability: false,
        }
    }
}

pub struct LumaSegmenter {
    config: LumaConfig,
}

impl LumaSegmenter {
    pub fn new(config: LumaConfig) -> Result<Self, ConfigError> {
        if config.mask_width == 0 || config.mask_height == 0 {
            return Err(ConfigError::Adapter {
                adapter: "luma",
                reason: format!(
                    "mask size {}x{} must be positive",
                    config.mask_width, config.mask_height
                ),
            });
        }
        Ok(Self { config })
    }
}

impl InferenceAdapter for LumaSegmenter {
    fn name(&self) -> &'static str {
        "luma"
    }

    fn output_kind(&self) -> ResultKind {
        ResultKind::SegmentationMask
    }

    fn infer(&mut self, frame: &FrameBuffer) -> Result<DetectionResult, InferenceError> {
        // 掩码分辨率不超过帧分辨率
        let mw = self.config.mask_width.min(frame.width());
        let mh = self.config.mask_height.min(frame.height());

        let gray = imageops::grayscale(frame.image());
        let small = if (mw, mh) == (gray.width(), gray.height()) {
            gray
        } else {
            imageops::resize(&gray, mw, mh, FilterType::Triangle)
        };

        let luma = small.into_raw();
        let mask = if self.config.probability {
            let data = if self.config.invert {
                luma.into_iter().map(|v| 255 - v).collect()
            } else {
                luma
            };
            SegmentationMask::new(mw, mh, data, MaskEncoding::Probability)
        } else {
            let threshold = self.config.threshold;
            let invert = self.config.invert;
            let data = luma
                .into_iter()
                .map(|v| if (v >= threshold) != invert { 255 } else { 0 })
                .collect();
            SegmentationMask::new(mw, mh, data, MaskEncoding::Binary)
        };
        Ok(DetectionResult::SegmentationMask(mask))
    }
}
