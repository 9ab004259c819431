// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 画面输入系统 (Frame Input / Capture Driver)
///
/// 只在 UI 线程上按需抓取一帧, 不持有后台线程:
/// - DesktopCapture: 桌面区域捕获 (xcap, 需启用 `screen` 特性)
/// - StillSource:    从静态图片裁剪区域 (演示 / 无桌面环境)
/// - PatternSource:  合成测试图案, 每帧移动一次
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, ConfigError};
use crate::frame::{FrameBuffer, Region};

#[cfg(feature = "screen")]
pub mod desktop;
pub mod pattern;
pub mod still;

#[cfg(feature = "screen")]
pub use desktop::DesktopCapture;
pub use pattern::PatternSource;
pub use still::StillSource;

/// 捕获驱动
///
/// `capture` 在调用时读取表面像素, 不修改宿主状态.
/// 表面不可用或区域越界时返回 `CaptureError`, 由编排器放弃本轮.
pub trait FrameSource {
    fn name(&self) -> &'static str;

    /// 可寻址表面范围 (未知时 None)
    fn bounds(&self) -> Option<Region>;

    fn capture(&mut self, region: Region) -> Result<FrameBuffer, CaptureError>;
}

/// 输入源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// 桌面屏幕
    Screen,
    /// 静态图片
    Image,
    /// 合成图案
    #[default]
    Pattern,
}

/// 捕获配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: SourceKind,
    /// 捕获区域 (屏幕坐标)
    pub region: Region,
    /// `image` 源的图片路径
    pub image_path: Option<PathBuf>,
    /// `pattern` 源的虚拟屏幕尺寸
    pub pattern_size: (u32, u32),
    /// `pattern` 源的噪声幅度
    pub pattern_noise: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            region: Region::fixed(0, 0, 800, 600),
            image_path: None,
            pattern_size: (1920, 1080),
            pattern_noise: 4,
        }
    }
}

/// 根据配置创建输入源
pub fn build_source(config: &CaptureConfig) -> Result<Box<dyn FrameSource>, ConfigError> {
    match config.source {
        SourceKind::Screen => {
            #[cfg(feature = "screen")]
            {
                Ok(Box::new(DesktopCapture::new()))
            }
            #[cfg(not(feature = "screen"))]
            {
                Err(ConfigError::SourceUnavailable("screen"))
            }
        }
        SourceKind::Image => {
            let path = config
                .image_path
                .clone()
                .ok_or(ConfigError::MissingSetting("capture.image_path"))?;
            Ok(Box::new(StillSource::open(path)?))
        }
        SourceKind::Pattern => {
            let (w, h) = config.pattern_size;
            Ok(Box::new(PatternSource::new(w, h, config.pattern_noise)?))
        }
    }
}

/// 区域必须落在表面内
pub(crate) fn ensure_within(region: Region, surface: Region) -> Result<(), CaptureError> {
    if surface.contains(&region) {
        Ok(())
    } else {
        Err(CaptureError::OutOfBounds {
            region,
            surface: surface.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_source_is_pattern() {
        let config = CaptureConfig::default();
        let mut source = build_source(&config).unwrap();
        assert_eq!(source.name(), "pattern");
        let frame = source.capture(config.region).unwrap();
        assert_eq!((frame.width(), frame.height()), (800, 600));
        assert_eq!(frame.origin(), config.region);
    }

    #[test]
    fn test_image_source_requires_path() {
        let config = CaptureConfig {
            source: SourceKind::Image,
            ..Default::default()
        };
        assert!(build_source(&config).is_err());
    }

    #[cfg(not(feature = "screen"))]
    #[test]
    fn test_screen_source_unavailable_without_feature() {
        let config = CaptureConfig {
            source: SourceKind::Screen,
            ..Default::default()
        };
        assert!(matches!(
            build_source(&config),
            Err(ConfigError::SourceUnavailable("screen"))
        ));
    }
}
