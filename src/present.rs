// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 呈现 (Presentation Sink)
//!
//! 把渲染好的帧写到显示表面的目标区域, 尺寸不同时用 Catmull-Rom 卷积缩放.
use fast_image_resize as fr;
use image::{imageops, RgbaImage};

use crate::error::{ConfigError, PresentError};
use crate::frame::{FrameBuffer, Region, CHANNELS};
use crate::guard::ThreadGuard;

/// 显示表面
///
/// 只能在创建它的线程 (UI 线程) 上调用, 否则 panic.
pub trait PresentationSink {
    /// 默认呈现区域 (整个客户区)
    fn target(&self) -> Region;

    fn present(&mut self, frame: &FrameBuffer, target: Region) -> Result<(), PresentError>;
}

/// 缩放到目标尺寸; 尺寸相同时原样复制
pub fn stretch(image: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, PresentError> {
    if image.width() == width && image.height() == height {
        return Ok(image.clone());
    }

    let src = fr::images::Image::from_vec_u8(
        image.width(),
        image.height(),
        image.as_raw().clone(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| PresentError::Resize(e.to_string()))?;
    let mut dst = fr::images::Image::new(width, height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src,
            &mut dst,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::CatmullRom)),
        )
        .map_err(|e| PresentError::Resize(e.to_string()))?;

    RgbaImage::from_raw(width, height, dst.buffer().to_vec()).ok_or_else(|| {
        PresentError::Resize(format!(
            "resized buffer does not hold {}x{}x{} bytes",
            width, height, CHANNELS
        ))
    })
}

/// 内存中的 RGBA 表面 (无窗口环境 / 测试)
pub struct SurfaceBuffer {
    guard: ThreadGuard,
    surface: RgbaImage,
    presented: u64,
}

impl SurfaceBuffer {
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        Region::sized(width, height)?;
        Ok(Self {
            guard: ThreadGuard::current("SurfaceBuffer"),
            surface: RgbaImage::new(width, height),
            presented: 0,
        })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.surface
    }

    /// 已呈现的帧数
    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn bounds(&self) -> Region {
        Region::fixed(0, 0, self.surface.width(), self.surface.height())
    }
}

impl PresentationSink for SurfaceBuffer {
    fn target(&self) -> Region {
        self.bounds()
    }

    fn present(&mut self, frame: &FrameBuffer, target: Region) -> Result<(), PresentError> {
        self.guard.check();
        if !self.bounds().contains(&target) {
            return Err(PresentError::TargetOutOfBounds(target));
        }
        let scaled = stretch(frame.image(), target.width(), target.height())?;
        imageops::replace(&mut self.surface, &scaled, target.x() as i64, target.y() as i64);
        self.presented += 1;
        Ok(())
    }
}
