// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 静态图片输入: 整张图片作为可寻址表面, 每次裁剪出请求的区域

use std::path::{Path, PathBuf};

use image::{imageops, RgbaImage};

use super::{ensure_within, FrameSource};
use crate::error::{CaptureError, ConfigError};
use crate::frame::{FrameBuffer, Region};

pub struct StillSource {
    path: PathBuf,
    image: RgbaImage,
    surface: Region,
}

impl StillSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let image = image::open(&path)
            .map_err(|source| ConfigError::Image {
                path: path.clone(),
                source,
            })?
            .to_rgba8();
        let surface = Region::sized(image.width(), image.height())?;
        log::info!("🖼️ 静态图片输入: {} ({})", path.display(), surface);
        Ok(Self {
            path,
            image,
            surface,
        })
    }

    pub fn from_image(image: RgbaImage) -> Result<Self, ConfigError> {
        let surface = Region::sized(image.width(), image.height())?;
        Ok(Self {
            path: PathBuf::new(),
            image,
            surface,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for StillSource {
    fn name(&self) -> &'static str {
        "image"
    }

    fn bounds(&self) -> Option<Region> {
        Some(self.surface)
    }

    fn capture(&mut self, region: Region) -> Result<FrameBuffer, CaptureError> {
        ensure_within(region, self.surface)?;
        let view = imageops::crop_imm(
            &self.image,
            region.x() as u32,
            region.y() as u32,
            region.width(),
            region.height(),
        );
        Ok(FrameBuffer::new(view.to_image(), region))
    }
}
