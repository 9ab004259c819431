// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 合成图案输入
//!
//! 虚拟屏幕: 对角渐变背景 + 一个水平往返移动的白色方块, 每次捕获前进一步.
//! 可选噪声按帧序号播种, 同一帧序号的输出可复现.

use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ensure_within, FrameSource};
use crate::error::{CaptureError, ConfigError};
use crate::frame::{FrameBuffer, Region};

const BLOCK_SIZE: u32 = 96;
const STEP: u32 = 24;

pub struct PatternSource {
    surface: Region,
    noise: u8,
    tick: u64,
}

impl PatternSource {
    pub fn new(width: u32, height: u32, noise: u8) -> Result<Self, ConfigError> {
        Ok(Self {
            surface: Region::sized(width, height)?,
            noise,
            tick: 0,
        })
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// 当前帧方块左上角 (虚拟屏幕坐标)
    pub fn block_origin(&self) -> (u32, u32) {
        let span = self.surface.width().saturating_sub(BLOCK_SIZE).max(1);
        let travel = (self.tick as u32).wrapping_mul(STEP) % (2 * span);
        let x = if travel < span { travel } else { 2 * span - travel };
        let y = self.surface.height().saturating_sub(BLOCK_SIZE) / 2;
        (x, y)
    }

    fn background(&self, x: u32, y: u32) -> [u8; 3] {
        let w = self.surface.width();
        let h = self.surface.height();
        let r = (x * 255 / w.max(1)) as u8;
        let g = (y * 255 / h.max(1)) as u8;
        let b = ((x + y) * 255 / (w + h).max(1)) as u8 / 2;
        [r, g, b]
    }
}

impl FrameSource for PatternSource {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn bounds(&self) -> Option<Region> {
        Some(self.surface)
    }

    fn capture(&mut self, region: Region) -> Result<FrameBuffer, CaptureError> {
        ensure_within(region, self.surface)?;

        let (bx, by) = self.block_origin();
        let mut rng = StdRng::seed_from_u64(self.tick);
        let noise = self.noise as i16;
        let ox = region.x() as u32;
        let oy = region.y() as u32;

        let mut image = RgbaImage::new(region.width(), region.height());
        for (x, y, px) in image.enumerate_pixels_mut() {
            let vx = ox + x;
            let vy = oy + y;
            let inside = vx >= bx && vx < bx + BLOCK_SIZE && vy >= by && vy < by + BLOCK_SIZE;
            let mut rgb = if inside {
                [255, 255, 255]
            } else {
                self.background(vx, vy)
            };
            if noise > 0 {
                let n: i16 = rng.gen_range(-noise..=noise);
                for c in rgb.iter_mut() {
                    *c = (*c as i16 + n).clamp(0, 255) as u8;
                }
            }
            *px = Rgba([rgb[0], rgb[1], rgb[2], 255]);
        }

        self.tick += 1;
        Ok(FrameBuffer::new(image, region))
    }
}
