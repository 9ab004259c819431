// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 叠加渲染 (Overlay Renderer)
//!
//! 把推理结果画到帧的副本上, 原帧不变:
//! - 检测框: 跳过背景类, 画矩形框 + 左上角类别名
//! - 分割掩码: 最近邻放大到帧尺寸, 按编码二值化后与原帧做逻辑与 (不是混合)
//!
//! 结果格式异常时整帧按"无标注"处理, 错误只记日志.
use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::detection::{Detection, DetectionResult, SegmentationMask};
use crate::error::{ConfigError, RenderError};
use crate::frame::FrameBuffer;

/// 默认标签字体 (相对工作目录)
pub const DEFAULT_FONT_PATH: &str = "assets/font/ProggyClean.ttf";

/// 掩码之外的像素
const SUPPRESSED: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// 叠加样式
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// 框与文字颜色 RGBA
    pub color: [u8; 4],
    /// 框线宽 (像素)
    pub thickness: u32,
    /// TTF 标签字体, None 时只画框
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    /// Probability 掩码的置位阈值
    pub mask_threshold: u8,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: [255, 64, 64, 255],
            thickness: 2,
            font_path: Some(PathBuf::from(DEFAULT_FONT_PATH)),
            font_size: 16.0,
            mask_threshold: 128,
        }
    }
}

pub struct OverlayRenderer {
    style: OverlayStyle,
    font: Option<FontArc>,
    background_class: Option<u32>,
    class_count: Option<usize>,
}

impl OverlayRenderer {
    /// `class_count` 为 None 时不校验 class id 上限
    pub fn new(
        style: OverlayStyle,
        background_class: Option<u32>,
        class_count: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let font = match &style.font_path {
            Some(path) => match load_font(path) {
                Ok(font) => {
                    info!("✅ 标签字体加载成功: {}", path.display());
                    Some(font)
                }
                // 默认字体缺失不致命, 只画框
                Err(e) if path.as_path() == Path::new(DEFAULT_FONT_PATH) => {
                    warn!("⚠️ 未找到默认标签字体 ({}), 只画框", e);
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };
        Ok(Self {
            style,
            font,
            background_class,
            class_count,
        })
    }

    /// 渲染到新帧; 格式异常时返回原帧副本
    pub fn render(&self, frame: &FrameBuffer, result: &DetectionResult) -> FrameBuffer {
        self.try_render(frame, result).unwrap_or_else(|e| {
            warn!("⚠️ 检测结果格式异常, 按无标注呈现: {}", e);
            frame.duplicate()
        })
    }

    pub fn try_render(
        &self,
        frame: &FrameBuffer,
        result: &DetectionResult,
    ) -> Result<FrameBuffer, RenderError> {
        match result {
            DetectionResult::Detections(list) => self.render_detections(frame, list),
            DetectionResult::SegmentationMask(mask) => self.render_mask(frame, mask),
        }
    }

    fn render_detections(
        &self,
        frame: &FrameBuffer,
        detections: &[Detection],
    ) -> Result<FrameBuffer, RenderError> {
        // 先整体校验, 任何一项异常都不画
        let (fw, fh) = (frame.width(), frame.height());
        let thickness = self.style.thickness.max(1);
        // 框线超出帧的部分不画, 只需保留帧外 thickness+1 像素
        let margin = thickness as f32 + 1.0;
        let mut visible = Vec::with_capacity(detections.len());
        for (index, det) in detections.iter().enumerate() {
            if Some(det.class_id) == self.background_class {
                continue;
            }
            if let Some(count) = self.class_count {
                if det.class_id as usize >= count {
                    return Err(RenderError::ClassOutOfRange {
                        class_id: det.class_id,
                        class_count: count,
                    });
                }
            }
            if !det.bbox.is_valid() {
                return Err(RenderError::InvalidBox { index });
            }
            let rect = det.bbox.to_pixel_rect(fw, fh);
            if !rect.is_finite() {
                return Err(RenderError::InvalidBox { index });
            }
            match rect.clip(fw, fh, margin) {
                Some(clipped) => visible.push((det, clipped)),
                None => debug!("框 #{} 完全在帧外, 跳过", index),
            }
        }

        let mut out = frame.duplicate();
        if visible.is_empty() {
            return Ok(out);
        }

        let color = Rgba(self.style.color);
        let image = out.image_mut();
        for (det, r) in visible {
            let x = r.x1.round() as i32;
            let y = r.y1.round() as i32;
            let w = (r.width().round() as u32).max(1);
            let h = (r.height().round() as u32).max(1);

            for i in 0..thickness {
                if w <= 2 * i || h <= 2 * i {
                    break;
                }
                let offset = i as i32;
                let rect = Rect::at(x.saturating_add(offset), y.saturating_add(offset))
                    .of_size(w - 2 * i, h - 2 * i);
                draw_hollow_rect_mut(image, rect, color);
            }

            if let Some(font) = &self.font {
                if !det.label.is_empty() {
                    let size = self.style.font_size;
                    let ty = y.saturating_sub(size as i32).max(0);
                    draw_text_mut(image, color, x.max(0), ty, PxScale::from(size), font, &det.label);
                }
            }
        }
        Ok(out)
    }

    fn render_mask(
        &self,
        frame: &FrameBuffer,
        mask: &SegmentationMask,
    ) -> Result<FrameBuffer, RenderError> {
        let (fw, fh) = (frame.width(), frame.height());
        if mask.width == 0 || mask.height == 0 {
            return Err(RenderError::EmptyMask);
        }
        if mask.width > fw || mask.height > fh {
            return Err(RenderError::MaskTooLarge {
                mask_w: mask.width,
                mask_h: mask.height,
                frame_w: fw,
                frame_h: fh,
            });
        }
        if mask.data.len() != mask.expected_len() {
            return Err(RenderError::MaskLength {
                expected: mask.expected_len(),
                actual: mask.data.len(),
            });
        }

        // 最近邻: 预先算好每列/每行对应的掩码坐标
        let cols: Vec<usize> = (0..fw)
            .map(|x| (x as u64 * mask.width as u64 / fw as u64) as usize)
            .collect();
        let threshold = self.style.mask_threshold;
        let mw = mask.width as usize;

        let src = frame.image();
        let image = RgbaImage::from_fn(fw, fh, |x, y| {
            let my = (y as u64 * mask.height as u64 / fh as u64) as usize;
            let value = mask.data[my * mw + cols[x as usize]];
            if mask.is_set(value, threshold) {
                *src.get_pixel(x, y)
            } else {
                SUPPRESSED
            }
        });
        Ok(frame.with_image(image))
    }
}

fn load_font(path: &Path) -> Result<FontArc, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FontArc::try_from_vec(bytes).map_err(|_| ConfigError::Font(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BBox, MaskEncoding};
    use crate::frame::Region;

    fn noisy_frame(region: Region) -> FrameBuffer {
        let img = RgbaImage::from_fn(region.width(), region.height(), |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8, 255])
        });
        FrameBuffer::new(img, region)
    }

    /// 只画框, 像素断言不受字形影响
    fn renderer() -> OverlayRenderer {
        let style = OverlayStyle {
            font_path: None,
            ..Default::default()
        };
        OverlayRenderer::new(style, Some(91), Some(91)).unwrap()
    }

    fn bundled_font() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_FONT_PATH)
    }

    fn black_frame(w: u32, h: u32) -> FrameBuffer {
        FrameBuffer::new(
            RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255])),
            Region::sized(w, h).unwrap(),
        )
    }

    #[test]
    fn test_empty_detections_leave_frame_identical() {
        let frame = noisy_frame(Region::new(10, 10, 100, 50).unwrap());
        let out = renderer().render(&frame, &DetectionResult::empty());
        assert_eq!(out.pixels(), frame.pixels());
        assert_eq!(out.origin(), frame.origin());
    }

    #[test]
    fn test_box_drawn_at_scaled_extent() {
        let frame = FrameBuffer::new(
            RgbaImage::from_pixel(100, 50, Rgba([0, 0, 0, 255])),
            Region::new(10, 10, 100, 50).unwrap(),
        );
        let det = Detection::new(1, "person", BBox::normalized(0.5, 0.5, 0.2, 0.2));
        let out = renderer()
            .try_render(&frame, &DetectionResult::Detections(vec![det]))
            .unwrap();
        let color = Rgba(OverlayStyle::default().color);
        let img = out.image();

        // 外框 (40,20) ~ (59,29): 中心 (50,25), 20x10
        assert_eq!(*img.get_pixel(40, 20), color);
        assert_eq!(*img.get_pixel(59, 29), color);
        assert_eq!(*img.get_pixel(50, 20), color);
        assert_eq!(*img.get_pixel(41, 21), color);
        // 框外与框内保持原样
        assert_eq!(*img.get_pixel(39, 20), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(60, 25), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(50, 25), Rgba([0, 0, 0, 255]));
        // 原帧不变
        assert_eq!(*frame.image().get_pixel(40, 20), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_background_class_is_skipped() {
        let frame = noisy_frame(Region::sized(32, 32).unwrap());
        let det = Detection::new(91, "N/A", BBox::normalized(0.5, 0.5, 0.5, 0.5));
        let out = renderer()
            .try_render(&frame, &DetectionResult::Detections(vec![det]))
            .unwrap();
        assert_eq!(out.pixels(), frame.pixels());
    }

    #[test]
    fn test_out_of_range_class_falls_back_unannotated() {
        let r = OverlayRenderer::new(OverlayStyle::default(), None, Some(10)).unwrap();
        let frame = noisy_frame(Region::sized(32, 32).unwrap());
        let result = DetectionResult::Detections(vec![
            Detection::new(1, "a", BBox::normalized(0.5, 0.5, 0.5, 0.5)),
            Detection::new(10, "b", BBox::normalized(0.5, 0.5, 0.5, 0.5)),
        ]);
        assert_eq!(
            r.try_render(&frame, &result).err(),
            Some(RenderError::ClassOutOfRange {
                class_id: 10,
                class_count: 10
            })
        );
        assert_eq!(r.render(&frame, &result).pixels(), frame.pixels());
    }

    #[test]
    fn test_non_finite_box_rejected() {
        let frame = noisy_frame(Region::sized(16, 16).unwrap());
        let result = DetectionResult::Detections(vec![Detection::new(
            1,
            "x",
            BBox::normalized(f32::INFINITY, 0.5, 0.1, 0.1),
        )]);
        assert_eq!(
            renderer().try_render(&frame, &result).err(),
            Some(RenderError::InvalidBox { index: 0 })
        );
    }

    #[test]
    fn test_all_set_small_mask_keeps_frame() {
        // 256x256 区域 + 64x64 全 1 掩码 → 输出等于输入
        let frame = noisy_frame(Region::sized(256, 256).unwrap());
        let mask = SegmentationMask::filled(64, 64, 1, MaskEncoding::Binary);
        let out = renderer()
            .try_render(&frame, &DetectionResult::SegmentationMask(mask))
            .unwrap();
        assert_eq!(out.pixels(), frame.pixels());
    }

    #[test]
    fn test_all_zero_mask_suppresses_frame() {
        let frame = noisy_frame(Region::sized(40, 30).unwrap());
        let mask = SegmentationMask::filled(40, 30, 0, MaskEncoding::Binary);
        let out = renderer()
            .try_render(&frame, &DetectionResult::SegmentationMask(mask))
            .unwrap();
        assert!(out.image().pixels().all(|p| *p == SUPPRESSED));
    }

    #[test]
    fn test_mask_nearest_neighbour_halves() {
        // 2x1 掩码: 左半保留, 右半压黑
        let frame = noisy_frame(Region::sized(8, 4).unwrap());
        let mask = SegmentationMask::new(2, 1, vec![200, 50], MaskEncoding::Probability);
        let out = renderer()
            .try_render(&frame, &DetectionResult::SegmentationMask(mask))
            .unwrap();
        for y in 0..4 {
            for x in 0..8 {
                let expected = if x < 4 {
                    *frame.image().get_pixel(x, y)
                } else {
                    SUPPRESSED
                };
                assert_eq!(*out.image().get_pixel(x, y), expected);
            }
        }
    }

    #[test]
    fn test_malformed_masks() {
        let frame = noisy_frame(Region::sized(8, 8).unwrap());
        let r = renderer();

        let too_large = SegmentationMask::filled(16, 8, 1, MaskEncoding::Binary);
        assert!(matches!(
            r.try_render(&frame, &DetectionResult::SegmentationMask(too_large)),
            Err(RenderError::MaskTooLarge { .. })
        ));

        let short = SegmentationMask::new(4, 4, vec![1; 15], MaskEncoding::Binary);
        assert_eq!(
            r.try_render(&frame, &DetectionResult::SegmentationMask(short)).err(),
            Some(RenderError::MaskLength {
                expected: 16,
                actual: 15
            })
        );

        let empty = SegmentationMask::new(0, 4, Vec::new(), MaskEncoding::Binary);
        let out = r.render(&frame, &DetectionResult::SegmentationMask(empty));
        assert_eq!(out.pixels(), frame.pixels());
    }

    #[test]
    fn test_label_drawn_above_box() {
        let style = OverlayStyle {
            font_path: Some(bundled_font()),
            ..Default::default()
        };
        let r = OverlayRenderer::new(style, None, None).unwrap();
        let frame = black_frame(100, 50);
        // 框 (30,25) ~ (70,45), 标签从 (30, 25-16) 开始
        let det = Detection::new(1, "person", BBox::pixels(50.0, 35.0, 40.0, 20.0));
        let out = r
            .try_render(&frame, &DetectionResult::Detections(vec![det]))
            .unwrap();
        let img = out.image();
        let black = Rgba([0, 0, 0, 255]);

        let label_pixels = (9..25)
            .flat_map(|y| (30..100).map(move |x| (x, y)))
            .filter(|&(x, y)| *img.get_pixel(x, y) != black)
            .count();
        assert!(label_pixels > 0, "label text should be drawn above the box");
        // 标签左侧与框内不受影响
        for y in 9..25 {
            for x in 0..30 {
                assert_eq!(*img.get_pixel(x, y), black);
            }
        }
        for y in 27..43 {
            for x in 32..68 {
                assert_eq!(*img.get_pixel(x, y), black);
            }
        }
    }

    #[test]
    fn test_default_style_uses_bundled_font() {
        assert_eq!(
            OverlayStyle::default().font_path.as_deref(),
            Some(Path::new(DEFAULT_FONT_PATH))
        );
        assert!(load_font(&bundled_font()).is_ok());
    }

    #[test]
    fn test_off_frame_boxes_do_not_panic() {
        let frame = noisy_frame(Region::sized(100, 50).unwrap());
        let r = renderer();
        for bbox in [
            BBox::pixels(3.0e9, 10.0, 10.0, 10.0),
            BBox::normalized(5.0e7, 0.5, 1.0e7, 0.2),
            BBox::pixels(-3.0e9, -3.0e9, 10.0, 10.0),
        ] {
            let result = DetectionResult::Detections(vec![Detection::new(1, "far", bbox)]);
            let out = r.try_render(&frame, &result).unwrap();
            assert_eq!(out.pixels(), frame.pixels());
        }

        // 宽高溢出为无穷 → 格式异常, 按无标注呈现
        let overflow = DetectionResult::Detections(vec![Detection::new(
            1,
            "inf",
            BBox::normalized(0.5, 0.5, 1.0e38, 1.0e38),
        )]);
        assert_eq!(
            r.try_render(&frame, &overflow).err(),
            Some(RenderError::InvalidBox { index: 0 })
        );
        assert_eq!(r.render(&frame, &overflow).pixels(), frame.pixels());
    }

    #[test]
    fn test_partially_visible_box_is_clipped() {
        let frame = black_frame(100, 50);
        let color = Rgba(OverlayStyle::default().color);
        // 左半在帧外: 框 (-10,20) ~ (10,30)
        let det = Detection::new(1, "edge", BBox::pixels(0.0, 25.0, 20.0, 10.0));
        let out = renderer()
            .try_render(&frame, &DetectionResult::Detections(vec![det]))
            .unwrap();
        let img = out.image();
        assert_eq!(*img.get_pixel(9, 25), color);
        assert_eq!(*img.get_pixel(0, 20), color);
        assert_eq!(*img.get_pixel(0, 25), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(11, 25), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_missing_font_is_config_error() {
        let style = OverlayStyle {
            font_path: Some(PathBuf::from("/nonexistent/font.ttf")),
            ..Default::default()
        };
        assert!(matches!(
            OverlayRenderer::new(style, None, None),
            Err(ConfigError::Io { .. })
        ));
    }
}
