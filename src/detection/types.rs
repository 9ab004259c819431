// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测结果数据结构定义
/// Data structures produced by inference adapters
use serde::{Deserialize, Serialize};

// ========== 枚举类型 ==========

/// 检测框坐标单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxUnits {
    /// 0~1 归一化 (相对帧宽高)
    #[default]
    Normalized,
    /// 帧像素坐标
    Pixels,
}

/// 掩码取值含义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskEncoding {
    /// 非零即置位 (0/1 或 0/255)
    #[default]
    Binary,
    /// 0~255 概率, 按阈值二值化
    Probability,
}

/// 结果变体 (每个适配器实例固定产出一种)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Detections,
    SegmentationMask,
}

// ========== 数据结构 ==========

/// 检测框: 中心点 + 宽高
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    #[serde(default)]
    pub units: BoxUnits,
}

/// 像素空间矩形 (x1,y1 左上, x2,y2 右下)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl PixelRect {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2].iter().all(|v| v.is_finite())
    }

    /// 裁剪到帧外扩 `margin` 像素的范围, 与帧不相交时返回 None
    pub fn clip(&self, frame_w: u32, frame_h: u32, margin: f32) -> Option<PixelRect> {
        let (fw, fh) = (frame_w as f32, frame_h as f32);
        if self.x2 <= 0.0 || self.y2 <= 0.0 || self.x1 >= fw || self.y1 >= fh {
            return None;
        }
        let clipped = PixelRect {
            x1: self.x1.max(-margin),
            y1: self.y1.max(-margin),
            x2: self.x2.min(fw + margin),
            y2: self.y2.min(fh + margin),
        };
        (clipped.width() > 0.0 && clipped.height() > 0.0).then_some(clipped)
    }
}

impl BBox {
    pub fn normalized(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            cx,
            cy,
            w,
            h,
            units: BoxUnits::Normalized,
        }
    }

    pub fn pixels(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            cx,
            cy,
            w,
            h,
            units: BoxUnits::Pixels,
        }
    }

    /// 坐标有限且宽高为正
    pub fn is_valid(&self) -> bool {
        [self.cx, self.cy, self.w, self.h].iter().all(|v| v.is_finite())
            && self.w > 0.0
            && self.h > 0.0
    }

    /// 转为帧像素坐标, 归一化坐标按帧宽高缩放
    pub fn to_pixel_rect(&self, frame_w: u32, frame_h: u32) -> PixelRect {
        let (sx, sy) = match self.units {
            BoxUnits::Normalized => (frame_w as f32, frame_h as f32),
            BoxUnits::Pixels => (1.0, 1.0),
        };
        let cx = self.cx * sx;
        let cy = self.cy * sy;
        let w = self.w * sx;
        let h = self.h * sy;
        PixelRect {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }
}

/// 单个检测目标
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub label: String,
    pub bbox: BBox,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl Detection {
    pub fn new(class_id: u32, label: impl Into<String>, bbox: BBox) -> Self {
        Self {
            class_id,
            label: label.into(),
            bbox,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

/// 单通道分割掩码
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentationMask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub encoding: MaskEncoding,
}

impl SegmentationMask {
    pub fn new(width: u32, height: u32, data: Vec<u8>, encoding: MaskEncoding) -> Self {
        Self {
            width,
            height,
            data,
            encoding,
        }
    }

    /// 全部填充同一个值
    pub fn filled(width: u32, height: u32, value: u8, encoding: MaskEncoding) -> Self {
        Self::new(
            width,
            height,
            vec![value; (width as usize) * (height as usize)],
            encoding,
        )
    }

    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// 按编码判断取值是否置位
    #[inline]
    pub fn is_set(&self, value: u8, threshold: u8) -> bool {
        match self.encoding {
            MaskEncoding::Binary => value != 0,
            MaskEncoding::Probability => value >= threshold,
        }
    }

    /// 置位像素占比
    pub fn coverage(&self, threshold: u8) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let set = self.data.iter().filter(|&&v| self.is_set(v, threshold)).count();
        set as f32 / self.data.len() as f32
    }
}

/// 推理结果 (适配器 → 叠加渲染)
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionResult {
    Detections(Vec<Detection>),
    SegmentationMask(SegmentationMask),
}

impl DetectionResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            DetectionResult::Detections(_) => ResultKind::Detections,
            DetectionResult::SegmentationMask(_) => ResultKind::SegmentationMask,
        }
    }

    /// 空检测列表 (无标注)
    pub fn empty() -> Self {
        DetectionResult::Detections(Vec::new())
    }
}
