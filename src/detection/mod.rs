// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测结果与类别表 (Detection results)
///
/// 推理适配器的输出契约:
/// - types:  检测框 / 分割掩码 / 结果联合体
/// - labels: 类别 id → 标签映射
pub mod labels;
pub mod types;

pub use labels::{LabelMap, LabelSet, COCO91, COCO91_NO_OBJECT};
pub use types::{
    BBox, BoxUnits, Detection, DetectionResult, MaskEncoding, PixelRect, ResultKind,
    SegmentationMask,
};
