// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

// 固定检测适配器
// 每轮返回同一组检测框, 用于演示叠加效果; 空列表即 no-op 适配器

use crate::detection::{Detection, DetectionResult, LabelMap, ResultKind};
use crate::error::InferenceError;
use crate::frame::FrameBuffer;
use crate::models::InferenceAdapter;

pub struct FixedAdapter {
    detections: Vec<Detection>,
    labels: LabelMap,
}

impl FixedAdapter {
    /// 空标签的条目按类别表补全 (越界 id 保持原样, 交给渲染器判定)
    pub fn new(detections: Vec<Detection>, labels: LabelMap) -> Self {
        let detections = detections
            .into_iter()
            .map(|mut d| {
                if d.label.is_empty() {
                    if let Some(name) = labels.get(d.class_id) {
                        d.label = name.to_string();
                    }
                }
                d
            })
            .collect();
        Self { detections, labels }
    }

    /// 恒返回空检测列表
    pub fn noop() -> Self {
        Self::new(Vec::new(), LabelMap::coco91())
    }
}

impl InferenceAdapter for FixedAdapter {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn output_kind(&self) -> ResultKind {
        ResultKind::Detections
    }

    fn class_count(&self) -> Option<usize> {
        Some(self.labels.len())
    }

    fn infer(&mut self, _frame: &FrameBuffer) -> Result<DetectionResult, InferenceError> {
        Ok(DetectionResult::Detections(self.detections.clone()))
    }
}
