// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 配置文件与默认参数
pub mod cycle; // 单轮 capture → infer → render → present
pub mod detection; // 检测结果与类别表
pub mod error;
pub mod frame; // 帧缓冲与区域
pub mod guard;
pub mod input; // 画面输入系统
pub mod models; // 推理适配器接口与实现
pub mod overlay; // 叠加渲染
pub mod present; // 呈现表面
pub mod scheduler; // 后台刷新调度
pub mod stats;
pub mod ui_loop; // UI 线程事件泵
pub mod viewer; // macroquad 窗口

pub use crate::config::AppConfig;
pub use crate::cycle::{CycleFailure, CycleOrchestrator, CycleOutcome, CycleState};
pub use crate::detection::{BBox, Detection, DetectionResult, LabelMap, SegmentationMask};
pub use crate::error::{CaptureError, ConfigError, InferenceError, PresentError, RenderError};
pub use crate::frame::{FrameBuffer, Region};
pub use crate::input::FrameSource;
pub use crate::models::{FailurePolicy, InferenceAdapter, ModelHandle};
pub use crate::overlay::{OverlayRenderer, OverlayStyle};
pub use crate::present::{PresentationSink, SurfaceBuffer};
pub use crate::scheduler::{RefreshScheduler, SchedulerState, UiEvent};
pub use crate::ui_loop::UiPump;

/// 本地时间字符串, 各字段之间用 `delimiter` 分隔 (快照文件名等)
pub fn gen_time_string(delimiter: &str) -> String {
    let fmt = format!(
        "%Y{d}%m{d}%d{d}%H{d}%M{d}%S{d}%3f",
        d = delimiter
    );
    chrono::Local::now().format(&fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_time_string() {
        let s = gen_time_string("-");
        assert_eq!(s.split('-').count(), 7);
        assert!(!gen_time_string("").contains('-'));
    }
}
