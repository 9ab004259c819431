// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

// 网格帧差运动检测
//
// 把帧按 cell_size 划分网格, 逐格求平均亮度, 与上一帧比较;
// 变化超过阈值的格子按 4 邻域连通, 每个连通块输出一个归一化检测框.
// 第一帧只建立基线, 返回空列表.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::detection::{BBox, Detection, DetectionResult, ResultKind};
use crate::error::{ConfigError, InferenceError};
use crate::frame::FrameBuffer;
use crate::models::InferenceAdapter;

/// 运动检测参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub cell_size: u32,      // 网格边长(像素)
    pub diff_threshold: u8,  // 平均亮度差阈值
    pub min_cells: usize,    // 最小连通格数
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            cell_size: 16,
            diff_threshold: 24,
            min_cells: 2,
        }
    }
}

/// 上一帧的亮度网格
struct LumaGrid {
    cols: usize,
    rows: usize,
    cells: Vec<u8>,
}

pub struct MotionDetector {
    config: MotionConfig,
    previous: Option<LumaGrid>,
}

impl MotionDetector {
    pub const LABEL: &'static str = "motion";

    pub fn new(config: MotionConfig) -> Result<Self, ConfigError> {
        if config.cell_size == 0 {
            return Err(ConfigError::Adapter {
                adapter: "motion",
                reason: "cell_size must be positive".to_string(),
            });
        }
        Ok(Self {
            config,
            previous: None,
        })
    }

    fn grid(&self, frame: &FrameBuffer) -> LumaGrid {
        let cell = self.config.cell_size as usize;
        let cols = frame.width() as usize / cell;
        let rows = frame.height() as usize / cell;
        let stride = frame.width() as usize * 4;
        let pixels = frame.pixels();

        let mut cells = Vec::with_capacity(cols * rows);
        for gy in 0..rows {
            for gx in 0..cols {
                let mut sum: u64 = 0;
                for y in gy * cell..(gy + 1) * cell {
                    let row = y * stride;
                    for x in gx * cell..(gx + 1) * cell {
                        let p = row + x * 4;
                        // BT.601 整数近似
                        sum += (pixels[p] as u64 * 77
                            + pixels[p + 1] as u64 * 150
                            + pixels[p + 2] as u64 * 29)
                            >> 8;
                    }
                }
                cells.push((sum / (cell * cell) as u64) as u8);
            }
        }
        LumaGrid { cols, rows, cells }
    }

    /// 变化格子的连通块 → 检测框
    fn components(&self, active: &[bool], cols: usize, rows: usize, frame: &FrameBuffer) -> Vec<Detection> {
        let cell = self.config.cell_size as f32;
        let fw = frame.width() as f32;
        let fh = frame.height() as f32;
        let mut visited = vec![false; active.len()];
        let mut detections = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..active.len() {
            if !active[start] || visited[start] {
                continue;
            }
            visited[start] = true;
            queue.push_back(start);

            let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
            let (mut max_x, mut max_y) = (0usize, 0usize);
            let mut count = 0usize;

            while let Some(idx) = queue.pop_front() {
                let (x, y) = (idx % cols, idx / cols);
                count += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                let mut neighbours = Vec::with_capacity(4);
                if x > 0 {
                    neighbours.push(idx - 1);
                }
                if x + 1 < cols {
                    neighbours.push(idx + 1);
                }
                if y > 0 {
                    neighbours.push(idx - cols);
                }
                if y + 1 < rows {
                    neighbours.push(idx + cols);
                }
                for n in neighbours {
                    if active[n] && !visited[n] {
                        visited[n] = true;
                        queue.push_back(n);
                    }
                }
            }

            if count < self.config.min_cells {
                continue;
            }

            let x1 = min_x as f32 * cell;
            let y1 = min_y as f32 * cell;
            let x2 = (max_x + 1) as f32 * cell;
            let y2 = (max_y + 1) as f32 * cell;
            let box_cells = (max_x - min_x + 1) * (max_y - min_y + 1);

            detections.push(
                Detection::new(
                    0,
                    Self::LABEL,
                    BBox::normalized(
                        (x1 + x2) / 2.0 / fw,
                        (y1 + y2) / 2.0 / fh,
                        (x2 - x1) / fw,
                        (y2 - y1) / fh,
                    ),
                )
                .with_confidence(count as f32 / box_cells as f32),
            );
        }
        detections
    }
}

impl InferenceAdapter for MotionDetector {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn output_kind(&self) -> ResultKind {
        ResultKind::Detections
    }

    fn class_count(&self) -> Option<usize> {
        Some(1)
    }

    fn infer(&mut self, frame: &FrameBuffer) -> Result<DetectionResult, InferenceError> {
        if frame.width() < self.config.cell_size || frame.height() < self.config.cell_size {
            return Err(InferenceError::FrameTooSmall {
                adapter: "motion",
                width: frame.width(),
                height: frame.height(),
            });
        }

        let current = self.grid(frame);
        let detections = match &self.previous {
            Some(prev) if prev.cols == current.cols && prev.rows == current.rows => {
                let threshold = self.config.diff_threshold;
                let active: Vec<bool> = prev
                    .cells
                    .iter()
                    .zip(&current.cells)
                    .map(|(a, b)| a.abs_diff(*b) > threshold)
                    .collect();
                self.components(&active, current.cols, current.rows, frame)
            }
            // 首帧或尺寸变化: 重建基线
            _ => Vec::new(),
        };
        self.previous = Some(current);
        Ok(DetectionResult::Detections(detections))
    }
}
