// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 桌面捕获模块
//!
//! 基于 xcap 抓取显示器画面. 每次捕获重新枚举显示器,
//! 热插拔或分辨率变化后下一轮即可生效.

use image::{imageops, RgbaImage};
use xcap::Monitor;

use super::{ensure_within, FrameSource};
use crate::error::CaptureError;
use crate::frame::{FrameBuffer, Region};

/// 桌面捕获
#[derive(Default)]
pub struct DesktopCapture;

impl DesktopCapture {
    pub fn new() -> Self {
        Self
    }

    /// 找到完整包含区域的显示器
    fn monitor_for(region: Region) -> Result<(Monitor, Region), CaptureError> {
        let monitors = Monitor::all().map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        if monitors.is_empty() {
            return Err(CaptureError::Unavailable("no monitor attached".to_string()));
        }

        let mut surfaces = Vec::with_capacity(monitors.len());
        for monitor in monitors {
            let Ok(bounds) = Region::new(monitor.x(), monitor.y(), monitor.width(), monitor.height())
            else {
                continue;
            };
            if bounds.contains(&region) {
                return Ok((monitor, bounds));
            }
            surfaces.push(bounds.to_string());
        }

        Err(CaptureError::OutOfBounds {
            region,
            surface: surfaces.join(", "),
        })
    }
}

impl FrameSource for DesktopCapture {
    fn name(&self) -> &'static str {
        "screen"
    }

    fn bounds(&self) -> Option<Region> {
        let monitors = Monitor::all().ok()?;
        let primary = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())?;
        Region::new(primary.x(), primary.y(), primary.width(), primary.height()).ok()
    }

    fn capture(&mut self, region: Region) -> Result<FrameBuffer, CaptureError> {
        let (monitor, bounds) = Self::monitor_for(region)?;
        ensure_within(region, bounds)?;

        let shot = monitor
            .capture_image()
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        let (w, h) = (shot.width(), shot.height());
        let full = RgbaImage::from_raw(w, h, shot.into_raw())
            .ok_or(CaptureError::BadRaster { width: w, height: h })?;

        // HiDPI 下返回的像素尺寸可能与逻辑尺寸不同
        if w != bounds.width() || h != bounds.height() {
            return Err(CaptureError::BadRaster { width: w, height: h });
        }

        let local_x = (region.x() - bounds.x()) as u32;
        let local_y = (region.y() - bounds.y()) as u32;
        let view = imageops::crop_imm(&full, local_x, local_y, region.width(), region.height());
        Ok(FrameBuffer::new(view.to_image(), region))
    }
}
