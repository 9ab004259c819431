// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! macroquad 窗口
//!
//! 窗口本身就是 UI 线程: 每个窗口帧先处理刷新请求, 再重绘最近一次呈现的画面.
//! 关闭窗口 (或按 Esc) 时按 停止调度器 → 等待线程退出 → 退出循环 的顺序拆除.
use log::{info, warn};
use macroquad::prelude::*;

use crate::config::{AppConfig, WindowConfig};
use crate::cycle::CycleOrchestrator;
use crate::error::{ConfigError, PresentError};
use crate::frame::{FrameBuffer, Region};
use crate::guard::ThreadGuard;
use crate::present::{stretch, PresentationSink};
use crate::scheduler::{ui_channel, RefreshScheduler};
use crate::ui_loop::UiPump;

const STATUS_FONT_SIZE: f32 = 20.0;

pub fn window_conf(window: &WindowConfig) -> Conf {
    Conf {
        window_title: window.title.clone(),
        window_width: window.width as i32,
        window_height: window.height as i32,
        window_resizable: true,
        ..Default::default()
    }
}

/// 当前客户区 (窗口坐标)
pub fn client_area() -> Region {
    let w = (screen_width().round() as u32).max(1);
    let h = (screen_height().round() as u32).max(1);
    Region::fixed(0, 0, w, h)
}

/// 把帧上传为纹理, 每个窗口帧重绘
pub struct WindowSink {
    guard: ThreadGuard,
    texture: Option<Texture2D>,
    placed: Option<Region>,
}

impl Default for WindowSink {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowSink {
    pub fn new() -> Self {
        Self {
            guard: ThreadGuard::current("WindowSink"),
            texture: None,
            placed: None,
        }
    }

    /// 重绘最近一次呈现的画面
    pub fn draw(&self) {
        if let (Some(texture), Some(placed)) = (&self.texture, self.placed) {
            draw_texture(texture, placed.x() as f32, placed.y() as f32, WHITE);
        }
    }

    fn upload(&mut self, width: u32, height: u32, bytes: Vec<u8>) {
        // 只在分辨率变化时重建纹理, 否则更新像素数据
        let reuse = self.texture.as_ref().is_some_and(|tex| {
            tex.width() == width as f32 && tex.height() == height as f32
        });
        if reuse {
            if let Some(tex) = &self.texture {
                tex.update(&Image {
                    bytes,
                    width: width as u16,
                    height: height as u16,
                });
            }
        } else {
            let texture = Texture2D::from_rgba8(width as u16, height as u16, &bytes);
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        }
    }
}

impl PresentationSink for WindowSink {
    fn target(&self) -> Region {
        client_area()
    }

    fn present(&mut self, frame: &FrameBuffer, target: Region) -> Result<(), PresentError> {
        self.guard.check();
        if !client_area().contains(&target) || target.width() > u16::MAX as u32 || target.height() > u16::MAX as u32 {
            return Err(PresentError::TargetOutOfBounds(target));
        }
        let scaled = stretch(frame.image(), target.width(), target.height())?;
        self.upload(target.width(), target.height(), scaled.into_raw());
        self.placed = Some(target);
        Ok(())
    }
}

/// 窗口主循环 (在 macroquad 的 UI 线程上运行)
pub async fn run_window(config: AppConfig) -> Result<(), ConfigError> {
    let mut orchestrator = CycleOrchestrator::from_config(&config, WindowSink::new())?;
    let (events_tx, events_rx) = ui_channel();
    let mut scheduler = RefreshScheduler::new();
    let shared = scheduler.shared();
    let mut pump = UiPump::new(events_rx, shared.clone());

    prevent_quit();
    // 窗口已就绪: 先刷新一帧, 再启动调度器
    orchestrator.run_cycle();
    scheduler.start(config.refresh_interval(), events_tx)?;
    info!("✅ 窗口就绪, 开始刷新 (Esc 或关闭窗口退出)");

    loop {
        if is_quit_requested() || is_key_pressed(KeyCode::Escape) {
            info!("👋 窗口关闭, 停止刷新调度器...");
            scheduler.stop();
            scheduler.join();
            break;
        }

        pump.pump(&mut orchestrator);

        clear_background(BLACK);
        orchestrator.sink().draw();

        let stats = orchestrator.stats();
        let status = format!(
            "cycle {:.1}/s | presented {} | abandoned {} | dropped triggers {}",
            pump.cycle_rate(),
            stats.presented,
            stats.abandoned(),
            shared.dropped()
        );
        draw_text(&status, 10.0, STATUS_FONT_SIZE, STATUS_FONT_SIZE, GREEN);
        if let Some(failure) = orchestrator.last_failure() {
            draw_text(failure, 10.0, STATUS_FONT_SIZE * 2.0, STATUS_FONT_SIZE, ORANGE);
        }

        next_frame().await;
    }

    if pump.stray() > 0 {
        warn!("⚠️ 拆除期间丢弃 {} 个残留刷新请求", pump.stray());
    }
    info!("📊 最终统计: {}", orchestrator.stats());
    Ok(())
}
