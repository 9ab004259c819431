// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 屏幕哨兵 (Screen Sentinel)
///
/// 桌面区域实时检测叠加
///
/// 线程模型:
/// 1. 调度线程: 按间隔投递刷新请求 (不碰显示表面)
/// 2. 主线程:   捕获 → 推理 → 叠加 → 呈现 (macroquad 窗口循环)
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use mimalloc::MiMalloc;

use screen_sentinel::input::SourceKind;
use screen_sentinel::models::{FailurePolicy, ModelKind};
use screen_sentinel::scheduler::{ui_channel, RefreshScheduler};
use screen_sentinel::{gen_time_string, viewer, AppConfig, CycleOrchestrator, Region, SurfaceBuffer, UiPump};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 屏幕哨兵参数
#[derive(Parser, Debug)]
#[command(author, version, about = "屏幕哨兵 - 桌面区域实时检测叠加", long_about = None)]
struct Args {
    /// 配置文件 (不存在时写出默认配置)
    #[arg(short, long, default_value = "sentinel.json")]
    config: PathBuf,

    /// 输入源
    #[arg(short, long, value_enum)]
    source: Option<SourceKind>,

    /// 捕获区域 x,y,width,height
    #[arg(short, long)]
    region: Option<Region>,

    /// 刷新间隔 (毫秒)
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// 推理适配器
    #[arg(short, long, value_enum)]
    model: Option<ModelKind>,

    /// 推理失败时的处理策略
    #[arg(long, value_enum)]
    on_inference_error: Option<FailurePolicy>,

    /// 标签字体 (TTF)
    #[arg(long)]
    font: Option<PathBuf>,

    /// `image` 输入源的图片
    #[arg(long)]
    image: Option<PathBuf>,

    /// 不开窗口, 呈现到内存表面
    #[arg(long)]
    headless: bool,

    /// 无窗口模式运行时长 (秒)
    #[arg(long, default_value_t = 10)]
    run_secs: u64,

    /// 无窗口模式结束时保存最后一帧 (目录或 PNG 文件)
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(source) = self.source {
            config.capture.source = source;
        }
        if let Some(region) = self.region {
            config.capture.region = region;
        }
        if let Some(ms) = self.interval_ms {
            config.refresh_interval_ms = ms;
        }
        if let Some(kind) = self.model {
            config.model.kind = kind;
        }
        if let Some(policy) = self.on_inference_error {
            config.model.on_error = policy;
        }
        if let Some(font) = &self.font {
            config.overlay.font_path = Some(font.clone());
        }
        if let Some(image) = &self.image {
            config.capture.image_path = Some(image.clone());
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = AppConfig::load(&args.config);
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    info!("🚀 屏幕哨兵启动");
    config.print_summary();

    if args.headless {
        return run_headless(&config, &args);
    }

    let conf = viewer::window_conf(&config.window);
    macroquad::Window::from_config(conf, async move {
        if let Err(e) = viewer::run_window(config).await {
            error!("❌ 窗口循环启动失败: {}", e);
        }
    });
    Ok(())
}

fn run_headless(config: &AppConfig, args: &Args) -> Result<()> {
    let sink = SurfaceBuffer::new(config.window.width, config.window.height)?;
    let mut orchestrator =
        CycleOrchestrator::from_config(config, sink).context("failed to build pipeline")?;

    let (events_tx, events_rx) = ui_channel();
    let mut scheduler = RefreshScheduler::new();
    let mut pump = UiPump::new(events_rx, scheduler.shared());

    orchestrator.run_cycle();
    scheduler.start(config.refresh_interval(), events_tx)?;
    info!("✅ 无窗口模式运行 {}s", args.run_secs);

    pump.run_for(&mut orchestrator, Duration::from_secs(args.run_secs));
    scheduler.stop();
    scheduler.join();
    info!("📊 最终统计: {}", orchestrator.stats());

    if let Some(target) = &args.snapshot {
        let path = if target.is_dir() {
            target.join(format!("snapshot_{}.png", gen_time_string("")))
        } else {
            target.clone()
        };
        orchestrator
            .sink()
            .image()
            .save(&path)
            .with_context(|| format!("failed to save snapshot {}", path.display()))?;
        info!("💾 快照已保存到 {}", path.display());
    }
    Ok(())
}
