// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 刷新调度器 (Refresh Scheduler)
//!
//! 后台线程按固定间隔向 UI 线程投递 `UiEvent::RefreshRequested`, 自己从不触碰显示表面.
//!
//! 触发策略: 合并 (coalesce). UI 通道容量为 1, 上一个请求还没被取走时
//! 新请求直接在生产端丢弃并计数, 因此推理再慢也不会积压.
//!
//! 生命周期:
//! ```text
//! Stopped --start--> Running --stop--> StopRequested --(线程退出)--> Stopped
//! ```
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};

use crate::error::ConfigError;

/// 调度器 → UI 线程的消息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// 请求执行一轮 cycle; `seq` 为调度器投递序号
    RefreshRequested { seq: u64 },
}

/// 创建调度器与 UI 之间的容量为 1 的通道
pub fn ui_channel() -> (Sender<UiEvent>, Receiver<UiEvent>) {
    bounded(1)
}

/// 调度器状态 (进程内共享)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Stopped = 0,
    Running = 1,
    StopRequested = 2,
}

impl SchedulerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SchedulerState::Running,
            2 => SchedulerState::StopRequested,
            _ => SchedulerState::Stopped,
        }
    }
}

/// 调度线程与 UI 线程之间唯一共享的数据: 状态 + 单调计数
#[derive(Debug)]
pub struct SharedState {
    state: AtomicU8,
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(SchedulerState::Stopped as u8),
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }
}

impl SharedState {
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: SchedulerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Running → StopRequested; 其他状态下什么都不做, 返回是否发生了切换
    pub fn request_stop(&self) -> bool {
        self.state
            .compare_exchange(
                SchedulerState::Running as u8,
                SchedulerState::StopRequested as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// 成功投递的请求数
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// 因已有请求待处理而被合并丢弃的次数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct RefreshScheduler {
    shared: Arc<SharedState>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshScheduler {
    /// 新建 (Stopped), 需要 `start` 才会运行
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SharedState::default()),
            stop_tx: None,
            handle: None,
            interval: Duration::ZERO,
        }
    }

    pub fn shared(&self) -> Arc<SharedState> {
        self.shared.clone()
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 启动后台线程; 已在运行 (或尚未退出) 时忽略
    pub fn start(&mut self, interval: Duration, events: Sender<UiEvent>) -> Result<(), ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.shared.state() != SchedulerState::Stopped {
            warn!("⚠️ 刷新调度器已启动, 忽略重复 start");
            return Ok(());
        }
        // 上一个线程已自行退出 (例如 UI 通道关闭), 先回收再重启
        if self.handle.is_some() {
            debug!("♻️ 回收已退出的刷新调度线程");
            self.join();
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        self.stop_tx = Some(stop_tx);
        self.interval = interval;
        self.shared.set(SchedulerState::Running);

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("refresh-scheduler".to_string())
            .spawn(move || refresh_loop(interval, events, stop_rx, shared));
        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                info!("✅ 刷新调度器启动: 间隔 {}ms", interval.as_millis());
                Ok(())
            }
            Err(source) => {
                self.stop_tx = None;
                self.shared.set(SchedulerState::Stopped);
                Err(ConfigError::Spawn(source))
            }
        }
    }

    /// 请求停止, 不阻塞; 可重复调用
    pub fn stop(&self) {
        if self.shared.request_stop() {
            info!("🛑 刷新调度器收到停止请求");
        }
        if let Some(tx) = &self.stop_tx {
            // 唤醒等待中的线程; 通道已满说明之前已经唤醒过
            let _ = tx.try_send(());
        }
    }

    /// 等待后台线程退出
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            error!("❌ 刷新调度线程异常退出");
            self.shared.set(SchedulerState::Stopped);
        }
        self.stop_tx = None;
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

fn refresh_loop(
    interval: Duration,
    events: Sender<UiEvent>,
    stop_rx: Receiver<()>,
    shared: Arc<SharedState>,
) {
    let mut seq = 0u64;
    loop {
        // 可中断的等待: 收到停止信号立即醒来
        match stop_rx.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        if !shared.is_running() {
            break;
        }

        seq += 1;
        match events.try_send(UiEvent::RefreshRequested { seq }) {
            Ok(()) => {
                shared.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("⏳ 上一轮请求仍在等待, 合并刷新请求 #{}", seq);
            }
            Err(TrySendError::Disconnected(_)) => {
                info!("🔌 UI 通道已关闭, 刷新调度器退出");
                break;
            }
        }
    }
    shared.set(SchedulerState::Stopped);
    info!(
        "🛑 刷新调度器已停止 (投递 {}, 合并丢弃 {})",
        shared.sent(),
        shared.dropped()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_zero_interval_rejected() {
        let (tx, _rx) = ui_channel();
        let mut scheduler = RefreshScheduler::new();
        assert!(matches!(
            scheduler.start(Duration::ZERO, tx),
            Err(ConfigError::ZeroInterval)
        ));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_posts_and_coalesces() {
        let (tx, rx) = ui_channel();
        let mut scheduler = RefreshScheduler::new();
        scheduler.start(Duration::from_millis(5), tx).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);

        // 不消费: 第一个请求占满通道, 之后全部合并丢弃
        thread::sleep(Duration::from_millis(100));
        scheduler.stop();
        scheduler.join();

        let shared = scheduler.shared();
        assert_eq!(shared.sent(), 1);
        assert!(shared.dropped() > 0);
        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_stop_interrupts_long_wait() {
        let (tx, _rx) = ui_channel();
        let mut scheduler = RefreshScheduler::new();
        scheduler.start(Duration::from_secs(30), tx).unwrap();
        let started = Instant::now();
        scheduler.stop();
        scheduler.stop();
        scheduler.join();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_request_stop_from_shared_handle() {
        let (tx, rx) = ui_channel();
        let mut scheduler = RefreshScheduler::new();
        scheduler.start(Duration::from_millis(5), tx).unwrap();
        let shared = scheduler.shared();
        let requested = Instant::now();
        assert!(shared.request_stop());
        assert!(!shared.request_stop());

        // 线程在下一次醒来时退出: 不超过一个间隔 (加调度余量)
        let limit = scheduler.interval() + Duration::from_millis(50);
        while shared.state() != SchedulerState::Stopped && requested.elapsed() < limit {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(shared.state(), SchedulerState::Stopped);
        assert!(requested.elapsed() <= limit);
        let sent = shared.sent();
        drop(rx);
        scheduler.join();
        assert_eq!(shared.sent(), sent);
    }

    #[test]
    fn test_exits_when_ui_channel_closes() {
        let (tx, rx) = ui_channel();
        drop(rx);
        let mut scheduler = RefreshScheduler::new();
        scheduler.start(Duration::from_millis(2), tx).unwrap();
        scheduler.join();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_restart_after_self_exit() {
        let (dead_tx, dead_rx) = ui_channel();
        drop(dead_rx);
        let mut scheduler = RefreshScheduler::new();
        scheduler.start(Duration::from_millis(2), dead_tx).unwrap();
        let deadline = Instant::now() + Duration::from_secs(1);
        while scheduler.state() != SchedulerState::Stopped && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        // 线程句柄还在, 但重新 start 必须真正启动新线程
        let (tx, rx) = ui_channel();
        scheduler.start(Duration::from_millis(2), tx).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
        scheduler.stop();
        scheduler.join();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_drop_stops_thread() {
        let (tx, _rx) = ui_channel();
        let shared = {
            let mut scheduler = RefreshScheduler::new();
            scheduler.start(Duration::from_millis(50), tx).unwrap();
            scheduler.shared()
        };
        assert_eq!(shared.state(), SchedulerState::Stopped);
    }
}
