// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! UI 线程事件泵
//!
//! 取走所有待处理的刷新请求, 合并成一轮 cycle. 调度器已不在 Running 时
//! 收到的请求视为残留消息, 直接丢弃.
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info};

use crate::cycle::{CycleOrchestrator, CycleOutcome};
use crate::present::PresentationSink;
use crate::scheduler::{SchedulerState, SharedState, UiEvent};
use crate::stats::FpsCounter;

/// 无请求时检查调度器状态的间隔
const IDLE_POLL: Duration = Duration::from_millis(50);

pub struct UiPump {
    events: Receiver<UiEvent>,
    shared: Arc<SharedState>,
    fps: FpsCounter,
    /// 被合并进同一轮的请求数 (通道内, 不含生产端丢弃)
    merged: u64,
    /// 调度器停止后才到达的请求数
    stray: u64,
    last_seq: u64,
}

impl UiPump {
    pub fn new(events: Receiver<UiEvent>, shared: Arc<SharedState>) -> Self {
        Self {
            events,
            shared,
            fps: FpsCounter::new(),
            merged: 0,
            stray: 0,
            last_seq: 0,
        }
    }

    pub fn stray(&self) -> u64 {
        self.stray
    }

    pub fn merged(&self) -> u64 {
        self.merged
    }

    /// 最近一次处理的请求序号
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn cycle_rate(&self) -> f64 {
        self.fps.fps()
    }

    /// 非阻塞: 有请求就跑一轮 (窗口每帧调用)
    pub fn pump<K: PresentationSink>(
        &mut self,
        orchestrator: &mut CycleOrchestrator<K>,
    ) -> Option<CycleOutcome> {
        let pending = self.drain();
        self.dispatch(pending, orchestrator)
    }

    /// 阻塞等待下一个请求 (最多 `timeout`), 然后同 `pump`
    pub fn wait_and_pump<K: PresentationSink>(
        &mut self,
        orchestrator: &mut CycleOrchestrator<K>,
        timeout: Duration,
    ) -> Option<CycleOutcome> {
        let pending = match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.accept(event);
                1 + self.drain()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        };
        self.dispatch(pending, orchestrator)
    }

    /// 一直处理请求, 直到调度器停止且通道已空
    pub fn run_until_stopped<K: PresentationSink>(
        &mut self,
        orchestrator: &mut CycleOrchestrator<K>,
    ) {
        self.run_while(orchestrator, |_| true);
    }

    /// 最多运行 `limit`, 调度器提前停止时立即返回
    pub fn run_for<K: PresentationSink>(
        &mut self,
        orchestrator: &mut CycleOrchestrator<K>,
        limit: Duration,
    ) {
        let deadline = Instant::now() + limit;
        self.run_while(orchestrator, |now| now < deadline);
    }

    fn run_while<K, F>(&mut self, orchestrator: &mut CycleOrchestrator<K>, mut keep_going: F)
    where
        K: PresentationSink,
        F: FnMut(Instant) -> bool,
    {
        loop {
            if !keep_going(Instant::now()) {
                break;
            }
            match self.events.recv_timeout(IDLE_POLL) {
                Ok(event) => {
                    self.accept(event);
                    let pending = 1 + self.drain();
                    self.dispatch(pending, orchestrator);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.report(orchestrator, false);
                    if self.shared.state() == SchedulerState::Stopped {
                        // 退出前最后一次投递可能刚好落在通道里
                        let pending = self.drain();
                        if pending > 0 {
                            self.dispatch(pending, orchestrator);
                        }
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn accept(&mut self, event: UiEvent) {
        match event {
            UiEvent::RefreshRequested { seq } => self.last_seq = seq,
        }
    }

    fn drain(&mut self) -> u64 {
        let mut n = 0;
        while let Ok(event) = self.events.try_recv() {
            self.accept(event);
            n += 1;
        }
        n
    }

    fn dispatch<K: PresentationSink>(
        &mut self,
        pending: u64,
        orchestrator: &mut CycleOrchestrator<K>,
    ) -> Option<CycleOutcome> {
        if pending == 0 {
            self.report(orchestrator, false);
            return None;
        }
        // 拆除开始后不再启动新一轮
        if !self.shared.is_running() {
            self.stray += pending;
            debug!("🗑️ 调度器已停止, 丢弃 {} 个残留刷新请求", pending);
            return None;
        }
        self.merged += pending - 1;
        let outcome = orchestrator.run_cycle();
        self.report(orchestrator, true);
        Some(outcome)
    }

    fn report<K: PresentationSink>(&mut self, orchestrator: &CycleOrchestrator<K>, ran: bool) {
        let rate = if ran { self.fps.tick() } else { self.fps.poll() };
        if let Some(rate) = rate {
            if ran || rate > 0.0 {
                info!(
                    "📊 cycle {:.1}/s | {} | 触发 投递 {} 丢弃 {}",
                    rate,
                    orchestrator.stats(),
                    self.shared.sent(),
                    self.shared.dropped()
                );
            }
        }
    }
}
