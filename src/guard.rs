// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 线程归属检查
//!
//! 捕获 / 渲染 / 呈现只能在 UI 线程上发生. 在别的线程上调用属于编程错误
//! (SchedulerViolation), 直接 panic 而不是返回可恢复错误.
use std::thread::{self, ThreadId};

#[derive(Debug, Clone)]
pub struct ThreadGuard {
    owner: ThreadId,
    role: &'static str,
}

impl ThreadGuard {
    /// 以当前线程为所有者
    pub fn current(role: &'static str) -> Self {
        Self {
            owner: thread::current().id(),
            role,
        }
    }

    pub fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    #[track_caller]
    pub fn check(&self) {
        if !self.is_owner() {
            let current = thread::current();
            panic!(
                "SchedulerViolation: {} is owned by {:?} but was used from {:?} ({})",
                self.role,
                self.owner,
                current.id(),
                current.name().unwrap_or("unnamed")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_thread_passes() {
        let guard = ThreadGuard::current("sink");
        guard.check();
        assert!(guard.is_owner());
    }

    #[test]
    fn test_foreign_thread_panics() {
        let guard = ThreadGuard::current("sink");
        let joined = thread::spawn(move || guard.check()).join();
        assert!(joined.is_err());
    }
}
