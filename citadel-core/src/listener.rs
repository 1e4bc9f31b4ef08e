use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::{Block, BlockInstance};
use crate::error::ApplicationError;
use crate::metadata::{ApplicationMetaData, ComponentDescriptor};
use crate::proxy::BlockProxy;

/// Block 事件
#[derive(Debug, Clone)]
pub struct BlockEvent {
    pub name: String,
    pub proxy: Arc<BlockProxy>,
    pub descriptor: Arc<ComponentDescriptor>,
}

/// Block 监听器
///
/// 在 block 启动完成后以及开始关闭前收到通知。
pub trait BlockListener: Send + Sync {
    fn block_added(&self, event: &BlockEvent) {
        let _ = event;
    }

    fn block_removed(&self, event: &BlockEvent) {
        let _ = event;
    }
}

/// 应用监听器
pub trait ApplicationListener: Send + Sync {
    fn application_starting(&self, metadata: &ApplicationMetaData) {
        let _ = metadata;
    }

    fn application_started(&self) {}

    fn application_stopping(&self) {}

    fn application_stopped(&self) {}

    fn application_failure(&self, cause: &ApplicationError) {
        let _ = cause;
    }
}

#[derive(Clone)]
struct RegisteredListener {
    name: String,
    instance: BlockInstance,
}

/// 监听器集合
///
/// 写时复制：修改在锁内替换整个快照，通知时遍历快照而不持锁。
/// 通知同步进行并按注册顺序；监听器 panic 会被记录，不会中断通知。
#[derive(Default)]
pub struct ListenerSupport {
    listeners: Mutex<Arc<Vec<RegisteredListener>>>,
}

impl ListenerSupport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, name: impl Into<String>, instance: BlockInstance) {
        let mut listeners = self.listeners.lock();
        let mut next = Vec::clone(&listeners);
        next.push(RegisteredListener {
            name: name.into(),
            instance,
        });
        *listeners = Arc::new(next);
    }

    /// 清空并按注册顺序返回所有监听器
    pub fn drain(&self) -> Vec<(String, BlockInstance)> {
        let mut listeners = self.listeners.lock();
        let previous = std::mem::take(&mut *listeners);
        previous
            .iter()
            .map(|l| (l.name.clone(), Arc::clone(&l.instance)))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|l| l.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    fn snapshot(&self) -> Arc<Vec<RegisteredListener>> {
        Arc::clone(&self.listeners.lock())
    }

    fn notify<F>(&self, event: &str, f: F)
    where
        F: Fn(&dyn Block),
    {
        for listener in self.snapshot().iter() {
            let guard = listener.instance.read();
            if catch_unwind(AssertUnwindSafe(|| f(&**guard))).is_err() {
                tracing::error!(
                    "Listener '{}' panicked while handling {}",
                    listener.name,
                    event
                );
            }
        }
    }

    pub fn fire_block_added(&self, event: &BlockEvent) {
        tracing::debug!("Firing block_added for '{}'", event.name);
        self.notify("block_added", |block| {
            if let Some(listener) = block.as_block_listener() {
                listener.block_added(event);
            }
        });
    }

    pub fn fire_block_removed(&self, event: &BlockEvent) {
        tracing::debug!("Firing block_removed for '{}'", event.name);
        self.notify("block_removed", |block| {
            if let Some(listener) = block.as_block_listener() {
                listener.block_removed(event);
            }
        });
    }

    pub fn fire_application_starting(&self, metadata: &ApplicationMetaData) {
        self.notify("application_starting", |block| {
            if let Some(listener) = block.as_application_listener() {
                listener.application_starting(metadata);
            }
        });
    }

    pub fn fire_application_started(&self) {
        self.notify("application_started", |block| {
            if let Some(listener) = block.as_application_listener() {
                listener.application_started();
            }
        });
    }

    pub fn fire_application_stopping(&self) {
        self.notify("application_stopping", |block| {
            if let Some(listener) = block.as_application_listener() {
                listener.application_stopping();
            }
        });
    }

    pub fn fire_application_stopped(&self) {
        self.notify("application_stopped", |block| {
            if let Some(listener) = block.as_application_listener() {
                listener.application_stopped();
            }
        });
    }

    pub fn fire_application_failure(&self, cause: &ApplicationError) {
        self.notify("application_failure", |block| {
            if let Some(listener) = block.as_application_listener() {
                listener.application_failure(cause);
            }
        });
    }
}
