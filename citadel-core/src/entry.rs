use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::component::BlockInstance;
use crate::error::{ContainerError, ContainerResult};
use crate::metadata::ComponentDescriptor;
use crate::proxy::BlockProxy;
use crate::state::State;

struct EntryState {
    state: State,
    instance: Option<BlockInstance>,
    proxy: Option<Arc<BlockProxy>>,
}

/// Block 运行时条目
///
/// 独占持有实例。实例只在 STARTING 到 STOPPED 之间存在，
/// 进入 DESTROYING、DESTROYED 或 FAILED 时被移出。
/// 状态、实例与代理的修改都在条目锁内完成。
pub struct BlockEntry {
    descriptor: Arc<ComponentDescriptor>,
    inner: Mutex<EntryState>,
}

impl BlockEntry {
    pub fn new(descriptor: Arc<ComponentDescriptor>) -> Self {
        Self {
            descriptor,
            inner: Mutex::new(EntryState {
                state: State::Void,
                instance: None,
                proxy: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &Arc<ComponentDescriptor> {
        &self.descriptor
    }

    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// 已启动时返回代理
    pub fn proxy(&self) -> Option<Arc<BlockProxy>> {
        let inner = self.inner.lock();
        match inner.state {
            State::Started => inner.proxy.clone(),
            _ => None,
        }
    }

    fn transition(&self, inner: &mut EntryState, to: State) -> ContainerResult<()> {
        if !inner.state.can_transition_to(to) {
            return Err(ContainerError::IllegalStateTransition {
                name: self.name().to_string(),
                from: inner.state,
                to,
            });
        }
        tracing::trace!("Block '{}': {} -> {}", self.name(), inner.state, to);
        inner.state = to;
        Ok(())
    }

    /// 推进到下一个不涉及实例的状态
    pub fn set_state(&self, to: State) -> ContainerResult<()> {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, to)
    }

    /// CREATED -> STARTING，保存新创建的实例
    pub fn begin_start(&self, instance: BlockInstance) -> ContainerResult<()> {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, State::Starting)?;
        inner.instance = Some(instance);
        Ok(())
    }

    /// STARTING -> STARTED，保存代理
    pub fn activate(&self, proxy: Arc<BlockProxy>) -> ContainerResult<()> {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, State::Started)?;
        inner.proxy = Some(proxy);
        Ok(())
    }

    /// 进入 FAILED，丢弃实例与代理
    pub fn fail(&self) {
        let mut inner = self.inner.lock();
        if let Some(proxy) = inner.proxy.take() {
            proxy.invalidate();
        }
        inner.instance = None;
        if inner.state.is_terminal() {
            return;
        }
        tracing::trace!("Block '{}': {} -> {}", self.name(), inner.state, State::Failed);
        inner.state = State::Failed;
    }

    /// STARTED -> STOPPING，返回实例与代理供关闭使用
    ///
    /// 未处于 STARTED 时返回 `None`。
    pub fn begin_stop(&self) -> Option<(BlockInstance, Arc<BlockProxy>)> {
        let mut inner = self.inner.lock();
        if inner.state != State::Started {
            return None;
        }
        let instance = inner.instance.clone()?;
        let proxy = inner.proxy.clone()?;
        inner.state = State::Stopping;
        Some((instance, proxy))
    }

    /// STOPPED -> DESTROYING，移出实例
    pub fn begin_destroy(&self) -> ContainerResult<Option<BlockInstance>> {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, State::Destroying)?;
        inner.proxy = None;
        Ok(inner.instance.take())
    }

    /// 无条件进入 DESTROYED 并释放实例
    pub fn destroyed(&self) {
        let mut inner = self.inner.lock();
        inner.instance = None;
        inner.proxy = None;
        if inner.state != State::Destroying {
            tracing::warn!(
                "Block '{}' forced to {} from {}",
                self.name(),
                State::Destroyed,
                inner.state
            );
        }
        inner.state = State::Destroyed;
    }

    #[cfg(test)]
    pub(crate) fn holds_instance(&self) -> bool {
        self.inner.lock().instance.is_some()
    }
}

impl fmt::Debug for BlockEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockEntry")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

/// 应用内的条目表：名称到条目
#[derive(Debug, Default)]
pub struct BlockTable {
    entries: RwLock<HashMap<String, Arc<BlockEntry>>>,
}

impl BlockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以 VOID 状态重新装配所有条目
    pub fn assemble(&self, blocks: &[ComponentDescriptor]) {
        let fresh = blocks
            .iter()
            .map(|d| {
                let entry = BlockEntry::new(Arc::new(d.clone()));
                (d.name().to_string(), Arc::new(entry))
            })
            .collect();
        *self.entries.write() = fresh;
    }

    pub fn get(&self, name: &str) -> Option<Arc<BlockEntry>> {
        self.entries.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// 是否有条目持有存活实例
    pub fn any_live(&self) -> bool {
        self.entries.read().values().any(|e| e.state().is_live())
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Block;

    struct Inert;

    impl Block for Inert {}

    fn instance() -> BlockInstance {
        Arc::new(RwLock::new(Box::new(Inert) as Box<dyn Block>))
    }

    fn entry() -> BlockEntry {
        BlockEntry::new(Arc::new(ComponentDescriptor::new("a", "inert")))
    }

    fn start(entry: &BlockEntry) -> Arc<BlockProxy> {
        entry.set_state(State::Creating).unwrap();
        entry.set_state(State::Created).unwrap();
        let instance = instance();
        entry.begin_start(Arc::clone(&instance)).unwrap();
        let proxy = Arc::new(BlockProxy::wrap("a", instance, Vec::new()));
        entry.activate(Arc::clone(&proxy)).unwrap();
        proxy
    }

    #[test]
    fn test_full_lifecycle_keeps_instance_invariant() {
        let entry = entry();
        assert_eq!(entry.state(), State::Void);
        assert!(!entry.holds_instance());

        start(&entry);
        assert_eq!(entry.state(), State::Started);
        assert!(entry.holds_instance());
        assert!(entry.proxy().is_some());

        let (_, proxy) = entry.begin_stop().unwrap();
        assert_eq!(entry.state(), State::Stopping);
        assert!(entry.proxy().is_none());
        proxy.invalidate();

        entry.set_state(State::Stopped).unwrap();
        let taken = entry.begin_destroy().unwrap();
        assert!(taken.is_some());
        assert!(!entry.holds_instance());
        assert_eq!(entry.state(), State::Destroying);

        entry.destroyed();
        assert_eq!(entry.state(), State::Destroyed);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let entry = entry();
        assert!(matches!(
            entry.set_state(State::Started),
            Err(ContainerError::IllegalStateTransition { from: State::Void, to: State::Started, .. })
        ));
        assert!(entry.begin_stop().is_none());
    }

    #[test]
    fn test_fail_drops_instance_and_invalidates() {
        let entry = entry();
        let proxy = start(&entry);

        entry.fail();
        assert_eq!(entry.state(), State::Failed);
        assert!(!entry.holds_instance());
        assert!(!proxy.is_valid());

        // FAILED 是终止状态
        entry.fail();
        assert_eq!(entry.state(), State::Failed);
        assert!(entry.set_state(State::Creating).is_err());
    }

    #[test]
    fn test_table_assemble_replaces_entries() {
        let table = BlockTable::new();
        let blocks = vec![
            ComponentDescriptor::new("a", "inert"),
            ComponentDescriptor::new("b", "inert"),
        ];
        table.assemble(&blocks);
        assert_eq!(table.len(), 2);
        assert!(!table.any_live());

        start(&table.get("a").unwrap());
        assert!(table.any_live());

        table.assemble(&blocks);
        assert_eq!(table.get("a").unwrap().state(), State::Void);

        let mut names = table.names();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);

        table.clear();
        assert!(table.is_empty());
    }
}
