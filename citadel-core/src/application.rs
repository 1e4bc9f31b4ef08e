use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::ApplicationContext;
use crate::entry::BlockTable;
use crate::error::{ApplicationError, ApplicationResult, ContainerError};
use crate::graph::DependencyGraph;
use crate::lifecycle::LifecycleHelper;
use crate::listener::ListenerSupport;
use crate::metadata::{ApplicationMetaData, ComponentDescriptor};
use crate::provider::{BlockResourceProvider, ResourceProvider};
use crate::proxy::BlockProxy;
use crate::state::{Phase, State};
use crate::verifier::AssemblyVerifier;

/// 应用 trait - 一个可部署单元的生命周期接口
pub trait Application: Send + Sync {
    fn name(&self) -> &str;

    /// 按依赖顺序启动所有 block
    fn start(&self) -> ApplicationResult<()>;

    /// 按依赖的逆序关闭所有已启动的 block
    fn stop(&self) -> ApplicationResult<()>;

    /// 等价于 `stop()` 后 `start()`
    fn restart(&self) -> ApplicationResult<()> {
        self.stop()?;
        self.start()
    }

    /// 所有 block 名称（无序）
    fn block_names(&self) -> Vec<String>;

    /// 已启动 block 的代理
    fn block(&self, name: &str) -> Option<Arc<BlockProxy>>;
}

/// 默认应用实现
///
/// 生命周期阶段在调用线程中同步执行，同一时刻只有一个阶段在运行。
/// 名称查找可以与阶段并发进行。
pub struct DefaultApplication {
    context: Arc<ApplicationContext>,
    entries: Arc<BlockTable>,
    listeners: Arc<ListenerSupport>,
    helper: LifecycleHelper,
    phase: Mutex<()>,
    initialized: AtomicBool,
    running: AtomicBool,
}

impl DefaultApplication {
    pub fn new(context: Arc<ApplicationContext>) -> Self {
        let entries = Arc::new(BlockTable::new());
        let provider = Arc::new(BlockResourceProvider::new(
            Arc::clone(&context),
            Arc::clone(&entries),
        ));
        Self::with_provider(context, entries, provider)
    }

    /// 使用自定义资源提供者
    ///
    /// `entries` 应与提供者解析依赖时使用的条目表相同。
    pub fn with_provider(
        context: Arc<ApplicationContext>,
        entries: Arc<BlockTable>,
        provider: Arc<dyn ResourceProvider>,
    ) -> Self {
        let listeners = Arc::new(ListenerSupport::new());
        let helper = LifecycleHelper::new(provider, Arc::clone(&listeners));
        Self {
            context,
            entries,
            listeners,
            helper,
            phase: Mutex::new(()),
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &Arc<ApplicationContext> {
        &self.context
    }

    pub fn metadata(&self) -> &ApplicationMetaData {
        self.context.metadata()
    }

    pub fn home_directory(&self) -> &Path {
        self.context.home_directory()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn block_state(&self, name: &str) -> Option<State> {
        self.entries.get(name).map(|e| e.state())
    }

    /// 校验装配并加载监听器
    ///
    /// 重复调用无副作用。所有 block 以 VOID 状态登记。
    pub fn initialize(&self) -> ApplicationResult<()> {
        let _phase = self.phase.lock();
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        let metadata = self.context.metadata();
        AssemblyVerifier::verify(metadata, self.context.registry())?;

        for descriptor in metadata.listeners() {
            if let Err(e) = self.load_listener(descriptor) {
                self.release_listeners();
                return Err(e);
            }
        }

        self.entries.assemble(metadata.blocks());
        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!(
            "Application '{}' initialized with {} block(s) and {} listener(s)",
            self.name(),
            metadata.blocks().len(),
            self.listeners.len()
        );
        Ok(())
    }

    fn load_listener(&self, descriptor: &ComponentDescriptor) -> ApplicationResult<()> {
        let name = descriptor.name();
        let instance = self
            .helper
            .startup_listener(descriptor)
            .map_err(|source| ApplicationError::ListenerFailed {
                name: name.to_string(),
                source,
            })?;

        let is_listener = {
            let block = instance.read();
            block.as_block_listener().is_some() || block.as_application_listener().is_some()
        };
        if !is_listener {
            self.helper.shutdown_listener(name, instance);
            return Err(ApplicationError::NotAListener(name.to_string()));
        }

        self.listeners.add(name, instance);
        tracing::debug!("Registered listener '{}'", name);
        Ok(())
    }

    fn release_listeners(&self) {
        for (name, instance) in self.listeners.drain().into_iter().rev() {
            self.helper.shutdown_listener(&name, instance);
        }
    }

    fn run_startup(&self) -> ApplicationResult<()> {
        let order = DependencyGraph::walk(Phase::Startup, self.metadata().blocks())?;
        tracing::debug!("Startup order: {:?}", order);

        for name in &order {
            let entry = self
                .entries
                .get(name)
                .ok_or_else(|| ContainerError::UnknownBlock(name.clone()))?;
            self.helper
                .startup_block(&entry)
                .map_err(|source| ApplicationError::PhaseFailed {
                    phase: Phase::Startup,
                    source,
                })?;
        }
        Ok(())
    }

    fn run_shutdown(&self) {
        let blocks = self.metadata().blocks();
        let order = DependencyGraph::walk(Phase::Shutdown, blocks).unwrap_or_else(|e| {
            tracing::error!("Cannot order shutdown ({}); using reverse declaration order", e);
            blocks.iter().rev().map(|b| b.name().to_string()).collect()
        });
        tracing::debug!("Shutdown order: {:?}", order);

        for name in &order {
            if let Some(entry) = self.entries.get(name) {
                self.helper.shutdown_block(&entry);
            }
        }
    }

    /// 释放应用
    ///
    /// 仍在运行时先关闭，然后按注册的逆序释放监听器并清空条目表。
    /// 之后需要重新 `initialize()` 才能启动。
    pub fn dispose(&self) {
        if self.is_running() || self.entries.any_live() {
            if let Err(e) = self.stop() {
                tracing::warn!("Stop during dispose failed: {}", e);
            }
        }

        let _phase = self.phase.lock();
        self.release_listeners();
        self.entries.clear();
        self.initialized.store(false, Ordering::SeqCst);
        tracing::info!("Application '{}' disposed", self.name());
    }
}

impl Application for DefaultApplication {
    fn name(&self) -> &str {
        self.context.name()
    }

    /// 启动失败时不回滚：已启动的 block 保持 STARTED，
    /// 调用方应显式 `stop()` 释放。
    fn start(&self) -> ApplicationResult<()> {
        let _phase = self.phase.lock();
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(ApplicationError::NotInitialized(self.name().to_string()));
        }
        if self.is_running() || self.entries.any_live() {
            return Err(ApplicationError::AlreadyRunning(self.name().to_string()));
        }

        tracing::info!("Starting application '{}'", self.name());
        self.listeners.fire_application_starting(self.metadata());
        self.entries.assemble(self.metadata().blocks());

        match self.run_startup() {
            Ok(()) => {
                self.running.store(true, Ordering::SeqCst);
                self.listeners.fire_application_started();
                tracing::info!("Application '{}' started", self.name());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Application '{}' failed to start: {}", self.name(), e);
                self.listeners.fire_application_failure(&e);
                Err(e)
            }
        }
    }

    /// 关闭过程尽力而为：单个 block 的失败只记录，不会中断。
    /// 启动失败后仍可调用，用于释放已启动的部分。
    fn stop(&self) -> ApplicationResult<()> {
        let _phase = self.phase.lock();
        if !self.is_running() && !self.entries.any_live() {
            return Err(ApplicationError::NotRunning(self.name().to_string()));
        }

        tracing::info!("Stopping application '{}'", self.name());
        self.listeners.fire_application_stopping();
        self.run_shutdown();
        self.running.store(false, Ordering::SeqCst);
        self.listeners.fire_application_stopped();
        tracing::info!("Application '{}' stopped", self.name());
        Ok(())
    }

    fn block_names(&self) -> Vec<String> {
        self.entries.names()
    }

    fn block(&self, name: &str) -> Option<Arc<BlockProxy>> {
        self.entries.get(name).and_then(|e| e.proxy())
    }
}
