use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;

use crate::config::ConfigurationRepository;
use crate::error::ContainerResult;
use crate::logging::{LogManager, Logger, TracingLogManager};
use crate::metadata::ApplicationMetaData;
use crate::registry::BlockFactoryRegistry;

/// Shutdown hook类型
pub type ShutdownHook = Box<dyn Fn() -> ContainerResult<()> + Send + Sync>;

/// 上下文键：block 名称
pub const BLOCK_NAME_KEY: &str = "block.name";
/// 上下文键：应用名称
pub const APP_NAME_KEY: &str = "app.name";
/// 上下文键：应用主目录
pub const APP_HOME_KEY: &str = "app.home";

/// 应用上下文
///
/// 持有一个应用的装配描述以及所有外部协作者：工厂注册表、
/// 日志管理器、配置仓库和 shutdown hooks。显式构造并以 `Arc` 向下传递。
pub struct ApplicationContext {
    metadata: ApplicationMetaData,
    home_directory: PathBuf,
    registry: BlockFactoryRegistry,
    log_manager: Arc<dyn LogManager>,
    configurations: ConfigurationRepository,
    shutdown_hooks: RwLock<Vec<ShutdownHook>>,
}

impl ApplicationContext {
    pub fn builder(metadata: ApplicationMetaData) -> ApplicationContextBuilder {
        ApplicationContextBuilder::new(metadata)
    }

    pub fn metadata(&self) -> &ApplicationMetaData {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    pub fn home_directory(&self) -> &Path {
        &self.home_directory
    }

    pub fn registry(&self) -> &BlockFactoryRegistry {
        &self.registry
    }

    pub fn configurations(&self) -> &ConfigurationRepository {
        &self.configurations
    }

    /// 为组件名称获取 Logger
    pub fn logger(&self, name: &str) -> Logger {
        self.log_manager.logger(name)
    }

    /// 注册 shutdown hook
    ///
    /// block 请求关闭时按注册顺序执行
    pub fn register_shutdown_hook<F>(&self, hook: F)
    where
        F: Fn() -> ContainerResult<()> + Send + Sync + 'static,
    {
        let mut hooks = self.shutdown_hooks.write();
        hooks.push(Box::new(hook));
        tracing::debug!("Registered shutdown hook, total: {}", hooks.len());
    }

    /// 请求关闭应用
    ///
    /// hooks 在独立的 `citadel-shutdown` 线程中按注册顺序执行，调用方立即返回。
    /// hook 因此可以直接调用 `stop()`，即使请求来自 block 的工作线程
    /// 或某个生命周期阶段内部。单个 hook 失败或 panic 不影响其他 hook。
    ///
    /// 线程无法创建时记录错误并返回 `None`。
    pub fn request_shutdown(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let context = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("citadel-shutdown".to_string())
            .spawn(move || context.run_shutdown_hooks());

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to spawn shutdown thread for '{}': {}", self.name(), e);
                None
            }
        }
    }

    fn run_shutdown_hooks(&self) {
        let hooks = self.shutdown_hooks.read();
        tracing::info!(
            "Shutdown requested for application '{}', executing {} hook(s)",
            self.name(),
            hooks.len()
        );

        for (idx, hook) in hooks.iter().enumerate() {
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| hook())) {
                Ok(Ok(())) => tracing::debug!("Shutdown hook {} executed successfully", idx + 1),
                Ok(Err(e)) => tracing::warn!("Shutdown hook {} failed: {}", idx + 1, e),
                Err(_) => tracing::error!("Shutdown hook {} panicked", idx + 1),
            }
        }
    }
}

impl fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("name", &self.name())
            .field("home_directory", &self.home_directory)
            .field("registry", &self.registry)
            .field("configurations", &self.configurations.len())
            .field("shutdown_hooks", &self.shutdown_hooks.read().len())
            .finish()
    }
}

/// ApplicationContext 构建器
pub struct ApplicationContextBuilder {
    metadata: ApplicationMetaData,
    home_directory: Option<PathBuf>,
    registry: BlockFactoryRegistry,
    log_manager: Option<Arc<dyn LogManager>>,
    configurations: ConfigurationRepository,
}

impl ApplicationContextBuilder {
    pub fn new(metadata: ApplicationMetaData) -> Self {
        Self {
            metadata,
            home_directory: None,
            registry: BlockFactoryRegistry::new(),
            log_manager: None,
            configurations: ConfigurationRepository::new(),
        }
    }

    /// 设置应用主目录（默认：当前工作目录）
    pub fn with_home_directory(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_directory = Some(home.into());
        self
    }

    pub fn with_registry(mut self, registry: BlockFactoryRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_log_manager(mut self, log_manager: Arc<dyn LogManager>) -> Self {
        self.log_manager = Some(log_manager);
        self
    }

    pub fn with_configurations(mut self, configurations: ConfigurationRepository) -> Self {
        self.configurations = configurations;
        self
    }

    pub fn build(self) -> Arc<ApplicationContext> {
        let home_directory = self
            .home_directory
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let log_manager = self.log_manager.unwrap_or_else(|| {
            Arc::new(TracingLogManager::new().with_prefix(self.metadata.name()))
        });

        Arc::new(ApplicationContext {
            metadata: self.metadata,
            home_directory,
            registry: self.registry,
            log_manager,
            configurations: self.configurations,
            shutdown_hooks: RwLock::new(Vec::new()),
        })
    }
}

/// Block 上下文
///
/// 向组件暴露只读的身份与环境信息，以及请求关闭应用的回调。
#[derive(Clone)]
pub struct BlockContext {
    name: String,
    application: Arc<ApplicationContext>,
}

impl BlockContext {
    pub fn new(name: impl Into<String>, application: Arc<ApplicationContext>) -> Self {
        Self {
            name: name.into(),
            application,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn application_name(&self) -> &str {
        self.application.name()
    }

    pub fn home_directory(&self) -> &Path {
        self.application.home_directory()
    }

    /// 按键读取上下文值：`block.name`、`app.name`、`app.home`
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            BLOCK_NAME_KEY => Some(self.name.clone()),
            APP_NAME_KEY => Some(self.application_name().to_string()),
            APP_HOME_KEY => Some(self.home_directory().display().to_string()),
            _ => None,
        }
    }

    /// 请求关闭整个应用，hooks 异步执行
    pub fn request_shutdown(&self) -> Option<JoinHandle<()>> {
        tracing::info!("Block '{}' requested application shutdown", self.name);
        self.application.request_shutdown()
    }
}

impl fmt::Debug for BlockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockContext")
            .field("name", &self.name)
            .field("application", &self.application_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContainerError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context() -> Arc<ApplicationContext> {
        ApplicationContext::builder(ApplicationMetaData::new("demo"))
            .with_home_directory("/srv/demo")
            .build()
    }

    #[test]
    fn test_block_context_keys() {
        let ctx = BlockContext::new("greeter", context());

        assert_eq!(ctx.get(BLOCK_NAME_KEY).as_deref(), Some("greeter"));
        assert_eq!(ctx.get(APP_NAME_KEY).as_deref(), Some("demo"));
        assert_eq!(ctx.get(APP_HOME_KEY).as_deref(), Some("/srv/demo"));
        assert_eq!(ctx.get("unknown"), None);
        assert_eq!(ctx.home_directory(), Path::new("/srv/demo"));
    }

    #[test]
    fn test_default_logger_is_prefixed() {
        let ctx = context();
        assert_eq!(ctx.logger("greeter").category(), "demo.greeter");
    }

    #[test]
    fn test_request_shutdown_runs_every_hook() {
        let ctx = context();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        ctx.register_shutdown_hook(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Err(ContainerError::UnknownBlock("x".to_string()))
        });
        ctx.register_shutdown_hook(|| panic!("hook blew up"));
        let c = Arc::clone(&calls);
        ctx.register_shutdown_hook(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let handle = BlockContext::new("ticker", Arc::clone(&ctx)).request_shutdown();
        handle.unwrap().join().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_request_shutdown_returns_before_hooks_run() {
        let ctx = context();
        let gate = Arc::new(parking_lot::Mutex::new(()));
        let ran = Arc::new(AtomicUsize::new(0));

        // hook 需要调用方正持有的锁，同步执行会死锁
        let (g, r) = (Arc::clone(&gate), Arc::clone(&ran));
        ctx.register_shutdown_hook(move || {
            let _held = g.lock();
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let handle = {
            let _held = gate.lock();
            let handle = ctx.request_shutdown();
            assert_eq!(ran.load(Ordering::SeqCst), 0);
            handle
        };
        handle.unwrap().join().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
