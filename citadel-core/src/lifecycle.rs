use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::component::{Block, BlockInstance};
use crate::entry::BlockEntry;
use crate::error::{ContainerError, LifecycleError};
use crate::listener::{BlockEvent, ListenerSupport};
use crate::metadata::ComponentDescriptor;
use crate::provider::ResourceProvider;
use crate::state::{Stage, State};

/// 执行单个阶段，把错误与 panic 统一归类为 LifecycleError
fn run_stage<T, F>(name: &str, stage: Stage, f: F) -> Result<T, LifecycleError>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    tracing::trace!("Block '{}': entering stage {}", name, stage);
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(LifecycleError::new(name, stage, e)),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(LifecycleError::new(
                name,
                stage,
                anyhow::anyhow!("panicked: {}", message),
            ))
        }
    }
}

/// 关闭阶段的钩子失败只记录，不向上传播
fn run_teardown<F>(name: &str, stage: Stage, f: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    if let Err(e) = run_stage(name, stage, f) {
        tracing::warn!("{}", e);
    }
}

/// 生命周期驱动器
///
/// 启动时按固定顺序执行各阶段，任何失败都终止该 block 的启动；
/// 关闭时尽力而为，钩子失败只记录，block 总会到达 DESTROYED。
pub struct LifecycleHelper {
    provider: Arc<dyn ResourceProvider>,
    listeners: Arc<ListenerSupport>,
}

impl LifecycleHelper {
    pub fn new(provider: Arc<dyn ResourceProvider>, listeners: Arc<ListenerSupport>) -> Self {
        Self {
            provider,
            listeners,
        }
    }

    /// 启动单个 block
    ///
    /// 成功后条目进入 STARTED，代理被缓存，并通知 block_added。
    /// 任何阶段失败时条目进入 FAILED，错误携带 block 名称与阶段。
    pub fn startup_block(&self, entry: &BlockEntry) -> Result<(), LifecycleError> {
        let descriptor = Arc::clone(entry.descriptor());
        tracing::debug!("Starting block '{}'", descriptor.name());

        match self.startup_stages(entry, &descriptor) {
            Ok(()) => {
                tracing::info!("Block '{}' started", descriptor.name());
                Ok(())
            }
            Err(e) => {
                entry.fail();
                tracing::error!("{}", e);
                Err(e)
            }
        }
    }

    fn startup_stages(
        &self,
        entry: &BlockEntry,
        descriptor: &Arc<ComponentDescriptor>,
    ) -> Result<(), LifecycleError> {
        let name = descriptor.name();
        let state_error = |stage: Stage| move |e: ContainerError| LifecycleError::new(name, stage, e);

        entry.set_state(State::Creating).map_err(state_error(Stage::Create))?;
        let block = run_stage(name, Stage::Create, || {
            Ok(self.provider.create_object(descriptor)?)
        })?;
        entry.set_state(State::Created).map_err(state_error(Stage::Create))?;

        let instance: BlockInstance = Arc::new(RwLock::new(block));
        entry
            .begin_start(Arc::clone(&instance))
            .map_err(state_error(Stage::Create))?;

        // 代理在任何钩子运行前构建，START 成功后才发布
        let proxy = run_stage(name, Stage::Create, || {
            Ok(self.provider.create_proxy(descriptor, Arc::clone(&instance))?)
        })?;

        let started = {
            let mut guard = instance.write();
            self.apply_startup_stages(&mut **guard, descriptor, true)
        };
        if let Err(e) = started {
            proxy.invalidate();
            return Err(e);
        }

        entry
            .activate(Arc::clone(&proxy))
            .map_err(state_error(Stage::Start))?;

        self.listeners.fire_block_added(&BlockEvent {
            name: name.to_string(),
            proxy,
            descriptor: Arc::clone(descriptor),
        });
        Ok(())
    }

    /// 依次执行 LOGGER 到 START，只向实现了对应能力的实例注入资源
    fn apply_startup_stages(
        &self,
        block: &mut dyn Block,
        descriptor: &ComponentDescriptor,
        with_services: bool,
    ) -> Result<(), LifecycleError> {
        let name = descriptor.name();
        let provider = &self.provider;

        run_stage(name, Stage::Logger, || {
            if let Some(target) = block.as_log_enabled() {
                target.enable_logging(provider.create_logger(descriptor));
            }
            Ok(())
        })?;

        run_stage(name, Stage::Context, || match block.as_contextualizable() {
            Some(target) => target.contextualize(provider.create_context(descriptor)),
            None => Ok(()),
        })?;

        if with_services {
            run_stage(name, Stage::Service, || match block.as_serviceable() {
                Some(target) => target.service(provider.create_service_manager(descriptor)?),
                None => Ok(()),
            })?;
        }

        run_stage(name, Stage::Configure, || match block.as_configurable() {
            Some(target) => target.configure(provider.create_configuration(descriptor)?),
            None => Ok(()),
        })?;

        run_stage(name, Stage::Parameterize, || match block.as_parameterizable() {
            Some(target) => target.parameterize(provider.create_parameters(descriptor)?),
            None => Ok(()),
        })?;

        run_stage(name, Stage::Initialize, || match block.as_initializable() {
            Some(target) => target.initialize(),
            None => Ok(()),
        })?;

        run_stage(name, Stage::Start, || match block.as_startable() {
            Some(target) => target.start(),
            None => Ok(()),
        })?;

        Ok(())
    }

    /// 关闭单个 block
    ///
    /// 先通知移除并使代理失效，再执行 stop 与 dispose。
    /// 钩子失败只记录；无论成功与否条目最终进入 DESTROYED。
    /// 未处于 STARTED 的条目被跳过。
    pub fn shutdown_block(&self, entry: &BlockEntry) {
        let name = entry.name();
        let Some((instance, proxy)) = entry.begin_stop() else {
            tracing::debug!("Skipping shutdown of block '{}' in state {}", name, entry.state());
            return;
        };
        tracing::debug!("Stopping block '{}'", name);

        self.listeners.fire_block_removed(&BlockEvent {
            name: name.to_string(),
            proxy: Arc::clone(&proxy),
            descriptor: Arc::clone(entry.descriptor()),
        });
        proxy.invalidate();

        {
            let mut guard = instance.write();
            let block: &mut dyn Block = &mut **guard;
            run_teardown(name, Stage::Stop, || match block.as_startable() {
                Some(target) => target.stop(),
                None => Ok(()),
            });
        }
        drop(instance);

        if let Err(e) = entry.set_state(State::Stopped) {
            tracing::warn!("{}", e);
        }

        match entry.begin_destroy() {
            Ok(Some(instance)) => {
                let mut guard = instance.write();
                let block: &mut dyn Block = &mut **guard;
                run_teardown(name, Stage::Dispose, || match block.as_disposable() {
                    Some(target) => target.dispose(),
                    None => Ok(()),
                });
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("{}", e),
        }

        entry.destroyed();
        tracing::info!("Block '{}' destroyed", name);
    }

    /// 启动监听器
    ///
    /// 监听器不参与依赖解析，其余启动阶段与 block 相同。
    pub fn startup_listener(
        &self,
        descriptor: &ComponentDescriptor,
    ) -> Result<BlockInstance, LifecycleError> {
        let name = descriptor.name();
        tracing::debug!("Starting listener '{}'", name);

        let mut block = run_stage(name, Stage::Create, || {
            Ok(self.provider.create_object(descriptor)?)
        })?;
        self.apply_startup_stages(&mut *block, descriptor, false)?;

        Ok(Arc::new(RwLock::new(block)))
    }

    /// 关闭监听器，失败只记录
    pub fn shutdown_listener(&self, name: &str, instance: BlockInstance) {
        let mut guard = instance.write();
        let block: &mut dyn Block = &mut **guard;
        run_teardown(name, Stage::Stop, || match block.as_startable() {
            Some(target) => target.stop(),
            None => Ok(()),
        });
        run_teardown(name, Stage::Dispose, || match block.as_disposable() {
            Some(target) => target.dispose(),
            None => Ok(()),
        });
        tracing::debug!("Listener '{}' disposed", name);
    }
}
