//! 测试用的 spy block 与监听器

use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::{
    Block, Configurable, Contextualizable, Disposable, Initializable, LogEnabled,
    Parameterizable, Serviceable, Startable,
};
use crate::config::{Configuration, Parameters};
use crate::context::BlockContext;
use crate::error::ApplicationError;
use crate::listener::{ApplicationListener, BlockEvent, BlockListener};
use crate::logging::Logger;
use crate::metadata::ApplicationMetaData;
use crate::registry::{BlockFactory, BlockFactoryRegistry};
use crate::service::ServiceManager;
use crate::service_export;
use crate::state::Stage;

pub(crate) type Journal = Arc<Mutex<Vec<String>>>;

pub(crate) fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// 按前缀过滤记录
pub(crate) fn entries_for(journal: &Journal, prefix: &str) -> Vec<String> {
    journal
        .lock()
        .iter()
        .filter(|e| e.starts_with(prefix))
        .cloned()
        .collect()
}

pub(crate) fn position(journal: &Journal, entry: &str) -> Option<usize> {
    journal.lock().iter().position(|e| e == entry)
}

pub(crate) trait Pinger: Send + Sync {
    fn ping(&self) -> String;
}

/// Spy 的能力与故障注入
#[derive(Debug, Clone)]
pub(crate) struct SpySpec {
    capabilities: Vec<Stage>,
    fail_at: Option<Stage>,
    panic_at: Option<Stage>,
}

impl SpySpec {
    /// 实现全部能力
    pub(crate) fn full() -> Self {
        Self {
            capabilities: vec![
                Stage::Logger,
                Stage::Context,
                Stage::Service,
                Stage::Configure,
                Stage::Parameterize,
                Stage::Initialize,
                Stage::Start,
                Stage::Stop,
                Stage::Dispose,
            ],
            fail_at: None,
            panic_at: None,
        }
    }

    /// 不实现任何能力
    pub(crate) fn bare() -> Self {
        Self {
            capabilities: Vec::new(),
            fail_at: None,
            panic_at: None,
        }
    }

    pub(crate) fn only(stages: &[Stage]) -> Self {
        Self {
            capabilities: stages.to_vec(),
            ..Self::bare()
        }
    }

    pub(crate) fn without(mut self, stage: Stage) -> Self {
        self.capabilities.retain(|s| *s != stage);
        self
    }

    pub(crate) fn failing_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    pub(crate) fn panicking_at(mut self, stage: Stage) -> Self {
        self.panic_at = Some(stage);
        self
    }

    fn has(&self, stage: Stage) -> bool {
        self.capabilities.contains(&stage)
    }
}

/// 记录每个阶段调用的 block
///
/// 记录格式为 `名称:阶段`；启动时会 ping 所有依赖，记录为 `名称:called:依赖`。
pub(crate) struct Spy {
    name: String,
    spec: SpySpec,
    journal: Journal,
    services: Option<ServiceManager>,
}

impl Spy {
    fn record(&self, stage: Stage) -> anyhow::Result<()> {
        self.journal.lock().push(format!("{}:{}", self.name, stage));
        if self.spec.panic_at == Some(stage) {
            panic!("{} panicked at {}", self.name, stage);
        }
        if self.spec.fail_at == Some(stage) {
            anyhow::bail!("{} failed at {}", self.name, stage);
        }
        Ok(())
    }

    fn capable(&mut self, stage: Stage) -> Option<&mut Self> {
        if self.spec.has(stage) {
            Some(self)
        } else {
            None
        }
    }
}

impl Block for Spy {
    fn as_log_enabled(&mut self) -> Option<&mut dyn LogEnabled> {
        self.capable(Stage::Logger).map(|s| s as &mut dyn LogEnabled)
    }

    fn as_contextualizable(&mut self) -> Option<&mut dyn Contextualizable> {
        self.capable(Stage::Context).map(|s| s as &mut dyn Contextualizable)
    }

    fn as_serviceable(&mut self) -> Option<&mut dyn Serviceable> {
        self.capable(Stage::Service).map(|s| s as &mut dyn Serviceable)
    }

    fn as_configurable(&mut self) -> Option<&mut dyn Configurable> {
        self.capable(Stage::Configure).map(|s| s as &mut dyn Configurable)
    }

    fn as_parameterizable(&mut self) -> Option<&mut dyn Parameterizable> {
        self.capable(Stage::Parameterize).map(|s| s as &mut dyn Parameterizable)
    }

    fn as_initializable(&mut self) -> Option<&mut dyn Initializable> {
        self.capable(Stage::Initialize).map(|s| s as &mut dyn Initializable)
    }

    fn as_startable(&mut self) -> Option<&mut dyn Startable> {
        if self.spec.has(Stage::Start) || self.spec.has(Stage::Stop) {
            Some(self)
        } else {
            None
        }
    }

    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        self.capable(Stage::Dispose).map(|s| s as &mut dyn Disposable)
    }
}

impl LogEnabled for Spy {
    fn enable_logging(&mut self, logger: Logger) {
        let _ = self.record(Stage::Logger);
        logger.debug("logging enabled");
    }
}

impl Contextualizable for Spy {
    fn contextualize(&mut self, context: BlockContext) -> anyhow::Result<()> {
        assert_eq!(context.name(), self.name);
        self.record(Stage::Context)
    }
}

impl Serviceable for Spy {
    fn service(&mut self, services: ServiceManager) -> anyhow::Result<()> {
        self.services = Some(services);
        self.record(Stage::Service)
    }
}

impl Configurable for Spy {
    fn configure(&mut self, _configuration: Configuration) -> anyhow::Result<()> {
        self.record(Stage::Configure)
    }
}

impl Parameterizable for Spy {
    fn parameterize(&mut self, _parameters: Parameters) -> anyhow::Result<()> {
        self.record(Stage::Parameterize)
    }
}

impl Initializable for Spy {
    fn initialize(&mut self) -> anyhow::Result<()> {
        self.record(Stage::Initialize)
    }
}

impl Startable for Spy {
    fn start(&mut self) -> anyhow::Result<()> {
        if !self.spec.has(Stage::Start) {
            return Ok(());
        }
        self.record(Stage::Start)?;
        if let Some(services) = &self.services {
            for role in services.roles() {
                for proxy in services.lookup_all(role) {
                    let reply = proxy.invoke::<dyn Pinger, _>(|pinger| pinger.ping())?;
                    self.journal
                        .lock()
                        .push(format!("{}:called:{}", self.name, reply));
                }
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        if !self.spec.has(Stage::Stop) {
            return Ok(());
        }
        self.record(Stage::Stop)
    }
}

impl Disposable for Spy {
    fn dispose(&mut self) -> anyhow::Result<()> {
        self.record(Stage::Dispose)
    }
}

impl Pinger for Spy {
    fn ping(&self) -> String {
        self.name.clone()
    }
}

/// 实现键与 block 名称相同的 spy 工厂，导出 `ping` 服务
pub(crate) fn spy_factory(name: &str, spec: SpySpec, journal: &Journal) -> BlockFactory {
    let block_name = name.to_string();
    let journal = Arc::clone(journal);
    BlockFactory::new(name, move || {
        Ok(Box::new(Spy {
            name: block_name.clone(),
            spec: spec.clone(),
            journal: Arc::clone(&journal),
            services: None,
        }) as Box<dyn Block>)
    })
    .with_export(service_export!(Spy as dyn Pinger, "ping"))
}

pub(crate) fn spy_registry(spies: &[(&str, SpySpec)], journal: &Journal) -> BlockFactoryRegistry {
    let registry = BlockFactoryRegistry::new();
    for (name, spec) in spies {
        registry
            .register(spy_factory(name, spec.clone(), journal))
            .unwrap();
    }
    registry
}

/// 记录所有回调的监听器
pub(crate) struct RecordingListener {
    journal: Journal,
}

impl Block for RecordingListener {
    fn as_block_listener(&self) -> Option<&dyn BlockListener> {
        Some(self)
    }

    fn as_application_listener(&self) -> Option<&dyn ApplicationListener> {
        Some(self)
    }
}

impl RecordingListener {
    fn push(&self, entry: String) {
        self.journal.lock().push(entry);
    }
}

impl BlockListener for RecordingListener {
    fn block_added(&self, event: &BlockEvent) {
        assert!(event.proxy.is_valid());
        self.push(format!("listener:added:{}", event.name));
    }

    fn block_removed(&self, event: &BlockEvent) {
        self.push(format!("listener:removed:{}", event.name));
    }
}

impl ApplicationListener for RecordingListener {
    fn application_starting(&self, metadata: &ApplicationMetaData) {
        self.push(format!("listener:starting:{}", metadata.name()));
    }

    fn application_started(&self) {
        self.push("listener:started".to_string());
    }

    fn application_stopping(&self) {
        self.push("listener:stopping".to_string());
    }

    fn application_stopped(&self) {
        self.push("listener:stopped".to_string());
    }

    fn application_failure(&self, cause: &ApplicationError) {
        self.push(format!("listener:failure:{}", cause.block().unwrap_or("-")));
    }
}

pub(crate) fn listener_factory(key: &str, journal: &Journal) -> BlockFactory {
    let journal = Arc::clone(journal);
    BlockFactory::new(key, move || {
        Ok(Box::new(RecordingListener {
            journal: Arc::clone(&journal),
        }) as Box<dyn Block>)
    })
}
