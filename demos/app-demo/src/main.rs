use citadel_core::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

// ==================== 服务接口 ====================

trait Clock: Send + Sync {
    fn now_millis(&self) -> u128;
}

trait Greeter: Send + Sync {
    fn greet(&self, who: &str) -> anyhow::Result<String>;
}

// ==================== Block 定义 ====================

/// 系统时钟 - 不需要任何生命周期能力
#[derive(Default)]
struct SystemClock;

impl Block for SystemClock {}

impl Clock for SystemClock {
    fn now_millis(&self) -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
    }
}

/// 问候服务 - 依赖时钟，从配置读取问候语
#[derive(Default)]
struct GreeterBlock {
    logger: Option<Logger>,
    clock: Option<Arc<BlockProxy>>,
    greeting: String,
    audience: String,
}

impl Block for GreeterBlock {
    fn as_log_enabled(&mut self) -> Option<&mut dyn LogEnabled> {
        Some(self)
    }

    fn as_serviceable(&mut self) -> Option<&mut dyn Serviceable> {
        Some(self)
    }

    fn as_configurable(&mut self) -> Option<&mut dyn Configurable> {
        Some(self)
    }
}

impl LogEnabled for GreeterBlock {
    fn enable_logging(&mut self, logger: Logger) {
        self.logger = Some(logger);
    }
}

impl Serviceable for GreeterBlock {
    fn service(&mut self, services: ServiceManager) -> anyhow::Result<()> {
        self.clock = Some(services.lookup("clock")?);
        Ok(())
    }
}

impl Configurable for GreeterBlock {
    fn configure(&mut self, configuration: Configuration) -> anyhow::Result<()> {
        self.greeting = configuration.attribute_or("greeting", "Hello").to_string();
        self.audience = configuration.attribute("audience")?.to_string();
        if let Some(logger) = &self.logger {
            logger.info(format!("Greeting '{}' to '{}'", self.greeting, self.audience));
        }
        Ok(())
    }
}

impl Greeter for GreeterBlock {
    fn greet(&self, who: &str) -> anyhow::Result<String> {
        let clock = self
            .clock
            .as_ref()
            .ok_or_else(|| anyhow!("greeter has no clock"))?;
        let now = clock.invoke::<dyn Clock, _>(|c| c.now_millis())?;
        Ok(format!("{}, {} from {} at {}", self.greeting, who, self.audience, now))
    }
}

/// 定时调用问候服务，达到次数后请求关闭应用
#[derive(Default)]
struct Ticker {
    logger: Option<Logger>,
    context: Option<BlockContext>,
    greeter: Option<Arc<BlockProxy>>,
    interval: Duration,
    ticks: i64,
    stopping: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Block for Ticker {
    fn as_log_enabled(&mut self) -> Option<&mut dyn LogEnabled> {
        Some(self)
    }

    fn as_contextualizable(&mut self) -> Option<&mut dyn Contextualizable> {
        Some(self)
    }

    fn as_serviceable(&mut self) -> Option<&mut dyn Serviceable> {
        Some(self)
    }

    fn as_configurable(&mut self) -> Option<&mut dyn Configurable> {
        Some(self)
    }

    fn as_startable(&mut self) -> Option<&mut dyn Startable> {
        Some(self)
    }
}

impl LogEnabled for Ticker {
    fn enable_logging(&mut self, logger: Logger) {
        self.logger = Some(logger);
    }
}

impl Contextualizable for Ticker {
    fn contextualize(&mut self, context: BlockContext) -> anyhow::Result<()> {
        self.context = Some(context);
        Ok(())
    }
}

impl Serviceable for Ticker {
    fn service(&mut self, services: ServiceManager) -> anyhow::Result<()> {
        self.greeter = Some(services.lookup("greeter")?);
        Ok(())
    }
}

impl Configurable for Ticker {
    fn configure(&mut self, configuration: Configuration) -> anyhow::Result<()> {
        let interval = configuration.attribute_as_i64_or("interval-ms", 500)?;
        self.interval = Duration::from_millis(u64::try_from(interval)?);
        self.ticks = configuration.attribute_as_i64_or("ticks", 3)?;
        Ok(())
    }
}

impl Startable for Ticker {
    fn start(&mut self) -> anyhow::Result<()> {
        let greeter = self
            .greeter
            .clone()
            .ok_or_else(|| anyhow!("ticker has no greeter"))?;
        let context = self
            .context
            .clone()
            .ok_or_else(|| anyhow!("ticker has no context"))?;
        let logger = self
            .logger
            .clone()
            .unwrap_or_else(|| Logger::new(context.name()));
        let stopping = Arc::clone(&self.stopping);
        let interval = self.interval;
        let ticks = self.ticks;

        let worker = std::thread::Builder::new()
            .name("ticker".to_string())
            .spawn(move || {
                for tick in 1..=ticks {
                    if stopping.load(Ordering::SeqCst) {
                        return;
                    }
                    std::thread::sleep(interval);
                    let who = format!("tick #{}", tick);
                    match greeter.invoke::<dyn Greeter, _>(|g| g.greet(&who)) {
                        Ok(Ok(message)) => logger.info(&message),
                        Ok(Err(e)) => logger.warn(format!("Greeting failed: {}", e)),
                        Err(e) => {
                            logger.warn(format!("Greeter unavailable: {}", e));
                            return;
                        }
                    }
                }
                logger.info("Done ticking, requesting shutdown");
                // hooks 在独立线程中执行，这里不等待
                let _ = context.request_shutdown();
            })?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| anyhow!("ticker thread panicked"))?;
        }
        Ok(())
    }
}

/// 审计监听器 - 记录所有生命周期事件
#[derive(Default)]
struct AuditListener;

impl Block for AuditListener {
    fn as_block_listener(&self) -> Option<&dyn BlockListener> {
        Some(self)
    }

    fn as_application_listener(&self) -> Option<&dyn ApplicationListener> {
        Some(self)
    }
}

impl BlockListener for AuditListener {
    fn block_added(&self, event: &BlockEvent) {
        let services: Vec<&str> = event.proxy.services().collect();
        tracing::info!("[audit] block '{}' added, services: {:?}", event.name, services);
    }

    fn block_removed(&self, event: &BlockEvent) {
        tracing::info!("[audit] block '{}' removed", event.name);
    }
}

impl ApplicationListener for AuditListener {
    fn application_starting(&self, metadata: &ApplicationMetaData) {
        tracing::info!(
            "[audit] application '{}' starting with {} block(s)",
            metadata.name(),
            metadata.blocks().len()
        );
    }

    fn application_started(&self) {
        tracing::info!("[audit] application started");
    }

    fn application_stopped(&self) {
        tracing::info!("[audit] application stopped");
    }

    fn application_failure(&self, cause: &ApplicationError) {
        tracing::error!("[audit] application failed: {}", cause);
    }
}

// ==================== 装配 ====================

fn registry() -> ContainerResult<BlockFactoryRegistry> {
    BlockFactoryRegistry::new()
        .with_factory(
            BlockFactory::of::<SystemClock>("system-clock")
                .with_export(service_export!(SystemClock as dyn Clock, "clock")),
        )?
        .with_factory(
            BlockFactory::of::<GreeterBlock>("greeter")
                .with_export(service_export!(GreeterBlock as dyn Greeter, "greeter")),
        )?
        .with_factory(BlockFactory::of::<Ticker>("ticker"))?
        .with_factory(BlockFactory::of::<AuditListener>("audit-listener"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    LoggingConfig::from_env().init()?;

    let metadata = ApplicationMetaData::from_toml_str(include_str!("../config/assembly.toml"))?;
    let configurations =
        ConfigurationRepository::from_toml_str(include_str!("../config/config.toml"))?;

    let context = ApplicationContext::builder(metadata)
        .with_home_directory(std::env::current_dir()?)
        .with_registry(registry()?)
        .with_configurations(configurations)
        .build();

    let shutdown = Arc::new(Notify::new());
    let notifier = Arc::clone(&shutdown);
    context.register_shutdown_hook(move || {
        notifier.notify_one();
        Ok(())
    });

    let app = DefaultApplication::new(context);
    app.initialize()?;
    app.start()
        .context("demo application failed to start")?;

    tracing::info!("Blocks: {:?}", app.block_names());
    if let Some(greeter) = app.block("greeter") {
        let message = greeter.invoke::<dyn Greeter, _>(|g| g.greet("main"))??;
        tracing::info!("{}", message);
    }

    tokio::select! {
        _ = shutdown.notified() => tracing::info!("Shutdown requested by a block"),
        _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C"),
    }

    app.stop()?;
    app.dispose();
    Ok(())
}
