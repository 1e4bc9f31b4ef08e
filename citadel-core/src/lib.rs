// citadel-core: 组件生命周期容器
//
// 按声明的依赖装配 block，并驱动它们完成生命周期：
// - 能力驱动的阶段（日志、上下文、服务、配置、参数、初始化、启动）
// - 依赖顺序启动，逆序关闭
// - 代理只暴露声明的服务，关闭后失效
// - 监听器观察 block 与应用事件

pub mod application;
pub mod component;
pub mod config;
pub mod context;
pub mod entry;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod metadata;
pub mod provider;
pub mod proxy;
pub mod registry;
pub mod service;
pub mod state;
pub mod verifier;

#[cfg(test)]
mod testing;

// 重新导出常用类型
pub use application::{Application, DefaultApplication};
pub use component::{
    AsAny, Block, BlockInstance, Configurable, Contextualizable, Disposable, Initializable,
    LogEnabled, Parameterizable, Serviceable, Startable,
};
pub use config::{Configuration, ConfigurationRepository, Parameters};
pub use context::{
    ApplicationContext, ApplicationContextBuilder, BlockContext, ShutdownHook, APP_HOME_KEY,
    APP_NAME_KEY, BLOCK_NAME_KEY,
};
pub use entry::{BlockEntry, BlockTable};
pub use error::{
    ApplicationError, ApplicationResult, ContainerError, ContainerResult, LifecycleError,
};
pub use graph::DependencyGraph;
pub use lifecycle::LifecycleHelper;
pub use listener::{ApplicationListener, BlockEvent, BlockListener, ListenerSupport};
pub use logging::{LogFormat, LogLevel, LogManager, Logger, LoggingConfig, TracingLogManager};
pub use metadata::{ApplicationMetaData, ComponentDescriptor, DependencyDescriptor};
pub use provider::{BlockResourceProvider, ResourceProvider};
pub use proxy::BlockProxy;
pub use registry::{BlockFactory, BlockFactoryRegistry, Caster, Constructor, ServiceExport};
pub use service::ServiceManager;
pub use state::{Phase, Stage, State};
pub use verifier::AssemblyVerifier;

/// Prelude 模块，包含编写 block 所需的 traits 和类型
pub mod prelude {
    pub use crate::application::{Application, DefaultApplication};
    pub use crate::component::{
        Block, Configurable, Contextualizable, Disposable, Initializable, LogEnabled,
        Parameterizable, Serviceable, Startable,
    };
    pub use crate::config::{Configuration, ConfigurationRepository, Parameters};
    pub use crate::context::{ApplicationContext, BlockContext};
    pub use crate::error::{ApplicationError, ApplicationResult, ContainerError, ContainerResult};
    pub use crate::listener::{ApplicationListener, BlockEvent, BlockListener};
    pub use crate::logging::{Logger, LoggingConfig};
    pub use crate::metadata::{ApplicationMetaData, ComponentDescriptor, DependencyDescriptor};
    pub use crate::proxy::BlockProxy;
    pub use crate::registry::{BlockFactory, BlockFactoryRegistry};
    pub use crate::service::ServiceManager;
    pub use crate::service_export;

    pub use anyhow::{anyhow, Context as _};
}
