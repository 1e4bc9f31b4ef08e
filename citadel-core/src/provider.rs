use std::sync::Arc;

use crate::component::{Block, BlockInstance};
use crate::config::{Configuration, Parameters};
use crate::context::{ApplicationContext, BlockContext};
use crate::entry::BlockTable;
use crate::error::{ContainerError, ContainerResult};
use crate::logging::Logger;
use crate::metadata::ComponentDescriptor;
use crate::proxy::BlockProxy;
use crate::service::ServiceManager;
use crate::state::State;

/// 资源提供者
///
/// 每个生命周期阶段一个方法，为组件构建该阶段需要的资源。
pub trait ResourceProvider: Send + Sync {
    /// 通过工厂注册表创建实例
    fn create_object(&self, descriptor: &ComponentDescriptor) -> ContainerResult<Box<dyn Block>>;

    fn create_logger(&self, descriptor: &ComponentDescriptor) -> Logger;

    fn create_context(&self, descriptor: &ComponentDescriptor) -> BlockContext;

    /// 将每个依赖解析到已启动提供者的代理
    fn create_service_manager(
        &self,
        descriptor: &ComponentDescriptor,
    ) -> ContainerResult<ServiceManager>;

    fn create_configuration(&self, descriptor: &ComponentDescriptor)
        -> ContainerResult<Configuration>;

    fn create_parameters(&self, descriptor: &ComponentDescriptor) -> ContainerResult<Parameters>;

    /// 包装实例，只暴露声明的服务
    fn create_proxy(
        &self,
        descriptor: &ComponentDescriptor,
        instance: BlockInstance,
    ) -> ContainerResult<Arc<BlockProxy>>;
}

/// 默认资源提供者
///
/// 从应用上下文取得协作者，从条目表解析依赖。
pub struct BlockResourceProvider {
    context: Arc<ApplicationContext>,
    entries: Arc<BlockTable>,
}

impl BlockResourceProvider {
    pub fn new(context: Arc<ApplicationContext>, entries: Arc<BlockTable>) -> Self {
        Self { context, entries }
    }
}

impl ResourceProvider for BlockResourceProvider {
    fn create_object(&self, descriptor: &ComponentDescriptor) -> ContainerResult<Box<dyn Block>> {
        let factory = self.context.registry().get(descriptor.implementation())?;
        factory.create()
    }

    fn create_logger(&self, descriptor: &ComponentDescriptor) -> Logger {
        self.context.logger(descriptor.name())
    }

    fn create_context(&self, descriptor: &ComponentDescriptor) -> BlockContext {
        BlockContext::new(descriptor.name(), Arc::clone(&self.context))
    }

    fn create_service_manager(
        &self,
        descriptor: &ComponentDescriptor,
    ) -> ContainerResult<ServiceManager> {
        let mut services = ServiceManager::new();

        for dep in descriptor.dependencies() {
            let entry = self.entries.get(dep.provider()).ok_or_else(|| {
                ContainerError::UnknownProvider {
                    consumer: descriptor.name().to_string(),
                    role: dep.role().to_string(),
                    provider: dep.provider().to_string(),
                }
            })?;

            let proxy = match (entry.state(), entry.proxy()) {
                (State::Started, Some(proxy)) => proxy,
                _ => {
                    return Err(ContainerError::ProviderNotStarted {
                        consumer: descriptor.name().to_string(),
                        provider: dep.provider().to_string(),
                    })
                }
            };

            if !proxy.exposes(dep.service()) {
                return Err(ContainerError::MissingService {
                    consumer: descriptor.name().to_string(),
                    provider: dep.provider().to_string(),
                    service: dep.service().to_string(),
                });
            }

            services.bind(dep.role(), dep.alias(), proxy);
        }

        Ok(services)
    }

    fn create_configuration(
        &self,
        descriptor: &ComponentDescriptor,
    ) -> ContainerResult<Configuration> {
        self.context
            .configurations()
            .configuration(descriptor.name())
            .cloned()
    }

    fn create_parameters(&self, descriptor: &ComponentDescriptor) -> ContainerResult<Parameters> {
        let configuration = self.context.configurations().configuration(descriptor.name())?;
        Parameters::from_configuration(configuration)
    }

    fn create_proxy(
        &self,
        descriptor: &ComponentDescriptor,
        instance: BlockInstance,
    ) -> ContainerResult<Arc<BlockProxy>> {
        let factory = self.context.registry().get(descriptor.implementation())?;

        let exports = if descriptor.disable_proxy() {
            factory.exports().to_vec()
        } else {
            descriptor
                .services()
                .iter()
                .map(|service| {
                    factory.export(service).cloned().ok_or_else(|| {
                        ContainerError::ServiceNotExported {
                            implementation: descriptor.implementation().to_string(),
                            service: service.clone(),
                        }
                    })
                })
                .collect::<ContainerResult<Vec<_>>>()?
        };

        Ok(Arc::new(BlockProxy::wrap(descriptor.name(), instance, exports)))
    }
}
