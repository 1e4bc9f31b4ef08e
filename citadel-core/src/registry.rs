use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::component::{AsAny, Block};
use crate::error::{ContainerError, ContainerResult};

/// 从实现类型还原为服务接口的转换函数
pub type Caster<S> = for<'a> fn(&'a dyn Any) -> Option<&'a S>;

/// Block 构造函数类型
pub type Constructor = Box<dyn Fn() -> anyhow::Result<Box<dyn Block>> + Send + Sync>;

/// 服务导出
///
/// 将一个 block 实现以服务名的形式暴露为某个 trait 对象。
/// 通常通过 [`service_export!`](crate::service_export) 宏创建。
pub struct ServiceExport {
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    caster: Box<dyn Any + Send + Sync>,
}

impl ServiceExport {
    pub fn new<S: ?Sized + 'static>(name: impl Into<String>, caster: Caster<S>) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<S>(),
            type_name: type_name::<S>(),
            caster: Box::new(caster),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<S: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<S>()
    }

    /// 将 block 转换为服务接口
    pub fn cast<'a, S: ?Sized + 'static>(&self, block: &'a dyn Block) -> Option<&'a S> {
        let caster = self.caster.downcast_ref::<Caster<S>>()?;
        caster(AsAny::as_any(block))
    }
}

impl fmt::Debug for ServiceExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceExport")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// 创建服务导出
///
/// ```rust,ignore
/// BlockFactory::new("system-clock", || Ok(Box::new(SystemClock::default())))
///     .with_export(service_export!(SystemClock as dyn Clock, "clock"));
/// ```
#[macro_export]
macro_rules! service_export {
    ($implementation:ty as $service:ty, $name:expr) => {
        $crate::registry::ServiceExport::new::<$service>($name, |any| {
            let block: &$implementation = any.downcast_ref()?;
            Some(block)
        })
    };
}

/// Block 工厂
///
/// 以实现键注册，取代按类名反射加载。
pub struct BlockFactory {
    key: String,
    constructor: Constructor,
    exports: Vec<Arc<ServiceExport>>,
}

impl BlockFactory {
    pub fn new<F>(key: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn Block>> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            constructor: Box::new(constructor),
            exports: Vec::new(),
        }
    }

    /// 使用默认构造的工厂
    pub fn of<T>(key: impl Into<String>) -> Self
    where
        T: Block + Default,
    {
        Self::new(key, || Ok(Box::new(T::default()) as Box<dyn Block>))
    }

    pub fn with_export(mut self, export: ServiceExport) -> Self {
        self.exports.push(Arc::new(export));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn exports(&self) -> &[Arc<ServiceExport>] {
        &self.exports
    }

    pub fn export(&self, service: &str) -> Option<&Arc<ServiceExport>> {
        self.exports.iter().find(|e| e.name() == service)
    }

    /// 创建新实例
    pub fn create(&self) -> ContainerResult<Box<dyn Block>> {
        (self.constructor)().map_err(|source| ContainerError::InstantiationFailed {
            implementation: self.key.clone(),
            source,
        })
    }
}

impl fmt::Debug for BlockFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockFactory")
            .field("key", &self.key)
            .field("exports", &self.exports)
            .finish()
    }
}

/// Block 工厂注册表
///
/// 显式构造并向下传递，不存在全局状态。
#[derive(Default)]
pub struct BlockFactoryRegistry {
    factories: RwLock<HashMap<String, Arc<BlockFactory>>>,
}

impl BlockFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工厂，实现键重复时返回错误
    pub fn register(&self, factory: BlockFactory) -> ContainerResult<()> {
        let mut factories = self.factories.write();
        if factories.contains_key(factory.key()) {
            return Err(ContainerError::DuplicateName(factory.key().to_string()));
        }

        tracing::debug!(
            "Registered block factory: {} ({} export(s))",
            factory.key(),
            factory.exports().len()
        );
        factories.insert(factory.key().to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn with_factory(self, factory: BlockFactory) -> ContainerResult<Self> {
        self.register(factory)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> ContainerResult<Arc<BlockFactory>> {
        self.factories
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ContainerError::UnknownImplementation(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl fmt::Debug for BlockFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockFactoryRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Counter: Send + Sync {
        fn count(&self) -> u32;
    }

    trait Named: Send + Sync {
        fn label(&self) -> &str;
    }

    #[derive(Default)]
    struct Fixed;

    impl Block for Fixed {}

    impl Counter for Fixed {
        fn count(&self) -> u32 {
            7
        }
    }

    fn fixed_factory() -> BlockFactory {
        BlockFactory::of::<Fixed>("fixed")
            .with_export(service_export!(Fixed as dyn Counter, "counter"))
    }

    #[test]
    fn test_register_and_create() {
        let registry = BlockFactoryRegistry::new().with_factory(fixed_factory()).unwrap();
        assert!(registry.contains("fixed"));
        assert_eq!(registry.len(), 1);

        let factory = registry.get("fixed").unwrap();
        let block = factory.create().unwrap();
        let export = factory.export("counter").unwrap();

        assert!(export.is::<dyn Counter>());
        assert!(!export.is::<dyn Named>());

        let counter = export.cast::<dyn Counter>(&*block).unwrap();
        assert_eq!(counter.count(), 7);
        assert!(export.cast::<dyn Named>(&*block).is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let registry = BlockFactoryRegistry::new();
        registry.register(fixed_factory()).unwrap();
        assert!(matches!(
            registry.register(fixed_factory()),
            Err(ContainerError::DuplicateName(key)) if key == "fixed"
        ));
    }

    #[test]
    fn test_unknown_implementation() {
        let registry = BlockFactoryRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(ContainerError::UnknownImplementation(_))
        ));
    }

    #[test]
    fn test_constructor_failure_is_instantiation_error() {
        let factory = BlockFactory::new("broken", || Err(anyhow::anyhow!("no resources")));
        match factory.create() {
            Err(ContainerError::InstantiationFailed { implementation, .. }) => {
                assert_eq!(implementation, "broken")
            }
            _ => panic!("Expected InstantiationFailed"),
        }
    }
}
