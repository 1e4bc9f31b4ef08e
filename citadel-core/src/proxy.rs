use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::component::BlockInstance;
use crate::error::{ContainerError, ContainerResult};
use crate::registry::ServiceExport;

/// Block 代理
///
/// 只暴露 block 声明的服务接口。关闭时代理被失效，此后经由代理的
/// 任何调用都返回 [`ContainerError::Invalidated`]，即使调用方仍持有代理。
///
/// ```rust,ignore
/// let now = proxy.invoke::<dyn Clock, _>(|clock| clock.now())?;
/// ```
pub struct BlockProxy {
    name: String,
    exports: Vec<Arc<ServiceExport>>,
    target: RwLock<Option<BlockInstance>>,
}

impl BlockProxy {
    /// 包装实例，仅暴露给定的服务导出
    pub fn wrap(
        name: impl Into<String>,
        instance: BlockInstance,
        exports: Vec<Arc<ServiceExport>>,
    ) -> Self {
        Self {
            name: name.into(),
            exports,
            target: RwLock::new(Some(instance)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 暴露的服务名称
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().map(|e| e.name())
    }

    pub fn exposes(&self, service: &str) -> bool {
        self.exports.iter().any(|e| e.name() == service)
    }

    pub fn is_valid(&self) -> bool {
        self.target.read().is_some()
    }

    /// 永久失效，释放对实例的引用
    ///
    /// 已在进行中的调用会正常完成；之后的调用全部失败。
    pub fn invalidate(&self) {
        if self.target.write().take().is_some() {
            tracing::debug!("Invalidated proxy for block '{}'", self.name);
        }
    }

    /// 通过服务接口 `S` 调用 block
    ///
    /// 服务接口以 turbofish 指明，闭包参数类型由它推导：
    /// `proxy.invoke::<dyn Clock, _>(|clock| clock.now())`。
    ///
    /// # Errors
    ///
    /// - [`ContainerError::Invalidated`]：代理已失效
    /// - [`ContainerError::ServiceNotExposed`]：block 没有以 `S` 暴露服务
    pub fn invoke<S, R>(&self, f: impl FnOnce(&S) -> R) -> ContainerResult<R>
    where
        S: ?Sized + 'static,
    {
        let export = self
            .exports
            .iter()
            .find(|e| e.is::<S>())
            .ok_or_else(|| ContainerError::ServiceNotExposed {
                block: self.name.clone(),
                service: type_name::<S>().to_string(),
            })?;

        // 只在取引用时持有代理锁，失效不需要等待进行中的调用
        let instance = self
            .target
            .read()
            .clone()
            .ok_or_else(|| ContainerError::Invalidated(self.name.clone()))?;

        let guard = instance.read();
        let service = export
            .cast::<S>(&**guard)
            .ok_or_else(|| ContainerError::ServiceNotExposed {
                block: self.name.clone(),
                service: export.type_name().to_string(),
            })?;
        Ok(f(service))
    }
}

impl fmt::Debug for BlockProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockProxy")
            .field("name", &self.name)
            .field("services", &self.services().collect::<Vec<_>>())
            .field("valid", &self.is_valid())
            .finish()
    }
}
