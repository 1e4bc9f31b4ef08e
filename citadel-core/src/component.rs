use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{Configuration, Parameters};
use crate::context::BlockContext;
use crate::listener::{ApplicationListener, BlockListener};
use crate::logging::Logger;
use crate::service::ServiceManager;

/// 转换为 Any 引用，用于服务导出时的类型还原
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Block - 容器管理的组件
///
/// 每个生命周期阶段对应一个可选能力。实现某个能力的 block 覆盖对应的
/// `as_*` 方法返回 `Some(self)`，未实现的能力在该阶段被直接跳过。
///
/// # 示例
///
/// ```rust,ignore
/// struct Greeter { logger: Option<Logger> }
///
/// impl Block for Greeter {
///     fn as_log_enabled(&mut self) -> Option<&mut dyn LogEnabled> {
///         Some(self)
///     }
/// }
///
/// impl LogEnabled for Greeter {
///     fn enable_logging(&mut self, logger: Logger) {
///         self.logger = Some(logger);
///     }
/// }
/// ```
pub trait Block: AsAny + Send + Sync {
    fn as_log_enabled(&mut self) -> Option<&mut dyn LogEnabled> {
        None
    }

    fn as_contextualizable(&mut self) -> Option<&mut dyn Contextualizable> {
        None
    }

    fn as_serviceable(&mut self) -> Option<&mut dyn Serviceable> {
        None
    }

    fn as_configurable(&mut self) -> Option<&mut dyn Configurable> {
        None
    }

    fn as_parameterizable(&mut self) -> Option<&mut dyn Parameterizable> {
        None
    }

    fn as_initializable(&mut self) -> Option<&mut dyn Initializable> {
        None
    }

    fn as_startable(&mut self) -> Option<&mut dyn Startable> {
        None
    }

    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        None
    }

    /// 监听 block 的加入与移除
    fn as_block_listener(&self) -> Option<&dyn BlockListener> {
        None
    }

    /// 监听应用级事件
    fn as_application_listener(&self) -> Option<&dyn ApplicationListener> {
        None
    }
}

/// 存活的 block 实例
///
/// 由条目独占持有，只有代理会另外保留一份引用，并在失效时释放。
pub type BlockInstance = Arc<RwLock<Box<dyn Block>>>;

/// 注入日志
pub trait LogEnabled {
    fn enable_logging(&mut self, logger: Logger);
}

/// 注入上下文
pub trait Contextualizable {
    fn contextualize(&mut self, context: BlockContext) -> anyhow::Result<()>;
}

/// 注入依赖的服务
///
/// 服务管理器在此阶段构建一次，之后缓存于 block 内部。
/// 提供者关闭后，通过它取得的代理会返回失效错误。
pub trait Serviceable {
    fn service(&mut self, services: ServiceManager) -> anyhow::Result<()>;
}

/// 注入配置树
pub trait Configurable {
    fn configure(&mut self, configuration: Configuration) -> anyhow::Result<()>;
}

/// 注入只读参数
pub trait Parameterizable {
    fn parameterize(&mut self, parameters: Parameters) -> anyhow::Result<()>;
}

/// 初始化回调
/// 在所有资源注入完成后调用
pub trait Initializable {
    fn initialize(&mut self) -> anyhow::Result<()>;
}

/// 启动与停止
pub trait Startable {
    fn start(&mut self) -> anyhow::Result<()>;

    fn stop(&mut self) -> anyhow::Result<()>;
}

/// 释放资源
pub trait Disposable {
    fn dispose(&mut self) -> anyhow::Result<()>;
}
