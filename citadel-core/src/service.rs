use std::sync::Arc;

use crate::error::{ContainerError, ContainerResult};
use crate::proxy::BlockProxy;

#[derive(Debug, Clone)]
struct Binding {
    role: String,
    alias: String,
    proxy: Arc<BlockProxy>,
}

/// 服务管理器：role 到已启动提供者代理的映射
///
/// 在依赖注入阶段构建一次，之后不再变化。
#[derive(Debug, Clone, Default)]
pub struct ServiceManager {
    bindings: Vec<Binding>,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加绑定，同一 role 可以绑定多个提供者
    pub fn bind(&mut self, role: impl Into<String>, alias: impl Into<String>, proxy: Arc<BlockProxy>) {
        self.bindings.push(Binding {
            role: role.into(),
            alias: alias.into(),
            proxy,
        });
    }

    /// 按 role 查找唯一的提供者
    ///
    /// # Errors
    ///
    /// - [`ContainerError::UnknownRole`]：没有声明该 role
    /// - [`ContainerError::AmbiguousRole`]：该 role 绑定了多个提供者
    pub fn lookup(&self, role: &str) -> ContainerResult<Arc<BlockProxy>> {
        let mut matches = self.bindings.iter().filter(|b| b.role == role);
        match (matches.next(), matches.next()) {
            (Some(binding), None) => Ok(Arc::clone(&binding.proxy)),
            (Some(_), Some(_)) => Err(ContainerError::AmbiguousRole(role.to_string())),
            (None, _) => Err(ContainerError::UnknownRole(role.to_string())),
        }
    }

    /// 按声明顺序返回该 role 的所有提供者
    pub fn lookup_all(&self, role: &str) -> Vec<Arc<BlockProxy>> {
        self.bindings
            .iter()
            .filter(|b| b.role == role)
            .map(|b| Arc::clone(&b.proxy))
            .collect()
    }

    /// 按 role 与别名查找
    pub fn lookup_alias(&self, role: &str, alias: &str) -> ContainerResult<Arc<BlockProxy>> {
        if !self.has_service(role) {
            return Err(ContainerError::UnknownRole(role.to_string()));
        }

        self.bindings
            .iter()
            .find(|b| b.role == role && b.alias == alias)
            .map(|b| Arc::clone(&b.proxy))
            .ok_or_else(|| ContainerError::UnknownAlias {
                role: role.to_string(),
                alias: alias.to_string(),
            })
    }

    pub fn has_service(&self, role: &str) -> bool {
        self.bindings.iter().any(|b| b.role == role)
    }

    /// 所有 role，去重并保持声明顺序
    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = Vec::new();
        for binding in &self.bindings {
            if !roles.contains(&binding.role.as_str()) {
                roles.push(&binding.role);
            }
        }
        roles
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
