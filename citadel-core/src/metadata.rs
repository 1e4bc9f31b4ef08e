use serde::Deserialize;

use crate::error::ContainerResult;

/// 依赖声明
///
/// 使用者以 `role` 的名义依赖名为 `provider` 的 block。
/// 多个依赖可以共享同一个 role，此时以 `alias` 区分。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DependencyDescriptor {
    role: String,
    provider: String,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    service: Option<String>,
}

impl DependencyDescriptor {
    pub fn new(role: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            provider: provider.into(),
            alias: None,
            service: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// 别名，未声明时为提供者名称
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.provider)
    }

    /// 要求提供者暴露的服务，未声明时与 role 相同
    pub fn service(&self) -> &str {
        self.service.as_deref().unwrap_or(&self.role)
    }
}

/// 组件描述（不可变）
///
/// 装配时创建一次，此后在生命周期引擎中按引用共享。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ComponentDescriptor {
    name: String,
    implementation: String,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default, rename = "dependency")]
    dependencies: Vec<DependencyDescriptor>,
    #[serde(default)]
    disable_proxy: bool,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implementation: implementation.into(),
            services: Vec::new(),
            dependencies: Vec::new(),
            disable_proxy: false,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.services.push(service.into());
        self
    }

    pub fn with_dependency(mut self, dependency: DependencyDescriptor) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_disable_proxy(mut self, disable: bool) -> Self {
        self.disable_proxy = disable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn dependencies(&self) -> &[DependencyDescriptor] {
        &self.dependencies
    }

    pub fn disable_proxy(&self) -> bool {
        self.disable_proxy
    }

    pub fn declares_service(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service)
    }

    pub fn depends_on(&self, provider: &str) -> bool {
        self.dependencies.iter().any(|d| d.provider == provider)
    }
}

/// 应用装配描述
///
/// 监听器按声明顺序在任何 block 启动之前实例化。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationMetaData {
    name: String,
    #[serde(default, rename = "block")]
    blocks: Vec<ComponentDescriptor>,
    #[serde(default, rename = "listener")]
    listeners: Vec<ComponentDescriptor>,
}

impl ApplicationMetaData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// 从 TOML 字符串解析装配描述
    pub fn from_toml_str(content: &str) -> ContainerResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_block(mut self, block: ComponentDescriptor) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_listener(mut self, listener: ComponentDescriptor) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blocks(&self) -> &[ComponentDescriptor] {
        &self.blocks
    }

    pub fn listeners(&self) -> &[ComponentDescriptor] {
        &self.listeners
    }

    pub fn block(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.blocks.iter().find(|b| b.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSEMBLY: &str = r#"
name = "demo"

[[listener]]
name = "audit"
implementation = "audit-listener"

[[block]]
name = "clock"
implementation = "system-clock"
services = ["clock"]

[[block]]
name = "greeter"
implementation = "greeter"
services = ["greeter"]
disable-proxy = true

[[block.dependency]]
role = "clock"
provider = "clock"

[[block.dependency]]
role = "backup-clock"
provider = "clock"
alias = "secondary"
service = "clock"
"#;

    #[test]
    fn test_parse_assembly() {
        let metadata = ApplicationMetaData::from_toml_str(ASSEMBLY).unwrap();

        assert_eq!(metadata.name(), "demo");
        assert_eq!(metadata.listeners().len(), 1);
        assert_eq!(metadata.blocks().len(), 2);

        let greeter = metadata.block("greeter").unwrap();
        assert!(greeter.disable_proxy());
        assert!(greeter.depends_on("clock"));
        assert_eq!(greeter.dependencies().len(), 2);

        let primary = &greeter.dependencies()[0];
        assert_eq!(primary.service(), "clock");
        assert_eq!(primary.alias(), "clock");

        let backup = &greeter.dependencies()[1];
        assert_eq!(backup.role(), "backup-clock");
        assert_eq!(backup.alias(), "secondary");
        assert_eq!(backup.service(), "clock");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ApplicationMetaData::from_toml_str("name = \"x\"\nbogus = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_matches_parsed() {
        let built = ApplicationMetaData::new("demo").with_block(
            ComponentDescriptor::new("clock", "system-clock").with_service("clock"),
        );
        let parsed = ApplicationMetaData::from_toml_str(
            "name = \"demo\"\n[[block]]\nname = \"clock\"\nimplementation = \"system-clock\"\nservices = [\"clock\"]\n",
        )
        .unwrap();
        assert_eq!(built, parsed);
    }
}
