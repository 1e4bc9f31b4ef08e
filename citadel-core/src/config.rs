use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::error::{ContainerError, ContainerResult};

/// 解析布尔值，接受 true/yes/1 与 false/no/0
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, value: &str, expected: &'static str) -> ContainerError {
    ContainerError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// 配置树节点（不可变）
///
/// 每个节点有名称、可选的文本值、属性表和有序的子节点。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    name: String,
    value: Option<String>,
    attributes: BTreeMap<String, String>,
    children: Vec<Configuration>,
}

impl Configuration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Configuration) -> Self {
        self.children.push(child);
        self
    }

    /// 从 TOML 值构建配置树
    ///
    /// 标量成为属性，表成为子节点，表数组成为同名的多个子节点，
    /// 标量数组成为同名且带值的多个子节点。
    pub fn from_toml(name: impl Into<String>, value: &toml::Value) -> Self {
        let mut node = Self::new(name);
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    node.absorb(key, val);
                }
            }
            other => node.value = Some(scalar_to_string(other)),
        }
        node
    }

    fn absorb(&mut self, key: &str, value: &toml::Value) {
        match value {
            toml::Value::Table(_) => self.children.push(Self::from_toml(key, value)),
            toml::Value::Array(items) => {
                for item in items {
                    self.children.push(Self::from_toml(key, item));
                }
            }
            scalar => {
                self.attributes
                    .insert(key.to_string(), scalar_to_string(scalar));
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn value_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.value().unwrap_or(default)
    }

    pub fn value_as_i64(&self) -> ContainerResult<i64> {
        let value = self.value().ok_or_else(|| ContainerError::MissingAttribute {
            element: self.name.clone(),
            attribute: "value".to_string(),
        })?;
        value
            .trim()
            .parse()
            .map_err(|_| invalid(&self.name, value, "integer"))
    }

    pub fn value_as_bool(&self) -> ContainerResult<bool> {
        let value = self.value().ok_or_else(|| ContainerError::MissingAttribute {
            element: self.name.clone(),
            attribute: "value".to_string(),
        })?;
        parse_bool(value).ok_or_else(|| invalid(&self.name, value, "boolean"))
    }

    /// 获取属性，缺失时返回错误
    pub fn attribute(&self, name: &str) -> ContainerResult<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ContainerError::MissingAttribute {
                element: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    /// 获取属性（带默认值）
    pub fn attribute_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.attributes
            .get(name)
            .map(String::as_str)
            .unwrap_or(default)
    }

    pub fn attribute_as_i64(&self, name: &str) -> ContainerResult<i64> {
        let value = self.attribute(name)?;
        value.trim().parse().map_err(|_| invalid(name, value, "integer"))
    }

    pub fn attribute_as_i64_or(&self, name: &str, default: i64) -> ContainerResult<i64> {
        match self.attributes.get(name) {
            Some(_) => self.attribute_as_i64(name),
            None => Ok(default),
        }
    }

    pub fn attribute_as_f64(&self, name: &str) -> ContainerResult<f64> {
        let value = self.attribute(name)?;
        value.trim().parse().map_err(|_| invalid(name, value, "number"))
    }

    pub fn attribute_as_bool(&self, name: &str) -> ContainerResult<bool> {
        let value = self.attribute(name)?;
        parse_bool(value).ok_or_else(|| invalid(name, value, "boolean"))
    }

    pub fn attribute_as_bool_or(&self, name: &str, default: bool) -> ContainerResult<bool> {
        match self.attributes.get(name) {
            Some(_) => self.attribute_as_bool(name),
            None => Ok(default),
        }
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// 第一个同名子节点
    pub fn child(&self, name: &str) -> Option<&Configuration> {
        self.children.iter().find(|c| c.name == name)
    }

    /// 所有同名子节点，保持声明顺序
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Configuration> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn children(&self) -> &[Configuration] {
        &self.children
    }
}

fn scalar_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        // 嵌套结构不会作为标量出现
        other => other.to_string(),
    }
}

/// 只读参数视图
///
/// 由配置树派生，只包含字符串形式的名称与值。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    values: BTreeMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// 从配置树派生参数
    ///
    /// 节点自身的属性作为参数；`parameter` 子节点以其 `name`/`value`
    /// 属性定义参数，并覆盖同名属性。
    pub fn from_configuration(configuration: &Configuration) -> ContainerResult<Self> {
        let mut values: BTreeMap<String, String> = configuration
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for parameter in configuration.children_named("parameter") {
            let name = parameter.attribute("name")?;
            let value = parameter.attribute("value")?;
            values.insert(name.to_string(), value.to_string());
        }

        Ok(Self { values })
    }

    pub fn is_parameter(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn parameter(&self, name: &str) -> ContainerResult<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ContainerError::MissingParameter(name.to_string()))
    }

    pub fn parameter_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.values.get(name).map(String::as_str).unwrap_or(default)
    }

    pub fn parameter_as_i64(&self, name: &str) -> ContainerResult<i64> {
        let value = self.parameter(name)?;
        value.trim().parse().map_err(|_| invalid(name, value, "integer"))
    }

    pub fn parameter_as_i64_or(&self, name: &str, default: i64) -> ContainerResult<i64> {
        if self.is_parameter(name) {
            self.parameter_as_i64(name)
        } else {
            Ok(default)
        }
    }

    pub fn parameter_as_f64(&self, name: &str) -> ContainerResult<f64> {
        let value = self.parameter(name)?;
        value.trim().parse().map_err(|_| invalid(name, value, "number"))
    }

    pub fn parameter_as_bool(&self, name: &str) -> ContainerResult<bool> {
        let value = self.parameter(name)?;
        parse_bool(value).ok_or_else(|| invalid(name, value, "boolean"))
    }

    pub fn parameter_as_bool_or(&self, name: &str, default: bool) -> ContainerResult<bool> {
        if self.is_parameter(name) {
            self.parameter_as_bool(name)
        } else {
            Ok(default)
        }
    }

    /// 合并另一组参数，`other` 中的同名参数优先
    pub fn merge(mut self, other: &Parameters) -> Self {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
        self
    }
}

/// 配置仓库：block 名称到配置树的映射
#[derive(Debug, Clone, Default)]
pub struct ConfigurationRepository {
    configurations: HashMap<String, Configuration>,
}

impl ConfigurationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从文件加载 TOML 配置
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;
        Ok(Self::from_toml_str(&content)?)
    }

    /// 从 TOML 字符串解析，每个顶层表对应一个 block 的配置
    pub fn from_toml_str(content: &str) -> ContainerResult<Self> {
        let table: toml::Table = toml::from_str(content)?;
        let mut repository = Self::new();

        for (name, value) in &table {
            if value.is_table() {
                repository.insert(Configuration::from_toml(name.as_str(), value));
            } else {
                tracing::warn!("Ignoring top-level configuration key '{}': not a table", name);
            }
        }

        Ok(repository)
    }

    /// 以配置节点名称为键插入
    pub fn insert(&mut self, configuration: Configuration) {
        self.configurations
            .insert(configuration.name().to_string(), configuration);
    }

    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.insert(configuration);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.configurations.contains_key(name)
    }

    /// 获取 block 的配置，缺失时返回错误而不是默认值
    pub fn configuration(&self, name: &str) -> ContainerResult<&Configuration> {
        self.configurations
            .get(name)
            .ok_or_else(|| ContainerError::MissingConfiguration(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }
}
