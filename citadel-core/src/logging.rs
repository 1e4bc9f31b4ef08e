use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

use crate::error::{ApplicationError, ApplicationResult};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 紧凑格式（默认）
    Compact,
    /// 完整格式（带时间、级别、目标）
    Full,
    /// JSON 格式
    Json,
    /// 美化格式（适合开发）
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Full => write!(f, "full"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// 日志订阅者配置
///
/// 容器的日志都以 `logger` 字段标明所属 block，因此不输出模块路径；
/// 线程名总是输出，用于区分调用线程、block 工作线程与关闭线程。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// 日志级别（默认：Info）
    pub level: LogLevel,

    /// 日志格式（默认：Compact）
    pub format: LogFormat,

    /// 自定义过滤器，例如 "citadel_core=debug,app_demo=info"，优先于 `level`
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 从环境变量读取配置，无法解析的值被忽略
    ///
    /// - `CITADEL_LOG`：过滤器
    /// - `CITADEL_LOG_LEVEL`：级别
    /// - `CITADEL_LOG_FORMAT`：格式
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            level: lookup("CITADEL_LOG_LEVEL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.level),
            format: lookup("CITADEL_LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.format),
            filter: lookup("CITADEL_LOG"),
        }
    }

    /// 实际生效的过滤指令：合法的自定义过滤器，否则为级别
    pub fn directives(&self) -> String {
        match &self.filter {
            Some(filter) if EnvFilter::try_new(filter).is_ok() => filter.clone(),
            _ => self.level.to_string(),
        }
    }

    /// 安装全局订阅者，只能成功一次
    pub fn init(self) -> ApplicationResult<()> {
        let env_filter = EnvFilter::new(self.directives());
        let builder = subscriber_fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_names(true);

        let installed = match self.format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Full => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };
        installed.map_err(|e| ApplicationError::LoggingInitFailed(e.to_string()))
    }
}

/// 按类别命名的日志句柄
///
/// 克隆开销很小。所有输出都是带 `logger` 字段的 tracing 事件，
/// 由全局订阅者统一格式化与过滤。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    category: Arc<str>,
}

impl Logger {
    pub fn new(category: impl AsRef<str>) -> Self {
        Self {
            category: Arc::from(category.as_ref()),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// 派生子类别，例如 `app.greeter` -> `app.greeter.worker`
    pub fn child(&self, name: &str) -> Logger {
        Logger::new(format!("{}.{}", self.category, name))
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Trace => tracing::enabled!(Level::TRACE),
            LogLevel::Debug => tracing::enabled!(Level::DEBUG),
            LogLevel::Info => tracing::enabled!(Level::INFO),
            LogLevel::Warn => tracing::enabled!(Level::WARN),
            LogLevel::Error => tracing::enabled!(Level::ERROR),
        }
    }

    pub fn trace(&self, message: impl fmt::Display) {
        tracing::trace!(logger = %self.category, "{}", message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        tracing::debug!(logger = %self.category, "{}", message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        tracing::info!(logger = %self.category, "{}", message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        tracing::warn!(logger = %self.category, "{}", message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        tracing::error!(logger = %self.category, "{}", message);
    }
}

/// 日志协作者：为组件名称提供 Logger
pub trait LogManager: Send + Sync {
    fn logger(&self, name: &str) -> Logger;
}

/// 基于 tracing 的默认 LogManager
///
/// 可选前缀通常是应用名称，组件的类别为 `前缀.组件名`。
#[derive(Debug, Clone, Default)]
pub struct TracingLogManager {
    prefix: Option<String>,
}

impl TracingLogManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

impl LogManager for TracingLogManager {
    fn logger(&self, name: &str) -> Logger {
        match &self.prefix {
            Some(prefix) => Logger::new(format!("{}.{}", prefix, name)),
            None => Logger::new(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("full".parse::<LogFormat>().unwrap(), LogFormat::Full);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    }

    #[test]
    fn test_logging_config_from_lookup() {
        let env = |key: &str| match key {
            "CITADEL_LOG_LEVEL" => Some("debug".to_string()),
            "CITADEL_LOG_FORMAT" => Some("sideways".to_string()),
            "CITADEL_LOG" => Some("citadel_core=trace".to_string()),
            _ => None,
        };
        let config = LoggingConfig::from_lookup(env);

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.directives(), "citadel_core=trace");
        assert_eq!(LoggingConfig::from_lookup(|_| None), LoggingConfig::default());
    }

    #[test]
    fn test_invalid_filter_falls_back_to_level() {
        let config = LoggingConfig::new()
            .level(LogLevel::Warn)
            .format(LogFormat::Json)
            .filter("citadel_core=loudest");
        assert_eq!(config.directives(), "warn");
        assert_eq!(LoggingConfig::new().directives(), "info");
    }

    #[test]
    fn test_log_manager_prefix() {
        let plain = TracingLogManager::new();
        assert_eq!(plain.logger("greeter").category(), "greeter");

        let prefixed = TracingLogManager::new().with_prefix("demo");
        let logger = prefixed.logger("greeter");
        assert_eq!(logger.category(), "demo.greeter");
        assert_eq!(logger.child("worker").category(), "demo.greeter.worker");
    }

    #[test]
    fn test_logger_without_subscriber_does_not_panic() {
        let logger = Logger::new("test");
        logger.info("hello");
        logger.error(format_args!("value = {}", 1));
        let _ = logger.is_enabled(LogLevel::Trace);
    }
}
