use crate::state::{Phase, Stage, State};
use thiserror::Error;

/// 容器错误
///
/// 覆盖装配期错误（名称、依赖、实现、配置）以及代理失效后的访问错误。
/// 这类错误都是确定性的，不会自动重试。
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Invalid name '{0}': only ASCII letters, digits and '-' are allowed")]
    InvalidName(String),

    #[error("Duplicate name '{0}' in assembly")]
    DuplicateName(String),

    #[error("Block '{consumer}' depends on unknown provider '{provider}' for role '{role}'")]
    UnknownProvider {
        consumer: String,
        role: String,
        provider: String,
    },

    #[error("Block '{consumer}' requires service '{service}' which provider '{provider}' does not offer")]
    MissingService {
        consumer: String,
        provider: String,
        service: String,
    },

    #[error("Block '{block}' declares role '{role}' more than once without distinct aliases")]
    DuplicateRole { block: String, role: String },

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("No factory registered for implementation '{0}'")]
    UnknownImplementation(String),

    #[error("Implementation '{implementation}' does not export service '{service}'")]
    ServiceNotExported {
        implementation: String,
        service: String,
    },

    #[error("Failed to instantiate implementation '{implementation}': {source}")]
    InstantiationFailed {
        implementation: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Provider '{provider}' required by '{consumer}' is not started")]
    ProviderNotStarted { consumer: String, provider: String },

    #[error("Unknown role '{0}'")]
    UnknownRole(String),

    #[error("Role '{0}' resolves to more than one provider; use an alias")]
    AmbiguousRole(String),

    #[error("Unknown alias '{alias}' for role '{role}'")]
    UnknownAlias { role: String, alias: String },

    #[error("Block '{0}' has been invalidated")]
    Invalidated(String),

    #[error("Block '{block}' does not expose service '{service}'")]
    ServiceNotExposed { block: String, service: String },

    #[error("No configuration supplied for '{0}'")]
    MissingConfiguration(String),

    #[error("Element '{element}' is missing attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    #[error("Missing parameter '{0}'")]
    MissingParameter(String),

    #[error("Value '{value}' of '{key}' is not a valid {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Block '{name}' cannot move from {from} to {to}")]
    IllegalStateTransition { name: String, from: State, to: State },

    #[error("Unknown block '{0}'")]
    UnknownBlock(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type ContainerResult<T> = Result<T, ContainerError>;

/// 单个 block 在某个生命周期阶段的失败
#[derive(Debug, Error)]
#[error("Block '{name}' failed at stage {stage}: {source}")]
pub struct LifecycleError {
    pub name: String,
    pub stage: Stage,
    #[source]
    pub source: anyhow::Error,
}

impl LifecycleError {
    pub fn new(name: impl Into<String>, stage: Stage, source: impl Into<anyhow::Error>) -> Self {
        Self {
            name: name.into(),
            stage,
            source: source.into(),
        }
    }
}

/// 应用级错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("Application '{0}' is already running; stop it first")]
    AlreadyRunning(String),

    #[error("Application '{0}' is not running")]
    NotRunning(String),

    #[error("Application '{0}' has not been initialized")]
    NotInitialized(String),

    #[error("{phase} phase failed at block '{}' during stage {}", .source.name, .source.stage)]
    PhaseFailed {
        phase: Phase,
        #[source]
        source: LifecycleError,
    },

    #[error("Listener '{0}' implements neither block nor application listener callbacks")]
    NotAListener(String),

    #[error("Listener '{name}' failed to start: {source}")]
    ListenerFailed {
        name: String,
        #[source]
        source: LifecycleError,
    },

    #[error("Assembly error: {0}")]
    Assembly(#[from] ContainerError),

    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),
}

impl ApplicationError {
    /// 失败的 block 名称（仅阶段失败时存在）
    pub fn block(&self) -> Option<&str> {
        match self {
            Self::PhaseFailed { source, .. } | Self::ListenerFailed { source, .. } => {
                Some(source.name.as_str())
            }
            _ => None,
        }
    }

    /// 失败所在的阶段（仅阶段失败时存在）
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::PhaseFailed { source, .. } | Self::ListenerFailed { source, .. } => {
                Some(source.stage)
            }
            _ => None,
        }
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
