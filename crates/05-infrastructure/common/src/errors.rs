//! 错误类型定义

use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置解析失败: {source}")]
    ParseError {
        #[from]
        source: config::ConfigError,
    },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 依赖注入错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("组件已注册: {name}")]
    AlreadyRegistered { name: String },

    #[error("组件未注册: {name}")]
    ComponentNotRegistered { name: String },

    #[error("循环依赖检测到: {dependency_chain}")]
    CircularDependency { dependency_chain: String },

    #[error("依赖解析失败: {name}, 原因: {message}")]
    DependencyResolutionFailed { name: String, message: String },

    #[error("组件类型不匹配: {name}, 期望类型: {expected}")]
    TypeMismatch { name: String, expected: String },

    #[error("组件解析被中止: {message}")]
    ResolutionAborted { message: String },
}

impl DependencyError {
    /// 创建组件未注册错误
    pub fn not_registered(name: impl Into<String>) -> Self {
        Self::ComponentNotRegistered { name: name.into() }
    }

    /// 根据解析链创建循环依赖错误
    pub fn circular(chain: &[String], repeated: &str) -> Self {
        let mut links: Vec<&str> = chain.iter().map(String::as_str).collect();
        links.push(repeated);
        Self::CircularDependency {
            dependency_chain: links.join(" -> "),
        }
    }
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("依赖注入错误: {source}")]
    DependencyError {
        #[from]
        source: DependencyError,
    },

    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
