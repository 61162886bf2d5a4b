//! # Infrastructure Common
//!
//! 组件注册表基础设施层的公共部分。
//!
//! ## 核心内容
//!
//! - [`DependencyError`] - 注册与解析错误
//! - [`RegistryConfig`] - 注册表配置（看门狗、循环依赖检测）
//! - [`LoggingConfig`] / [`init_logging`] - 日志系统初始化

pub mod configuration;
pub mod errors;
pub mod logging;

pub use configuration::*;
pub use errors::*;
pub use logging::*;
