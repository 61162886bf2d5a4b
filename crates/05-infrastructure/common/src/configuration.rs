//! 组件注册表配置
//!
//! 配置来源按优先级从低到高依次为：内置默认值、`config/registry` 文件、
//! 以 `COMPONENT_REGISTRY` 为前缀的环境变量。

use crate::errors::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::time::Duration;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "COMPONENT_REGISTRY";

/// 默认配置文件路径（不含扩展名）
pub const DEFAULT_CONFIG_FILE: &str = "config/registry";

/// 组件注册表配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 解析看门狗等待时间（毫秒），为 0 时不启动看门狗
    pub watchdog_timeout_ms: u64,
    /// 是否启用循环依赖检测
    pub enable_circular_dependency_detection: bool,
    /// 依赖图最大解析深度
    ///
    /// 解析前的依赖图校验会拒绝深于该值的依赖链，即使依赖链本身无环且全部已注册，
    /// 此时返回 `DependencyResolutionFailed`。依赖链较深的应用需要相应调大。
    pub max_resolution_depth: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_ms: 5000,
            enable_circular_dependency_detection: true,
            max_resolution_depth: 100,
        }
    }
}

impl RegistryConfig {
    /// 从默认配置文件和环境变量加载配置
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// 从指定配置文件和环境变量加载配置
    pub fn load_from(path: &str) -> ConfigResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文本加载配置
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_resolution_depth == 0 {
            return Err(ConfigError::ValidationError {
                message: "max_resolution_depth 必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    /// 看门狗等待时间
    pub fn watchdog_timeout(&self) -> Option<Duration> {
        (self.watchdog_timeout_ms > 0).then(|| Duration::from_millis(self.watchdog_timeout_ms))
    }

    /// 设置看门狗等待时间
    pub fn with_watchdog_timeout(mut self, timeout: Duration) -> Self {
        self.watchdog_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// 设置是否启用循环依赖检测
    pub fn with_circular_dependency_detection(mut self, enabled: bool) -> Self {
        self.enable_circular_dependency_detection = enabled;
        self
    }
}
