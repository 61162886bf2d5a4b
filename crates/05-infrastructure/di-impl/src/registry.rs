//! 组件注册表实现

use crate::build::ComponentBuild;
use async_trait::async_trait;
use di_abstractions::{
    ComponentBuilder, ComponentRegistry, ComponentSelector, ComponentValue, DoneCallback,
    ProgressCallback, RegistryStats,
};
use indexmap::IndexMap;
use infrastructure_common::{DependencyError, DependencyResult, RegistryConfig};
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// 注册表中每个名称对应的存储单元
pub(crate) enum Slot {
    /// 已注册，尚未解析
    Pending(Arc<ComponentBuild>),
    /// 已解析的最终值
    Resolved(ComponentValue),
}

struct RegistryInner {
    slots: RwLock<IndexMap<String, Slot>>,
    config: RegistryConfig,
}

/// 组件注册表实现
///
/// 克隆得到的句柄共享同一份注册表；不同的 `new()` 实例之间互不影响。
#[derive(Clone)]
pub struct ComponentRegistryImpl {
    inner: Arc<RegistryInner>,
}

impl ComponentRegistryImpl {
    /// 使用默认配置创建注册表
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// 使用指定配置创建注册表
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                slots: RwLock::new(IndexMap::new()),
                config,
            }),
        }
    }

    /// 注册表配置
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// 解析单个组件
    pub async fn resolve_one(&self, name: &str) -> DependencyResult<ComponentValue> {
        let mut values = self.resolve(ComponentSelector::one(name)).await?;
        values.pop().ok_or_else(|| DependencyError::ResolutionAborted {
            message: format!("组件 {} 未返回任何值", name),
        })
    }

    /// 解析单个组件并转换为具体类型
    pub async fn resolve_as<T>(&self, name: &str) -> DependencyResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.resolve_one(name)
            .await?
            .downcast::<T>()
            .map_err(|_| DependencyError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>().to_string(),
            })
    }

    pub(crate) fn slots(&self) -> &RwLock<IndexMap<String, Slot>> {
        &self.inner.slots
    }

    #[cfg(test)]
    pub(crate) fn pending_build(&self, name: &str) -> Option<Arc<ComponentBuild>> {
        match self.inner.slots.read().get(name) {
            Some(Slot::Pending(build)) => Some(Arc::clone(build)),
            _ => None,
        }
    }

    /// 用最终值替换组件的存储单元，保持注册顺序不变
    pub(crate) fn store_resolved(&self, name: &str, value: ComponentValue) {
        if let Some(slot) = self.inner.slots.write().get_mut(name) {
            *slot = Slot::Resolved(value);
        }
    }
}

impl Default for ComponentRegistryImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentRegistryImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistryImpl")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[async_trait]
impl ComponentRegistry for ComponentRegistryImpl {
    fn register_with_dependencies(
        &self,
        name: &str,
        dependencies: Vec<String>,
        builder: ComponentBuilder,
    ) -> DependencyResult<()> {
        let mut slots = self.inner.slots.write();
        if slots.contains_key(name) {
            warn!(component = name, "组件重复注册");
            return Err(DependencyError::AlreadyRegistered {
                name: name.to_string(),
            });
        }

        info!(
            component = name,
            dependencies = ?dependencies,
            mode = ?builder.mode(),
            "注册组件"
        );
        let build = ComponentBuild::new(name.to_string(), dependencies, builder);
        slots.insert(name.to_string(), Slot::Pending(Arc::new(build)));
        Ok(())
    }

    fn is_registered(&self, name: &str) -> bool {
        self.inner.slots.read().contains_key(name)
    }

    fn is_resolved(&self, name: &str) -> bool {
        matches!(self.inner.slots.read().get(name), Some(Slot::Resolved(_)))
    }

    fn registered_names(&self) -> Vec<String> {
        self.inner.slots.read().keys().cloned().collect()
    }

    fn stats(&self) -> RegistryStats {
        let slots = self.inner.slots.read();
        let mut stats = RegistryStats {
            registered: slots.len(),
            ..RegistryStats::default()
        };
        for slot in slots.values() {
            match slot {
                Slot::Resolved(_) => stats.resolved += 1,
                Slot::Pending(build) if build.is_building() => stats.building += 1,
                Slot::Pending(_) => stats.idle += 1,
            }
        }
        stats
    }

    fn resolve_with(
        &self,
        selector: ComponentSelector,
        on_done: DoneCallback,
        on_progress: Option<ProgressCallback>,
    ) -> DependencyResult<()> {
        let names = match selector {
            ComponentSelector::All => self.registered_names(),
            ComponentSelector::Names(names) => names,
        };

        self.validate_graph(&names)?;
        debug!(components = ?names, "解析组件");
        self.dispatch_watched(names, on_done, on_progress)
    }

    async fn resolve(&self, selector: ComponentSelector) -> DependencyResult<Vec<ComponentValue>> {
        let (tx, rx) = oneshot::channel();
        self.resolve_with(
            selector,
            Box::new(move |values| {
                let _ = tx.send(values);
            }),
            None,
        )?;

        rx.await.map_err(|_| DependencyError::ResolutionAborted {
            message: "解析完成回调在交付结果前被丢弃".to_string(),
        })
    }
}
