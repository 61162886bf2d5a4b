//! 组件注册表抽象接口

use crate::component::{ComponentBuilder, ComponentValue};
use crate::selector::ComponentSelector;
use async_trait::async_trait;
use infrastructure_common::DependencyResult;
use std::sync::Arc;

/// 解析完成回调，按请求顺序接收全部组件值
pub type DoneCallback = Box<dyn FnOnce(Vec<ComponentValue>) + Send>;

/// 解析进度回调，每当一个等待中的组件就绪（且整批尚未完成）时调用
pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// 组件注册表 trait
///
/// 组件按名称注册，首次被请求时才构建，且每个组件最多构建一次。
#[async_trait]
pub trait ComponentRegistry: Send + Sync {
    /// 注册无依赖组件
    fn register(&self, name: &str, builder: ComponentBuilder) -> DependencyResult<()> {
        self.register_with_dependencies(name, Vec::new(), builder)
    }

    /// 注册组件及其依赖列表
    ///
    /// 依赖无需事先注册，只要在组件首次被请求前注册即可。
    fn register_with_dependencies(
        &self,
        name: &str,
        dependencies: Vec<String>,
        builder: ComponentBuilder,
    ) -> DependencyResult<()>;

    /// 检查组件是否已注册
    fn is_registered(&self, name: &str) -> bool;

    /// 检查组件是否已构建完成
    fn is_resolved(&self, name: &str) -> bool;

    /// 按注册顺序返回全部组件名称
    fn registered_names(&self) -> Vec<String>;

    /// 获取注册表统计信息
    fn stats(&self) -> RegistryStats;

    /// 解析组件，完成后调用 `on_done`
    ///
    /// `on_done` 总是在调用者的调用栈之外执行，且只执行一次。
    /// 未注册的名称会立即返回错误，此时不会触发任何构建。
    fn resolve_with(
        &self,
        selector: ComponentSelector,
        on_done: DoneCallback,
        on_progress: Option<ProgressCallback>,
    ) -> DependencyResult<()>;

    /// 解析组件并等待结果
    async fn resolve(&self, selector: ComponentSelector) -> DependencyResult<Vec<ComponentValue>>;
}

/// 注册表统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// 已注册组件数量
    pub registered: usize,
    /// 已构建完成的组件数量
    pub resolved: usize,
    /// 正在构建的组件数量
    pub building: usize,
    /// 尚未开始构建的组件数量
    pub idle: usize,
}
