//! 组件值与构建器定义
//!
//! 组件构建器在注册时显式声明为同步或异步：
//!
//! - 同步构建器接收按声明顺序排列的依赖值，直接返回组件值
//! - 异步构建器额外接收一个 [`Completion`]，在组件就绪时调用一次

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// 已解析的组件值
pub type ComponentValue = Arc<dyn Any + Send + Sync>;

/// 同步构建函数
pub type SyncBuilderFn = Box<dyn FnOnce(Vec<ComponentValue>) -> ComponentValue + Send>;

/// 异步构建函数
pub type AsyncBuilderFn = Box<dyn FnOnce(Vec<ComponentValue>, Completion) + Send>;

/// 将任意值包装为组件值
pub fn component_value<T>(value: T) -> ComponentValue
where
    T: Any + Send + Sync,
{
    Arc::new(value)
}

/// 构建模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    /// 构建器直接返回组件值
    Sync,
    /// 构建器通过完成回调交付组件值
    Async,
}

/// 组件构建器
///
/// 每个构建器最多执行一次。
pub enum ComponentBuilder {
    /// 同步构建器
    Sync(SyncBuilderFn),
    /// 异步构建器
    Async(AsyncBuilderFn),
}

impl ComponentBuilder {
    /// 常量组件：始终产出给定的值
    pub fn value<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::from_value(component_value(value))
    }

    /// 常量组件（已包装的值）
    pub fn from_value(value: ComponentValue) -> Self {
        Self::Sync(Box::new(move |_| value))
    }

    /// 同步构建器
    pub fn sync<F, T>(builder: F) -> Self
    where
        F: FnOnce(Vec<ComponentValue>) -> T + Send + 'static,
        T: Any + Send + Sync,
    {
        Self::Sync(Box::new(move |deps| component_value(builder(deps))))
    }

    /// 异步构建器，构建完成后必须调用 [`Completion::complete`]
    pub fn asynchronous<F>(builder: F) -> Self
    where
        F: FnOnce(Vec<ComponentValue>, Completion) + Send + 'static,
    {
        Self::Async(Box::new(builder))
    }

    /// 基于 `Future` 的异步构建器
    ///
    /// 返回的 future 会在当前 Tokio 运行时上执行。
    pub fn future<F, Fut, T>(builder: F) -> Self
    where
        F: FnOnce(Vec<ComponentValue>) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Any + Send + Sync,
    {
        Self::Async(Box::new(move |deps, done| {
            let pending = builder(deps);
            tokio::spawn(async move {
                done.complete(pending.await);
            });
        }))
    }

    /// 构建模式
    pub fn mode(&self) -> BuildMode {
        match self {
            Self::Sync(_) => BuildMode::Sync,
            Self::Async(_) => BuildMode::Async,
        }
    }
}

impl fmt::Debug for ComponentBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentBuilder")
            .field(&self.mode())
            .finish()
    }
}

/// 异步构建器的完成句柄
///
/// `complete` 会消耗句柄，因此每个组件最多交付一次结果。
/// 未调用就被丢弃的句柄会记录警告，对应组件将永远停留在构建中状态。
pub struct Completion {
    component: String,
    deliver: Option<Box<dyn FnOnce(ComponentValue) + Send>>,
}

impl Completion {
    /// 创建完成句柄
    pub fn new<F>(component: impl Into<String>, deliver: F) -> Self
    where
        F: FnOnce(ComponentValue) + Send + 'static,
    {
        Self {
            component: component.into(),
            deliver: Some(Box::new(deliver)),
        }
    }

    /// 组件名称
    pub fn component(&self) -> &str {
        &self.component
    }

    /// 交付组件值
    pub fn complete<T>(self, value: T)
    where
        T: Any + Send + Sync,
    {
        self.complete_value(component_value(value));
    }

    /// 交付已包装的组件值
    pub fn complete_value(mut self, value: ComponentValue) {
        if let Some(deliver) = self.deliver.take() {
            deliver(value);
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("component", &self.component)
            .field("delivered", &self.deliver.is_none())
            .finish()
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.deliver.is_some() {
            tracing::warn!(
                component = %self.component,
                "异步构建器未调用完成回调，组件将无法解析"
            );
        }
    }
}
