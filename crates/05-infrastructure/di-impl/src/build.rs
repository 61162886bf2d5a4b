//! 组件构建状态机
//!
//! 每个已注册但尚未解析的组件对应一个 [`ComponentBuild`]：
//! `Idle` → `Building` → `Resolved`。构建器最多执行一次，
//! 构建期间登记的等待者按登记顺序各被通知一次。

use crate::registry::ComponentRegistryImpl;
use di_abstractions::{BuildMode, Completion, ComponentBuilder, ComponentValue, DoneCallback};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// 等待组件就绪的续体
pub(crate) type Waiter = Box<dyn FnOnce(ComponentValue) + Send>;

enum BuildState {
    Idle(ComponentBuilder),
    Building { waiters: Vec<Waiter> },
    Resolved(ComponentValue),
}

/// 单个组件的构建状态机
pub(crate) struct ComponentBuild {
    name: String,
    dependencies: Vec<String>,
    mode: BuildMode,
    state: Mutex<BuildState>,
}

impl ComponentBuild {
    pub(crate) fn new(name: String, dependencies: Vec<String>, builder: ComponentBuilder) -> Self {
        Self {
            name,
            dependencies,
            mode: builder.mode(),
            state: Mutex::new(BuildState::Idle(builder)),
        }
    }

    pub(crate) fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn mode(&self) -> BuildMode {
        self.mode
    }

    pub(crate) fn is_building(&self) -> bool {
        matches!(*self.state.lock(), BuildState::Building { .. })
    }

    /// 登记等待者，首次调用时启动构建
    pub(crate) fn build(self: &Arc<Self>, registry: &ComponentRegistryImpl, waiter: Waiter) {
        let mut state = self.state.lock();

        if let BuildState::Resolved(value) = &*state {
            let value = value.clone();
            drop(state);
            waiter(value);
            return;
        }

        if let BuildState::Building { waiters } = &mut *state {
            waiters.push(waiter);
            return;
        }

        let previous = std::mem::replace(
            &mut *state,
            BuildState::Building {
                waiters: vec![waiter],
            },
        );
        drop(state);

        if let BuildState::Idle(builder) = previous {
            self.start(registry.clone(), builder);
        }
    }

    fn start(self: &Arc<Self>, registry: ComponentRegistryImpl, builder: ComponentBuilder) {
        debug!(
            component = %self.name,
            mode = ?self.mode(),
            dependencies = ?self.dependencies,
            "开始构建组件"
        );

        let this = Arc::clone(self);
        if self.dependencies.is_empty() {
            tokio::spawn(async move {
                this.invoke(registry, builder, Vec::new());
            });
            return;
        }

        let deps_registry = registry.clone();
        let on_done: DoneCallback =
            Box::new(move |values| this.invoke(deps_registry, builder, values));
        if let Err(error) = registry.dispatch(self.dependencies.clone(), on_done, None) {
            tracing::error!(
                component = %self.name,
                %error,
                "组件依赖解析失败，组件将保持构建中状态"
            );
        }
    }

    fn invoke(
        self: Arc<Self>,
        registry: ComponentRegistryImpl,
        builder: ComponentBuilder,
        dependencies: Vec<ComponentValue>,
    ) {
        match builder {
            ComponentBuilder::Sync(build) => {
                let value = build(dependencies);
                self.complete(&registry, value);
            }
            ComponentBuilder::Async(build) => {
                let this = Arc::clone(&self);
                let completion = Completion::new(self.name.clone(), move |value| {
                    this.complete(&registry, value);
                });
                build(dependencies, completion);
            }
        }
    }

    fn complete(&self, registry: &ComponentRegistryImpl, value: ComponentValue) {
        let waiters = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, BuildState::Resolved(value.clone())) {
                BuildState::Building { waiters } => waiters,
                previous => {
                    *state = previous;
                    warn!(component = %self.name, "组件不在构建中，忽略交付的值");
                    return;
                }
            }
        };

        registry.store_resolved(&self.name, value.clone());
        debug!(component = %self.name, waiters = waiters.len(), "组件构建完成");

        for waiter in waiters {
            waiter(value.clone());
        }
    }
}

impl fmt::Debug for ComponentBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentBuild")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("mode", &self.mode)
            .field("building", &self.is_building())
            .finish()
    }
}
