//! 依赖图校验
//!
//! 在触发任何构建之前，沿未解析组件的依赖边做深度优先遍历：
//! 未注册的名称和解析链中重复出现的名称都会立即报错。

use crate::registry::{ComponentRegistryImpl, Slot};
use indexmap::IndexMap;
use infrastructure_common::{DependencyError, DependencyResult, RegistryConfig};
use std::collections::HashSet;
use tracing::debug;

impl ComponentRegistryImpl {
    /// 校验请求名称及其传递依赖
    pub(crate) fn validate_graph(&self, names: &[String]) -> DependencyResult<()> {
        let slots = self.slots().read();
        let mut walk = GraphWalk {
            slots: &*slots,
            config: self.config(),
            visited: HashSet::new(),
            chain: Vec::new(),
        };

        for name in names {
            walk.visit(name)?;
        }
        Ok(())
    }
}

struct GraphWalk<'a> {
    slots: &'a IndexMap<String, Slot>,
    config: &'a RegistryConfig,
    visited: HashSet<&'a str>,
    /// 当前解析链
    chain: Vec<String>,
}

impl<'a> GraphWalk<'a> {
    fn visit(&mut self, name: &str) -> DependencyResult<()> {
        if self.chain.iter().any(|link| link == name) {
            if self.config.enable_circular_dependency_detection {
                return Err(DependencyError::circular(&self.chain, name));
            }
            debug!(component = name, chain = ?self.chain, "循环依赖检测已关闭，跳过");
            return Ok(());
        }

        if self.visited.contains(name) {
            return Ok(());
        }

        let slots = self.slots;
        let Some((key, slot)) = slots.get_key_value(name) else {
            debug!(component = name, chain = ?self.chain, "依赖图中存在未注册的组件");
            return Err(DependencyError::not_registered(name));
        };

        if let Slot::Pending(build) = slot {
            if self.chain.len() >= self.config.max_resolution_depth {
                return Err(DependencyError::DependencyResolutionFailed {
                    name: name.to_string(),
                    message: format!("依赖深度超过上限 {}", self.config.max_resolution_depth),
                });
            }

            self.chain.push(key.clone());
            for dependency in build.dependencies() {
                self.visit(dependency)?;
            }
            self.chain.pop();
        }

        self.visited.insert(key.as_str());
        Ok(())
    }
}
