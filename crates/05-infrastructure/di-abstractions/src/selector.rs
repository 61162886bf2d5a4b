//! 组件选择器
//!
//! 描述一次解析请求要获取哪些组件。

/// 通配符，表示解析时刻注册表中的全部组件
pub const WILDCARD: &str = "*";

/// 组件选择器
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentSelector {
    /// 解析开始时已注册的全部组件，按注册顺序
    All,
    /// 按给定顺序解析指定组件
    Names(Vec<String>),
}

impl ComponentSelector {
    /// 单个组件
    pub fn one(name: impl Into<String>) -> Self {
        Self::Names(vec![name.into()])
    }
}

impl From<&str> for ComponentSelector {
    fn from(name: &str) -> Self {
        if name == WILDCARD {
            Self::All
        } else {
            Self::one(name)
        }
    }
}

impl From<String> for ComponentSelector {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<Vec<String>> for ComponentSelector {
    fn from(names: Vec<String>) -> Self {
        Self::Names(names)
    }
}

impl From<Vec<&str>> for ComponentSelector {
    fn from(names: Vec<&str>) -> Self {
        Self::from(names.as_slice())
    }
}

impl From<&[&str]> for ComponentSelector {
    fn from(names: &[&str]) -> Self {
        Self::Names(names.iter().map(|name| (*name).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ComponentSelector {
    fn from(names: [&str; N]) -> Self {
        Self::from(names.as_slice())
    }
}
