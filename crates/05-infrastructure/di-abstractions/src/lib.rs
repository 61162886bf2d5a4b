//! # Dependency Injection Abstractions
//!
//! 惰性组件注册表抽象层，定义组件注册和批量解析的核心接口。
//!
//! ## 核心接口
//!
//! - [`ComponentRegistry`] - 组件注册表接口
//! - [`ComponentBuilder`] - 显式标记同步/异步的组件构建器
//! - [`Completion`] - 异步构建器的完成句柄
//! - [`ComponentSelector`] - 单个名称、名称列表或通配符

pub mod component;
pub mod registry;
pub mod selector;

pub use component::*;
pub use registry::*;
pub use selector::*;
