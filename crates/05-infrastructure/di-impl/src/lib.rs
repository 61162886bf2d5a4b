//! # 依赖注入具体实现
//!
//! 惰性命名组件注册表：组件在首次被请求时才解析其依赖并构建，
//! 每个组件最多构建一次，结果被缓存并分发给所有并发的请求者。
//!
//! - [`ComponentRegistryImpl`] - 注册表，实现 [`di_abstractions::ComponentRegistry`]
//!
//! 解析总是异步完成，必须在 Tokio 运行时内发起。

mod build;
mod graph;
mod registry;
mod resolver;

pub use registry::ComponentRegistryImpl;
