//! 持久化（persist）
//!
//! 定义发布记录仓储协议及其内存参考实现：
//! - 记录创建、状态迁移与原子认领（`EventPublicationRepository`）；
//! - 未完成、失败、已完成记录的查询与清理；
//! - 基于 `DashMap` 的 `InMemoryEventPublicationRepository`。
//!
//! 该模块只定义协议，具体存储后端（如 Postgres、文档库）由上层提供实现并注入。
//!
mod publication_repository;
mod publication_repository_inmemory;

pub use publication_repository::{
    EventPublicationRepository, EventPublicationRepositoryExt, FailedCriteria,
};
pub use publication_repository_inmemory::InMemoryEventPublicationRepository;
