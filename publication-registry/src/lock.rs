//! 批次互斥锁（PassLock）
//!
//! 跨进程时可由外部分布式锁实现，保证同一时刻只有一个实例执行某类批次
//! （陈旧回收、失败重投）。逐条记录的互斥由仓储的原子认领保证，与本锁无关；
//! 注册表本身不依赖该锁。
//!
use async_trait::async_trait;
use dashmap::DashSet;
use publication_domain::error::DomainResult as Result;

#[async_trait]
pub trait PassLock: Send + Sync {
    /// 尝试获取锁，已被占用时返回 `false`
    async fn try_lock(&self, pass: &str) -> Result<bool>;

    async fn unlock(&self, pass: &str) -> Result<()>;
}

/// 进程内锁，适用于单实例部署与测试
#[derive(Debug, Default)]
pub struct InMemoryPassLock {
    held: DashSet<String>,
}

impl InMemoryPassLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, pass: &str) -> bool {
        self.held.contains(pass)
    }
}

#[async_trait]
impl PassLock for InMemoryPassLock {
    async fn try_lock(&self, pass: &str) -> Result<bool> {
        Ok(self.held.insert(pass.to_string()))
    }

    async fn unlock(&self, pass: &str) -> Result<()> {
        self.held.remove(pass);
        Ok(())
    }
}
