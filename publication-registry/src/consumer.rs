//! 重投消费者（PublicationConsumer）
//!
//! 注册表在重投时把已认领的记录交给消费者，由外部派发机制负责真正调用目标；
//! 派发完成后应回调注册表的 `mark_completed`/`mark_failed`/`mark_processing`。
//!
use async_trait::async_trait;
use publication_domain::publication::EventPublication;

#[async_trait]
pub trait PublicationConsumer: Send + Sync {
    /// 交付一条已认领的记录；返回错误时注册表只解除在途跟踪，记录保持 Resubmitted
    async fn resubmit(&self, publication: EventPublication) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> PublicationConsumer for F
where
    F: Fn(EventPublication) -> anyhow::Result<()> + Send + Sync,
{
    async fn resubmit(&self, publication: EventPublication) -> anyhow::Result<()> {
        (self)(publication)
    }
}
