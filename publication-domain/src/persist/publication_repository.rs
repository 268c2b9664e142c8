//! 发布记录仓储协议
//!
//! 所有查询均按发布时间从早到晚返回。`mark_resubmitted` 必须实现为单次条件写
//! （按预期旧状态更新），以保证并发调度下每条记录至多被一个调用方认领。
//!
use crate::error::DomainResult as Result;
use crate::publication::{
    EventPublication, PublicationId, PublicationStatus, PublishedEvent, TargetIdentifier,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// 失败记录的读取条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedCriteria {
    /// 只读取发布时间早于该时刻的记录；None 表示不限
    pub reference_instant: Option<DateTime<Utc>>,
    /// 最多读取条数
    pub max_items_to_read: usize,
}

impl FailedCriteria {
    pub fn new(reference_instant: Option<DateTime<Utc>>, max_items_to_read: usize) -> Self {
        Self {
            reference_instant,
            max_items_to_read,
        }
    }

    pub fn accepts(&self, publication: &EventPublication) -> bool {
        publication.status() == PublicationStatus::Failed
            && self
                .reference_instant
                .is_none_or(|instant| publication.is_published_before(instant))
    }
}

#[async_trait]
pub trait EventPublicationRepository: Send + Sync {
    async fn create(&self, publication: EventPublication) -> Result<EventPublication>;

    async fn mark_processing(&self, id: PublicationId) -> Result<()>;

    /// 已完成的记录保持原完成时间不变
    async fn mark_completed(&self, id: PublicationId, completion_date: DateTime<Utc>)
    -> Result<()>;

    async fn mark_failed(&self, id: PublicationId) -> Result<()>;

    /// 陈旧回收专用的条件失败：记录仍处于 `status` 且陈旧参照时间早于 `cutoff`
    /// 时才迁移为 Failed，并返回 `true`
    async fn mark_failed_if_stale(
        &self,
        id: PublicationId,
        status: PublicationStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<bool>;

    /// 原子认领：仅完成状态迁移的调用方得到 `true`
    async fn mark_resubmitted(&self, id: PublicationId, at: DateTime<Utc>) -> Result<bool>;

    async fn find_incomplete_publications(&self) -> Result<Vec<EventPublication>>;

    async fn find_incomplete_publications_published_before(
        &self,
        instant: DateTime<Utc>,
    ) -> Result<Vec<EventPublication>>;

    async fn find_failed_publications(
        &self,
        criteria: FailedCriteria,
    ) -> Result<Vec<EventPublication>>;

    async fn find_by_status(&self, status: PublicationStatus) -> Result<Vec<EventPublication>>;

    async fn count_by_status(&self, status: PublicationStatus) -> Result<usize>;

    async fn find_completed_publications(&self) -> Result<Vec<EventPublication>>;

    /// 按值查找某事件发往某目标的全部记录（任意状态）
    async fn find_publications_by_event_and_target(
        &self,
        event: &PublishedEvent,
        target: &TargetIdentifier,
    ) -> Result<Vec<EventPublication>>;

    async fn delete_completed_publications_before(&self, instant: DateTime<Utc>) -> Result<()>;

    async fn delete_publications(&self, ids: &[PublicationId]) -> Result<()>;
}

#[async_trait]
pub trait EventPublicationRepositoryExt: EventPublicationRepository {
    /// 按值查找最早的一条未完成记录
    async fn find_incomplete_publication_by_event_and_target(
        &self,
        event: &PublishedEvent,
        target: &TargetIdentifier,
    ) -> Result<Option<EventPublication>> {
        let publications = self
            .find_publications_by_event_and_target(event, target)
            .await?;

        Ok(publications.into_iter().find(|p| !p.is_completed()))
    }
}

#[async_trait]
impl<T> EventPublicationRepository for Arc<T>
where
    T: EventPublicationRepository + ?Sized,
{
    async fn create(&self, publication: EventPublication) -> Result<EventPublication> {
        (**self).create(publication).await
    }

    async fn mark_processing(&self, id: PublicationId) -> Result<()> {
        (**self).mark_processing(id).await
    }

    async fn mark_completed(
        &self,
        id: PublicationId,
        completion_date: DateTime<Utc>,
    ) -> Result<()> {
        (**self).mark_completed(id, completion_date).await
    }

    async fn mark_failed(&self, id: PublicationId) -> Result<()> {
        (**self).mark_failed(id).await
    }

    async fn mark_failed_if_stale(
        &self,
        id: PublicationId,
        status: PublicationStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<bool> {
        (**self).mark_failed_if_stale(id, status, cutoff).await
    }

    async fn mark_resubmitted(&self, id: PublicationId, at: DateTime<Utc>) -> Result<bool> {
        (**self).mark_resubmitted(id, at).await
    }

    async fn find_incomplete_publications(&self) -> Result<Vec<EventPublication>> {
        (**self).find_incomplete_publications().await
    }

    async fn find_incomplete_publications_published_before(
        &self,
        instant: DateTime<Utc>,
    ) -> Result<Vec<EventPublication>> {
        (**self)
            .find_incomplete_publications_published_before(instant)
            .await
    }

    async fn find_failed_publications(
        &self,
        criteria: FailedCriteria,
    ) -> Result<Vec<EventPublication>> {
        (**self).find_failed_publications(criteria).await
    }

    async fn find_by_status(&self, status: PublicationStatus) -> Result<Vec<EventPublication>> {
        (**self).find_by_status(status).await
    }

    async fn count_by_status(&self, status: PublicationStatus) -> Result<usize> {
        (**self).count_by_status(status).await
    }

    async fn find_completed_publications(&self) -> Result<Vec<EventPublication>> {
        (**self).find_completed_publications().await
    }

    async fn find_publications_by_event_and_target(
        &self,
        event: &PublishedEvent,
        target: &TargetIdentifier,
    ) -> Result<Vec<EventPublication>> {
        (**self)
            .find_publications_by_event_and_target(event, target)
            .await
    }

    async fn delete_completed_publications_before(&self, instant: DateTime<Utc>) -> Result<()> {
        (**self).delete_completed_publications_before(instant).await
    }

    async fn delete_publications(&self, ids: &[PublicationId]) -> Result<()> {
        (**self).delete_publications(ids).await
    }
}

#[async_trait]
impl<T> EventPublicationRepositoryExt for T where T: EventPublicationRepository + ?Sized {}
