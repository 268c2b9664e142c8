//! 内存版发布记录仓储（InMemoryEventPublicationRepository）
//!
//! 基于 `DashMap` 的参考实现，满足 `EventPublicationRepository` 协议：
//! - 每次读取都返回“重建”的记录（事件值相同、实例标识不同），与真实存储的往返行为一致；
//! - 条件更新在持有记录分片写锁的情况下完成，`mark_resubmitted` 因此是原子的；
//! - 同一发布时间的记录按写入顺序返回。
//!
//! 典型用途：测试环境、示例与本地开发。
//!
use crate::error::DomainResult as Result;
use crate::persist::{EventPublicationRepository, FailedCriteria};
use crate::publication::{
    EventPublication, PublicationId, PublicationStatus, PublishedEvent, TargetIdentifier,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug)]
struct StoredPublication {
    sequence: u64,
    publication: EventPublication,
}

#[derive(Debug, Default)]
pub struct InMemoryEventPublicationRepository {
    publications: DashMap<PublicationId, StoredPublication>,
    sequence: AtomicU64,
}

impl InMemoryEventPublicationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.publications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publications.is_empty()
    }

    /// 读取单条记录（测试与诊断用）
    pub fn get(&self, id: PublicationId) -> Option<EventPublication> {
        self.publications
            .get(&id)
            .map(|stored| stored.publication.detached())
    }

    /// 按发布时间、写入顺序收集满足条件的记录
    fn select<F>(&self, predicate: F) -> Vec<EventPublication>
    where
        F: Fn(&EventPublication) -> bool,
    {
        let mut matched: Vec<(DateTime<Utc>, u64, EventPublication)> = self
            .publications
            .iter()
            .filter(|entry| predicate(&entry.publication))
            .map(|entry| {
                (
                    entry.publication.publication_date(),
                    entry.sequence,
                    entry.publication.detached(),
                )
            })
            .collect();

        matched.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        matched.into_iter().map(|(_, _, p)| p).collect()
    }

    /// 在记录锁内执行状态迁移；记录不存在时返回 false
    fn transition<F>(&self, id: PublicationId, f: F) -> bool
    where
        F: FnOnce(&mut EventPublication) -> bool,
    {
        match self.publications.get_mut(&id) {
            Some(mut stored) => f(&mut stored.publication),
            None => false,
        }
    }
}

#[async_trait]
impl EventPublicationRepository for InMemoryEventPublicationRepository {
    async fn create(&self, publication: EventPublication) -> Result<EventPublication> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.publications.insert(
            publication.identifier(),
            StoredPublication {
                sequence,
                publication: publication.clone(),
            },
        );
        Ok(publication)
    }

    async fn mark_processing(&self, id: PublicationId) -> Result<()> {
        let changed = self.transition(id, EventPublication::mark_processing);
        debug!(%id, changed, "mark processing");
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: PublicationId,
        completion_date: DateTime<Utc>,
    ) -> Result<()> {
        let changed = self.transition(id, |p| p.mark_completed(completion_date));
        debug!(%id, changed, "mark completed");
        Ok(())
    }

    async fn mark_failed(&self, id: PublicationId) -> Result<()> {
        let changed = self.transition(id, EventPublication::mark_failed);
        debug!(%id, changed, "mark failed");
        Ok(())
    }

    async fn mark_failed_if_stale(
        &self,
        id: PublicationId,
        status: PublicationStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.transition(id, |p| p.mark_failed_if_stale(status, cutoff));
        debug!(%id, %status, changed, "mark failed if stale");
        Ok(changed)
    }

    async fn mark_resubmitted(&self, id: PublicationId, at: DateTime<Utc>) -> Result<bool> {
        Ok(self.transition(id, |p| p.mark_resubmitted(at)))
    }

    async fn find_incomplete_publications(&self) -> Result<Vec<EventPublication>> {
        Ok(self.select(|p| !p.is_completed()))
    }

    async fn find_incomplete_publications_published_before(
        &self,
        instant: DateTime<Utc>,
    ) -> Result<Vec<EventPublication>> {
        Ok(self.select(|p| !p.is_completed() && p.is_published_before(instant)))
    }

    async fn find_failed_publications(
        &self,
        criteria: FailedCriteria,
    ) -> Result<Vec<EventPublication>> {
        let mut failed = self.select(|p| criteria.accepts(p));
        failed.truncate(criteria.max_items_to_read);
        Ok(failed)
    }

    async fn find_by_status(&self, status: PublicationStatus) -> Result<Vec<EventPublication>> {
        Ok(self.select(|p| p.status() == status))
    }

    async fn count_by_status(&self, status: PublicationStatus) -> Result<usize> {
        Ok(self
            .publications
            .iter()
            .filter(|entry| entry.publication.status() == status)
            .count())
    }

    async fn find_completed_publications(&self) -> Result<Vec<EventPublication>> {
        Ok(self.select(EventPublication::is_completed))
    }

    async fn find_publications_by_event_and_target(
        &self,
        event: &PublishedEvent,
        target: &TargetIdentifier,
    ) -> Result<Vec<EventPublication>> {
        Ok(self.select(|p| p.matches(event, target)))
    }

    async fn delete_completed_publications_before(&self, instant: DateTime<Utc>) -> Result<()> {
        self.publications.retain(|_, stored| {
            !(stored.publication.is_completed()
                && stored
                    .publication
                    .completion_date()
                    .is_some_and(|at| at < instant))
        });
        Ok(())
    }

    async fn delete_publications(&self, ids: &[PublicationId]) -> Result<()> {
        for id in ids {
            self.publications.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;
    use std::sync::Arc;

    fn event(n: u32) -> PublishedEvent {
        PublishedEvent::new("OrderPlaced", json!({ "n": n }))
    }

    fn publication_at(n: u32, at: DateTime<Utc>) -> EventPublication {
        EventPublication::new(event(n), TargetIdentifier::new("inventory"), at)
    }

    #[tokio::test]
    async fn incomplete_are_returned_oldest_first() {
        let repo = InMemoryEventPublicationRepository::new();
        let t1 = Utc::now();
        let t2 = t1 + TimeDelta::seconds(1);
        let t3 = t1 + TimeDelta::seconds(2);

        // 乱序写入
        let p3 = repo.create(publication_at(3, t3)).await.unwrap();
        let p1 = repo.create(publication_at(1, t1)).await.unwrap();
        let p2 = repo.create(publication_at(2, t2)).await.unwrap();

        let ids: Vec<_> = repo
            .find_incomplete_publications()
            .await
            .unwrap()
            .iter()
            .map(EventPublication::identifier)
            .collect();
        assert_eq!(ids, vec![p1.identifier(), p2.identifier(), p3.identifier()]);

        let before: Vec<_> = repo
            .find_incomplete_publications_published_before(t3)
            .await
            .unwrap()
            .iter()
            .map(EventPublication::identifier)
            .collect();
        assert_eq!(before, vec![p1.identifier(), p2.identifier()]);
    }

    #[tokio::test]
    async fn reads_are_detached_copies() {
        let repo = InMemoryEventPublicationRepository::new();
        let created = repo.create(publication_at(1, Utc::now())).await.unwrap();

        let read = repo.get(created.identifier()).unwrap();
        assert!(read.event().same_value(created.event()));
        assert!(!read.event().same_instance(created.event()));

        let found = repo
            .find_publications_by_event_and_target(&event(1), &"inventory".into())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identifier(), created.identifier());
    }

    #[tokio::test]
    async fn completion_keeps_first_date() {
        let repo = InMemoryEventPublicationRepository::new();
        let p = repo.create(publication_at(1, Utc::now())).await.unwrap();
        let first = Utc::now();

        repo.mark_completed(p.identifier(), first).await.unwrap();
        repo.mark_completed(p.identifier(), first + TimeDelta::seconds(30))
            .await
            .unwrap();

        let stored = repo.get(p.identifier()).unwrap();
        assert_eq!(stored.status(), PublicationStatus::Completed);
        assert_eq!(stored.completion_date(), Some(first));
        assert!(repo.find_incomplete_publications().await.unwrap().is_empty());
        assert_eq!(repo.find_completed_publications().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_yield_exactly_one_winner() {
        let repo = Arc::new(InMemoryEventPublicationRepository::new());
        let p = repo.create(publication_at(1, Utc::now())).await.unwrap();
        repo.mark_failed(p.identifier()).await.unwrap();

        let claims = (0..8).map(|_| {
            let repo = repo.clone();
            let id = p.identifier();
            tokio::spawn(async move { repo.mark_resubmitted(id, Utc::now()).await.unwrap() })
        });
        let results = futures_util::future::join_all(claims).await;
        let winners = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();

        assert_eq!(winners, 1);
        let stored = repo.get(p.identifier()).unwrap();
        assert_eq!(stored.status(), PublicationStatus::Resubmitted);
        assert_eq!(stored.completion_attempts(), 1);
    }

    #[tokio::test]
    async fn failed_criteria_limits_and_ages() {
        let repo = InMemoryEventPublicationRepository::new();
        let t0 = Utc::now();
        for n in 0..5 {
            let p = repo
                .create(publication_at(n, t0 + TimeDelta::seconds(n as i64)))
                .await
                .unwrap();
            repo.mark_failed(p.identifier()).await.unwrap();
        }

        let limited = repo
            .find_failed_publications(FailedCriteria::new(None, 2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].event().payload(), &json!({"n": 0}));

        let aged = repo
            .find_failed_publications(FailedCriteria::new(Some(t0 + TimeDelta::seconds(2)), 10))
            .await
            .unwrap();
        assert_eq!(aged.len(), 2);
        assert_eq!(repo.count_by_status(PublicationStatus::Failed).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn deletes_completed_before_instant_and_by_id() {
        let repo = InMemoryEventPublicationRepository::new();
        let t0 = Utc::now();
        let old = repo.create(publication_at(1, t0)).await.unwrap();
        let recent = repo.create(publication_at(2, t0)).await.unwrap();
        let open = repo.create(publication_at(3, t0)).await.unwrap();

        repo.mark_completed(old.identifier(), t0).await.unwrap();
        repo.mark_completed(recent.identifier(), t0 + TimeDelta::seconds(60))
            .await
            .unwrap();

        repo.delete_completed_publications_before(t0 + TimeDelta::seconds(30))
            .await
            .unwrap();
        assert!(repo.get(old.identifier()).is_none());
        assert!(repo.get(recent.identifier()).is_some());
        assert!(repo.get(open.identifier()).is_some());

        repo.delete_publications(&[recent.identifier(), open.identifier()])
            .await
            .unwrap();
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn stale_failure_skips_rows_that_moved_on() {
        let repo = InMemoryEventPublicationRepository::new();
        let t0 = Utc::now();
        let cutoff = t0 + TimeDelta::seconds(1);
        let done = repo.create(publication_at(1, t0)).await.unwrap();
        let stuck = repo.create(publication_at(2, t0)).await.unwrap();
        repo.mark_processing(done.identifier()).await.unwrap();
        repo.mark_processing(stuck.identifier()).await.unwrap();

        // 读取之后、写入之前被完成
        repo.mark_completed(done.identifier(), cutoff).await.unwrap();

        assert!(
            !repo
                .mark_failed_if_stale(done.identifier(), PublicationStatus::Processing, cutoff)
                .await
                .unwrap()
        );
        assert!(
            repo.mark_failed_if_stale(stuck.identifier(), PublicationStatus::Processing, cutoff)
                .await
                .unwrap()
        );
        assert!(
            !repo
                .mark_failed_if_stale(stuck.identifier(), PublicationStatus::Processing, cutoff)
                .await
                .unwrap()
        );

        assert_eq!(
            repo.get(done.identifier()).unwrap().status(),
            PublicationStatus::Completed
        );
        assert_eq!(
            repo.get(stuck.identifier()).unwrap().status(),
            PublicationStatus::Failed
        );
    }
}
