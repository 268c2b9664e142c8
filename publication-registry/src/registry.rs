//! 事件发布注册表（EventPublicationRegistry）
//!
//! 发布记录状态机的驱动者：
//! - 扇出：为每个目标创建一条 Published 记录并登记在途；
//! - 路由派发回调：processing / completed / failed；
//! - 陈旧回收：将长期停留在 Processing/Resubmitted 的记录置为 Failed；
//! - 有界重投：原子认领 Failed（或遗留未完成）记录并交给消费者；
//! - 关闭时列出仍未完成的记录（仅诊断日志）。
//!
//! 注册表自身不管理事务，`store` 应在调用方决定发布事件的工作单元内调用。
//! 所有方法都可被多个任务并发调用；仓储错误原样向上传播，不做原地重试。
//!
use crate::consumer::PublicationConsumer;
use crate::tracker::InFlightTracker;
use bon::Builder;
use publication_domain::clock::{Clock, SystemClock, instant_before};
use publication_domain::error::{DomainError, DomainResult as Result};
use publication_domain::persist::{EventPublicationRepository, FailedCriteria};
use publication_domain::policy::{ResubmissionPolicy, StalenessPolicy};
use publication_domain::publication::{
    EventPublication, PublicationId, PublicationStatus, PublishedEvent, TargetIdentifier,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Builder)]
pub struct EventPublicationRegistry {
    repository: Arc<dyn EventPublicationRepository>,
    #[builder(default)]
    staleness: StalenessPolicy,
    #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)]
    clock: Arc<dyn Clock>,
    #[builder(skip)]
    in_flight: InFlightTracker,
}

impl EventPublicationRegistry {
    /// 使用系统时钟、不做陈旧判定的注册表
    pub fn new(repository: Arc<dyn EventPublicationRepository>) -> Self {
        Self::builder().repository(repository).build()
    }

    pub fn repository(&self) -> &Arc<dyn EventPublicationRepository> {
        &self.repository
    }

    pub fn staleness(&self) -> &StalenessPolicy {
        &self.staleness
    }

    pub fn in_flight(&self) -> &InFlightTracker {
        &self.in_flight
    }

    /// 扇出：为每个不同的目标持久化一条 Published 记录并登记在途。
    ///
    /// 重复的目标只保留第一次出现；所有记录共享同一事件实例与发布时间。
    pub async fn store<I>(&self, event: PublishedEvent, targets: I) -> Result<Vec<EventPublication>>
    where
        I: IntoIterator<Item = TargetIdentifier>,
    {
        let publication_date = self.clock.now();
        let mut seen = HashSet::new();
        let targets: Vec<TargetIdentifier> = targets
            .into_iter()
            .filter(|target| seen.insert(target.clone()))
            .collect();

        // 全部持久化成功后才登记在途
        let mut created = Vec::with_capacity(targets.len());
        for target in targets {
            let publication = EventPublication::new(event.clone(), target, publication_date);
            self.repository.create(publication.clone()).await?;
            created.push(publication);
        }

        for publication in &created {
            self.in_flight.register(publication.clone());
        }

        debug!(
            event_type = event.event_type(),
            targets = created.len(),
            "stored event publications"
        );

        Ok(created)
    }

    /// 尽力而为地将在途记录置为 Processing；无在途记录时静默返回
    pub async fn mark_processing(
        &self,
        event: &PublishedEvent,
        target: &TargetIdentifier,
    ) -> Result<()> {
        let Some(publication) = self.in_flight.lookup(event, target) else {
            debug!(%target, "no in-flight publication to mark processing");
            return Ok(());
        };

        self.repository
            .mark_processing(publication.identifier())
            .await?;

        self.in_flight.update(event, target, |tracked| {
            tracked.mark_processing();
        });

        Ok(())
    }

    /// 标记完成：优先走在途（实例）路径，否则按值回查仓储。
    ///
    /// 已完成的记录再次完成不产生任何变化；完全找不到记录时返回 `NotFound`。
    pub async fn mark_completed(
        &self,
        event: &PublishedEvent,
        target: &TargetIdentifier,
    ) -> Result<()> {
        let now = self.clock.now();

        if let Some(publication) = self.in_flight.lookup(event, target) {
            self.repository
                .mark_completed(publication.identifier(), now)
                .await?;
            self.in_flight.unregister_publication(&publication);
            debug!(id = %publication.identifier(), %target, "publication completed");
            return Ok(());
        }

        let publications = self
            .repository
            .find_publications_by_event_and_target(event, target)
            .await?;

        match publications.iter().find(|p| !p.is_completed()) {
            Some(publication) => {
                self.repository
                    .mark_completed(publication.identifier(), now)
                    .await?;
                self.in_flight.unregister_publication(publication);
                debug!(id = %publication.identifier(), %target, "persisted publication completed");
                Ok(())
            }
            None if !publications.is_empty() => {
                debug!(%target, "publication already completed");
                Ok(())
            }
            None => Err(Self::unknown_publication(event, target)),
        }
    }

    /// 标记失败：无论仓储更新是否成功，都先解除在途跟踪
    pub async fn mark_failed(&self, event: &PublishedEvent, target: &TargetIdentifier) -> Result<()> {
        if let Some(publication) = self.in_flight.unregister(event, target) {
            debug!(id = %publication.identifier(), %target, "publication failed");
            return self.repository.mark_failed(publication.identifier()).await;
        }

        let publications = self
            .repository
            .find_publications_by_event_and_target(event, target)
            .await?;

        match publications.iter().find(|p| !p.is_completed()) {
            Some(publication) => {
                self.in_flight.unregister_publication(publication);
                debug!(id = %publication.identifier(), %target, "persisted publication failed");
                self.repository.mark_failed(publication.identifier()).await
            }
            None if !publications.is_empty() => {
                debug!(%target, "publication already completed, ignoring failure");
                Ok(())
            }
            None => Err(Self::unknown_publication(event, target)),
        }
    }

    fn unknown_publication(event: &PublishedEvent, target: &TargetIdentifier) -> DomainError {
        DomainError::not_found(format!(
            "no publication of event {} for target {}",
            event.event_type(),
            target
        ))
    }

    pub async fn find_incomplete_publications(&self) -> Result<Vec<EventPublication>> {
        self.repository.find_incomplete_publications().await
    }

    pub async fn find_incomplete_publications_older_than(
        &self,
        age: Duration,
    ) -> Result<Vec<EventPublication>> {
        let instant = instant_before(self.clock.now(), age);
        self.repository
            .find_incomplete_publications_published_before(instant)
            .await
    }

    /// 重投未完成记录（可按年龄限定），返回成功交付给消费者的条数
    pub async fn process_incomplete_publications<F, C>(
        &self,
        filter: F,
        consumer: &C,
        max_age: Option<Duration>,
    ) -> Result<usize>
    where
        F: Fn(&EventPublication) -> bool + Send + Sync,
        C: PublicationConsumer + ?Sized,
    {
        let publications = match max_age {
            Some(age) => self.find_incomplete_publications_older_than(age).await?,
            None => self.find_incomplete_publications().await?,
        };

        self.claim_and_dispatch(publications, &filter, consumer)
            .await
    }

    /// 在并发上限内重投失败记录，返回成功交付给消费者的条数。
    ///
    /// 当前 Resubmitted 数已达 `max_in_flight` 时整批跳过；否则最多读取
    /// `min(batch_size, max_in_flight - in_flight)` 条。
    pub async fn process_failed_publications<C>(
        &self,
        policy: &ResubmissionPolicy,
        consumer: &C,
    ) -> Result<usize>
    where
        C: PublicationConsumer + ?Sized,
    {
        let in_flight = self
            .repository
            .count_by_status(PublicationStatus::Resubmitted)
            .await?;

        let items_to_read = policy.items_to_read(in_flight);
        if items_to_read == 0 {
            info!(
                in_flight,
                max_in_flight = ?policy.max_in_flight(),
                "resubmission ceiling reached, skipping pass"
            );
            return Ok(0);
        }

        let reference_instant = (!policy.min_age().is_zero())
            .then(|| instant_before(self.clock.now(), policy.min_age()));
        let failed = self
            .repository
            .find_failed_publications(FailedCriteria::new(reference_instant, items_to_read))
            .await?;

        let dispatched = self
            .claim_and_dispatch(failed, &|p: &EventPublication| policy.accepts(p), consumer)
            .await?;

        if dispatched > 0 {
            info!(dispatched, in_flight, "resubmitted failed publications");
        }

        Ok(dispatched)
    }

    async fn claim_and_dispatch<F, C>(
        &self,
        publications: Vec<EventPublication>,
        filter: &F,
        consumer: &C,
    ) -> Result<usize>
    where
        F: Fn(&EventPublication) -> bool + Send + Sync + ?Sized,
        C: PublicationConsumer + ?Sized,
    {
        let mut dispatched = 0;

        for mut publication in publications {
            if !filter(&publication) {
                continue;
            }

            let id = publication.identifier();
            let now = self.clock.now();
            if !self.repository.mark_resubmitted(id, now).await? {
                debug!(%id, "publication claimed elsewhere, skipping");
                continue;
            }

            publication.mark_resubmitted(now);
            // 同一记录可能仍以原事件实例在途
            self.in_flight.unregister_by_id(id);
            self.in_flight.register(publication.clone());

            if let Err(err) = consumer.resubmit(publication.clone()).await {
                // 保持 Resubmitted，交由陈旧回收处理，避免紧密重试
                self.in_flight.unregister_publication(&publication);
                warn!(
                    %id,
                    target = %publication.target_identifier(),
                    error = %err,
                    "resubmission consumer failed"
                );
                continue;
            }

            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// 陈旧回收：Processing 与 Resubmitted 两轮独立扫描，返回被置为 Failed 的条数
    pub async fn mark_stale_publications_failed(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut failed = 0;

        for status in [PublicationStatus::Processing, PublicationStatus::Resubmitted] {
            let threshold = self.staleness.for_status(status);
            if threshold.is_zero() {
                continue;
            }

            let cutoff = instant_before(now, threshold);
            for publication in self.repository.find_by_status(status).await? {
                if publication.staleness_reference() >= cutoff {
                    continue;
                }

                let id = publication.identifier();
                if !self
                    .repository
                    .mark_failed_if_stale(id, status, cutoff)
                    .await?
                {
                    debug!(%id, %status, "publication moved on before stale sweep, skipping");
                    continue;
                }

                self.in_flight.unregister_publication(&publication);
                failed += 1;

                debug!(
                    %id,
                    %status,
                    target = %publication.target_identifier(),
                    "stale publication marked failed"
                );
            }
        }

        if failed > 0 {
            info!(failed, "marked stale publications failed");
        }

        Ok(failed)
    }

    pub async fn find_completed_publications(&self) -> Result<Vec<EventPublication>> {
        self.repository.find_completed_publications().await
    }

    /// 删除完成时间早于 `now - age` 的已完成记录
    pub async fn delete_completed_publications_older_than(&self, age: Duration) -> Result<()> {
        let instant = instant_before(self.clock.now(), age);
        self.repository
            .delete_completed_publications_before(instant)
            .await
    }

    pub async fn delete_publications(&self, ids: &[PublicationId]) -> Result<()> {
        for id in ids {
            self.in_flight.unregister_by_id(*id);
        }
        self.repository.delete_publications(ids).await
    }

    /// 关闭钩子：列出仍未完成的记录，只记录日志、不修改任何状态
    pub async fn shutdown(&self) -> Result<Vec<EventPublication>> {
        let outstanding = self.repository.find_incomplete_publications().await?;

        if outstanding.is_empty() {
            info!("no outstanding event publications at shutdown");
            return Ok(outstanding);
        }

        warn!(
            count = outstanding.len(),
            "shutting down with outstanding event publications"
        );
        for publication in &outstanding {
            warn!(
                id = %publication.identifier(),
                event_type = publication.event().event_type(),
                target = %publication.target_identifier(),
                status = %publication.status(),
                attempts = publication.completion_attempts(),
                "outstanding publication"
            );
        }

        Ok(outstanding)
    }
}
