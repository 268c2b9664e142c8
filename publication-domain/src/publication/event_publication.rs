//! 事件发布记录（EventPublication）
//!
//! 一条记录对应“一个事件 → 一个投递目标”的一次完整生命周期，是持久化的最小工作单元。
//! 状态迁移方法只在迁移合法时修改记录并返回 `true`，仓储实现据此完成条件更新。
//!
use super::{PublicationStatus, PublishedEvent, TargetIdentifier};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 发布记录标识，创建时分配，永不复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicationId(Uuid);

impl PublicationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PublicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PublicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PublicationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct EventPublication {
    /// 记录唯一标识
    #[builder(default)]
    identifier: PublicationId,
    /// 事件负载
    event: PublishedEvent,
    /// 投递目标
    target_identifier: TargetIdentifier,
    /// 发布时间，创建后不可变
    publication_date: DateTime<Utc>,
    /// 完成时间，当且仅当状态为 Completed 时存在
    completion_date: Option<DateTime<Utc>>,
    /// 最近一次被认领重投的时间
    last_resubmission_date: Option<DateTime<Utc>>,
    /// 进入 Processing/Resubmitted 的累计次数
    #[builder(default)]
    completion_attempts: u32,
    #[builder(default = PublicationStatus::Published)]
    status: PublicationStatus,
}

impl EventPublication {
    /// 创建一条新的 Published 记录
    pub fn new(
        event: PublishedEvent,
        target_identifier: TargetIdentifier,
        publication_date: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: PublicationId::new(),
            event,
            target_identifier,
            publication_date,
            completion_date: None,
            last_resubmission_date: None,
            completion_attempts: 0,
            status: PublicationStatus::Published,
        }
    }

    pub fn identifier(&self) -> PublicationId {
        self.identifier
    }

    pub fn event(&self) -> &PublishedEvent {
        &self.event
    }

    pub fn target_identifier(&self) -> &TargetIdentifier {
        &self.target_identifier
    }

    pub fn publication_date(&self) -> DateTime<Utc> {
        self.publication_date
    }

    pub fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.completion_date
    }

    pub fn last_resubmission_date(&self) -> Option<DateTime<Utc>> {
        self.last_resubmission_date
    }

    pub fn completion_attempts(&self) -> u32 {
        self.completion_attempts
    }

    pub fn status(&self) -> PublicationStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    pub fn is_published_before(&self, instant: DateTime<Utc>) -> bool {
        self.publication_date < instant
    }

    /// 陈旧判定的参照时间：最近一次重投时间，否则为发布时间
    pub fn staleness_reference(&self) -> DateTime<Utc> {
        self.last_resubmission_date.unwrap_or(self.publication_date)
    }

    /// 是否与给定事件（按值）及目标匹配
    pub fn matches(&self, event: &PublishedEvent, target: &TargetIdentifier) -> bool {
        self.target_identifier == *target && self.event.same_value(event)
    }

    /// Published/Resubmitted -> Processing
    pub fn mark_processing(&mut self) -> bool {
        match self.status {
            PublicationStatus::Published | PublicationStatus::Resubmitted => {
                self.status = PublicationStatus::Processing;
                self.completion_attempts = self.completion_attempts.saturating_add(1);
                true
            }
            _ => false,
        }
    }

    /// 任意未完成状态 -> Completed；完成时间只写一次
    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_completed() {
            return false;
        }

        self.status = PublicationStatus::Completed;
        self.completion_date.get_or_insert(at);
        true
    }

    /// Published/Processing/Resubmitted -> Failed
    pub fn mark_failed(&mut self) -> bool {
        match self.status {
            PublicationStatus::Completed | PublicationStatus::Failed => false,
            _ => {
                self.status = PublicationStatus::Failed;
                true
            }
        }
    }

    /// 条件失败：仅当记录仍处于 `status` 且陈旧参照时间早于 `cutoff` 时置为 Failed
    pub fn mark_failed_if_stale(
        &mut self,
        status: PublicationStatus,
        cutoff: DateTime<Utc>,
    ) -> bool {
        if self.status != status || self.staleness_reference() >= cutoff {
            return false;
        }

        self.mark_failed()
    }

    /// 认领重投：除 Completed 与 Resubmitted 外的状态 -> Resubmitted
    pub fn mark_resubmitted(&mut self, at: DateTime<Utc>) -> bool {
        match self.status {
            PublicationStatus::Completed | PublicationStatus::Resubmitted => false,
            _ => {
                self.status = PublicationStatus::Resubmitted;
                self.last_resubmission_date = Some(at);
                self.completion_attempts = self.completion_attempts.saturating_add(1);
                true
            }
        }
    }

    /// 以新的事件实例重建记录（值相同、标识不同）
    pub fn detached(&self) -> Self {
        Self {
            event: self.event.detached(),
            ..self.clone()
        }
    }
}
