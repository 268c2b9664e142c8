use crate::publication::PublicationStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 陈旧策略：各状态下记录被视为“已被遗弃”的时长。
///
/// 时长为零表示该状态永不判为陈旧；只有 Processing 与 Resubmitted 会被监控。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StalenessPolicy {
    processing: Duration,
    resubmitted: Duration,
}

impl StalenessPolicy {
    /// 永不判定陈旧
    pub const fn disabled() -> Self {
        Self {
            processing: Duration::ZERO,
            resubmitted: Duration::ZERO,
        }
    }

    pub const fn new(processing: Duration, resubmitted: Duration) -> Self {
        Self {
            processing,
            resubmitted,
        }
    }

    pub const fn with_processing(self, processing: Duration) -> Self {
        Self { processing, ..self }
    }

    pub const fn with_resubmitted(self, resubmitted: Duration) -> Self {
        Self {
            resubmitted,
            ..self
        }
    }

    pub fn for_status(&self, status: PublicationStatus) -> Duration {
        match status {
            PublicationStatus::Processing => self.processing,
            PublicationStatus::Resubmitted => self.resubmitted,
            _ => Duration::ZERO,
        }
    }

    pub fn is_monitored(&self, status: PublicationStatus) -> bool {
        !self.for_status(status).is_zero()
    }
}
