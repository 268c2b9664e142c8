//! 重投策略（ResubmissionPolicy）
//!
//! 控制一次失败记录重投批次的规模：并发上限、批量大小、最小年龄与筛选条件。
//! 策略不可变，`with_*` 方法返回新的实例。
//!
use crate::error::{DomainError, DomainResult};
use crate::publication::EventPublication;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

/// 记录筛选谓词
pub type PublicationFilter = Arc<dyn Fn(&EventPublication) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct ResubmissionPolicy {
    /// 同时处于 Resubmitted 的记录上限；None 表示不限
    max_in_flight: Option<NonZeroUsize>,
    batch_size: NonZeroUsize,
    min_age: Duration,
    filter: PublicationFilter,
}

impl ResubmissionPolicy {
    pub const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(100).unwrap();

    /// 默认策略：并发不限、批量 100、无最小年龄、接受所有记录
    pub fn defaults() -> Self {
        Self {
            max_in_flight: None,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            min_age: Duration::ZERO,
            filter: Arc::new(|_| true),
        }
    }

    pub fn with_max_in_flight(self, max_in_flight: usize) -> DomainResult<Self> {
        let max_in_flight = NonZeroUsize::new(max_in_flight)
            .ok_or_else(|| DomainError::invalid_value("max_in_flight must be greater than zero"))?;

        Ok(Self {
            max_in_flight: Some(max_in_flight),
            ..self
        })
    }

    pub fn with_unbounded_in_flight(self) -> Self {
        Self {
            max_in_flight: None,
            ..self
        }
    }

    pub fn with_batch_size(self, batch_size: usize) -> DomainResult<Self> {
        let batch_size = NonZeroUsize::new(batch_size)
            .ok_or_else(|| DomainError::invalid_value("batch_size must be greater than zero"))?;

        Ok(Self { batch_size, ..self })
    }

    pub fn with_min_age(self, min_age: Duration) -> Self {
        Self { min_age, ..self }
    }

    pub fn with_filter<F>(self, filter: F) -> Self
    where
        F: Fn(&EventPublication) -> bool + Send + Sync + 'static,
    {
        Self {
            filter: Arc::new(filter),
            ..self
        }
    }

    pub fn max_in_flight(&self) -> Option<usize> {
        self.max_in_flight.map(NonZeroUsize::get)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    pub fn min_age(&self) -> Duration {
        self.min_age
    }

    pub fn filter(&self) -> &PublicationFilter {
        &self.filter
    }

    pub fn accepts(&self, publication: &EventPublication) -> bool {
        (self.filter)(publication)
    }

    /// 在当前已有 `in_flight` 条重投中记录时，本批次最多可读取的条数。
    ///
    /// 返回 0 表示已达上限，本批次应当跳过。
    pub fn items_to_read(&self, in_flight: usize) -> usize {
        match self.max_in_flight {
            None => self.batch_size(),
            Some(max) => self.batch_size().min(max.get().saturating_sub(in_flight)),
        }
    }
}

impl Default for ResubmissionPolicy {
    fn default() -> Self {
        Self::defaults()
    }
}

impl fmt::Debug for ResubmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResubmissionPolicy")
            .field("max_in_flight", &self.max_in_flight)
            .field("batch_size", &self.batch_size)
            .field("min_age", &self.min_age)
            .finish_non_exhaustive()
    }
}
