//! 已发布事件（PublishedEvent）
//!
//! 进程内以 `Arc` 共享同一事件实例，使派发路径能按对象标识快速找回自己的发布记录；
//! 持久化时按值（事件类型 + JSON 负载）序列化，从存储重建后得到的是新的实例。
//! 两种相等语义刻意分开：`same_instance` 比较标识，`same_value` 比较值。
//!
use crate::error::DomainResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct EventData {
    event_type: String,
    payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishedEvent {
    inner: Arc<EventData>,
}

/// 事件实例标识：由共享实例的地址得出。
///
/// 只要持有该事件的任一克隆仍存活，地址就不会被复用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventIdentity(usize);

impl PublishedEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            inner: Arc::new(EventData {
                event_type: event_type.into(),
                payload,
            }),
        }
    }

    /// 将任意可序列化的领域事件包装为已发布事件
    pub fn from_event<E>(event_type: impl Into<String>, event: &E) -> DomainResult<Self>
    where
        E: Serialize,
    {
        Ok(Self::new(event_type, serde_json::to_value(event)?))
    }

    pub fn event_type(&self) -> &str {
        &self.inner.event_type
    }

    pub fn payload(&self) -> &Value {
        &self.inner.payload
    }

    /// 将负载还原为具体事件类型
    pub fn to_event<E>(&self) -> DomainResult<E>
    where
        E: DeserializeOwned,
    {
        Ok(serde_json::from_value(self.inner.payload.clone())?)
    }

    pub fn identity(&self) -> EventIdentity {
        EventIdentity(Arc::as_ptr(&self.inner) as usize)
    }

    pub fn same_instance(&self, other: &PublishedEvent) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn same_value(&self, other: &PublishedEvent) -> bool {
        self.same_instance(other) || self.inner == other.inner
    }

    /// 复制出一个值相同、标识不同的实例（模拟存储往返）
    pub fn detached(&self) -> Self {
        Self::new(self.inner.event_type.clone(), self.inner.payload.clone())
    }
}
