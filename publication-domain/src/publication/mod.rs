//! 事件发布（publication）
//!
//! 发布记录实体及其值对象：记录标识、投递目标、已发布事件与生命周期状态。
//!
mod event;
mod event_publication;
mod status;
mod target;

pub use event::{EventIdentity, PublishedEvent};
pub use event_publication::{EventPublication, PublicationId};
pub use status::PublicationStatus;
pub use target::TargetIdentifier;
