//! 事件发布注册表（publication-registry）
//!
//! 在 `publication-domain` 的模型与仓储协议之上，提供至少一次投递的编排：
//! - `InFlightTracker`：按事件实例标识 + 目标跟踪在途记录；
//! - `EventPublicationRegistry`：扇出、回调路由、陈旧回收、有界重投与关闭报告；
//! - `PublicationConsumer`：重投时交付记录的外部派发能力；
//! - `PassLock`：可选的批次级互斥（跨进程时由外部分布式锁实现）；
//! - `RecoveryEngine`（`engine` 特性）：周期执行陈旧回收与失败重投。
//!
pub mod consumer;
#[cfg(feature = "engine")]
pub mod engine;
pub mod lock;
pub mod registry;
pub mod tracker;

pub use consumer::PublicationConsumer;
#[cfg(feature = "engine")]
pub use engine::{EngineHandle, RecoveryEngine, RecoveryEngineConfig};
pub use lock::{InMemoryPassLock, PassLock};
pub use registry::EventPublicationRegistry;
pub use tracker::InFlightTracker;
