//! 事件发布登记领域层（publication-domain）
//!
//! 提供“事件 X 必须投递给目标 Y”这一持久化记录的领域模型与协议：
//! - 发布记录（`publication`）：`EventPublication` 及其状态机、标识与事件值对象；
//! - 策略（`policy`）：重投策略 `ResubmissionPolicy` 与陈旧策略 `StalenessPolicy`；
//! - 持久化（`persist`）：`EventPublicationRepository` 协议与内存参考实现；
//! - 时钟（`clock`）：可注入的时间来源，便于测试陈旧与最小年龄判定。
//!
//! 本 crate 不绑定存储与传输实现，编排逻辑（在途跟踪、重投、陈旧回收）位于
//! `publication-registry`。
//!
pub mod clock;
pub mod error;
pub mod persist;
pub mod policy;
pub mod publication;
