//! 策略（policy）
//!
//! 注册表只读取、从不修改的不可变值对象：
//! - `ResubmissionPolicy`：每次重投调用时传入；
//! - `StalenessPolicy`：构造注册表时装配一次。
//!
mod resubmission;
mod staleness;

pub use resubmission::{PublicationFilter, ResubmissionPolicy};
pub use staleness::StalenessPolicy;
