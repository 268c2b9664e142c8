//! 领域层统一错误定义
//!
//! 聚焦序列化、仓储、状态校验与锁等最小必要集合，
//! 便于仓储实现与注册表统一转换为 `DomainError`。
//!
use thiserror::Error;

/// 统一错误类型（事件发布登记的最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    // --- 仓储/持久化 ---
    #[error("repository error: {reason}")]
    Repository { reason: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },

    // --- 校验与状态 ---
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },

    // --- 协调 ---
    #[error("lock error: {reason}")]
    Lock { reason: String },
}

impl DomainError {
    pub fn repository(reason: impl Into<String>) -> Self {
        Self::Repository {
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }

    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }

    pub fn lock(reason: impl Into<String>) -> Self {
        Self::Lock {
            reason: reason.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

// 允许仓储实现直接使用 `?` 将 uuid 解析错误转换为 DomainError
impl From<uuid::Error> for DomainError {
    fn from(err: uuid::Error) -> Self {
        DomainError::InvalidValue {
            reason: err.to_string(),
        }
    }
}

impl From<chrono::OutOfRangeError> for DomainError {
    fn from(err: chrono::OutOfRangeError) -> Self {
        DomainError::InvalidValue {
            reason: err.to_string(),
        }
    }
}
