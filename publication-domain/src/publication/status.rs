use serde::{Deserialize, Serialize};
use std::fmt;

/// 发布记录的生命周期状态
///
/// ```text
/// Published ──> Processing ──> Completed
///     │             │
///     └──> Failed <─┘<── Resubmitted (陈旧回收)
///            │               ▲
///            └── claim ──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationStatus {
    Published,
    Processing,
    Completed,
    Failed,
    Resubmitted,
}

impl PublicationStatus {
    pub const ALL: [PublicationStatus; 5] = [
        PublicationStatus::Published,
        PublicationStatus::Processing,
        PublicationStatus::Completed,
        PublicationStatus::Failed,
        PublicationStatus::Resubmitted,
    ];

    /// 是否已完成（唯一的终态）
    pub fn is_completed(&self) -> bool {
        matches!(self, PublicationStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Published => "PUBLISHED",
            PublicationStatus::Processing => "PROCESSING",
            PublicationStatus::Completed => "COMPLETED",
            PublicationStatus::Failed => "FAILED",
            PublicationStatus::Resubmitted => "RESUBMITTED",
        }
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&PublicationStatus::Resubmitted).unwrap();
        assert_eq!(json, "\"RESUBMITTED\"");
        for status in PublicationStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn only_completed_is_terminal() {
        let terminal: Vec<_> = PublicationStatus::ALL
            .into_iter()
            .filter(PublicationStatus::is_completed)
            .collect();
        assert_eq!(terminal, vec![PublicationStatus::Completed]);
    }
}
