use serde::{Deserialize, Serialize};
use std::fmt;

/// 投递目标标识（如监听器方法签名），对注册表而言是不透明字符串
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetIdentifier(String);

impl TargetIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetIdentifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TargetIdentifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for TargetIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
