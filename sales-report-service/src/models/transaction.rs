use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A source document as read from the store. Field names are not stable across
/// documents, so nothing is deserialized into a fixed struct at this stage.
pub type RawDocument = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Sale,
    Return,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Return => "return",
        }
    }

    /// +1 for sales, -1 for returns.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Sale => 1.0,
            Self::Return => -1.0,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sale" | "sales" => Ok(Self::Sale),
            "return" | "returns" => Ok(Self::Return),
            _ => Err(format!("Invalid record kind: {}", s)),
        }
    }
}

/// One sales invoice or sales return, tagged by the collection it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    Sale(RawDocument),
    Return(RawDocument),
}

impl Transaction {
    /// Wrap a raw store value. Non-object values are dropped.
    pub fn from_value(kind: RecordKind, value: Value) -> Option<Self> {
        match value {
            Value::Object(document) => Some(match kind {
                RecordKind::Sale => Self::Sale(document),
                RecordKind::Return => Self::Return(document),
            }),
            _ => None,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Sale(_) => RecordKind::Sale,
            Self::Return(_) => RecordKind::Return,
        }
    }

    pub fn document(&self) -> &RawDocument {
        match self {
            Self::Sale(document) | Self::Return(document) => document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sign_convention() {
        assert_eq!(RecordKind::Sale.sign(), 1.0);
        assert_eq!(RecordKind::Return.sign(), -1.0);
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Transaction::from_value(RecordKind::Sale, json!("INV-1")).is_none());
        let tx = Transaction::from_value(RecordKind::Return, json!({"returnNumber": "RET-1"}));
        assert_eq!(tx.map(|t| t.kind()), Some(RecordKind::Return));
    }

    #[test]
    fn test_parse_record_kind() {
        assert_eq!("Sale".parse::<RecordKind>(), Ok(RecordKind::Sale));
        assert_eq!("returns".parse::<RecordKind>(), Ok(RecordKind::Return));
        assert!("refund".parse::<RecordKind>().is_err());
    }
}
