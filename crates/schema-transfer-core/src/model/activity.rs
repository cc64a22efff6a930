use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::Collectionable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
    Login,
    Comment,
    Run,
    #[serde(other)]
    Other,
}

impl ActivityAction {
    /// Actions that change item data
    pub const CHANGES: [ActivityAction; 3] = [
        ActivityAction::Create,
        ActivityAction::Update,
        ActivityAction::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Create => "create",
            ActivityAction::Update => "update",
            ActivityAction::Delete => "delete",
            ActivityAction::Login => "login",
            ActivityAction::Comment => "comment",
            ActivityAction::Run => "run",
            ActivityAction::Other => "other",
        }
    }
}

/// One audit-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub collection: String,
    #[serde(deserialize_with = "string_or_number")]
    pub item: String,
    pub timestamp: String,
    pub action: ActivityAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    pub fn new(
        collection: impl Into<String>,
        item: impl Into<String>,
        timestamp: impl Into<String>,
        action: ActivityAction,
    ) -> Self {
        Self {
            collection: collection.into(),
            item: item.into(),
            timestamp: timestamp.into(),
            action,
            user: None,
            extra: Map::new(),
        }
    }
}

impl Collectionable for Activity {
    fn collection(&self) -> &str {
        &self.collection
    }
}

/// Item keys arrive as strings, but integer primary keys sometimes come through as numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number item key, got {}",
            other
        ))),
    }
}
