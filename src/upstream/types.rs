//! Quest-board response types.
//!
//! Every field is optional on the wire; decoding never fails because a quest
//! or task is missing an attribute.

use quest_doc::Document;
use serde::{Deserialize, Deserializer};

/// A board column grouping quests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestBox {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quests: Vec<QuestSummary>,
}

/// A board entry. Entries without an id are ignored by the monitor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestSummary {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl QuestSummary {
    /// Display title, or the id when the quest has no name.
    pub fn title(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.id.as_deref())
            .unwrap_or("untitled quest")
    }
}

/// Quest detail as returned by `quests/v2/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestDetail {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Document,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<Task>,
}

/// One proof requirement inside a quest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: TaskType,
}

/// Proof mechanism a task requires.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<String>")]
pub enum TaskType {
    TweetReact,
    File,
    Url,
    /// Any other task type, kept verbatim for logging.
    Other(String),
}

impl Default for TaskType {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for TaskType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "tweetReact" => Self::TweetReact,
            "file" => Self::File,
            "url" => Self::Url,
            _ => Self::Other(raw),
        }
    }
}

impl From<Option<String>> for TaskType {
    fn from(raw: Option<String>) -> Self {
        raw.map(Self::from).unwrap_or_default()
    }
}

impl TaskType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TweetReact => "tweetReact",
            Self::File => "file",
            Self::Url => "url",
            Self::Other(raw) if raw.is_empty() => "unknown",
            Self::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept string or numeric ids; anything else (including empty strings) is `None`.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
