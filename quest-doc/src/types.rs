//! Document node types and tolerant decoding from JSON.

use serde::Deserialize;
use serde_json::Value;

use crate::MAX_DEPTH;

/// Node types that embed content from a social platform. Their source URL
/// lives in `attrs` rather than in a link mark.
const EMBED_KINDS: &[&str] = &[
    "tweet",
    "twitter",
    "youtube",
    "instagram",
    "tiktok",
    "embed",
    "iframe",
];

/// A single node of a rich-text document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Any node carrying nested content: `doc`, `paragraph`, `heading`,
    /// `bulletList`, `orderedList`, `listItem`, `blockquote`, or an unknown
    /// node type that happens to have a `content` list.
    Container { kind: String, content: Vec<Node> },
    /// Inline text with its marks.
    Text { text: String, marks: Vec<Mark> },
    /// Platform embed (`tweet`, `youtube`, ...) with its source URL.
    Embed { kind: String, src: Option<String> },
    /// Anything else (`hardBreak`, `image`, ...).
    Leaf { kind: String },
}

/// A text mark. Only `link` marks carry an `href`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub kind: String,
    pub href: Option<String>,
}

impl Mark {
    /// The link target, if this is a `link` mark with a non-empty `href`.
    pub fn link_href(&self) -> Option<&str> {
        if self.kind != "link" {
            return None;
        }
        self.href.as_deref().map(str::trim).filter(|h| !h.is_empty())
    }
}

/// A decoded rich-text document: the top-level node list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Build a document directly from nodes.
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Decode a document from JSON.
    ///
    /// Accepts a `doc` object, any single node object, a bare node list, or a
    /// string containing JSON of either form. Anything else decodes to an
    /// empty document.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let is_doc = map.get("type").and_then(Value::as_str) == Some("doc");
                if is_doc {
                    Self::new(decode_list(map.get("content"), 1))
                } else {
                    Self::new(decode_node(value, 0).into_iter().collect())
                }
            }
            Value::Array(_) => Self::new(decode_list(Some(value), 0)),
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(inner) if !inner.is_string() => Self::from_value(&inner),
                _ => Self::default(),
            },
            _ => Self::default(),
        }
    }

    /// Top-level nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Concatenated text of every text node, blocks separated by a space.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<(&Node, usize)> = self.nodes.iter().rev().map(|n| (n, 0)).collect();
        while let Some((node, depth)) = stack.pop() {
            match node {
                Node::Container { content, .. } if depth < MAX_DEPTH => {
                    if !out.is_empty() && !out.ends_with(' ') {
                        out.push(' ');
                    }
                    stack.extend(content.iter().rev().map(|c| (c, depth + 1)));
                }
                Node::Text { text, .. } => out.push_str(text),
                _ => {}
            }
        }
        out.trim().to_owned()
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

fn decode_list(value: Option<&Value>, depth: usize) -> Vec<Node> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    if depth > MAX_DEPTH {
        tracing::trace!(depth, "document nesting too deep; dropping subtree");
        return Vec::new();
    }
    items
        .iter()
        .filter_map(|item| decode_node(item, depth))
        .collect()
}

fn decode_node(value: &Value, depth: usize) -> Option<Node> {
    let map = value.as_object()?;
    let kind = map
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    if kind == "text" {
        let text = map
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let marks = map
            .get("marks")
            .and_then(Value::as_array)
            .map(|marks| marks.iter().filter_map(decode_mark).collect())
            .unwrap_or_default();
        return Some(Node::Text { text, marks });
    }

    if EMBED_KINDS.contains(&kind.as_str()) {
        let attrs = map.get("attrs");
        let src = ["src", "url", "href"]
            .iter()
            .find_map(|key| attrs.and_then(|a| a.get(key)).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        return Some(Node::Embed { kind, src });
    }

    match map.get("content") {
        Some(content) if content.is_array() => Some(Node::Container {
            kind,
            content: decode_list(Some(content), depth + 1),
        }),
        _ => Some(Node::Leaf { kind }),
    }
}

fn decode_mark(value: &Value) -> Option<Mark> {
    let map = value.as_object()?;
    let kind = map.get("type").and_then(Value::as_str)?.to_owned();
    let href = map
        .get("attrs")
        .and_then(|a| a.get("href"))
        .and_then(Value::as_str)
        .map(str::to_owned);
    Some(Mark { kind, href })
}
