//! # quest-doc
//!
//! Rich-text document model for quest descriptions, and link extraction.
//!
//! Quest descriptions arrive as a nested JSON node tree (`doc` → `paragraph`
//! → `text` with `link` marks, lists, and platform embeds such as `tweet`).
//! This crate decodes that tree tolerantly and walks it to find hyperlinks.
//!
//! ## Design
//!
//! - Decoding is total: missing or mistyped fields never fail, they simply
//!   produce fewer nodes
//! - Traversal uses an explicit stack, so deeply nested input cannot
//!   overflow the call stack; nodes deeper than [`MAX_DEPTH`] are skipped
//! - Links are yielded lazily and in document order, without de-duplication
//!
//! ```
//! use quest_doc::Document;
//!
//! let doc = Document::from_value(&serde_json::json!({
//!     "type": "doc",
//!     "content": [{
//!         "type": "paragraph",
//!         "content": [{
//!             "type": "text",
//!             "text": "like this",
//!             "marks": [{"type": "link", "attrs": {"href": "https://x.com/a/status/1"}}]
//!         }]
//!     }]
//! }));
//! let links: Vec<&str> = doc.links_matching(&["x.com"]).collect();
//! assert_eq!(links, vec!["https://x.com/a/status/1"]);
//! ```

pub mod links;
pub mod normalize;
pub mod types;

pub use links::{host_matches, Links};
pub use normalize::normalize_link;
pub use types::{Document, Mark, Node};

/// Maximum nesting depth that decoding and traversal will descend into.
pub const MAX_DEPTH: usize = 64;
