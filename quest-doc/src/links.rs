//! Lazy, document-ordered hyperlink traversal.

use url::Url;

use crate::types::{Document, Mark, Node};
use crate::MAX_DEPTH;

/// Iterator over every hyperlink in a [`Document`], in document order.
///
/// Yields `href`s of `link` marks on text nodes and the source URL of
/// platform embeds. Containers are descended with an explicit stack.
pub struct Links<'a> {
    stack: Vec<(&'a Node, usize)>,
    marks: std::slice::Iter<'a, Mark>,
}

impl<'a> Links<'a> {
    fn new(nodes: &'a [Node]) -> Self {
        Self {
            stack: nodes.iter().rev().map(|n| (n, 0)).collect(),
            marks: Default::default(),
        }
    }
}

impl<'a> Iterator for Links<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            for mark in self.marks.by_ref() {
                if let Some(href) = mark.link_href() {
                    return Some(href);
                }
            }

            let (node, depth) = self.stack.pop()?;
            match node {
                Node::Container { content, .. } => {
                    if depth >= MAX_DEPTH {
                        tracing::trace!(depth, "skipping container beyond depth limit");
                        continue;
                    }
                    self.stack
                        .extend(content.iter().rev().map(|child| (child, depth + 1)));
                }
                Node::Text { marks, .. } => self.marks = marks.iter(),
                Node::Embed { src: Some(src), .. } => return Some(src.as_str()),
                Node::Embed { src: None, .. } | Node::Leaf { .. } => {}
            }
        }
    }
}

impl Document {
    /// Every hyperlink in the document, lazily and in document order.
    pub fn links(&self) -> Links<'_> {
        Links::new(self.nodes())
    }

    /// Hyperlinks whose host is one of `domains` (or a subdomain of one).
    pub fn links_matching<'a>(
        &'a self,
        domains: &'a [&'a str],
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.links()
            .filter(move |link| domains.iter().any(|d| host_matches(link, d)))
    }
}

/// Returns `true` if `link`'s host equals `domain` or is a subdomain of it.
///
/// Scheme-less links such as `x.com/user/status/1` are accepted.
/// Comparison is case-insensitive.
pub fn host_matches(link: &str, domain: &str) -> bool {
    let Some(host) = link_host(link) else {
        return false;
    };
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

pub(crate) fn link_host(link: &str) -> Option<String> {
    let link = link.trim();
    let parsed = match Url::parse(link) {
        Ok(url) if url.has_host() => url,
        _ => Url::parse(&format!("https://{link}")).ok()?,
    };
    let host = parsed.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}
