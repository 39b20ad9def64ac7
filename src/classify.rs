//! Social platform classification of quests.
//!
//! A quest belongs to a platform when its title or description mentions one
//! of the platform's keywords, or when its description links to one of the
//! platform's domains. Only `file` and `url` tasks use this.

use crate::upstream::QuestDetail;
use serde::{Deserialize, Serialize};

/// Social platforms that proofs can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Twitter,
    Tiktok,
    Instagram,
    Youtube,
    Linkedin,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Self::Twitter,
        Self::Tiktok,
        Self::Instagram,
        Self::Youtube,
        Self::Linkedin,
    ];

    /// Stable lowercase name; also the registry file stem.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Tiktok => "tiktok",
            Self::Instagram => "instagram",
            Self::Youtube => "youtube",
            Self::Linkedin => "linkedin",
        }
    }

    /// Lowercase words that mark a quest as belonging to this platform.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Twitter => &["twitter", "tweet", "x.com"],
            Self::Tiktok => &["tiktok", "tik tok"],
            Self::Instagram => &["instagram", "insta "],
            Self::Youtube => &["youtube", "youtu.be"],
            Self::Linkedin => &["linkedin"],
        }
    }

    /// Link hosts (and their subdomains) owned by this platform.
    pub fn domains(self) -> &'static [&'static str] {
        match self {
            Self::Twitter => &["x.com", "twitter.com"],
            Self::Tiktok => &["tiktok.com"],
            Self::Instagram => &["instagram.com", "instagr.am"],
            Self::Youtube => &["youtube.com", "youtu.be"],
            Self::Linkedin => &["linkedin.com", "lnkd.in"],
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let wanted = input.trim().to_ascii_lowercase();
        match wanted.as_str() {
            "x" => Ok(Self::Twitter),
            "yt" => Ok(Self::Youtube),
            _ => Self::ALL
                .into_iter()
                .find(|p| p.as_str() == wanted)
                .ok_or_else(|| format!("unknown platform `{input}`")),
        }
    }
}

/// Which platforms a quest matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    matched: [bool; Platform::ALL.len()],
}

impl Classification {
    pub fn is_match(&self, platform: Platform) -> bool {
        self.matched[platform.index()]
    }

    /// Matched platforms in declaration order.
    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        Platform::ALL.into_iter().filter(|p| self.is_match(*p))
    }

    pub fn is_empty(&self) -> bool {
        !self.matched.iter().any(|m| *m)
    }

    fn set(&mut self, platform: Platform) {
        self.matched[platform.index()] = true;
    }
}

/// Classify a quest by title, description text and description links.
pub fn classify(detail: &QuestDetail, title: &str) -> Classification {
    let title = title.to_lowercase();
    let body = detail.description.plain_text().to_lowercase();
    let links: Vec<&str> = detail.description.links().collect();

    let mut result = Classification::default();
    for platform in Platform::ALL {
        let keyword_hit = platform
            .keywords()
            .iter()
            .any(|kw| title.contains(kw) || body.contains(kw));
        let link_hit = || {
            links.iter().any(|link| {
                platform
                    .domains()
                    .iter()
                    .any(|domain| quest_doc::host_matches(link, domain))
            })
        };
        if keyword_hit || link_hit() {
            result.set(platform);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde_json::json;

    fn detail(description: serde_json::Value) -> QuestDetail {
        serde_json::from_value(json!({"id": "q", "description": description})).unwrap()
    }

    fn paragraph(text: &str) -> serde_json::Value {
        json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": text}]}
        ]})
    }

    #[test]
    fn keyword_in_title_matches() {
        let result = classify(&detail(json!(null)), "Like our TikTok video");
        assert!(result.is_match(Platform::Tiktok));
        assert!(!result.is_match(Platform::Twitter));
    }

    #[test]
    fn keyword_in_body_matches() {
        let result = classify(&detail(paragraph("Drop a comment on Instagram")), "Engage");
        assert_eq!(result.platforms().collect::<Vec<_>>(), vec![Platform::Instagram]);
    }

    #[test]
    fn linked_domain_matches_without_keyword() {
        let doc = json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [
                {"type": "text", "text": "here", "marks": [
                    {"type": "link", "attrs": {"href": "https://www.youtube.com/watch?v=1"}}
                ]}
            ]}
        ]});
        let result = classify(&detail(doc), "Watch this");
        assert_eq!(result.platforms().collect::<Vec<_>>(), vec![Platform::Youtube]);
    }

    #[test]
    fn several_platforms_can_match() {
        let result = classify(&detail(paragraph("Share on LinkedIn too")), "Retweet us");
        assert!(result.is_match(Platform::Twitter));
        assert!(result.is_match(Platform::Linkedin));
    }

    #[test]
    fn unrelated_quest_matches_nothing() {
        let result = classify(&detail(paragraph("Join our Discord")), "Say hi");
        assert!(result.is_empty());
    }

    #[test]
    fn platform_parsing() {
        assert_eq!("TikTok".parse::<Platform>().unwrap(), Platform::Tiktok);
        assert_eq!("x".parse::<Platform>().unwrap(), Platform::Twitter);
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn platform_names_round_trip() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }
}
