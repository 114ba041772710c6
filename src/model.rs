//! Canonical content model shared by every site parser.
//!
//! Parsers normalize whatever the origin platform returns (embedded page
//! state, REST payloads) into a [`ParseResult`]; renderers only ever see
//! these types.

use serde::{Deserialize, Serialize};

/// Platforms with a built-in parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Xiaohongshu,
    Twitter,
}

impl Platform {
    /// Identifier used in configuration (`disabled_platforms`).
    pub fn name(self) -> &'static str {
        match self {
            Platform::Xiaohongshu => "xiaohongshu",
            Platform::Twitter => "twitter",
        }
    }

    /// Human-readable name for logs and rendered output.
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Xiaohongshu => "小红书",
            Platform::Twitter => "Twitter/X",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Post author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>, avatar_url: Option<String>) -> Self {
        Self {
            name: name.into(),
            avatar_url: avatar_url.filter(|url| !url.is_empty()),
        }
    }
}

/// One unit of post content. Order inside [`ParseResult::contents`] is
/// reproduced verbatim by renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Content {
    Text {
        body: String,
    },
    Image {
        url: String,
    },
    Video {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cover_url: Option<String>,
    },
}

impl Content {
    pub fn text(body: impl Into<String>) -> Self {
        Content::Text { body: body.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Content::Image { url: url.into() }
    }

    pub fn video(url: impl Into<String>, cover_url: Option<String>) -> Self {
        Content::Video {
            url: url.into(),
            cover_url,
        }
    }

    /// One `Image` per URL, keeping the given order.
    pub fn images<I, S>(urls: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter().map(Content::image).collect()
    }
}

/// Normalized representation of a resolved post.
///
/// Cache identity is the matched link text, not any field here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    pub platform: Platform,
    pub title: String,
    pub text: String,
    pub author: Author,
    pub contents: Vec<Content>,
    /// Publish time, whole seconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// URL of the page or API document the post was read from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ParseResult {
    pub fn video_count(&self) -> usize {
        self.contents
            .iter()
            .filter(|c| matches!(c, Content::Video { .. }))
            .count()
    }

    pub fn image_count(&self) -> usize {
        self.contents
            .iter()
            .filter(|c| matches!(c, Content::Image { .. }))
            .count()
    }
}
