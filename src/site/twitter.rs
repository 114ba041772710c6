//! Twitter/X status extraction via the `FxTwitter` API.
//!
//! `FxTwitter` returns clean JSON for a status, including:
//! - Long-form article content (`tweet.article.content.blocks`)
//! - Author information
//! - Photo and video media in display order

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT};
use serde::Deserialize;
use tracing::info;

use super::{nullable, SiteParser};
use crate::config::Config;
use crate::error::{ParseError, Result};
use crate::fingerprint::{self, desktop_profile};
use crate::http_client::{HttpClient, HttpRequest};
use crate::matcher::SearchResult;
use crate::model::{Author, Content, ParseResult, Platform};

const PATTERNS: &[(&str, &str)] = &[
    (
        "x.com",
        r"https?://(?:www\.|mobile\.)?x\.com/(\w+)/status/(\d+)",
    ),
    (
        "twitter.com",
        r"https?://(?:www\.|mobile\.)?twitter\.com/(\w+)/status/(\d+)",
    ),
];

/// Twitter/X parser backed by an `FxTwitter`-compatible API.
pub struct TwitterParser {
    client: Arc<dyn HttpClient>,
    headers: HeaderMap,
    api_base: String,
    timeout: Duration,
}

impl TwitterParser {
    pub fn new(client: Arc<dyn HttpClient>, config: &Config) -> Self {
        let mut headers = desktop_profile().to_headers();
        fingerprint::insert(&mut headers, ACCEPT, "application/json");

        Self {
            client,
            headers,
            api_base: config.twitter.api_base.trim_end_matches('/').to_string(),
            timeout: config.timeout_for(Platform::Twitter),
        }
    }
}

#[async_trait]
impl SiteParser for TwitterParser {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn patterns(&self) -> &'static [(&'static str, &'static str)] {
        PATTERNS
    }

    async fn parse(&self, search: &SearchResult) -> Result<ParseResult> {
        let (Some(user), Some(id)) = (search.group(1), search.group(2)) else {
            return Err(ParseError::Unsupported(format!(
                "not a status link: {}",
                search.matched()
            )));
        };

        let api_url = format!("{}/{user}/status/{id}", self.api_base);
        let response = self
            .client
            .send(
                HttpRequest::get(&api_url)
                    .headers(self.headers.clone())
                    .timeout(self.timeout),
            )
            .await?;
        info!(url = %api_url, status = response.status, "fetched status");

        if !response.is_success() {
            // Deleted or protected statuses still come back as JSON with a message.
            return match serde_json::from_str::<FxTwitterResponse>(&response.body) {
                Ok(FxTwitterResponse {
                    tweet: None,
                    message: Some(message),
                    code,
                }) => Err(ParseError::Expired(format!("status {id}: {message} ({code})"))),
                _ => Err(ParseError::Status {
                    status: response.status,
                    url: api_url,
                }),
            };
        }

        let FxTwitterResponse {
            code,
            message,
            tweet,
        } = serde_json::from_str::<FxTwitterResponse>(&response.body)?;
        let tweet = tweet.ok_or_else(|| {
            ParseError::Expired(format!(
                "status {id}: {} ({code})",
                message.unwrap_or_default()
            ))
        })?;

        Ok(tweet.into_result())
    }
}

impl Tweet {
    fn into_result(self) -> ParseResult {
        let mut contents = Vec::new();
        let mut title = String::new();

        if let Some(article) = self.article {
            title = article.title;
            if let Some(content) = article.content {
                contents.extend(
                    content
                        .blocks
                        .into_iter()
                        .filter_map(|b| b.text)
                        .filter(|t| !t.trim().is_empty())
                        .map(Content::text),
                );
            }
        }

        if let Some(media) = self.media {
            contents.extend(media.all.into_iter().filter_map(MediaItem::into_content));
        }

        ParseResult {
            platform: Platform::Twitter,
            title,
            text: self.text,
            author: Author::new(self.author.name, self.author.avatar_url),
            contents,
            timestamp: self.created_timestamp,
            url: self.url,
        }
    }
}

impl MediaItem {
    fn into_content(self) -> Option<Content> {
        let url = self.url.filter(|u| !u.is_empty())?;
        match self.kind.as_str() {
            "photo" => Some(Content::image(url)),
            "video" | "gif" => Some(Content::video(url, self.thumbnail_url)),
            _ => None,
        }
    }
}

// ============================================================================
// FxTwitter API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct FxTwitterResponse {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    tweet: Option<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    text: String,
    author: TweetAuthor,
    #[serde(default)]
    created_timestamp: Option<i64>,
    #[serde(default)]
    article: Option<Article>,
    #[serde(default)]
    media: Option<Media>,
}

#[derive(Debug, Deserialize)]
struct TweetAuthor {
    name: String,
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default, deserialize_with = "nullable")]
    title: String,
    #[serde(default)]
    content: Option<ArticleContent>,
}

#[derive(Debug, Deserialize)]
struct ArticleContent {
    #[serde(default, deserialize_with = "nullable")]
    blocks: Vec<Block>,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(default, deserialize_with = "nullable")]
    all: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    kind: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
}
