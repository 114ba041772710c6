//! Xiaohongshu (小红书) note extraction from embedded page state.
//!
//! Note pages carry their data as a `window.__INITIAL_STATE__=...` script
//! blob. Two page shapes exist:
//! - `/explore/<id>`: desktop page, note under `note.noteDetailMap.<id>.note`
//! - `/discovery/item/<id>`: mobile share page, note under
//!   `noteData.data.noteData` plus watermark-free preload images
//!
//! `xhslink.com` short links are resolved first by reading the redirect
//! `Location` without following it.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, ACCEPT};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{nullable, SiteParser};
use crate::config::Config;
use crate::error::{ParseError, Result};
use crate::fingerprint::{self, desktop_profile, mobile_profile};
use crate::http_client::{get_redirect_url, HttpClient, HttpRequest};
use crate::matcher::SearchResult;
use crate::model::{Author, Content, ParseResult, Platform};

pub const WEB_BASE: &str = "https://www.xiaohongshu.com";

const PATTERNS: &[(&str, &str)] = &[
    (
        "xiaohongshu.com",
        r"https?://(?:www\.)?xiaohongshu\.com/[A-Za-z0-9._?%&+=/#@-]*",
    ),
    ("xhslink.com", r"https?://xhslink\.com/[A-Za-z0-9._?%&+=/#@-]*"),
];

const EXPLORE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
    image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

static INITIAL_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)window\.__INITIAL_STATE__=(.*?)</script>").expect("valid state regex")
});

static NOTE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:/explore/|/discovery/item/|source=note&noteId=)(\w+)").expect("valid id regex")
});

/// Xiaohongshu parser.
pub struct XiaohongshuParser {
    client: Arc<dyn HttpClient>,
    /// PC browser identity, used for `/explore/` pages.
    desktop: HeaderMap,
    /// iOS identity, used for `/discovery/item/` pages.
    mobile: HeaderMap,
    use_cookie: bool,
    cookie_mode: bool,
    timeout: Duration,
    web_base: String,
}

impl XiaohongshuParser {
    pub fn new(client: Arc<dyn HttpClient>, config: &Config) -> Self {
        let mut desktop = desktop_profile().to_headers();
        fingerprint::insert(&mut desktop, ACCEPT, EXPLORE_ACCEPT);
        let cookie = config.xiaohongshu.active_cookie();
        if let Some(cookie) = cookie {
            fingerprint::insert(&mut desktop, reqwest::header::COOKIE, cookie);
        }

        let mut mobile = mobile_profile().to_headers();
        for (name, value) in [
            ("origin", WEB_BASE),
            ("x-requested-with", "XMLHttpRequest"),
            ("sec-fetch-site", "same-origin"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-dest", "empty"),
        ] {
            fingerprint::insert(&mut mobile, HeaderName::from_static(name), value);
        }

        Self {
            client,
            desktop,
            mobile,
            use_cookie: config.xiaohongshu.use_cookie,
            cookie_mode: cookie.is_some(),
            timeout: config.timeout_for(Platform::Xiaohongshu),
            web_base: WEB_BASE.to_string(),
        }
    }

    /// Override the host used when rebuilding `/explore/` URLs.
    #[must_use]
    pub fn with_web_base(mut self, base: impl Into<String>) -> Self {
        self.web_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Rewrite any note link into its `/explore/` form: `(note_id, url)`.
    fn normalize_to_explore_url(&self, url: &str) -> Result<(String, String)> {
        let id = NOTE_ID
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| ParseError::Unsupported(format!("share link incomplete: {url}")))?;

        let query: Vec<(String, String)> = url::Url::parse(url)
            .map(|u| u.query_pairs().into_owned().collect())
            .unwrap_or_default();
        let param = |name: &str| {
            query
                .iter()
                .find(|(k, v)| k == name && !v.is_empty())
                .map(|(_, v)| v.clone())
        };

        let mut explore = url::Url::parse(&format!("{}/explore/{id}", self.web_base))
            .map_err(|e| ParseError::Unsupported(format!("{url}: {e}")))?;
        {
            let mut pairs = explore.query_pairs_mut();
            pairs.append_pair(
                "xsec_source",
                &param("xsec_source").unwrap_or_else(|| "pc_feed".to_string()),
            );
            if let Some(token) = param("xsec_token") {
                pairs.append_pair("xsec_token", &token);
            }
        }

        Ok((id, explore.into()))
    }

    async fn parse_explore(&self, url: &str, note_id: &str) -> Result<ParseResult> {
        let response = self
            .client
            .send(
                HttpRequest::get(url)
                    .headers(self.desktop.clone())
                    .timeout(self.timeout),
            )
            .await?
            .error_for_status()?;
        info!(url = %response.url, status = response.status, "fetched explore page");

        let state = extract_initial_state(&response.body)?;
        let node = state
            .get("note")
            .and_then(|n| n.get("noteDetailMap"))
            .and_then(|m| m.get(note_id))
            .and_then(|d| d.get("note"))
            .filter(|n| n.as_object().is_some_and(|o| !o.is_empty()))
            .ok_or_else(|| {
                ParseError::MissingData(format!("note {note_id} not found in page state"))
            })?;

        let note = ExploreNote::deserialize(node)?;
        Ok(note.into_result(response.url))
    }

    async fn parse_discovery(&self, url: &str) -> Result<ParseResult> {
        let response = self
            .client
            .send(
                HttpRequest::get(url)
                    .headers(self.mobile.clone())
                    .timeout(self.timeout),
            )
            .await?
            .error_for_status()?;
        info!(url = %response.url, status = response.status, "fetched discovery page");

        let state = extract_initial_state(&response.body)?;
        let note_data = state
            .get("noteData")
            .filter(|v| !v.is_null())
            .ok_or_else(|| ParseError::MissingData("noteData not found in page state".into()))?;

        // Preload data is optional; a malformed blob only loses the cover and fallbacks.
        let preload = note_data
            .get("normalNotePreloadData")
            .filter(|v| !v.is_null())
            .and_then(|v| match PreloadData::deserialize(v) {
                Ok(preload) => Some(preload),
                Err(e) => {
                    warn!(error = %e, "ignoring malformed preload data");
                    None
                }
            });
        let node = note_data
            .get("data")
            .and_then(|d| d.get("noteData"))
            .filter(|n| n.as_object().is_some_and(|o| !o.is_empty()))
            .ok_or_else(|| ParseError::MissingData("noteData.data.noteData not found".into()))?;

        let note = DiscoveryNote::deserialize(node)?;
        Ok(note.into_result(preload, response.url))
    }
}

#[async_trait]
impl SiteParser for XiaohongshuParser {
    fn platform(&self) -> Platform {
        Platform::Xiaohongshu
    }

    fn patterns(&self) -> &'static [(&'static str, &'static str)] {
        PATTERNS
    }

    async fn parse(&self, search: &SearchResult) -> Result<ParseResult> {
        let mut url = search.matched().to_string();

        if url.contains("xhslink") {
            let headers = if self.use_cookie {
                self.desktop.clone()
            } else {
                self.mobile.clone()
            };
            url = get_redirect_url(self.client.as_ref(), &url, headers, self.timeout).await?;
            debug!(%url, "xhslink redirect");
        }

        if self.cookie_mode {
            let (note_id, explore_url) = self.normalize_to_explore_url(&url)?;
            return self.parse_explore(&explore_url, &note_id).await;
        }

        let path = url::Url::parse(&url)
            .map(|u| u.path().to_string())
            .map_err(|e| ParseError::Unsupported(format!("{url}: {e}")))?;

        if let Some(rest) = path.strip_prefix("/explore/") {
            let note_id = rest.rsplit('/').find(|s| !s.is_empty()).unwrap_or_default();
            if note_id.is_empty() {
                return Err(ParseError::Unsupported(format!("{url}: missing note id")));
            }
            self.parse_explore(&url, note_id).await
        } else if path.starts_with("/discovery/item/") {
            self.parse_discovery(&url).await
        } else {
            Err(ParseError::Unsupported(format!(
                "xiaohongshu link {url} (path {path})"
            )))
        }
    }
}

/// Locate and decode the `window.__INITIAL_STATE__` blob in `html`.
fn extract_initial_state(html: &str) -> Result<Value> {
    let blob = INITIAL_STATE
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ParseError::Expired("xiaohongshu share link expired or note removed".into()))?
        .as_str()
        .trim()
        .trim_end_matches(';');

    Ok(serde_json::from_str(&replace_undefined(blob))?)
}

/// Replace bare JavaScript `undefined` tokens with `null`, leaving string
/// contents alone.
fn replace_undefined(js: &str) -> String {
    const TOKEN: &str = "undefined";

    let mut out = String::with_capacity(js.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = js;

    while let Some(ch) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        } else if rest.starts_with(TOKEN) {
            let prev_ident = out
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
            let next_ident = rest[TOKEN.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
            if !prev_ident && !next_ident {
                out.push_str("null");
                rest = &rest[TOKEN.len()..];
                continue;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    out
}

// ============================================================================
// Page state types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct Video {
    #[serde(default)]
    media: Option<VideoMedia>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoMedia {
    #[serde(default)]
    stream: Option<Stream>,
}

/// Encoded variants by codec. h265 is watermark-free; h264 carries the
/// watermark.
#[derive(Debug, Default, Deserialize)]
struct Stream {
    #[serde(default, deserialize_with = "nullable")]
    h264: Vec<StreamVariant>,
    #[serde(default, deserialize_with = "nullable")]
    h265: Vec<StreamVariant>,
    #[serde(default, deserialize_with = "nullable")]
    av1: Vec<StreamVariant>,
    #[serde(default, deserialize_with = "nullable")]
    h266: Vec<StreamVariant>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamVariant {
    #[serde(default)]
    master_url: Option<String>,
}

impl Video {
    /// First playable URL in preference order h265, h264, av1, h266.
    fn best_url(&self) -> Option<String> {
        let stream = self.media.as_ref()?.stream.as_ref()?;
        [&stream.h265, &stream.h264, &stream.av1, &stream.h266]
            .into_iter()
            .find_map(|variants| {
                variants
                    .iter()
                    .find_map(|v| v.master_url.clone().filter(|u| !u.is_empty()))
            })
    }
}

fn video_url(kind: &str, video: Option<&Video>) -> Option<String> {
    if kind != "video" {
        return None;
    }
    video?.best_url()
}

fn to_seconds(millis: Option<i64>) -> Option<i64> {
    millis.filter(|t| *t > 0).map(|t| t.div_euclid(1000))
}

#[derive(Debug, Deserialize)]
struct ExploreUser {
    #[serde(default, deserialize_with = "nullable")]
    nickname: String,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExploreImage {
    #[serde(default)]
    url_default: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExploreNote {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, deserialize_with = "nullable")]
    title: String,
    #[serde(default, deserialize_with = "nullable")]
    desc: String,
    user: ExploreUser,
    #[serde(default, deserialize_with = "nullable")]
    image_list: Vec<ExploreImage>,
    #[serde(default)]
    video: Option<Video>,
    #[serde(default)]
    time: Option<i64>,
}

impl ExploreNote {
    fn image_urls(&self) -> Vec<String> {
        self.image_list
            .iter()
            .filter_map(|img| img.url_default.clone().or_else(|| img.url.clone()))
            .filter(|u| !u.is_empty())
            .collect()
    }

    fn into_result(self, url: String) -> ParseResult {
        let images = self.image_urls();
        let contents = match video_url(&self.kind, self.video.as_ref()) {
            Some(video) => vec![Content::video(video, images.first().cloned())],
            None => Content::images(images),
        };

        ParseResult {
            platform: Platform::Xiaohongshu,
            title: self.title,
            text: self.desc,
            author: Author::new(self.user.nickname, self.user.avatar),
            contents,
            timestamp: to_seconds(self.time),
            url: Some(url),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryUser {
    #[serde(default, deserialize_with = "nullable")]
    nick_name: String,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryImage {
    #[serde(default, deserialize_with = "nullable")]
    url: String,
    #[serde(default)]
    url_size_large: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryNote {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, deserialize_with = "nullable")]
    title: String,
    #[serde(default, deserialize_with = "nullable")]
    desc: String,
    user: DiscoveryUser,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default)]
    last_update_time: Option<i64>,
    /// Watermarked.
    #[serde(default, deserialize_with = "nullable")]
    image_list: Vec<DiscoveryImage>,
    #[serde(default)]
    video: Option<Video>,
}

/// Preview data served alongside the note; its single image is
/// watermark-free and serves as video cover.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreloadData {
    #[serde(default, deserialize_with = "nullable")]
    title: String,
    #[serde(default, deserialize_with = "nullable")]
    desc: String,
    #[serde(default, deserialize_with = "nullable")]
    images_list: Vec<DiscoveryImage>,
}

impl DiscoveryNote {
    fn into_result(self, preload: Option<PreloadData>, url: String) -> ParseResult {
        let images: Vec<String> = self
            .image_list
            .iter()
            .map(|img| img.url.clone())
            .filter(|u| !u.is_empty())
            .collect();

        let contents = match video_url(&self.kind, self.video.as_ref()) {
            Some(video) => {
                let cover = preload
                    .as_ref()
                    .and_then(|p| {
                        p.images_list.iter().find_map(|img| {
                            img.url_size_large
                                .clone()
                                .filter(|u| !u.is_empty())
                                .or_else(|| Some(img.url.clone()).filter(|u| !u.is_empty()))
                        })
                    })
                    .or_else(|| images.first().cloned());
                vec![Content::video(video, cover)]
            }
            None => Content::images(images),
        };

        let (title, text) = match preload {
            Some(p) => (
                if self.title.is_empty() { p.title } else { self.title },
                if self.desc.is_empty() { p.desc } else { self.desc },
            ),
            None => (self.title, self.desc),
        };

        ParseResult {
            platform: Platform::Xiaohongshu,
            title,
            text,
            author: Author::new(self.user.nick_name, self.user.avatar),
            contents,
            timestamp: to_seconds(self.time.or(self.last_update_time)),
            url: Some(url),
        }
    }
}
