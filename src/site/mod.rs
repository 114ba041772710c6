//! Platform parsers.
//!
//! Each platform gets one [`SiteParser`] implementation that turns a
//! detected link into a [`ParseResult`]. Parsers declare the
//! `(keyword, pattern)` pairs they handle; the
//! [`Pipeline`](crate::pipeline::Pipeline) registers those patterns and
//! routes matches back to the parser by keyword.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use linkparse::config::Config;
//! use linkparse::http_client::ReqwestClient;
//! use linkparse::site::{twitter::TwitterParser, SiteParser};
//!
//! let client = Arc::new(ReqwestClient::new()?);
//! let parser = TwitterParser::new(client, &Config::default());
//! assert_eq!(parser.patterns()[0].0, "x.com");
//! # Ok::<(), linkparse::ParseError>(())
//! ```

pub mod twitter;
pub mod xiaohongshu;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::error::Result;
use crate::matcher::SearchResult;
use crate::model::{ParseResult, Platform};

/// Platform-parser contract.
#[async_trait]
pub trait SiteParser: Send + Sync {
    fn platform(&self) -> Platform;

    /// `(keyword, pattern)` pairs in registration order.
    fn patterns(&self) -> &'static [(&'static str, &'static str)];

    /// Fetch and normalize the post behind `search`.
    async fn parse(&self, search: &SearchResult) -> Result<ParseResult>;
}

/// Deserialize `null` (or a missing field, with `#[serde(default)]`) as
/// `T::default()`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
