//! Content-resolution pipeline.
//!
//! Owns the pattern registry, one parser instance per enabled platform and
//! the result cache. Request handlers share a single `Pipeline` by
//! reference; the only mutable state inside is the cache.
//!
//! Flow for one message: [`Pipeline::find_link`] → [`Pipeline::handle`],
//! which checks the cache, resolves on a miss, renders, and caches only
//! after both resolution and rendering succeeded.
//!
//! Concurrent requests for the same uncached link are not coalesced: each
//! one runs its parser and the last successful render owns the cache slot.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::ResultCache;
use crate::config::Config;
use crate::error::PipelineError;
use crate::http_client::{HttpClient, ReqwestClient};
use crate::matcher::{PatternRegistry, SearchResult};
use crate::model::{ParseResult, Platform};
use crate::site::twitter::TwitterParser;
use crate::site::xiaohongshu::XiaohongshuParser;
use crate::site::SiteParser;

/// Downstream consumer of resolved posts (message formatting and sending).
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, result: &ParseResult) -> anyhow::Result<()>;
}

/// Builds a [`Pipeline`], registering parsers in order.
pub struct PipelineBuilder {
    config: Config,
    patterns: PatternRegistry,
    parsers: HashMap<String, Arc<dyn SiteParser>>,
    platforms: Vec<Platform>,
}

impl PipelineBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            patterns: PatternRegistry::new(),
            parsers: HashMap::new(),
            platforms: Vec::new(),
        }
    }

    /// Register `parser` under each of its keywords, unless its platform is
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the parser's patterns is not a valid regex.
    pub fn register(mut self, parser: Arc<dyn SiteParser>) -> Result<Self, regex::Error> {
        let platform = parser.platform();
        if self.config.is_disabled(platform) {
            info!(%platform, "platform disabled, parser not registered");
            return Ok(self);
        }

        for (keyword, pattern) in parser.patterns() {
            if self.patterns.register(keyword, pattern)? {
                self.parsers.insert((*keyword).to_string(), Arc::clone(&parser));
            }
        }
        if !self.platforms.contains(&platform) {
            self.platforms.push(platform);
        }
        Ok(self)
    }

    pub fn build(self) -> Pipeline {
        let names: Vec<&str> = self.platforms.iter().map(|p| p.display_name()).collect();
        info!("enabled platforms: {}", names.join(", "));

        Pipeline {
            patterns: self.patterns,
            parsers: self.parsers,
            platforms: self.platforms,
            cache: ResultCache::new(self.config.cache_capacity),
        }
    }
}

/// Link detection, dispatch, resolution and caching.
pub struct Pipeline {
    patterns: PatternRegistry,
    parsers: HashMap<String, Arc<dyn SiteParser>>,
    platforms: Vec<Platform>,
    cache: ResultCache,
}

impl Pipeline {
    pub fn builder(config: &Config) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Pipeline with every built-in parser, sharing `client`.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in pattern fails to compile.
    pub fn with_client(config: &Config, client: Arc<dyn HttpClient>) -> Result<Self, regex::Error> {
        Ok(Self::builder(config)
            .register(Arc::new(XiaohongshuParser::new(Arc::clone(&client), config)))?
            .register(Arc::new(TwitterParser::new(client, config)))?
            .build())
    }

    /// Pipeline with every built-in parser over a reqwest client.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);
        Ok(Self::with_client(config, client)?)
    }

    /// First registered link pattern matching anywhere in `text`.
    pub fn find_link(&self, text: &str) -> Option<SearchResult> {
        self.patterns.find_link(text)
    }

    /// Parser registered for `keyword`.
    pub fn dispatch(&self, keyword: &str) -> Result<&Arc<dyn SiteParser>, PipelineError> {
        self.parsers.get(keyword).ok_or_else(|| {
            error!(keyword, "keyword matched without a registered parser");
            PipelineError::UnknownKeyword(keyword.to_string())
        })
    }

    /// Run the parser for `search`. Does not touch the cache.
    #[instrument(skip(self, search), fields(keyword = search.keyword(), link = search.matched()))]
    pub async fn resolve(&self, search: &SearchResult) -> Result<ParseResult, PipelineError> {
        let parser = self.dispatch(search.keyword())?;
        match parser.parse(search).await {
            Ok(result) => {
                debug!(?result, "parsed");
                Ok(result)
            }
            Err(e) => {
                warn!(platform = %parser.platform(), error = %e, "parse failed");
                Err(e.into())
            }
        }
    }

    /// Serve `search` from cache or resolve it, then render.
    ///
    /// The result is cached only after rendering succeeds; any failure
    /// leaves the cache as it was.
    pub async fn handle<R>(
        &self,
        search: &SearchResult,
        renderer: &R,
    ) -> Result<Arc<ParseResult>, PipelineError>
    where
        R: Renderer + ?Sized,
    {
        let key = search.matched();
        let result = match self.cache.get(key) {
            Some(hit) => {
                debug!(key, "cache hit");
                hit
            }
            None => Arc::new(self.resolve(search).await?),
        };

        renderer
            .render(&result)
            .await
            .map_err(PipelineError::Render)?;

        self.cache.put(key, Arc::clone(&result));
        Ok(result)
    }

    /// [`find_link`](Self::find_link) followed by [`handle`](Self::handle).
    /// `Ok(None)` when `text` holds no supported link.
    pub async fn handle_text<R>(
        &self,
        text: &str,
        renderer: &R,
    ) -> Result<Option<Arc<ParseResult>>, PipelineError>
    where
        R: Renderer + ?Sized,
    {
        match self.find_link(text) {
            Some(search) => self.handle(&search, renderer).await.map(Some),
            None => Ok(None),
        }
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("result cache cleared");
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Enabled platforms in registration order.
    pub fn enabled_platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Registered keywords in registration order.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.patterns.keywords()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::testing::ScriptedClient;

    fn pipeline(config: &Config) -> Pipeline {
        Pipeline::with_client(config, Arc::new(ScriptedClient::new())).unwrap()
    }

    #[test]
    fn registers_builtin_parsers_in_order() {
        let p = pipeline(&Config::default());
        assert_eq!(
            p.keywords().collect::<Vec<_>>(),
            vec!["xiaohongshu.com", "xhslink.com", "x.com", "twitter.com"]
        );
        assert_eq!(
            p.enabled_platforms(),
            &[Platform::Xiaohongshu, Platform::Twitter]
        );
    }

    #[test]
    fn disabled_platform_is_not_registered() {
        let config = Config::from_toml(r#"disabled_platforms = ["twitter"]"#).unwrap();
        let p = pipeline(&config);
        assert_eq!(p.enabled_platforms(), &[Platform::Xiaohongshu]);
        assert!(p.find_link("https://x.com/a/status/1").is_none());
        assert!(matches!(
            p.dispatch("x.com"),
            Err(PipelineError::UnknownKeyword(_))
        ));
    }

    #[test]
    fn keywords_dispatch_to_their_parser() {
        let p = pipeline(&Config::default());
        for (text, platform) in [
            ("go https://www.xiaohongshu.com/explore/1", Platform::Xiaohongshu),
            ("go https://xhslink.com/abc", Platform::Xiaohongshu),
            ("go https://x.com/a/status/1", Platform::Twitter),
            ("go https://twitter.com/a/status/1", Platform::Twitter),
        ] {
            let found = p.find_link(text).unwrap();
            assert_eq!(p.dispatch(found.keyword()).unwrap().platform(), platform);
        }
    }

    #[test]
    fn unknown_keyword_is_an_error() {
        let p = pipeline(&Config::default());
        let err = p.dispatch("myspace.com").err().unwrap();
        assert!(matches!(err, PipelineError::UnknownKeyword(k) if k == "myspace.com"));
    }

    #[test]
    fn cache_capacity_comes_from_config() {
        let config = Config::from_toml("cache_capacity = 7").unwrap();
        assert_eq!(pipeline(&config).cache().capacity(), 7);
    }
}
