//! `linkparse` - social-media link resolution for chat bots
//!
//! # Features
//!
//! - **Link detection**: first registered platform pattern found in free-form text
//! - **Dispatch**: one long-lived parser per enabled platform, selected by keyword
//! - **Normalization**: embedded page state and REST payloads mapped to one
//!   [`ParseResult`] model with ordered [`Content`]
//! - **Caching**: bounded FIFO cache, written only after a successful render
//!
//! # Example
//!
//! ```rust,no_run
//! use linkparse::{Config, ParseResult, Pipeline, Renderer};
//!
//! struct Print;
//!
//! #[async_trait::async_trait]
//! impl Renderer for Print {
//!     async fn render(&self, result: &ParseResult) -> anyhow::Result<()> {
//!         println!("{}: {}", result.author.name, result.title);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::from_config(&Config::default())?;
//!     if let Some(search) = pipeline.find_link("check this out https://xhslink.com/abcd123 nice") {
//!         pipeline.handle(&search, &Print).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod http_client;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod site;

pub use cache::ResultCache;
pub use config::Config;
pub use error::{ParseError, PipelineError};
pub use http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestClient};
pub use matcher::{PatternRegistry, SearchResult};
pub use model::{Author, Content, ParseResult, Platform};
pub use pipeline::{Pipeline, PipelineBuilder, Renderer};
pub use site::SiteParser;

/// Version of linkparse
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
