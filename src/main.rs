//! `linkparse` CLI - detect and resolve social-media links from the terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use linkparse::{Config, Content, ParseResult, Pipeline, Renderer};

#[derive(Parser)]
#[command(name = "linkparse")]
#[command(about = "Detect social-media links in text and resolve them into structured posts")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/linkparse/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which link (if any) the text contains
    Detect {
        /// Message text to scan
        text: String,
    },

    /// Detect a link and resolve the post behind it
    Resolve {
        /// Message text to scan
        text: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List enabled platforms and their keywords
    Platforms,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "linkparse=debug" } else { "linkparse=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref())?;
    let pipeline = Pipeline::from_config(&config)?;

    match cli.command {
        Commands::Detect { text } => Ok(cmd_detect(&pipeline, &text)),
        Commands::Resolve { text, json } => cmd_resolve(&pipeline, &text, json).await,
        Commands::Platforms => {
            cmd_platforms(&pipeline);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn cmd_detect(pipeline: &Pipeline, text: &str) -> ExitCode {
    let Some(found) = pipeline.find_link(text) else {
        println!("No supported link found");
        return ExitCode::FAILURE;
    };

    println!("🔗 Keyword: {}", found.keyword());
    println!("   Match:   {}", found.matched());
    let mut index = 1;
    while let Some(group) = found.group(index) {
        println!("   Group {index}: {group}");
        index += 1;
    }
    ExitCode::SUCCESS
}

async fn cmd_resolve(pipeline: &Pipeline, text: &str, json: bool) -> Result<ExitCode> {
    let renderer = StdoutRenderer { json };
    match pipeline.handle_text(text, &renderer).await? {
        Some(_) => Ok(ExitCode::SUCCESS),
        None => {
            println!("No supported link found");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_platforms(pipeline: &Pipeline) {
    println!("📋 Enabled platforms:");
    for platform in pipeline.enabled_platforms() {
        println!("   {} ({})", platform.display_name(), platform.name());
    }
    println!("\n🔑 Keywords:");
    for keyword in pipeline.keywords() {
        println!("   {keyword}");
    }
}

/// Prints resolved posts to stdout.
struct StdoutRenderer {
    json: bool,
}

#[async_trait]
impl Renderer for StdoutRenderer {
    async fn render(&self, result: &ParseResult) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(result)?);
        } else {
            print!("{}", format_summary(result));
        }
        Ok(())
    }
}

fn format_summary(result: &ParseResult) -> String {
    let mut out = format!("📱 {}\n", result.platform.display_name());
    if !result.title.is_empty() {
        out.push_str(&format!("📝 {}\n", result.title));
    }
    out.push_str(&format!("👤 {}\n", result.author.name));
    if let Some(published) = result
        .timestamp
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    {
        out.push_str(&format!("🕒 {}\n", published.format("%Y-%m-%d %H:%M UTC")));
    }
    if !result.text.is_empty() {
        out.push('\n');
        out.push_str(&result.text);
        out.push('\n');
    }
    if !result.contents.is_empty() {
        out.push('\n');
    }
    for content in &result.contents {
        match content {
            Content::Text { body } => out.push_str(&format!("   {body}\n")),
            Content::Image { url } => out.push_str(&format!("🖼️  {url}\n")),
            Content::Video { url, cover_url } => {
                out.push_str(&format!("🎬 {url}\n"));
                if let Some(cover) = cover_url {
                    out.push_str(&format!("   cover: {cover}\n"));
                }
            }
        }
    }
    out
}
