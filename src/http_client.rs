//! HTTP capability used by site parsers.
//!
//! Parsers talk to [`HttpClient`] rather than reqwest directly so the same
//! parsing code runs against the network or a scripted client in tests.
//!
//! [`ReqwestClient`] features:
//! - HTTP/2 with fallback, Brotli/Gzip compression
//! - Per-request headers, timeout and redirect policy
//! - No cookie store: cookies are only sent when a parser adds the header

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Client, Method};
use tracing::{debug, info, instrument};

use crate::error::{ParseError, Result};

/// HTTP method subset the parsers need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub follow_redirects: bool,
    pub timeout: Duration,
}

impl HttpRequest {
    /// GET that follows redirects, with a 30 second timeout.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: HeaderMap::new(),
            follow_redirects: true,
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
        }
    }

    /// HEAD with the same defaults as [`HttpRequest::get`].
    pub fn head(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Head,
            ..Self::get(url)
        }
    }

    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn no_redirect(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Response with the body already read as text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// Final URL after any followed redirects.
    pub url: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail with [`ParseError::Status`] unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ParseError::Status {
                status: self.status,
                url: self.url,
            })
        }
    }
}

/// Something that can execute [`HttpRequest`]s.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Resolve a short link by requesting it without following redirects and
/// reading the `Location` header. Relative locations are joined onto `url`.
pub async fn get_redirect_url(
    client: &dyn HttpClient,
    url: &str,
    headers: HeaderMap,
    timeout: Duration,
) -> Result<String> {
    let response = client
        .send(
            HttpRequest::get(url)
                .headers(headers)
                .no_redirect()
                .timeout(timeout),
        )
        .await?;

    let location = response
        .headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ParseError::Redirect(format!(
                "no Location header from {url} (HTTP {})",
                response.status
            ))
        })?;

    let resolved = url::Url::parse(url)
        .and_then(|base| base.join(location))
        .map_or_else(|_| location.to_string(), String::from);

    debug!(from = %url, to = %resolved, "resolved redirect");
    Ok(resolved)
}

/// reqwest-backed [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    follow: Client,
    no_follow: Client,
}

impl ReqwestClient {
    /// Create a new client pair (redirect-following and non-following).
    pub fn new() -> Result<Self> {
        Ok(Self {
            follow: Self::builder()
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()?,
            no_follow: Self::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()?,
        })
    }

    fn builder() -> reqwest::ClientBuilder {
        Client::builder()
            // Let the server negotiate HTTP/2
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    #[instrument(skip(self, request), fields(url = %request.url, follow = request.follow_redirects))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let client = if request.follow_redirects {
            &self.follow
        } else {
            &self.no_follow
        };
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Head => Method::HEAD,
        };

        debug!("sending request");
        let response = client
            .request(method, &request.url)
            .headers(request.headers)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| classify(e, &request.url))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        info!(status, final_url = %url, "response received");

        let body = response
            .text()
            .await
            .map_err(|e| classify(e, &request.url))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
            url,
        })
    }
}

fn classify(err: reqwest::Error, url: &str) -> ParseError {
    if err.is_timeout() {
        ParseError::Timeout(url.to_string())
    } else {
        ParseError::Network(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // Accept and hold the connection without ever answering.
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let client = ReqwestClient::new().unwrap();
        let url = format!("http://{addr}/");
        let started = std::time::Instant::now();
        let err = client
            .send(HttpRequest::get(&url).timeout(Duration::from_millis(300)))
            .await
            .unwrap_err();

        assert!(matches!(err, ParseError::Timeout(ref u) if *u == url));
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }

    #[tokio::test]
    async fn redirect_is_not_followed() {
        let mut server = mockito::Server::new_async().await;
        let target = format!("{}/explore/abc", server.url());
        let short = server
            .mock("GET", "/s/xyz")
            .with_status(302)
            .with_header("location", &target)
            .create_async()
            .await;

        let client = ReqwestClient::new().unwrap();
        let url = format!("{}/s/xyz", server.url());
        let resolved = get_redirect_url(&client, &url, HeaderMap::new(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(resolved, target);
        short.assert_async().await;
    }

    #[tokio::test]
    async fn relative_location_is_joined() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/s/rel")
            .with_status(301)
            .with_header("location", "/discovery/item/42")
            .create_async()
            .await;

        let client = ReqwestClient::new().unwrap();
        let url = format!("{}/s/rel", server.url());
        let resolved = get_redirect_url(&client, &url, HeaderMap::new(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(resolved, format!("{}/discovery/item/42", server.url()));
    }

    #[tokio::test]
    async fn missing_location_is_a_redirect_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/s/none")
            .with_status(200)
            .with_body("not a redirect")
            .create_async()
            .await;

        let client = ReqwestClient::new().unwrap();
        let url = format!("{}/s/none", server.url());
        let err = get_redirect_url(&client, &url, HeaderMap::new(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, ParseError::Redirect(_)));
    }

    #[tokio::test]
    async fn custom_headers_are_sent() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/page")
            .match_header("x-requested-with", "XMLHttpRequest")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-requested-with", "XMLHttpRequest".parse().unwrap());

        let client = ReqwestClient::new().unwrap();
        let response = client
            .send(HttpRequest::get(format!("{}/page", server.url())).headers(headers))
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.body, "ok");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let client = ReqwestClient::new().unwrap();
        let response = client
            .send(HttpRequest::get(format!("{}/gone", server.url())))
            .await
            .unwrap();

        let err = response.error_for_status().unwrap_err();
        assert!(matches!(err, ParseError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn head_request_uses_head_method() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("HEAD", "/probe")
            .with_status(204)
            .create_async()
            .await;

        let client = ReqwestClient::new().unwrap();
        let response = client
            .send(HttpRequest::head(format!("{}/probe", server.url())))
            .await
            .unwrap();

        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
        m.assert_async().await;
    }

    #[test]
    fn request_builder_sets_fields() {
        let req = HttpRequest::get("https://example.com")
            .no_redirect()
            .timeout(Duration::from_secs(3));
        assert_eq!(req.method, HttpMethod::Get);
        assert!(!req.follow_redirects);
        assert_eq!(req.timeout, Duration::from_secs(3));
    }
}
