//! Client identity header profiles.
//!
//! Some origins serve materially different pages to a desktop browser and
//! to a mobile app webview, so parsers pick one of two identities per
//! request instead of a single default header set.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, USER_AGENT,
};

/// Recent stable Chrome releases: (major, full).
const CHROME_VERSIONS: &[(&str, &str)] = &[
    ("131", "131.0.6778.205"),
    ("132", "132.0.6834.160"),
    ("133", "133.0.6943.127"),
    ("134", "134.0.6998.89"),
];

const IOS_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1";

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
    image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

/// Which kind of client a request should look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Desktop,
    Mobile,
}

/// Browser profile rendered into request headers.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub kind: ClientKind,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub accept_encoding: String,
    pub sec_ch_ua: String,
    pub sec_ch_ua_mobile: String,
    pub sec_ch_ua_platform: String,
}

#[derive(Debug, Clone, Copy)]
enum OsPlatform {
    MacOS,
    Windows,
}

impl OsPlatform {
    fn random() -> Self {
        let mut rng = rand::thread_rng();
        // Windows 75%, macOS 25%
        if rng.gen::<f32>() < 0.75 {
            OsPlatform::Windows
        } else {
            OsPlatform::MacOS
        }
    }

    fn os_string(self) -> &'static str {
        match self {
            OsPlatform::MacOS => "Macintosh; Intel Mac OS X 10_15_7",
            OsPlatform::Windows => "Windows NT 10.0; Win64; x64",
        }
    }

    fn sec_ch_platform(self) -> &'static str {
        match self {
            OsPlatform::MacOS => "\"macOS\"",
            OsPlatform::Windows => "\"Windows\"",
        }
    }
}

/// Desktop Chrome profile with a randomized OS and release.
#[must_use]
pub fn desktop_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let platform = OsPlatform::random();
    let (major, full) = CHROME_VERSIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(CHROME_VERSIONS[0]);

    let user_agent = format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{full} Safari/537.36",
        platform.os_string(),
    );

    BrowserProfile {
        kind: ClientKind::Desktop,
        user_agent,
        accept: HTML_ACCEPT.to_string(),
        accept_language: "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
        accept_encoding: "gzip, deflate, br".to_string(),
        sec_ch_ua: format!(
            "\"Google Chrome\";v=\"{major}\", \"Chromium\";v=\"{major}\", \"Not_A Brand\";v=\"24\""
        ),
        sec_ch_ua_mobile: "?0".to_string(),
        sec_ch_ua_platform: platform.sec_ch_platform().to_string(),
    }
}

/// iOS Safari profile (what in-app share webviews send).
#[must_use]
pub fn mobile_profile() -> BrowserProfile {
    BrowserProfile {
        kind: ClientKind::Mobile,
        user_agent: IOS_USER_AGENT.to_string(),
        accept: HTML_ACCEPT.to_string(),
        accept_language: "zh-CN,zh-Hans;q=0.9".to_string(),
        accept_encoding: "gzip, deflate, br".to_string(),
        // Safari doesn't send Sec-CH-UA headers
        sec_ch_ua: String::new(),
        sec_ch_ua_mobile: String::new(),
        sec_ch_ua_platform: String::new(),
    }
}

impl BrowserProfile {
    /// Convert profile to reqwest `HeaderMap`.
    ///
    /// Values that are not valid header text are skipped.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        insert(&mut headers, USER_AGENT, &self.user_agent);
        insert(&mut headers, ACCEPT, &self.accept);
        insert(&mut headers, ACCEPT_LANGUAGE, &self.accept_language);
        insert(&mut headers, ACCEPT_ENCODING, &self.accept_encoding);

        if !self.sec_ch_ua.is_empty() {
            insert(&mut headers, HeaderName::from_static("sec-ch-ua"), &self.sec_ch_ua);
            insert(
                &mut headers,
                HeaderName::from_static("sec-ch-ua-mobile"),
                &self.sec_ch_ua_mobile,
            );
            insert(
                &mut headers,
                HeaderName::from_static("sec-ch-ua-platform"),
                &self.sec_ch_ua_platform,
            );
        }

        headers
    }
}

/// Insert `value` under `name`, ignoring values that are not valid header text.
pub fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => tracing::warn!(header = %name, "skipping invalid header value"),
    }
}
