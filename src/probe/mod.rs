use std::future::Future;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(12);

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0";

/// Outcome of one title probe. A non-empty `error` means no HTTP response
/// was obtained on either scheme.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub title: String,
    pub location: String,
    pub status_code: u16,
    pub body_length: usize,
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build probe client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid title pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub trait Probe: Clone + Send + Sync + 'static {
    fn probe_title(&self, host: &str) -> impl Future<Output = ProbeResult> + Send;
}

/// Used when title fetching is disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProbe;

impl Probe for NoProbe {
    async fn probe_title(&self, _host: &str) -> ProbeResult {
        ProbeResult::default()
    }
}

#[derive(Clone, Debug)]
pub struct HttpProber {
    client: reqwest::Client,
    title_re: Regex,
}

impl HttpProber {
    pub fn new() -> Result<Self, ProbeError> {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ProbeError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(USER_AGENT),
        );

        // the first response is final, certificates are not checked
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .danger_accept_invalid_hostnames(true)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            title_re: title_regex()?,
        })
    }

    async fn fetch(&self, url: &str) -> ProbeResult {
        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                return ProbeResult {
                    error: e.to_string(),
                    ..Default::default()
                }
            }
        };

        let status_code = resp.status().as_u16();
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return ProbeResult {
                    error: e.to_string(),
                    ..Default::default()
                }
            }
        };

        let text = String::from_utf8_lossy(&body);
        ProbeResult {
            title: extract_title(&self.title_re, &text),
            location,
            status_code,
            body_length: body.len(),
            error: String::new(),
        }
    }
}

impl Probe for HttpProber {
    /// HTTPS first, plain HTTP only when HTTPS produced no response at all.
    async fn probe_title(&self, host: &str) -> ProbeResult {
        let mut last_error = String::new();
        for scheme in ["https", "http"] {
            let result = self.fetch(&format!("{scheme}://{host}")).await;
            if result.error.is_empty() {
                return result;
            }
            log::debug!("title probe {scheme}://{host} failed: {}", result.error);
            last_error = result.error;
        }
        ProbeResult {
            error: last_error,
            ..Default::default()
        }
    }
}

pub fn title_regex() -> Result<Regex, regex::Error> {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>")
}

pub fn extract_title(title_re: &Regex, body: &str) -> String {
    title_re
        .captures(body)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}
