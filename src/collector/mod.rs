use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use base64::Engine as _;
use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;

pub const DEFAULT_RECON_URL: &str = "https://fofa.info/api/v1/search/all";
pub const RECON_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on pages fetched per collection run.
pub const MAX_PAGES: u32 = 30;

#[derive(Clone, PartialEq, Eq)]
pub struct ReconCredential {
    pub email: String,
    pub key: String,
}

impl std::fmt::Debug for ReconCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconCredential")
            .field("email", &self.email)
            .field("key", &"***")
            .finish()
    }
}

/// Parses an `email|key` token.
pub fn parse_credential(value: &str) -> Result<ReconCredential, String> {
    let (email, key) = value
        .trim()
        .split_once('|')
        .ok_or_else(|| "expected format email|key".to_string())?;
    let (email, key) = (email.trim(), key.trim());
    if email.is_empty() || key.is_empty() {
        return Err("both email and key must be non-empty".to_string());
    }
    Ok(ReconCredential {
        email: email.to_string(),
        key: key.to_string(),
    })
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to build recon HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid recon url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request for page {page} failed: {source}")]
    Http {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("page {page} is not a valid envelope: {source}")]
    Decode {
        page: u32,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconEnvelope {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub errmsg: Option<String>,
    #[serde(default)]
    pub results: Vec<Vec<serde_json::Value>>,
}

/// One page of raw recon-API output.
pub trait PageSource: Send + Sync + 'static {
    fn fetch_page(&self, page: u32) -> impl Future<Output = Result<Vec<u8>, CollectError>> + Send;
}

#[derive(Clone, Debug)]
pub struct ReconApi {
    client: reqwest::Client,
    base_url: reqwest::Url,
    credential: ReconCredential,
    query: String,
}

impl ReconApi {
    pub fn new(
        base_url: &str,
        credential: ReconCredential,
        target: &str,
    ) -> Result<Self, CollectError> {
        let base_url = reqwest::Url::parse(base_url).map_err(|source| CollectError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let client = reqwest::Client::builder()
            .timeout(RECON_TIMEOUT)
            .build()
            .map_err(|source| CollectError::ClientBuild { source })?;
        Ok(Self {
            client,
            base_url,
            credential,
            query: encode_query(target),
        })
    }

    pub fn page_url(&self, page: u32) -> reqwest::Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("email", &self.credential.email)
            .append_pair("key", &self.credential.key)
            .append_pair("qbase64", &self.query)
            .append_pair("page", &page.to_string());
        url
    }
}

impl PageSource for ReconApi {
    async fn fetch_page(&self, page: u32) -> Result<Vec<u8>, CollectError> {
        let resp = self
            .client
            .get(self.page_url(page))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| CollectError::Http { page, source })?;
        let body = resp
            .bytes()
            .await
            .map_err(|source| CollectError::Http { page, source })?;
        Ok(body.to_vec())
    }
}

/// base64 of `domain=<target>`.
pub fn encode_query(target: &str) -> String {
    base64::engine::general_purpose::URL_SAFE.encode(format!("domain={target}"))
}

/// Reduces a recon row (`host`, `host:port` or a URL) to a bare hostname.
pub fn normalize_host(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let with_scheme = if raw.starts_with("https://") || raw.starts_with("http://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let url = reqwest::Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }
    Some(host.to_string())
}

/// Pages through the source until an error envelope, an empty page or
/// `MAX_PAGES`. Failed pages are skipped. Hostnames keep first-seen order.
pub async fn collect_hosts<P: PageSource>(source: &P) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut hosts: Vec<String> = Vec::new();

    for page in 1..=MAX_PAGES {
        debug!("fetching recon page {page}");
        let envelope = match source.fetch_page(page).await.and_then(|body| {
            serde_json::from_slice::<ReconEnvelope>(&body)
                .map_err(|source| CollectError::Decode { page, source })
        }) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("{e}, skipping page");
                continue;
            }
        };

        if envelope.error {
            if let Some(msg) = envelope.errmsg.as_deref() {
                warn!("recon api returned error on page {page}: {msg}");
            }
            break;
        }
        if envelope.results.is_empty() {
            break;
        }

        for row in envelope.results.iter() {
            let Some(raw) = row.first().and_then(|v| v.as_str()) else {
                continue;
            };
            match normalize_host(raw) {
                Some(host) => {
                    if seen.insert(host.clone()) {
                        hosts.push(host);
                    }
                }
                None => warn!("could not extract a host from recon row '{raw}'"),
            }
        }
    }
    hosts
}

/// Waits for triggers; each one is a full collection run whose hosts are
/// handed to the resolution pool.
pub struct Collector<P> {
    source: Option<P>,
}

impl<P: PageSource> Collector<P> {
    pub fn new(source: Option<P>) -> Self {
        Self { source }
    }

    pub async fn run(self, mut trigger_rx: mpsc::Receiver<()>, hosts_tx: mpsc::Sender<String>) {
        debug!("recon collector started");
        while trigger_rx.recv().await.is_some() {
            let Some(source) = self.source.as_ref() else {
                warn!("recon trigger received but no credential is configured");
                continue;
            };
            let hosts = collect_hosts(source).await;
            info!("found {} hosts from recon api, start verifying", hosts.len());
            for host in hosts {
                debug!("queueing recon host {host}");
                if hosts_tx.send(host).await.is_err() {
                    debug!("resolution pool closed, recon collector stopping");
                    return;
                }
            }
        }
        debug!("recon collector finished");
    }
}
