//! Link Auditor
//!
//! Read-only companion to the mutator: extracts URLs from descriptions,
//! probes each distinct URL once (HEAD, falling back to GET when the method
//! is not allowed), and classifies liveness. Best-effort by design: a single
//! attempt per URL, short timeout, no retries.

use crate::youtube::client::VideoRecord;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Liveness classification for one probed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// 2xx or 3xx
    Alive,
    /// 4xx, 5xx, timeout, or connection failure
    Broken,
    /// Other transport ambiguity (TLS trouble, malformed responses, ...)
    Unknown,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Alive => "alive",
            Self::Broken => "broken",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One row of the audit report: a (video, url) pair with its verdict
#[derive(Debug, Clone)]
pub struct LinkCheckResult {
    pub video_id: String,
    pub url: String,
    pub status: LinkStatus,
    pub http_status: Option<u16>,
}

/// Characters that commonly trail a URL in prose but are not part of it
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ')', ']', ';', ':', '!', '?', '\'', '"', '>'];

/// Extract well-formed http/https URLs from free text, first-seen order,
/// deduplicated within the text. A URL-pattern scan, not HTML parsing.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    let mut rest = text;
    while let Some(pos) = rest.find("http://").or_else(|| rest.find("https://")) {
        // Prefer whichever scheme occurs first
        let pos = match (rest.find("http://"), rest.find("https://")) {
            (Some(a), Some(b)) => a.min(b),
            _ => pos,
        };

        let candidate = &rest[pos..];
        let end = candidate
            .find(|c: char| c.is_whitespace() || c == '<' || c == '"')
            .unwrap_or(candidate.len());
        let token = candidate[..end].trim_end_matches(TRAILING_PUNCTUATION);

        if let Ok(parsed) = Url::parse(token) {
            if parsed.host_str().is_some() && seen.insert(token.to_string()) {
                urls.push(token.to_string());
            }
        }

        rest = &candidate[end.max(1).min(candidate.len())..];
    }

    urls
}

/// Probes links found in video descriptions
pub struct LinkAuditor {
    http: reqwest::Client,
    concurrency: usize,
}

impl LinkAuditor {
    /// Default probe timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new() -> Result<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT, 8)
    }

    pub fn with_timeout(timeout: Duration, concurrency: usize) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ytbulk/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create probe HTTP client")?;

        Ok(Self {
            http,
            concurrency: concurrency.max(1),
        })
    }

    /// Audit every URL in every description. Distinct URLs are probed once;
    /// the report still carries one row per (video, url) pair.
    pub async fn audit_all(&self, videos: &[VideoRecord]) -> Vec<LinkCheckResult> {
        let pairs: Vec<(String, String)> = videos
            .iter()
            .flat_map(|video| {
                extract_urls(&video.description)
                    .into_iter()
                    .map(move |url| (video.id.clone(), url))
            })
            .collect();

        let mut distinct: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for (_, url) in &pairs {
            if seen.insert(url.clone()) {
                distinct.push(url.clone());
            }
        }

        tracing::info!(
            pairs = pairs.len(),
            distinct = distinct.len(),
            "link audit started"
        );

        let verdicts: HashMap<String, (LinkStatus, Option<u16>)> = stream::iter(distinct)
            .map(|url| async move {
                let verdict = self.probe(&url).await;
                (url, verdict)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        pairs
            .into_iter()
            .map(|(video_id, url)| {
                let (status, http_status) = verdicts
                    .get(&url)
                    .copied()
                    .unwrap_or((LinkStatus::Unknown, None));
                LinkCheckResult {
                    video_id,
                    url,
                    status,
                    http_status,
                }
            })
            .collect()
    }

    /// One lightweight probe: HEAD, retried as GET only on 405
    pub async fn probe(&self, url: &str) -> (LinkStatus, Option<u16>) {
        let head = self.http.head(url).send().await;

        let response = match head {
            Ok(resp) if resp.status() == StatusCode::METHOD_NOT_ALLOWED => {
                self.http.get(url).send().await
            }
            other => other,
        };

        match response {
            Ok(resp) => {
                let status = resp.status();
                let class = if status.is_success() || status.is_redirection() {
                    LinkStatus::Alive
                } else {
                    LinkStatus::Broken
                };
                tracing::debug!(%url, code = status.as_u16(), %class, "probe complete");
                (class, Some(status.as_u16()))
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                tracing::debug!(%url, error = %e, "probe could not reach the host");
                (LinkStatus::Broken, None)
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "probe failed");
                (LinkStatus::Unknown, None)
            }
        }
    }
}

/// Render the report as CSV, one row per (video, url) pair
pub fn to_csv(results: &[LinkCheckResult]) -> String {
    let mut out = String::from("video_id,url,status,http_status\n");
    for row in results {
        let code = row
            .http_status
            .map(|c| c.to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(&row.video_id),
            csv_field(&row.url),
            row.status,
            code
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_urls_from_prose() {
        let urls = extract_urls("Check out https://a.com and http://b.com/page today");
        assert_eq!(urls, vec!["https://a.com", "http://b.com/page"]);
    }

    #[test]
    fn trims_trailing_punctuation() {
        let urls = extract_urls("See https://example.com/docs. Also (https://other.com)!");
        assert_eq!(urls, vec!["https://example.com/docs", "https://other.com"]);
    }

    #[test]
    fn deduplicates_within_text() {
        let urls = extract_urls("https://a.com then https://a.com again");
        assert_eq!(urls, vec!["https://a.com"]);
    }

    #[test]
    fn ignores_malformed_candidates() {
        let urls = extract_urls("broken https:// and https://# nothing");
        assert!(urls.is_empty());
    }

    #[test]
    fn plain_text_yields_nothing() {
        assert!(extract_urls("no links here at all").is_empty());
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let results = vec![LinkCheckResult {
            video_id: "v1".to_string(),
            url: "https://a.com/x,y".to_string(),
            status: LinkStatus::Broken,
            http_status: Some(404),
        }];
        let csv = to_csv(&results);
        assert!(csv.starts_with("video_id,url,status,http_status\n"));
        assert!(csv.contains("v1,\"https://a.com/x,y\",broken,404"));
    }

    #[test]
    fn csv_leaves_http_status_blank_when_unknown() {
        let results = vec![LinkCheckResult {
            video_id: "v1".to_string(),
            url: "https://a.com".to_string(),
            status: LinkStatus::Unknown,
            http_status: None,
        }];
        assert!(to_csv(&results).contains("v1,https://a.com,unknown,\n"));
    }
}
