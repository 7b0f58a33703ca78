/// Link preview enrichment
///
/// Fetches a page and pulls OpenGraph / meta-tag metadata. This adapter never
/// fails a batch: any per-link problem degrades that link to URL + domain.
use async_trait::async_trait;
use futures::future::join_all;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{error::CoffeyResult, records::Link};

/// Hard timeout on preview fetches; a slow page must not stall record creation
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// How much of the body gets scanned for meta tags
const HTML_SCAN_LIMIT: usize = 100_000;

lazy_static! {
    static ref OG_TITLE: Regex =
        Regex::new(r#"(?i)<meta\s+property=["']og:title["']\s+content=["']([^"']+)["']"#).unwrap();
    static ref OG_DESCRIPTION: Regex =
        Regex::new(r#"(?i)<meta\s+property=["']og:description["']\s+content=["']([^"']+)["']"#)
            .unwrap();
    static ref OG_IMAGE: Regex =
        Regex::new(r#"(?i)<meta\s+property=["']og:image["']\s+content=["']([^"']+)["']"#).unwrap();
    static ref META_DESCRIPTION: Regex =
        Regex::new(r#"(?i)<meta\s+name=["']description["']\s+content=["']([^"']+)["']"#).unwrap();
    static ref TITLE_TAG: Regex = Regex::new(r"(?i)<title>([^<]+)</title>").unwrap();
}

#[async_trait]
pub trait LinkPreviewSource: Send + Sync {
    /// Fetch metadata for one URL; always returns at least URL + domain
    async fn fetch(&self, url: &str) -> Link;
}

/// Parsed page metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Pull OpenGraph metadata out of an HTML fragment, with standard-meta and
/// title-tag fallbacks
pub fn parse_meta_tags(html: &str) -> PageMetadata {
    let capture = |re: &Regex| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    let mut meta = PageMetadata {
        title: capture(&OG_TITLE),
        description: capture(&OG_DESCRIPTION),
        image: capture(&OG_IMAGE),
    };

    if meta.description.is_none() {
        meta.description = capture(&META_DESCRIPTION);
    }
    if meta.title.is_none() {
        meta.title = capture(&TITLE_TAG);
    }

    meta
}

/// Hostname of a URL, or empty when unparseable
pub fn extract_domain(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
}

/// HTTP-backed preview fetcher
pub struct HttpLinkPreview {
    client: reqwest::Client,
}

impl HttpLinkPreview {
    pub fn new(user_agent: &str) -> CoffeyResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| {
                crate::error::CoffeyError::Internal(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkPreviewSource for HttpLinkPreview {
    async fn fetch(&self, url: &str) -> Link {
        let mut link = Link {
            url: url.to_string(),
            domain: extract_domain(url),
            ..Default::default()
        };

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Link preview fetch failed for {}: {}", url, e);
                return link;
            }
        };

        if !response.status().is_success() {
            return link;
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/html"))
            .unwrap_or(false);
        if !is_html {
            return link;
        }

        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Link preview body read failed for {}: {}", url, e);
                return link;
            }
        };

        let mut scan_end = body.len().min(HTML_SCAN_LIMIT);
        while !body.is_char_boundary(scan_end) {
            scan_end -= 1;
        }
        let meta = parse_meta_tags(&body[..scan_end]);

        link.title = meta.title;
        link.description = meta.description;
        link.image = meta.image;
        link
    }
}

/// Enrich a batch of links concurrently.
///
/// Links that already carry caller-supplied metadata are passed through with
/// only the domain filled in; enrichment is additive, never an overwrite.
pub async fn enrich_links(source: &dyn LinkPreviewSource, links: Vec<Link>) -> Vec<Link> {
    let futures = links.into_iter().map(|link| async move {
        if link.title.is_some() || link.description.is_some() || link.image.is_some() {
            let domain = link.domain.clone().or_else(|| extract_domain(&link.url));
            return Link { domain, ..link };
        }
        source.fetch(&link.url).await
    });

    join_all(futures).await
}
