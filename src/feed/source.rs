//! Feed sources.
//!
//! [`FeedSource`] is the seam between the poll cycle and whatever fetches
//! and parses feeds. [`HttpFeedSource`] is the default implementation over
//! reqwest and feed-rs.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use super::types::FeedItem;
use crate::config::FetchConfig;
use crate::{FeedbotError, Result};

/// Fetches a feed and returns its entries in document order (newest first).
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse `uri`, giving up after `timeout`.
    async fn fetch(&self, uri: &str, timeout: Duration) -> Result<Vec<FeedItem>>;
}

/// HTTP feed source with SSRF protection and a body size limit.
pub struct HttpFeedSource {
    client: Client,
    max_feed_size: u64,
    allow_private_hosts: bool,
}

impl HttpFeedSource {
    /// Create a source from the fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FeedbotError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_feed_size {
            return Err(FeedbotError::Fetch(format!(
                "feed too large: {} bytes (max {} bytes)",
                size, self.max_feed_size
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, uri: &str, timeout: Duration) -> Result<Vec<FeedItem>> {
        if !self.allow_private_hosts {
            validate_url(uri)?;
        }

        debug!("Fetching feed {}", uri);
        let response = self
            .client
            .get(uri)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FeedbotError::Fetch(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FeedbotError::Fetch(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            self.check_size(content_length)?;
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedbotError::Fetch(format!("failed to read response: {}", e)))?;
        self.check_size(bytes.len() as u64)?;

        parse_feed(&bytes)
    }
}

/// Validate a URL for SSRF protection.
///
/// Only http and https are accepted, and the host must not be a loopback,
/// private, link-local or reserved name or address.
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| FeedbotError::Fetch(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FeedbotError::Fetch(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| FeedbotError::Fetch("URL has no host".to_string()))?;

    let ip = match host {
        url::Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(FeedbotError::Fetch(format!("forbidden host: {}", domain)));
            }
            return Ok(());
        }
        url::Host::Ipv4(v4) => IpAddr::V4(v4),
        url::Host::Ipv6(v6) => IpAddr::V6(v6),
    };

    if is_private_ip(&ip) {
        return Err(FeedbotError::Fetch(format!(
            "private IP address not allowed: {}",
            ip
        )));
    }
    Ok(())
}

fn is_forbidden_hostname(host: &str) -> bool {
    const FORBIDDEN_SUFFIXES: [&str; 7] = [
        ".local",
        ".localhost",
        ".internal",
        ".intranet",
        ".corp",
        ".home",
        ".lan",
    ];

    let host = host.to_lowercase();
    host == "localhost" || FORBIDDEN_SUFFIXES.iter().any(|s| host.ends_with(s))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.is_documentation()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // unique local fc00::/7
                || (first & 0xfe00) == 0xfc00
                // link-local fe80::/10
                || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Parse an RSS, Atom or JSON Feed document into items.
///
/// The publish timestamp falls back to the updated timestamp; entries with
/// neither keep `published_at = None` and are rejected later by the diff.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>> {
    let feed = parser::parse(bytes)
        .map_err(|e| FeedbotError::Fetch(format!("failed to parse feed: {}", e)))?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());
            let mut item = FeedItem::new(entry.id, title);

            if let Some(link) = entry.links.first() {
                item = item.with_link(link.href.clone());
            }
            if let Some(content) = entry
                .summary
                .map(|t| t.content)
                .or(entry.content.and_then(|c| c.body))
            {
                item = item.with_content(strip_html(&content));
            }
            if let Some(author) = entry.authors.first() {
                item = item.with_author(author.name.clone());
            }
            if let Some(published_at) = entry.published.or(entry.updated) {
                item = item.with_published_at(published_at);
            }
            item
        })
        .collect();

    Ok(items)
}

/// Strip HTML tags and decode common entities.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut entity: Option<String> = None;

    for ch in html.chars() {
        if let Some(name) = entity.as_mut() {
            if ch == ';' {
                push_entity(&mut out, name);
                entity = None;
                continue;
            }
            if ch.is_ascii_alphanumeric() || ch == '#' {
                name.push(ch);
                continue;
            }
            // Not an entity after all, e.g. "AT&T rocks".
            out.push('&');
            out.push_str(name);
            entity = None;
        }
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            '&' if !in_tag => entity = Some(String::new()),
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    if let Some(name) = entity {
        out.push('&');
        out.push_str(&name);
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_entity(out: &mut String, name: &str) {
    let decoded = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => name
            .strip_prefix("#x")
            .or_else(|| name.strip_prefix("#X"))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()))
            .and_then(char::from_u32),
    };
    match decoded {
        Some(c) => out.push(c),
        None => {
            out.push('&');
            out.push_str(name);
            out.push(';');
        }
    }
}
