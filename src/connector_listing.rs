//! Paginated announcement-listing connector.
//!
//! The scraped site paginates through a path segment rather than a query
//! parameter (`<base_url>/0/1`, `<base_url>/0/2`, ...). Markup classes on
//! the site churn, so the parser anchors on the things that survive
//! redesigns: every item carries a "Görüntüle" link to its detail page, the
//! detail URL carries a stable numeric id, and the item block text contains
//! a `d MMMM yyyy` date with a Turkish month name.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::ListingConnectorConfig;
use crate::connector::{Connector, REQUEST_TIMEOUT_SECS, USER_AGENT};
use crate::error::FetchError;
use crate::models::RawDocument;

/// The listing view link text; the one marker the site has never renamed.
const VIEW_LINK_TEXT: &str = "Görüntüle";

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})\s+(\p{L}+)\s+(\d{4})").expect("valid regex"))
}

pub struct ListingConnector {
    config: ListingConnectorConfig,
    http: reqwest::Client,
}

impl ListingConnector {
    pub fn new(config: ListingConnectorConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("reqwest client");
        Self { config, http }
    }

    async fn fetch_page(&self, page: u32) -> Result<String, FetchError> {
        let url = format!("{}/0/{}", self.config.base_url.trim_end_matches('/'), page);
        println!("listing: fetching page {}", url);
        let resp = self.http.get(&url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }

    async fn fetch_detail(&self, detail_url: &str) -> Result<String, FetchError> {
        let resp = self
            .http
            .get(detail_url)
            .send()
            .await?
            .error_for_status()?;
        let body = resp.text().await?;
        let doc = Html::parse_document(&body);
        let selector = Selector::parse(&self.config.content_selector)
            .map_err(|e| FetchError::Parse(format!("bad content selector: {e}")))?;
        Ok(doc
            .select(&selector)
            .next()
            .map(|el| el.inner_html())
            .unwrap_or_else(|| "<p>İçerik bulunamadı.</p>".to_string()))
    }

    /// Collect the detail-page links from one listing page.
    fn view_links(page_url: &Url, body: &str) -> Vec<ListingItem> {
        let doc = Html::parse_document(body);
        let anchors = Selector::parse("a[href]").expect("valid selector");

        let mut out = Vec::new();
        for link in doc.select(&anchors) {
            let text: String = link.text().collect::<String>();
            if text.trim() != VIEW_LINK_TEXT {
                continue;
            }
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Ok(detail) = page_url.join(href) else {
                continue;
            };
            let detail_url = detail.to_string();
            let container_text = container_text(link);
            let title = extract_title_near_link(link, page_url, &detail_url)
                .unwrap_or_else(|| fallback_title(&container_text, &detail_url));
            out.push(ListingItem {
                detail_url,
                title,
                container_text,
            });
        }
        out
    }
}

/// One announcement link found on a listing page, before the detail fetch.
struct ListingItem {
    detail_url: String,
    title: String,
    container_text: String,
}

#[async_trait]
impl Connector for ListingConnector {
    fn code(&self) -> &str {
        &self.config.code
    }

    fn description(&self) -> &str {
        "Paginated announcement listing (path-segment pages)"
    }

    fn base_url(&self) -> Option<&str> {
        Some(&self.config.base_url)
    }

    async fn fetch_latest(&self) -> Result<Vec<RawDocument>, FetchError> {
        let base = Url::parse(&self.config.base_url)
            .map_err(|e| FetchError::Parse(format!("bad base_url: {e}")))?;

        let mut documents = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut page = 1u32;

        println!(
            "listing: starting crawl (test_mode={}, max_pages={}, sleep_ms={})",
            self.config.test_mode, self.config.max_pages, self.config.sleep_ms
        );

        loop {
            if page > self.config.max_pages {
                println!("listing: max_pages cap reached ({})", self.config.max_pages);
                break;
            }

            let body = self.fetch_page(page).await?;
            let links = Self::view_links(&base, &body);
            println!("listing: page {} has {} items", page, links.len());

            if links.is_empty() {
                // No view links: past the last page
                break;
            }

            for item in links {
                let Some(external_id) = extract_external_id(&item.detail_url) else {
                    eprintln!("listing: no external id in {}, skipping", item.detail_url);
                    continue;
                };
                // The same announcement can be linked twice on one page
                if !seen.insert(external_id.clone()) {
                    continue;
                }

                let published_at =
                    parse_date_from_text(&item.container_text).unwrap_or_else(Utc::now);

                match self.fetch_detail(&item.detail_url).await {
                    Ok(html) => {
                        println!("listing: fetched {}", item.title);
                        documents.push(RawDocument {
                            external_id,
                            title: item.title,
                            html,
                            url: item.detail_url,
                            category: self.config.category.clone(),
                            published_at,
                        });
                    }
                    Err(e) => {
                        // One broken detail page must not abort the crawl
                        eprintln!("listing: detail fetch failed for {}: {}", item.detail_url, e);
                    }
                }
            }

            if self.config.test_mode {
                println!("listing: test mode, stopping after first page");
                break;
            }

            page += 1;
            if self.config.sleep_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.sleep_ms)).await;
            }
        }

        println!("listing: crawl finished, {} documents", documents.len());
        Ok(documents)
    }
}

/// Walk up a few ancestors from the view link to approximate the item
/// block, then take its text. Deliberately not tied to any class name.
fn container_text(link: ElementRef<'_>) -> String {
    let mut cur = link;
    for _ in 0..6 {
        let Some(parent) = cur.parent().and_then(ElementRef::wrap) else {
            break;
        };
        cur = parent;
    }
    cur.text().collect::<String>()
}

/// A link sharing the detail href but not labeled "Görüntüle" is the title.
fn extract_title_near_link(link: ElementRef<'_>, page_url: &Url, detail_url: &str) -> Option<String> {
    let mut cur = link;
    for _ in 0..6 {
        let Some(parent) = cur.parent().and_then(ElementRef::wrap) else {
            break;
        };
        cur = parent;
    }

    let anchors = Selector::parse("a[href]").expect("valid selector");
    for a in cur.select(&anchors) {
        let href = a.value().attr("href")?;
        let Ok(abs) = page_url.join(href) else {
            continue;
        };
        if abs.as_str() == detail_url {
            let text = a.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() && text != VIEW_LINK_TEXT {
                return Some(text.to_string());
            }
        }
    }
    None
}

fn fallback_title(container_text: &str, detail_url: &str) -> String {
    let trimmed = container_text.trim();
    if trimmed.is_empty() {
        let id = extract_external_id(detail_url).unwrap_or_default();
        return format!("Duyuru {id}");
    }
    truncate_chars(trimmed, 120)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

/// Stable id from the detail URL: the second-to-last path segment
/// (`.../goruntule/12345/kayit-duyurusu` -> `12345`).
fn extract_external_id(detail_url: &str) -> Option<String> {
    let trimmed = detail_url.trim_end_matches('/');
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.len() < 2 {
        return None;
    }
    let id = parts[parts.len() - 2];
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Find a `d <ay> yyyy` date in free text and parse it at local midnight
/// (+03:00). Unparseable text falls back to the caller's "now".
fn parse_date_from_text(text: &str) -> Option<DateTime<Utc>> {
    let caps = date_pattern().captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = turkish_month(&caps[2])?;
    let year: i32 = caps[3].parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let offset = FixedOffset::east_opt(3 * 3600)?;
    let local = date.and_hms_opt(0, 0, 0)?.and_local_timezone(offset);
    Some(local.single()?.with_timezone(&Utc))
}

/// Turkish month names, full and abbreviated, case-insensitive (including
/// the dotted/dotless i distinction).
fn turkish_month(name: &str) -> Option<u32> {
    let lower = name.to_lowercase().replace('İ', "i").replace('I', "ı");
    let month = match lower.as_str() {
        "ocak" | "oca" => 1,
        "şubat" | "şub" => 2,
        "mart" | "mar" => 3,
        "nisan" | "nis" => 4,
        "mayıs" | "may" => 5,
        "haziran" | "haz" => 6,
        "temmuz" | "tem" => 7,
        "ağustos" | "ağu" => 8,
        "eylül" | "eyl" => 9,
        "ekim" | "eki" => 10,
        "kasım" | "kas" => 11,
        "aralık" | "ara" => 12,
        _ => return None,
    };
    Some(month)
}
