//! Session-based FAQ portal connector.
//!
//! The portal only serves its question listings to what looks like a
//! browser session: a landing GET establishes cookies, each category
//! listing is fetched by POST with AJAX headers, and each question body
//! comes from a modal endpoint. Cookies from every response are captured
//! in a shared jar and replayed on subsequent requests.
//!
//! Category ids may be configured explicitly; otherwise they are
//! auto-discovered from three redundant markup patterns, because the
//! portal has shipped all three over time.

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config::FaqConnectorConfig;
use crate::connector::{Connector, REQUEST_TIMEOUT_SECS, USER_AGENT};
use crate::error::FetchError;
use crate::models::RawDocument;

fn questions_call_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SSSorular\((\d+)\)").expect("valid regex"))
}

fn modal_call_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SssModal\((\d+)\)").expect("valid regex"))
}

fn digits_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)").expect("valid regex"))
}

pub struct FaqConnector {
    config: FaqConnectorConfig,
    http: reqwest::Client,
}

impl FaqConnector {
    pub fn new(config: FaqConnectorConfig) -> Self {
        // The cookie jar is the session: captured from every response,
        // replayed on every request.
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .cookie_provider(Arc::new(reqwest::cookie::Jar::default()))
            .build()
            .expect("reqwest client");
        Self { config, http }
    }

    fn landing_url(&self) -> String {
        match &self.config.menu_url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => format!("{}/", self.config.base_url.trim_end_matches('/')),
        }
    }

    async fn fetch_landing(&self, landing_url: &str) -> Option<String> {
        match self.http.get(landing_url).send().await {
            Ok(resp) => resp.text().await.ok(),
            Err(e) => {
                eprintln!("faq: landing fetch failed: {}", e);
                None
            }
        }
    }

    async fn fetch_category_listing(
        &self,
        landing_url: &str,
        category_id: u32,
    ) -> Result<String, FetchError> {
        let url = format!(
            "{}/Home/SSSorular/{}",
            self.config.base_url.trim_end_matches('/'),
            category_id
        );
        println!("faq: fetching category listing (POST) {}", url);
        let resp = self
            .http
            .post(&url)
            .header("Accept", "text/html,*/*")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", landing_url)
            .send()
            .await?;
        Ok(resp.text().await?)
    }

    async fn fetch_modal(&self, landing_url: &str, modal_url: &str) -> Result<String, FetchError> {
        let resp = self
            .http
            .get(modal_url)
            .header("Accept", "text/html,*/*")
            .header("Referer", landing_url)
            .send()
            .await?;
        let body = resp.text().await?;
        Ok(extract_modal_html(&body))
    }

    async fn resolve_category_ids(&self, landing_url: &str) -> Vec<u32> {
        let mut ids = parse_category_ids(&self.config.category_ids);
        if ids.is_empty() {
            if let Some(body) = self.fetch_landing(landing_url).await {
                ids = discover_category_ids(&body);
                println!("faq: discovered category ids {:?}", ids);
            }
        }
        if ids.is_empty() {
            eprintln!("faq: no categories found, falling back to category 2");
            ids = vec![2];
        }
        ids
    }
}

#[async_trait]
impl Connector for FaqConnector {
    fn code(&self) -> &str {
        &self.config.code
    }

    fn description(&self) -> &str {
        "Session-based FAQ portal (cookie jar, category POST, modal GET)"
    }

    fn base_url(&self) -> Option<&str> {
        Some(&self.config.base_url)
    }

    async fn fetch_latest(&self) -> Result<Vec<RawDocument>, FetchError> {
        let landing_url = self.landing_url();
        println!(
            "faq: starting crawl (test_mode={}, max_items={}, sleep_ms={})",
            self.config.test_mode, self.config.max_items, self.config.sleep_ms
        );

        // Landing GET primes the cookie jar even when category ids are
        // configured explicitly.
        let _ = self.fetch_landing(&landing_url).await;
        let category_ids = self.resolve_category_ids(&landing_url).await;
        println!("faq: using category ids {:?}", category_ids);

        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        'categories: for category_id in category_ids {
            if out.len() >= self.config.max_items {
                break;
            }

            let listing = self.fetch_category_listing(&landing_url, category_id).await?;
            let questions = extract_questions(&listing);
            println!(
                "faq: category {} has {} question candidates",
                category_id,
                questions.len()
            );

            for question in questions {
                if out.len() >= self.config.max_items {
                    println!("faq: max_items cap reached ({})", self.config.max_items);
                    break 'categories;
                }

                let external_id = format!("sss-{}", question.id);
                if !seen.insert(external_id.clone()) {
                    continue;
                }

                let modal_url = format!(
                    "{}/Home/SssModal/{}",
                    self.config.base_url.trim_end_matches('/'),
                    question.id
                );

                match self.fetch_modal(&landing_url, &modal_url).await {
                    Ok(html) => {
                        out.push(RawDocument {
                            external_id,
                            title: question.title,
                            html,
                            url: modal_url,
                            category: "sss".to_string(),
                            published_at: Utc::now(),
                        });
                    }
                    Err(e) => {
                        eprintln!(
                            "faq: modal fetch failed for id {} ({}): {}",
                            question.id, modal_url, e
                        );
                        continue;
                    }
                }

                if self.config.test_mode && out.len() >= 20 {
                    println!("faq: test mode, stopping after 20 items");
                    break 'categories;
                }

                if self.config.sleep_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.config.sleep_ms)).await;
                }
            }
        }

        println!("faq: crawl finished, {} documents", out.len());
        Ok(out)
    }
}

/// One question reference found on a category listing.
#[derive(Debug, PartialEq, Eq)]
struct QuestionRef {
    id: String,
    title: String,
}

fn parse_category_ids(csv: &str) -> Vec<u32> {
    let mut seen = HashSet::new();
    csv.split(',')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Discover category ids from the landing page markup. Three redundant
/// patterns: `data-id` attributes, `onclick="SSSorular(n)"` handlers, and
/// `/Home/SSSorular/n` hrefs.
fn discover_category_ids(body: &str) -> Vec<u32> {
    let doc = Html::parse_document(body);
    let mut ids: Vec<u32> = Vec::new();
    let mut seen: HashSet<u32> = HashSet::new();
    let mut push = |id: u32, ids: &mut Vec<u32>| {
        if seen.insert(id) {
            ids.push(id);
        }
    };

    let data_id = Selector::parse("[data-id]").expect("valid selector");
    for el in doc.select(&data_id) {
        if let Some(id) = el.value().attr("data-id").and_then(|s| s.trim().parse().ok()) {
            push(id, &mut ids);
        }
    }

    let onclick = Selector::parse("[onclick]").expect("valid selector");
    for el in doc.select(&onclick) {
        let Some(handler) = el.value().attr("onclick") else {
            continue;
        };
        if let Some(caps) = questions_call_pattern().captures(handler) {
            if let Ok(id) = caps[1].parse() {
                push(id, &mut ids);
            }
        }
    }

    let hrefs = Selector::parse(r#"a[href*="/Home/SSSorular/"]"#).expect("valid selector");
    for el in doc.select(&hrefs) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if let Some(caps) = digits_pattern().captures(href) {
            if let Ok(id) = caps[1].parse() {
                push(id, &mut ids);
            }
        }
    }

    ids
}

/// Collect question candidates from a category listing, de-duplicated by
/// question id. Matched by several selectors because the portal has used
/// buttons, anchors, and plain data attributes interchangeably.
fn extract_questions(body: &str) -> Vec<QuestionRef> {
    let doc = Html::parse_document(body);
    let selectors = [
        r#"[data-sss-id]"#,
        r#"button[onclick*="SssModal"]"#,
        r#"a[onclick*="SssModal"]"#,
        r#"a[href*="/Home/SssModal/"]"#,
    ];

    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for selector_str in selectors {
        let selector = Selector::parse(selector_str).expect("valid selector");
        for el in doc.select(&selector) {
            let Some(id) = extract_question_id(&el) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }
            out.push(QuestionRef {
                id,
                title: extract_question_title(&el),
            });
        }
    }

    out
}

fn extract_question_id(el: &scraper::ElementRef<'_>) -> Option<String> {
    if let Some(id) = el.value().attr("data-sss-id") {
        let id = id.trim();
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }

    if let Some(handler) = el.value().attr("onclick") {
        if let Some(caps) = modal_call_pattern().captures(handler) {
            return Some(caps[1].to_string());
        }
    }

    if let Some(href) = el.value().attr("href") {
        if href.contains("/Home/SssModal/") {
            if let Some(caps) = digits_pattern().captures(href) {
                return Some(caps[1].to_string());
            }
        }
    }

    None
}

fn extract_question_title(el: &scraper::ElementRef<'_>) -> String {
    let strong = Selector::parse("strong").expect("valid selector");
    let text = el
        .select(&strong)
        .next()
        .map(|s| s.text().collect::<String>())
        .unwrap_or_else(|| el.text().collect::<String>());
    let text = text.trim();
    if text.is_empty() {
        "SSS".to_string()
    } else {
        text.to_string()
    }
}

/// The modal body HTML is the document; fall back through the full
/// response before giving up with an explicit marker.
fn extract_modal_html(body: &str) -> String {
    let doc = Html::parse_document(body);
    let body_sel = Selector::parse("body").expect("valid selector");
    if let Some(el) = doc.select(&body_sel).next() {
        let html = el.inner_html();
        if !html.trim().is_empty() {
            return html.trim().to_string();
        }
    }
    let full = body.trim();
    if full.is_empty() {
        "<p>İçerik bulunamadı.</p>".to_string()
    } else {
        full.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_csv_parse() {
        assert_eq!(parse_category_ids("2,13,14"), vec![2, 13, 14]);
        assert_eq!(parse_category_ids(" 2 , x, 2, 5 "), vec![2, 5]);
        assert!(parse_category_ids("").is_empty());
    }

    #[test]
    fn discovers_categories_from_all_three_patterns() {
        let body = r#"
            <html><body>
              <button class="nav-link" data-id="2">Kayıt</button>
              <button onclick="SSSorular(13)">Burs</button>
              <a href="/Home/SSSorular/14">Yurt</a>
            </body></html>
        "#;
        assert_eq!(discover_category_ids(body), vec![2, 13, 14]);
    }

    #[test]
    fn question_candidates_deduplicated() {
        let body = r#"
            <html><body>
              <button data-sss-id="7"><strong>Kayıt nasıl yapılır?</strong></button>
              <button onclick="SssModal(7)">Kayıt nasıl yapılır?</button>
              <a href="/Home/SssModal/9">Burs ne zaman?</a>
            </body></html>
        "#;
        let questions = extract_questions(body);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id, "7");
        assert_eq!(questions[0].title, "Kayıt nasıl yapılır?");
        assert_eq!(questions[1].id, "9");
    }

    #[test]
    fn blank_question_title_falls_back() {
        let body = r#"<html><body><button data-sss-id="3">  </button></body></html>"#;
        let questions = extract_questions(body);
        assert_eq!(questions[0].title, "SSS");
    }

    #[test]
    fn modal_html_extraction() {
        assert_eq!(
            extract_modal_html("<html><body><p>Cevap</p></body></html>"),
            "<p>Cevap</p>"
        );
        assert_eq!(extract_modal_html(""), "<p>İçerik bulunamadı.</p>");
    }
}
