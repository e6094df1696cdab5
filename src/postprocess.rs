//! Response post-processing.
//!
//! The model is asked to end its answer with one control line,
//! `KULLANILAN_KAYNAK: S<n>` or `KULLANILAN_KAYNAK: YOK`. This module
//! extracts that declaration, strips every control line and any
//! model-authored "Kaynak:" line from the visible text, resolves the
//! declared tag back to the matching context URL, and appends a single
//! citation line when the profile wants citations. A missing or
//! malformed control line is a normal outcome, not an error: the answer
//! simply carries no resolvable citation.
//!
//! [`sanitize_for_speech`] produces the audio variant: no source
//! section, no URLs.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::DocumentMatch;
use crate::preference::PreferenceProfile;

const NO_SOURCE_MARKER: &str = "Kaynak belirtilmemiş";

fn control_line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*KULLANILAN_KAYNAK\s*:\s*(S\d+|YOK)\s*$").expect("valid regex")
    })
}

fn source_line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Both the singular and plural label, the model writes either.
    RE.get_or_init(|| Regex::new(r"(?im)^\s*Kaynaklar?\s*:.*$").expect("valid regex"))
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("valid regex"))
}

/// What the model declared it used. `None` means the control line was
/// absent or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredSource {
    /// 1-based index into the context match list (S1 = 1).
    Tag(usize),
    None,
}

/// Extract the declared source from the raw model output. When the
/// model emitted the line more than once, the last one wins.
pub fn extract_declared_source(raw: &str) -> Option<DeclaredSource> {
    let caps = control_line_pattern().captures_iter(raw).last()?;
    let token = caps[1].to_uppercase();
    if token == "YOK" {
        return Some(DeclaredSource::None);
    }
    token[1..].parse::<usize>().ok().map(DeclaredSource::Tag)
}

/// Map a declaration to a context URL. NONE, an out-of-range tag, or a
/// match without a URL all resolve to no citation.
pub fn resolve_citation<'a>(
    declared: Option<DeclaredSource>,
    matches: &'a [DocumentMatch],
) -> Option<&'a str> {
    match declared? {
        DeclaredSource::None => None,
        DeclaredSource::Tag(n) => matches.get(n.checked_sub(1)?).and_then(|m| m.url()),
    }
}

/// Remove control lines and model-authored "Kaynak:" lines. The
/// post-processor owns the citation line; the model does not get to
/// write its own.
pub fn strip_control_lines(raw: &str) -> String {
    let without_control = control_line_pattern().replace_all(raw, "");
    let without_sources = source_line_pattern().replace_all(&without_control, "");
    without_sources.trim().to_string()
}

/// The full post-processing pass over one raw model answer.
pub struct ProcessedAnswer {
    /// User-visible text, citation line included when applicable.
    pub text: String,
    /// The resolved citation URL, if any.
    pub citation: Option<String>,
}

pub fn process_answer(
    raw: &str,
    matches: &[DocumentMatch],
    profile: &PreferenceProfile,
) -> ProcessedAnswer {
    let declared = extract_declared_source(raw);
    let citation = resolve_citation(declared, matches).map(|u| u.to_string());
    let mut text = strip_control_lines(raw);

    if profile.citations {
        match &citation {
            Some(url) => text.push_str(&format!("\n\nKaynak: {}", url)),
            None => text.push_str(&format!("\n\nKaynak: {}", NO_SOURCE_MARKER)),
        }
    }

    ProcessedAnswer { text, citation }
}

/// Speech-safe variant: drop any trailing "Kaynak:" section and every
/// embedded URL. Only used when the answer is handed to a synthesizer.
pub fn sanitize_for_speech(text: &str) -> String {
    let without_sources = source_line_pattern().replace_all(text, "");
    let without_urls = url_pattern().replace_all(&without_sources, "");
    collapse_blank_lines(without_urls.trim())
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::new();
    let mut blank_run = 0usize;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line.trim_end());
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matches() -> Vec<DocumentMatch> {
        vec![
            DocumentMatch {
                text: "birinci".into(),
                metadata: json!({"url": "https://example.edu/1"}),
                distance: 0.2,
            },
            DocumentMatch {
                text: "ikinci".into(),
                metadata: json!({"url": "https://example.edu/2"}),
                distance: 0.4,
            },
        ]
    }

    fn citing_profile() -> PreferenceProfile {
        PreferenceProfile::fresh(1)
    }

    #[test]
    fn declared_source_extraction() {
        assert_eq!(
            extract_declared_source("Cevap.\nKULLANILAN_KAYNAK: S2"),
            Some(DeclaredSource::Tag(2))
        );
        assert_eq!(
            extract_declared_source("Cevap.\n  kullanılan_kaynak yok"),
            None
        );
        assert_eq!(
            extract_declared_source("Cevap.\nKULLANILAN_KAYNAK: YOK"),
            Some(DeclaredSource::None)
        );
        assert_eq!(extract_declared_source("Cevap without control line"), None);
    }

    #[test]
    fn last_control_line_wins() {
        let raw = "KULLANILAN_KAYNAK: S1\nCevap.\nKULLANILAN_KAYNAK: S2";
        assert_eq!(extract_declared_source(raw), Some(DeclaredSource::Tag(2)));
    }

    #[test]
    fn citation_resolution() {
        let m = matches();
        assert_eq!(
            resolve_citation(Some(DeclaredSource::Tag(2)), &m),
            Some("https://example.edu/2")
        );
        assert_eq!(resolve_citation(Some(DeclaredSource::None), &m), None);
        assert_eq!(resolve_citation(Some(DeclaredSource::Tag(9)), &m), None);
        assert_eq!(resolve_citation(None, &m), None);
    }

    #[test]
    fn answer_with_declared_source_gets_citation() {
        let raw = "Kayıtlar 20 Ekim'de başlıyor.\nKULLANILAN_KAYNAK: S2";
        let processed = process_answer(raw, &matches(), &citing_profile());
        assert_eq!(processed.citation.as_deref(), Some("https://example.edu/2"));
        assert!(processed.text.ends_with("Kaynak: https://example.edu/2"));
        assert!(!processed.text.contains("KULLANILAN_KAYNAK"));
    }

    #[test]
    fn none_declaration_gets_no_source_marker() {
        let raw = "Bilgi bulamadım.\nKULLANILAN_KAYNAK: YOK";
        let processed = process_answer(raw, &matches(), &citing_profile());
        assert!(processed.citation.is_none());
        assert!(processed.text.ends_with("Kaynak: Kaynak belirtilmemiş"));
    }

    #[test]
    fn citations_off_appends_nothing() {
        let mut profile = citing_profile();
        profile.citations = false;
        let raw = "Cevap.\nKULLANILAN_KAYNAK: S1";
        let processed = process_answer(raw, &matches(), &profile);
        assert_eq!(processed.text, "Cevap.");
        assert_eq!(processed.citation.as_deref(), Some("https://example.edu/1"));
    }

    #[test]
    fn model_authored_source_lines_are_stripped() {
        let raw = "Cevap.\nKaynak: https://model-made-this-up.example\nKULLANILAN_KAYNAK: S1";
        let processed = process_answer(raw, &matches(), &citing_profile());
        assert!(!processed.text.contains("model-made-this-up"));
        assert!(processed.text.ends_with("Kaynak: https://example.edu/1"));
    }

    #[test]
    fn plural_source_label_is_stripped_too() {
        let raw = "Cevap.\nKaynaklar: https://model-made-this-up.example\nKULLANILAN_KAYNAK: S1";
        let processed = process_answer(raw, &matches(), &citing_profile());
        assert!(!processed.text.contains("model-made-this-up"));
        assert!(!processed.text.contains("Kaynaklar:"));
        assert!(processed.text.ends_with("Kaynak: https://example.edu/1"));
    }

    #[test]
    fn speech_variant_drops_plural_source_label() {
        let text = "Kayıtlar başladı.\n\nKaynaklar: https://example.edu/1";
        let sanitized = sanitize_for_speech(text);
        assert!(!sanitized.contains("Kaynaklar"));
        assert!(!sanitized.contains("http"));
        assert!(sanitized.contains("Kayıtlar başladı"));
    }

    #[test]
    fn speech_variant_has_no_urls_or_source_section() {
        let text = "Kayıtlar başladı, detaylar https://example.edu/1 adresinde.\n\nKaynak: https://example.edu/1";
        let sanitized = sanitize_for_speech(text);
        assert!(!sanitized.contains("http"));
        assert!(!sanitized.contains("Kaynak:"));
        assert!(sanitized.contains("Kayıtlar başladı"));
    }
}
