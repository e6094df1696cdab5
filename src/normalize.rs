//! Content normalization: raw connector HTML to stored plain text.

use scraper::Html;

/// Strip markup and collapse whitespace runs to single spaces.
///
/// Applied to both title and content before an announcement is persisted;
/// the vector store and the prompt only ever see normalized text.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        let html = "<p>Kayıt   tarihleri\n\n<b>2025</b> güz dönemi</p>";
        assert_eq!(html_to_text(html), "Kayıt tarihleri 2025 güz dönemi");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(html_to_text("  zaten   düz metin  "), "zaten düz metin");
    }

    #[test]
    fn empty_input() {
        assert_eq!(html_to_text(""), "");
        assert_eq!(html_to_text("<div></div>"), "");
    }

    #[test]
    fn nested_markup() {
        let html = "<div><ul><li>Bir</li><li>İki</li></ul><p>Üç</p></div>";
        assert_eq!(html_to_text(html), "Bir İki Üç");
    }
}
