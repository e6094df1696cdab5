//! Prompt construction.
//!
//! Renders the generation prompt deterministically: style policy block,
//! emotion directive, bounded conversation history, tagged context
//! matches (S1, S2, ...), then the question. The model is instructed to
//! end its answer with a single `KULLANILAN_KAYNAK:` control line naming
//! the context tag it relied on, which the post-processor resolves back
//! to a URL.
//!
//! A separate lexical check detects memory questions ("az önce ne
//! söyledin?") so the caller can skip retrieval and build a
//! history-only prompt instead.

use crate::config::ChatConfig;
use crate::models::{DocumentMatch, Emotion, Role, StoredMessage};
use crate::preference::{AnswerFormat, PreferenceProfile, Tone, Verbosity};

/// Backward-reference phrases that mark a question as being about the
/// conversation itself rather than the document index.
const MEMORY_PHRASES: &[&str] = &[
    "az önce",
    "az once",
    "demin",
    "ne söyledin",
    "ne soyledin",
    "ne dedin",
    "ne demiştin",
    "ne demistin",
    "ne sormuştum",
    "ne sormustum",
    "önceki sorum",
    "onceki sorum",
    "ilk sorum",
    "son sorum",
    "ne konuştuk",
    "ne konustuk",
    "hatırlıyor musun",
    "hatirliyor musun",
];

/// Lexical memory-question detection. Case-insensitive contains-match
/// against a fixed phrase list; no retrieval should run for these.
pub fn is_memory_question(question: &str) -> bool {
    let lowered = question.to_lowercase();
    MEMORY_PHRASES.iter().any(|p| lowered.contains(p))
}

fn emotion_directive(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Anxious => {
            "Kullanıcı endişeli görünüyor. Sakinleştirici bir dil kullan, adımları netleştir ve güven ver."
        }
        Emotion::Angry => {
            "Kullanıcı öfkeli görünüyor. Sakin ve profesyonel kal, tartışmaya girme, çözüme odaklan."
        }
        Emotion::Sad => {
            "Kullanıcı üzgün görünüyor. Nazik ve destekleyici bir ton kullan."
        }
        Emotion::Happy => {
            "Kullanıcı keyifli görünüyor. Olumlu ve samimi bir ton kullan."
        }
        Emotion::Neutral => "Doğal ve yardımsever bir ton kullan.",
        Emotion::Unknown => "Doğal ve yardımsever bir ton kullan.",
    }
}

fn style_directives(profile: &PreferenceProfile) -> String {
    let mut lines = Vec::new();

    match profile.verbosity {
        Verbosity::Short => lines.push("Kısa ve öz cevap ver; en fazla birkaç cümle."),
        Verbosity::Normal => lines.push("Normal uzunlukta, açıklayıcı cevap ver."),
    }
    match profile.format {
        AnswerFormat::Steps => lines.push("Cevabı numaralı adımlar halinde yapılandır."),
        AnswerFormat::Default => lines.push("Cevabı düz metin olarak yaz."),
    }
    match profile.tone {
        Tone::Technical => lines.push("Teknik terimleri kullanmaktan çekinme."),
        Tone::Simple => lines.push("Teknik terimlerden kaçın, basit bir dille anlat."),
    }

    lines.join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}...", truncated)
}

fn history_block(history: &[StoredMessage], config: &ChatConfig) -> String {
    if history.is_empty() {
        return String::new();
    }
    let mut block = String::from("Önceki konuşma:\n");
    for message in history {
        let speaker = match message.role {
            Role::User => "Kullanıcı",
            Role::Assistant => "Asistan",
        };
        block.push_str(&format!(
            "{}: {}\n",
            speaker,
            truncate_chars(&message.content, config.history_max_chars)
        ));
    }
    block
}

fn context_block(matches: &[DocumentMatch], config: &ChatConfig) -> String {
    let mut block = String::from("Kaynak belgeler:\n");
    for (i, m) in matches.iter().enumerate() {
        block.push_str(&format!(
            "[S{}] {} ({})\n{}\n\n",
            i + 1,
            m.title().unwrap_or("Başlıksız"),
            m.url().unwrap_or("-"),
            truncate_chars(&m.text, config.context_max_chars)
        ));
    }
    block
}

/// Build the grounded-answer prompt.
pub fn build_prompt(
    profile: &PreferenceProfile,
    emotion: Emotion,
    history: &[StoredMessage],
    matches: &[DocumentMatch],
    question: &str,
    config: &ChatConfig,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "Sen bir üniversitenin öğrenci asistanısın. Soruları yalnızca verilen kaynak belgelere dayanarak cevapla.\n",
    );
    prompt.push_str(&style_directives(profile));
    prompt.push('\n');
    prompt.push_str(emotion_directive(emotion));
    prompt.push_str("\n\n");

    let history_text = history_block(history, config);
    if !history_text.is_empty() {
        prompt.push_str(&history_text);
        prompt.push('\n');
    }

    prompt.push_str(&context_block(matches, config));

    prompt.push_str(
        "Kurallar:\n\
         - Cevabı yalnızca yukarıdaki kaynak belgelere dayandır.\n\
         - Kaynaklarda cevap yoksa bunu açıkça söyle, tahmin etme.\n\
         - Cevabın EN SON satırı şu biçimde olmalı: KULLANILAN_KAYNAK: S1 gibi tek bir kaynak etiketi, \
         hiçbir kaynak kullanmadıysan KULLANILAN_KAYNAK: YOK.\n\n",
    );

    prompt.push_str(&format!("Soru: {}\n", question));
    prompt
}

/// Build the history-only prompt for memory questions. The model must
/// answer strictly from the conversation and say so when the answer is
/// not there.
pub fn build_memory_prompt(
    history: &[StoredMessage],
    question: &str,
    config: &ChatConfig,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "Sen bir üniversitenin öğrenci asistanısın. Kullanıcı bu konuşmanın kendisi hakkında bir soru soruyor.\n\
         Yalnızca aşağıdaki konuşma geçmişine dayanarak cevap ver. Geçmişte cevap yoksa \
         'Bu konuşmada böyle bir bilgi bulamadım.' de; başka kaynak kullanma.\n\n",
    );

    let history_text = history_block(history, config);
    if history_text.is_empty() {
        prompt.push_str("Önceki konuşma: (boş)\n");
    } else {
        prompt.push_str(&history_text);
    }

    prompt.push('\n');
    prompt.push_str(&format!(
        "Soru: {}\nCevabın sonuna KULLANILAN_KAYNAK: YOK satırını ekle.\n",
        question
    ));
    prompt
}
