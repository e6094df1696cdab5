//! Per-user adaptive response-style profile.
//!
//! Four axes (verbosity, citations, format, tone), each a score in
//! [0, 100] that moves by a fixed step per feedback tag and never
//! decays. The discrete setting on each axis is derived by hysteresis:
//! the score must reach the high threshold to switch the setting "on"
//! and drop to the low threshold to switch it back, so mixed feedback
//! near the midpoint never flaps the setting.
//!
//! Updates are read-modify-write per user with last-write-wins
//! semantics; concurrent feedback for the same user may lose an update,
//! which preference drift tolerates.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::config::PreferencesConfig;

/// Feedback signals, one score nudge each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceTag {
    /// "kısa istiyorum": push verbosity toward SHORT.
    WantShort,
    /// "normal istiyorum": push verbosity back toward NORMAL.
    WantNormal,
    /// "kaynak istiyorum": push citations on.
    WantSources,
    /// "kaynak istemiyorum": push citations off.
    NoSources,
    /// "adım adım": push format toward STEPS.
    WantSteps,
    /// push format back to DEFAULT.
    DefaultFormat,
    /// "teknik anlat": push tone toward TECHNICAL.
    WantTechnical,
    /// "basit anlat": push tone back toward SIMPLE.
    WantSimple,
}

impl PreferenceTag {
    /// Parse a feedback tag string. Unrecognized tags are `None`, which
    /// callers treat as a no-op.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_uppercase().as_str() {
            "KISA_ISTIYORUM" => Some(PreferenceTag::WantShort),
            "NORMAL_ISTIYORUM" => Some(PreferenceTag::WantNormal),
            "KAYNAK_ISTIYORUM" => Some(PreferenceTag::WantSources),
            "KAYNAK_ISTEMIYORUM" => Some(PreferenceTag::NoSources),
            "ADIM_ADIM" => Some(PreferenceTag::WantSteps),
            "FORMAT_DEFAULT" => Some(PreferenceTag::DefaultFormat),
            "TEKNIK_ANLAT" => Some(PreferenceTag::WantTechnical),
            "BASIT_ANLAT" => Some(PreferenceTag::WantSimple),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Short,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerFormat {
    Steps,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Technical,
    Simple,
}

/// The persisted profile: four scores plus the four settings derived
/// from them the last time feedback was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceProfile {
    pub user_id: i64,
    pub verbosity_score: i64,
    pub citations_score: i64,
    pub format_score: i64,
    pub tone_score: i64,
    pub verbosity: Verbosity,
    pub citations: bool,
    pub format: AnswerFormat,
    pub tone: Tone,
}

impl PreferenceProfile {
    /// Fresh profile: every score at the midpoint, every setting at its
    /// default.
    pub fn fresh(user_id: i64) -> Self {
        Self {
            user_id,
            verbosity_score: 50,
            citations_score: 50,
            format_score: 50,
            tone_score: 50,
            verbosity: Verbosity::Normal,
            // Citations are shown until the user pushes them off.
            citations: true,
            format: AnswerFormat::Default,
            tone: Tone::Simple,
        }
    }
}

fn clamp_score(score: i64) -> i64 {
    score.clamp(0, 100)
}

/// The hysteresis state machine, shared by all four axes: above the high
/// threshold the "high" setting wins, below the low threshold the "low"
/// setting wins, and in between the previous setting holds.
fn derive_setting<S: Copy>(previous: S, score: i64, config: &PreferencesConfig, high: S, low: S) -> S {
    if score >= config.high_threshold {
        high
    } else if score <= config.low_threshold {
        low
    } else {
        previous
    }
}

/// Apply one batch of feedback tags to a profile. Pure; persistence is
/// the caller's concern.
pub fn apply_tags(
    mut profile: PreferenceProfile,
    tags: &[PreferenceTag],
    config: &PreferencesConfig,
) -> PreferenceProfile {
    for tag in tags {
        match tag {
            PreferenceTag::WantShort => {
                profile.verbosity_score = clamp_score(profile.verbosity_score + config.step)
            }
            PreferenceTag::WantNormal => {
                profile.verbosity_score = clamp_score(profile.verbosity_score - config.step)
            }
            PreferenceTag::WantSources => {
                profile.citations_score = clamp_score(profile.citations_score + config.step)
            }
            PreferenceTag::NoSources => {
                profile.citations_score = clamp_score(profile.citations_score - config.step)
            }
            PreferenceTag::WantSteps => {
                profile.format_score = clamp_score(profile.format_score + config.step)
            }
            PreferenceTag::DefaultFormat => {
                profile.format_score = clamp_score(profile.format_score - config.step)
            }
            PreferenceTag::WantTechnical => {
                profile.tone_score = clamp_score(profile.tone_score + config.step)
            }
            PreferenceTag::WantSimple => {
                profile.tone_score = clamp_score(profile.tone_score - config.step)
            }
        }
    }

    profile.verbosity = derive_setting(
        profile.verbosity,
        profile.verbosity_score,
        config,
        Verbosity::Short,
        Verbosity::Normal,
    );
    profile.citations = derive_setting(
        profile.citations,
        profile.citations_score,
        config,
        true,
        false,
    );
    profile.format = derive_setting(
        profile.format,
        profile.format_score,
        config,
        AnswerFormat::Steps,
        AnswerFormat::Default,
    );
    profile.tone = derive_setting(
        profile.tone,
        profile.tone_score,
        config,
        Tone::Technical,
        Tone::Simple,
    );

    profile
}

fn verbosity_to_db(v: Verbosity) -> &'static str {
    match v {
        Verbosity::Short => "SHORT",
        Verbosity::Normal => "NORMAL",
    }
}

fn format_to_db(f: AnswerFormat) -> &'static str {
    match f {
        AnswerFormat::Steps => "STEPS",
        AnswerFormat::Default => "DEFAULT",
    }
}

fn tone_to_db(t: Tone) -> &'static str {
    match t {
        Tone::Technical => "TECHNICAL",
        Tone::Simple => "SIMPLE",
    }
}

/// Load a user's profile, or a fresh one if none is stored.
pub async fn load_profile(pool: &SqlitePool, user_id: i64) -> Result<PreferenceProfile> {
    let row: Option<(i64, i64, i64, i64, String, i64, String, String)> = sqlx::query_as(
        r#"
        SELECT verbosity_score, citations_score, format_score, tone_score,
               verbosity, citations, format, tone
        FROM user_preferences WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some((vs, cs, fs, ts, verbosity, citations, format, tone)) = row else {
        return Ok(PreferenceProfile::fresh(user_id));
    };

    Ok(PreferenceProfile {
        user_id,
        verbosity_score: vs,
        citations_score: cs,
        format_score: fs,
        tone_score: ts,
        verbosity: if verbosity == "SHORT" {
            Verbosity::Short
        } else {
            Verbosity::Normal
        },
        citations: citations != 0,
        format: if format == "STEPS" {
            AnswerFormat::Steps
        } else {
            AnswerFormat::Default
        },
        tone: if tone == "TECHNICAL" {
            Tone::Technical
        } else {
            Tone::Simple
        },
    })
}

/// Persist a profile, replacing any previous row for the user.
pub async fn save_profile(pool: &SqlitePool, profile: &PreferenceProfile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_preferences
            (user_id, verbosity_score, citations_score, format_score, tone_score,
             verbosity, citations, format, tone, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            verbosity_score = excluded.verbosity_score,
            citations_score = excluded.citations_score,
            format_score = excluded.format_score,
            tone_score = excluded.tone_score,
            verbosity = excluded.verbosity,
            citations = excluded.citations,
            format = excluded.format,
            tone = excluded.tone,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(profile.user_id)
    .bind(profile.verbosity_score)
    .bind(profile.citations_score)
    .bind(profile.format_score)
    .bind(profile.tone_score)
    .bind(verbosity_to_db(profile.verbosity))
    .bind(profile.citations as i64)
    .bind(format_to_db(profile.format))
    .bind(tone_to_db(profile.tone))
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// Load, apply feedback tags, save. Unrecognized tag strings are skipped.
pub async fn apply_feedback(
    pool: &SqlitePool,
    user_id: i64,
    tags: &[String],
    config: &PreferencesConfig,
) -> Result<PreferenceProfile> {
    let parsed: Vec<PreferenceTag> = tags.iter().filter_map(|t| PreferenceTag::parse(t)).collect();
    let profile = load_profile(pool, user_id).await?;
    let updated = apply_tags(profile, &parsed, config);
    save_profile(pool, &updated).await?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;

    fn config() -> PreferencesConfig {
        PreferencesConfig::default()
    }

    #[test]
    fn tag_parsing() {
        assert_eq!(
            PreferenceTag::parse("KISA_ISTIYORUM"),
            Some(PreferenceTag::WantShort)
        );
        assert_eq!(
            PreferenceTag::parse(" kaynak_istiyorum "),
            Some(PreferenceTag::WantSources)
        );
        assert_eq!(PreferenceTag::parse("GARBAGE"), None);
    }

    #[test]
    fn step_moves_score_and_clamps() {
        let mut profile = PreferenceProfile::fresh(1);
        for _ in 0..10 {
            profile = apply_tags(profile, &[PreferenceTag::WantShort], &config());
        }
        assert_eq!(profile.verbosity_score, 100);

        for _ in 0..10 {
            profile = apply_tags(profile, &[PreferenceTag::WantNormal], &config());
        }
        assert_eq!(profile.verbosity_score, 0);
    }

    #[test]
    fn hysteresis_holds_in_dead_band() {
        // 50 -> 65: crosses the high threshold, setting flips to SHORT.
        let profile = PreferenceProfile::fresh(1);
        let profile = apply_tags(profile, &[PreferenceTag::WantShort], &config());
        assert_eq!(profile.verbosity_score, 65);
        assert_eq!(profile.verbosity, Verbosity::Short);

        // 65 -> 50: back in the dead band, SHORT is retained.
        let profile = apply_tags(profile, &[PreferenceTag::WantNormal], &config());
        assert_eq!(profile.verbosity_score, 50);
        assert_eq!(profile.verbosity, Verbosity::Short);

        // 50 -> 35: at or below the low threshold, flips to NORMAL.
        let profile = apply_tags(profile, &[PreferenceTag::WantNormal], &config());
        assert_eq!(profile.verbosity_score, 35);
        assert_eq!(profile.verbosity, Verbosity::Normal);
    }

    #[test]
    fn three_terse_signals_cross_high_threshold_monotonically() {
        let mut profile = PreferenceProfile::fresh(1);
        let mut last = profile.verbosity_score;
        for _ in 0..3 {
            profile = apply_tags(profile, &[PreferenceTag::WantShort], &config());
            assert!(profile.verbosity_score > last);
            last = profile.verbosity_score;
        }
        assert_eq!(profile.verbosity, Verbosity::Short);
    }

    #[test]
    fn axes_are_independent() {
        let profile = PreferenceProfile::fresh(1);
        let profile = apply_tags(profile, &[PreferenceTag::WantSources], &config());
        assert_eq!(profile.citations_score, 65);
        assert!(profile.citations);
        assert_eq!(profile.verbosity_score, 50);
        assert_eq!(profile.verbosity, Verbosity::Normal);
        assert_eq!(profile.format, AnswerFormat::Default);
        assert_eq!(profile.tone, Tone::Simple);
    }

    #[tokio::test]
    async fn profile_roundtrip() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::create_schema(&pool).await.unwrap();

        let fresh = load_profile(&pool, 42).await.unwrap();
        assert_eq!(fresh, PreferenceProfile::fresh(42));

        let updated = apply_feedback(
            &pool,
            42,
            &["ADIM_ADIM".to_string(), "bogus".to_string()],
            &config(),
        )
        .await
        .unwrap();
        assert_eq!(updated.format_score, 65);
        assert_eq!(updated.format, AnswerFormat::Steps);

        let reloaded = load_profile(&pool, 42).await.unwrap();
        assert_eq!(reloaded, updated);
    }
}
