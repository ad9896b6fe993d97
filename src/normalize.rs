//! Text normalization shared by the candidate index and the scorer.
//!
//! Matching is case-insensitive, punctuation-insensitive, and
//! diacritic-insensitive; both queries and library tracks pass through the
//! same functions so the scorer only ever compares normalized text.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Title noise stripped before comparison (applied in order).
static TITLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Remaster variants: "- Remastered 2021", "(2021 Remaster)"
        Regex::new(r"(?i)\s*[-–—/]\s*(?:remaster(?:ed)?(?:\s+\d{4})?|(?:\d{4}\s+)?remaster(?:ed)?)").unwrap(),
        Regex::new(r"(?i)\s*[\(\[](?:remaster(?:ed)?(?:\s+\d{4})?|(?:\d{4}\s+)?remaster(?:ed)?)[\)\]]").unwrap(),
        // Live/acoustic: "(Live at Wembley)", "- Acoustic Version"
        Regex::new(r"(?i)\s*[\(\[](?:live(?:\s+(?:at|from|in)\s+[^)\]]+)?|acoustic(?:\s+version)?|unplugged)[\)\]]").unwrap(),
        Regex::new(r"(?i)\s*[-–—]\s*(?:live(?:\s+(?:at|from|in)\s+.+)?|acoustic(?:\s+version)?)").unwrap(),
        // Mix/version variants: "(Radio Edit)", "[Album Version]", "(Mono)"
        Regex::new(r"(?i)\s*[\(\[](?:radio\s+edit|single\s+version|album\s+version|extended(?:\s+(?:mix|version))?|original\s+mix|mono|stereo)[\)\]]").unwrap(),
        // Content variants: "(Explicit)", "[Clean]"
        Regex::new(r"(?i)\s*[\(\[](?:explicit|clean|censored|instrumental|karaoke)[\)\]]").unwrap(),
        // Featured artists: "(feat. Artist)", "ft. Someone" with or without brackets
        Regex::new(r"(?i)\s*[\(\[](?:feat\.?|ft\.?|featuring)\s+[^)\]]+[\)\]]").unwrap(),
        Regex::new(r"(?i)\s+(?:feat\.?|ft\.?|featuring)\s+.+$").unwrap(),
        // Year suffix: "- 2021", "- 1997 Version"
        Regex::new(r"(?i)\s*[-–—]\s*\d{4}(?:\s+(?:version|mix|edit))?$").unwrap(),
    ]
});

/// Track number prefixes like "03 - ", "01. ", "Track 5 - "
static TRACK_NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:track\s*)?\d{1,4}\s*[-–—._]\s*").unwrap());

/// Artist suffixes dropped before comparison (featured credits, ensembles).
static ARTIST_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\s+(?:feat\.?|ft\.?|featuring|with|&|,|;|/)\s+.*").unwrap(),
        Regex::new(r"(?i)\s+(?:band|orchestra|ensemble|quartet|trio)$").unwrap(),
    ]
});

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII via NFKD decomposition, dropping
/// combining marks and transliterating what remains.
/// e.g., "Beyoncé" → "beyonce", "Motörhead" → "motorhead"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Normalize punctuation: straighten curly quotes, unify "&" with "and",
/// collapse repeated whitespace.
pub fn normalize_punctuation(s: &str) -> String {
    let result = s
        .replace(['\u{2018}', '\u{2019}', '\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(" & ", " and ");
    MULTI_SPACE.replace_all(&result, " ").to_string()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize a title for matching.
/// Strips track numbers, remaster/live/edit tags, and featured credits.
pub fn normalize_title(title: &str) -> String {
    let mut result = normalize_punctuation(title);
    result = TRACK_NUMBER_PREFIX.replace(&result, "").to_string();
    for pattern in TITLE_PATTERNS.iter() {
        result = pattern.replace_all(&result, "").to_string();
    }

    let mut normalized = fold_to_ascii(&result).trim().to_string();

    // "The Sound of Silence" should match "Sound of Silence"
    if normalized.starts_with("the ") && normalized.len() > 6 {
        normalized = normalized[4..].to_string();
    }

    normalized
}

/// Normalize an artist name for matching.
/// Strips featured credits and handles the "The" prefix/suffix forms.
pub fn normalize_artist(artist: &str) -> String {
    let mut result = normalize_punctuation(artist);
    for pattern in ARTIST_PATTERNS.iter() {
        result = pattern.replace_all(&result, "").to_string();
    }

    let mut normalized = fold_to_ascii(&result).trim().to_string();

    if normalized.starts_with("the ") {
        normalized = normalized[4..].to_string();
    }
    if normalized.ends_with(", the") {
        normalized = normalized[..normalized.len() - 5].to_string();
    }

    normalized
}

/// Normalize an album name for matching. Albums carry less noise than
/// titles; punctuation folding and the "The" prefix are enough.
pub fn normalize_album(album: &str) -> String {
    let mut normalized = fold_to_ascii(&normalize_punctuation(album)).trim().to_string();
    if normalized.starts_with("the ") && normalized.len() > 6 {
        normalized = normalized[4..].to_string();
    }
    normalized
}

/// Alphanumeric word tokens of an already-normalized string, sorted.
/// Basis of the token-sort ratio in the scorer.
pub fn sorted_tokens(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens
}

// ============================================================================
// TESTS
// ============================================================================
