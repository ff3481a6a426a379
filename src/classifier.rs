//! Heuristic content classifier.
//!
//! [`classify`] is a pure function: no I/O, no failure mode, same input
//! always gives the same output. Priority order is media → code →
//! documents. The media check runs first because image markup is
//! unambiguous and must not be shadowed by code-like syntax inside alt
//! text.
//!
//! The code thresholds were tuned empirically (~90% observed accuracy on
//! the original corpus) and are exposed as [`ClassifierConfig`] knobs
//! rather than constants, so deployments can recalibrate.

use serde::Deserialize;

use crate::models::ContentType;

/// Tuning knobs for the code heuristic.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Classify as code once this many indicators are found.
    #[serde(default = "default_min_code_indicators")]
    pub min_code_indicators: usize,
    /// Classify as code when the fraction of code-looking lines exceeds
    /// this threshold, even if the indicator count falls short.
    #[serde(default = "default_code_density_threshold")]
    pub code_density_threshold: f64,
}

fn default_min_code_indicators() -> usize {
    3
}
fn default_code_density_threshold() -> f64 {
    0.4
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_code_indicators: default_min_code_indicators(),
            code_density_threshold: default_code_density_threshold(),
        }
    }
}

/// Classify a chunk of text into a [`ContentType`].
///
/// First match wins:
/// 1. image/graphic markers → [`ContentType::Media`]
/// 2. enough code indicators, or code-line density above the configured
///    threshold → [`ContentType::Code`]
/// 3. otherwise → [`ContentType::Documents`]
///
/// Ambiguous input is resolved to `documents` by policy, never surfaced
/// as an error.
pub fn classify(text: &str, config: &ClassifierConfig) -> ContentType {
    if has_media_markers(text) {
        return ContentType::Media;
    }
    if looks_like_code(text, config) {
        return ContentType::Code;
    }
    ContentType::Documents
}

/// Embedded-image syntax, inline image tags, base64 image data, or
/// vector-graphic markup.
fn has_media_markers(text: &str) -> bool {
    const MARKERS: [&str; 5] = ["![", "<img", "<picture", "data:image/", "<svg"];
    MARKERS.iter().any(|m| text.contains(m))
}

fn looks_like_code(text: &str, config: &ClassifierConfig) -> bool {
    if count_code_indicators(text) >= config.min_code_indicators {
        return true;
    }
    code_line_density(text) > config.code_density_threshold
}

/// Keywords counted only as the first token of a line, so prose that
/// merely mentions them ("because", "the class of...") does not trip the
/// heuristic.
const CODE_KEYWORDS: [&str; 18] = [
    "fn", "func", "def", "function", "class", "struct", "impl", "import", "use", "let", "const",
    "var", "return", "pub", "public", "private", "async", "#include",
];

fn count_code_indicators(text: &str) -> usize {
    let mut indicators = 0;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("```") {
            indicators += 1;
        }
        if line.starts_with("    ") || line.starts_with('\t') {
            indicators += 1;
        }
        if first_token_is_keyword(trimmed) {
            indicators += 1;
        }
        if has_brace_semicolon_pattern(trimmed) {
            indicators += 1;
        }
        if trimmed.contains("=>") || trimmed.contains("->") {
            indicators += 1;
        }
    }
    indicators
}

/// Fraction of lines that look like code: fence delimiters, fenced
/// regions, indented blocks, or lines matching structural patterns.
fn code_line_density(text: &str) -> f64 {
    let mut total = 0usize;
    let mut code_lines = 0usize;
    let mut in_fence = false;

    for line in text.lines() {
        total += 1;
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            code_lines += 1;
            continue;
        }
        if in_fence {
            code_lines += 1;
            continue;
        }
        if is_code_line(line, trimmed) {
            code_lines += 1;
        }
    }

    if total == 0 {
        return 0.0;
    }
    code_lines as f64 / total as f64
}

fn is_code_line(raw: &str, trimmed: &str) -> bool {
    if trimmed.is_empty() {
        return false;
    }
    raw.starts_with("    ")
        || raw.starts_with('\t')
        || first_token_is_keyword(trimmed)
        || has_brace_semicolon_pattern(trimmed)
        || trimmed.contains("=>")
        || trimmed.contains("->")
}

fn first_token_is_keyword(trimmed: &str) -> bool {
    let first = trimmed.split_whitespace().next().unwrap_or("");
    CODE_KEYWORDS.contains(&first)
}

fn has_brace_semicolon_pattern(trimmed: &str) -> bool {
    trimmed.ends_with('{')
        || trimmed.ends_with("};")
        || trimmed.ends_with(");")
        || trimmed.ends_with(';') && trimmed.contains('(')
        || trimmed == "}"
        || trimmed.ends_with("{}")
}
