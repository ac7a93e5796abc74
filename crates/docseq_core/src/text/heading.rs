//! Heading detection strategy shared by titles and paragraph splitting.
//!
//! # Responsibility
//! - Decide whether a single line reads like a heading.
//! - Derive a short section title from the start of a node.
//!
//! # Invariants
//! - Detectors are pure: same input, same answer, no I/O.

use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s*$").expect("valid sentence end regex"));
static MARKUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_`]").expect("valid markup regex"));

const TITLE_SCAN_CHARS: usize = 200;
const TITLE_FALLBACK_WORDS: usize = 4;
const HEADING_LINE_MAX_CHARS: usize = 80;

/// Replaceable heading heuristic.
pub trait HeadingDetector {
    /// Returns a title for a section that starts with `content`.
    fn section_title(&self, content: &str) -> Option<String>;
    /// Whether `line` should stand alone as a heading paragraph.
    fn is_heading_line(&self, line: &str) -> bool;
}

/// Default line-shape heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicHeadingDetector;

impl HeadingDetector for HeuristicHeadingDetector {
    fn section_title(&self, content: &str) -> Option<String> {
        let head: String = content.chars().take(TITLE_SCAN_CHARS).collect();

        for line in head.lines().map(str::trim) {
            if line.starts_with('#') {
                let stripped = line.replace('#', "");
                let stripped = stripped.trim();
                if !stripped.is_empty() {
                    return Some(stripped.to_string());
                }
                continue;
            }
            let len = line.chars().count();
            let capitalized = line.chars().next().is_some_and(char::is_uppercase);
            if len > 10 && len < 60 && capitalized {
                return Some(line.to_string());
            }
        }

        let words: Vec<&str> = head.split_whitespace().take(TITLE_FALLBACK_WORDS).collect();
        let title = MARKUP_RE.replace_all(&words.join(" "), "").trim().to_string();
        if title.is_empty() {
            None
        } else {
            Some(title)
        }
    }

    fn is_heading_line(&self, line: &str) -> bool {
        line.chars().count() < HEADING_LINE_MAX_CHARS && !ends_sentence(line)
    }
}

/// Whether `text` ends with `.`, `!` or `?` (trailing whitespace ignored).
pub fn ends_sentence(text: &str) -> bool {
    SENTENCE_END_RE.is_match(text)
}
