//! Deterministic paragraph partitioner.
//!
//! Used when the segmentation service is unavailable and for manual
//! resegmentation. No I/O; identical input always yields identical output.

use crate::text::heading::{ends_sentence, HeadingDetector, HeuristicHeadingDetector};
use once_cell::sync::Lazy;
use regex::Regex;

static BLANK_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid blank line regex"));
static CLAUSE_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?;:]\s*$").expect("valid clause end regex"));

/// Below this many blank-line paragraphs the text is regrouped by line.
const MIN_BLOCK_PARAGRAPHS: usize = 3;
/// A grouped paragraph may close once it is longer than this.
const MIN_GROUPED_CHARS: usize = 100;
/// Unpunctuated paragraphs shorter than this merge into their successor.
const MERGE_BELOW_CHARS: usize = 80;
const KEEP_ABOVE_CHARS: usize = 20;
const HEADER_MIN_CHARS: usize = 5;
const HEADER_MAX_CHARS: usize = 40;
const HEADER_MAX_WORDS: usize = 5;

/// Splits raw text into paragraphs with the default heading heuristic.
pub fn partition(text: &str) -> Vec<String> {
    partition_with(text, &HeuristicHeadingDetector)
}

/// Splits raw text into paragraphs using `detector` for heading lines.
pub fn partition_with(text: &str, detector: &dyn HeadingDetector) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut paragraphs: Vec<String> = BLANK_LINE_RE
        .split(&normalized)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(str::to_string)
        .collect();
    if paragraphs.len() < MIN_BLOCK_PARAGRAPHS {
        paragraphs = group_lines(&normalized, detector);
    }

    merge_fragments(paragraphs)
        .into_iter()
        .filter(|paragraph| worth_keeping(paragraph))
        .collect()
}

fn group_lines(text: &str, detector: &dyn HeadingDetector) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if !current.is_empty() && detector.is_heading_line(line) {
            paragraphs.push(current.join(" "));
            current.clear();
            paragraphs.push(line.to_string());
            continue;
        }

        current.push(line);
        if ends_sentence(line) && current.join(" ").chars().count() > MIN_GROUPED_CHARS {
            paragraphs.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
}

fn merge_fragments(paragraphs: Vec<String>) -> Vec<String> {
    let mut merged = Vec::with_capacity(paragraphs.len());
    let mut iter = paragraphs.into_iter().peekable();
    while let Some(paragraph) = iter.next() {
        let current = paragraph.trim();
        let fragment =
            current.chars().count() < MERGE_BELOW_CHARS && !CLAUSE_END_RE.is_match(current);
        match iter.peek() {
            Some(_) if fragment => {
                let next = iter.next().unwrap_or_default();
                merged.push(format!("{current}\n\n{}", next.trim()));
            }
            _ => merged.push(current.to_string()),
        }
    }
    merged
}

fn worth_keeping(paragraph: &str) -> bool {
    let len = paragraph.chars().count();
    if len > KEEP_ABOVE_CHARS {
        return true;
    }
    len > HEADER_MIN_CHARS
        && len <= HEADER_MAX_CHARS
        && paragraph.split_whitespace().count() <= HEADER_MAX_WORDS
}

#[cfg(test)]
mod tests {
    use super::partition;

    const LONG_A: &str = "Ownership is the set of rules that govern how a Rust program manages memory.";
    const LONG_B: &str = "Every value has an owner, and there can only be one owner at a time.";
    const LONG_C: &str = "When the owner goes out of scope, the value will be dropped right away.";

    #[test]
    fn blank_lines_separate_paragraphs() {
        let text = format!("{LONG_A}\n\n{LONG_B}\n\n{LONG_C}");
        assert_eq!(partition(&text), vec![LONG_A, LONG_B, LONG_C]);
    }

    #[test]
    fn carriage_returns_are_normalized() {
        let text = format!("{LONG_A}\r\n\r\n{LONG_B}\r\r{LONG_C}");
        assert_eq!(partition(&text), vec![LONG_A, LONG_B, LONG_C]);
    }

    #[test]
    fn single_newlines_group_sentences_and_isolate_headings() {
        let text = format!("{LONG_A}\nSecond Part\n{LONG_B}\n{LONG_C}");
        let paragraphs = partition(&text);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0], LONG_A);
        assert_eq!(paragraphs[1], format!("Second Part\n\n{LONG_B} {LONG_C}"));
    }

    #[test]
    fn short_unpunctuated_paragraph_merges_with_successor() {
        let text = format!("Introduction\n\n{LONG_A}\n\n{LONG_B}");
        let paragraphs = partition(&text);
        assert_eq!(
            paragraphs,
            vec![format!("Introduction\n\n{LONG_A}"), LONG_B.to_string()]
        );
    }

    #[test]
    fn tiny_fragments_are_dropped_but_short_headers_survive() {
        let text = format!("{LONG_A}\n\n{LONG_B}\n\nok.\n\nFinal words here.");
        let paragraphs = partition(&text);
        assert_eq!(paragraphs, vec![LONG_A, LONG_B, "Final words here."]);
    }

    #[test]
    fn partition_is_deterministic() {
        let text = format!("Title\n{LONG_A}\n{LONG_B}\n\n{LONG_C}");
        assert_eq!(partition(&text), partition(&text));
    }

    #[test]
    fn empty_text_yields_no_paragraphs() {
        assert!(partition("").is_empty());
        assert!(partition("\n\n  \n").is_empty());
    }
}
