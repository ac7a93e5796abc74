//! Outline validation, heuristic fallback, and markdown rendering.
//!
//! # Invariants
//! - Every returned `Outline` covers `1..=previews.len()` exactly once, with
//!   sections sorted by `start_node`.
//! - Rendering lists section headers only; no descriptive body text.

use crate::outline::model::{node_range_label, Importance, NodePreview, Outline, OutlineDraft, Section};
use crate::text::heading::HeadingDetector;
use std::collections::BTreeSet;

pub const DEFAULT_OUTLINE_TITLE: &str = "Table of Contents";
const EMPTY_OUTLINE_MARKDOWN: &str = "# Table of Contents\n\n*No sections available.*";
const MIN_FALLBACK_SECTIONS: usize = 2;
const MAX_FALLBACK_SECTIONS: usize = 4;

/// Cleans a collaborator draft into a gap-free outline.
///
/// Drafted sections that are incomplete, out of range, or overlap an earlier
/// one are dropped. Every node left uncovered lands in a `Supporting` section
/// per consecutive run, so a draft where nothing survives still yields a
/// complete outline.
pub fn validate_outline(
    draft: OutlineDraft,
    previews: &[NodePreview],
    detector: &dyn HeadingDetector,
) -> Outline {
    let total = previews.len();
    let mut covered = BTreeSet::new();
    let mut sections = Vec::new();

    for drafted in draft.sections {
        let (Some(title), Some(start), Some(end)) =
            (drafted.title, drafted.start_node, drafted.end_node)
        else {
            continue;
        };
        let title = title.trim().to_string();
        if title.is_empty() || start < 1 || start > end || end > total as i64 {
            continue;
        }
        let (start, end) = (start as usize, end as usize);
        if (start..=end).any(|node| covered.contains(&node)) {
            continue;
        }
        covered.extend(start..=end);

        let importance = drafted
            .importance
            .as_deref()
            .and_then(Importance::parse)
            .unwrap_or(Importance::Secondary);
        sections.push(Section {
            title,
            start_node: start,
            end_node: end,
            importance,
        });
    }

    for (start, end) in uncovered_runs(total, &covered) {
        sections.push(Section {
            title: heuristic_title(previews, start, end, detector),
            start_node: start,
            end_node: end,
            importance: Importance::Supporting,
        });
    }
    sections.sort_by_key(|section| section.start_node);

    let title = draft
        .title
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_OUTLINE_TITLE.to_string());
    Outline { title, sections }
}

/// Splits the nodes into 2-4 contiguous, roughly equal sections.
pub fn fallback_outline(previews: &[NodePreview], detector: &dyn HeadingDetector) -> Outline {
    let total = previews.len();
    let mut sections = Vec::new();
    if total > 0 {
        let count = (total / 3)
            .clamp(MIN_FALLBACK_SECTIONS, MAX_FALLBACK_SECTIONS)
            .min(total);
        let per_section = total / count;
        for index in 0..count {
            let start = index * per_section + 1;
            let end = if index + 1 == count {
                total
            } else {
                (index + 1) * per_section
            };
            sections.push(Section {
                title: heuristic_title(previews, start, end, detector),
                start_node: start,
                end_node: end,
                importance: if index < 2 {
                    Importance::Primary
                } else {
                    Importance::Secondary
                },
            });
        }
    }

    Outline {
        title: DEFAULT_OUTLINE_TITLE.to_string(),
        sections,
    }
}

/// Renders the TOC node body: one weighted header per section.
pub fn render_markdown(outline: &Outline) -> String {
    if outline.sections.is_empty() {
        return EMPTY_OUTLINE_MARKDOWN.to_string();
    }
    outline
        .sections
        .iter()
        .map(|section| {
            format!(
                "{} {} ({})",
                section.importance.heading_marker(),
                section.title,
                section.node_range_label()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn heuristic_title(
    previews: &[NodePreview],
    start: usize,
    end: usize,
    detector: &dyn HeadingDetector,
) -> String {
    previews
        .get(start - 1)
        .and_then(|preview| detector.section_title(&preview.content_preview))
        .unwrap_or_else(|| format!("Content ({})", node_range_label(start, end)))
}

fn uncovered_runs(total: usize, covered: &BTreeSet<usize>) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for node in (1..=total).filter(|node| !covered.contains(node)) {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == node => *end = node,
            _ => runs.push((node, node)),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::{fallback_outline, render_markdown, validate_outline};
    use crate::outline::model::{Importance, NodePreview, OutlineDraft, SectionDraft};
    use crate::text::heading::HeuristicHeadingDetector;

    fn previews(contents: &[&str]) -> Vec<NodePreview> {
        contents
            .iter()
            .enumerate()
            .map(|(index, content)| NodePreview {
                position: index + 1,
                content_preview: content.to_string(),
            })
            .collect()
    }

    fn drafted(title: &str, start: i64, end: i64, importance: &str) -> SectionDraft {
        SectionDraft {
            title: Some(title.to_string()),
            start_node: Some(start),
            end_node: Some(end),
            importance: Some(importance.to_string()),
        }
    }

    #[test]
    fn invalid_and_overlapping_sections_are_dropped_and_gaps_filled() {
        let nodes = previews(&["# Alpha", "b", "c", "## Delta", "e"]);
        let draft = OutlineDraft {
            title: None,
            sections: vec![
                drafted("First", 1, 2, "primary"),
                drafted("Overlap", 2, 3, "primary"),
                drafted("Out of range", 4, 9, "primary"),
                drafted("Last", 5, 5, "bogus"),
            ],
        };

        let outline = validate_outline(draft, &nodes, &HeuristicHeadingDetector);
        assert!(outline.covers_exactly(5));
        assert_eq!(outline.title, "Table of Contents");
        let titles: Vec<&str> = outline.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "c", "Last"]);
        assert_eq!(outline.sections[1].importance, Importance::Supporting);
        assert_eq!(outline.sections[2].importance, Importance::Secondary);
    }

    #[test]
    fn draft_without_usable_sections_becomes_one_supporting_run() {
        let nodes = previews(&["# Opening", "b", "c"]);
        let draft = OutlineDraft {
            title: Some("T".to_string()),
            sections: vec![drafted("Bad", 0, 1, "primary"), drafted("Worse", 2, 9, "primary")],
        };

        let outline = validate_outline(draft, &nodes, &HeuristicHeadingDetector);
        assert_eq!(outline.title, "T");
        assert_eq!(outline.sections.len(), 1);
        assert_eq!(outline.sections[0].title, "Opening");
        assert_eq!(outline.sections[0].importance, Importance::Supporting);
        assert!(outline.covers_exactly(3));
    }

    #[test]
    fn fallback_uses_two_to_four_contiguous_groups() {
        let two = fallback_outline(&previews(&["a", "b"]), &HeuristicHeadingDetector);
        assert_eq!(two.sections.len(), 2);
        assert!(two.covers_exactly(2));

        let seven = previews(&["a", "b", "c", "d", "e", "f", "g"]);
        let outline = fallback_outline(&seven, &HeuristicHeadingDetector);
        assert_eq!(outline.sections.len(), 2);
        assert_eq!(outline.sections[0].end_node, 3);
        assert_eq!(outline.sections[1].end_node, 7);
        assert!(outline.covers_exactly(7));

        let many: Vec<String> = (0..20).map(|i| format!("node {i}")).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let outline = fallback_outline(&previews(&refs), &HeuristicHeadingDetector);
        assert_eq!(outline.sections.len(), 4);
        assert_eq!(outline.sections[3].importance, Importance::Secondary);
        assert!(outline.covers_exactly(20));
    }

    #[test]
    fn fallback_title_uses_range_when_heuristic_finds_nothing() {
        let outline = fallback_outline(&previews(&["  ", "b"]), &HeuristicHeadingDetector);
        assert_eq!(outline.sections[0].title, "Content (Node 1)");
    }

    #[test]
    fn render_uses_heading_weight_and_ranges() {
        let nodes = previews(&["a", "b", "c"]);
        let draft = OutlineDraft {
            title: None,
            sections: vec![
                drafted("Intro", 1, 2, "primary"),
                drafted("Wrap up", 3, 3, "supporting"),
            ],
        };
        let outline = validate_outline(draft, &nodes, &HeuristicHeadingDetector);
        assert_eq!(
            render_markdown(&outline),
            "## Intro (Nodes 1-2)\n#### Wrap up (Node 3)"
        );
    }
}
