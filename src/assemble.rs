//! Logical text assembly: one string per paragraph plus the offset map back
//! onto its runs and the windows rules are matched in.

use crate::segment::Paragraph;
use std::ops::Range;

/// How matching windows are cut out of a paragraph's logical text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowMode {
    /// One window per run; fragile runs are merged with their neighbours.
    #[default]
    PerSegment,
    /// The whole paragraph is one window.
    Paragraph,
}

/// Boundary-merge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    /// Whole-run texts that cannot be matched on their own (lone brackets).
    pub fragile: Vec<String>,
    pub mode: WindowMode,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            fragile: ["(", ")", "（", "）"].iter().map(|s| s.to_string()).collect(),
            mode: WindowMode::PerSegment,
        }
    }
}

impl MergeConfig {
    /// Match whole paragraphs regardless of run boundaries.
    pub fn paragraph() -> Self {
        Self {
            mode: WindowMode::Paragraph,
            ..Self::default()
        }
    }

    /// Treat runs consisting of exactly `fragment` as fragile.
    pub fn with_fragile(mut self, fragment: impl Into<String>) -> Self {
        self.fragile.push(fragment.into());
        self
    }

    pub fn is_fragile(&self, text: &str) -> bool {
        self.fragile.iter().any(|f| f == text)
    }
}

/// Logical range contributed by one text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpan {
    /// Index into [`Paragraph::segments`].
    pub segment: usize,
    pub range: Range<usize>,
}

/// Maps logical byte offsets to (segment index, offset within the segment) and back.
///
/// Built per paragraph; only valid for the paragraph it was assembled from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetMap {
    spans: Vec<SegmentSpan>,
}

impl OffsetMap {
    /// Every text run in order, including zero-width ones.
    pub fn spans(&self) -> &[SegmentSpan] {
        &self.spans
    }

    /// The run owning the character that starts at `offset`.
    ///
    /// Zero-width runs own nothing; `None` when `offset` is past the end.
    pub fn locate(&self, offset: usize) -> Option<(usize, usize)> {
        let idx = self.spans.partition_point(|s| s.range.end <= offset);
        let span = self.spans[idx..]
            .iter()
            .find(|s| !s.range.is_empty())?;
        if span.range.start > offset {
            return None;
        }
        Some((span.segment, offset - span.range.start))
    }

    /// Logical offset of `intra` bytes into `segment`.
    pub fn to_logical(&self, segment: usize, intra: usize) -> Option<usize> {
        self.spans
            .iter()
            .find(|s| s.segment == segment)
            .filter(|s| intra <= s.range.len())
            .map(|s| s.range.start + intra)
    }

    /// Non-empty runs intersecting `range`.
    pub fn overlapping(&self, range: Range<usize>) -> impl Iterator<Item = &SegmentSpan> + '_ {
        self.spans
            .iter()
            .filter(move |s| !s.range.is_empty() && s.range.start < range.end && range.start < s.range.end)
    }

    pub fn span_of(&self, segment: usize) -> Option<&SegmentSpan> {
        self.spans.iter().find(|s| s.segment == segment)
    }
}

/// A paragraph's text as rules see it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalText {
    pub text: String,
    pub offsets: OffsetMap,
    /// Disjoint ranges, in order, that matches must stay within.
    pub windows: Vec<Range<usize>>,
}

impl LogicalText {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The window containing `offset`.
    pub fn window_at(&self, offset: usize) -> Option<&Range<usize>> {
        self.windows.iter().find(|w| w.contains(&offset))
    }
}

/// Build the logical text of `paragraph`.
///
/// Windows never extend across a structural run, so a rewrite can never move
/// text from one side of a drawing or tab to the other.
pub fn assemble(paragraph: &Paragraph, config: &MergeConfig) -> LogicalText {
    let mut text = String::new();
    let mut spans = Vec::new();
    // (range, fragile, structural run since the previous unit)
    let mut units: Vec<(Range<usize>, bool, bool)> = Vec::new();
    let mut barrier = false;

    for (index, segment) in paragraph.segments.iter().enumerate() {
        let Some(run_text) = segment.text() else {
            barrier = true;
            continue;
        };
        let start = text.len();
        text.push_str(run_text);
        let range = start..text.len();
        spans.push(SegmentSpan {
            segment: index,
            range: range.clone(),
        });
        if !range.is_empty() {
            units.push((range, config.is_fragile(run_text), barrier));
            barrier = false;
        }
    }

    let windows = match config.mode {
        WindowMode::PerSegment => merge_fragile(&units),
        WindowMode::Paragraph => merge_all(&units),
    };

    LogicalText {
        text,
        offsets: OffsetMap { spans },
        windows,
    }
}

fn merge_fragile(units: &[(Range<usize>, bool, bool)]) -> Vec<Range<usize>> {
    // joined[i]: unit i shares a window with unit i - 1
    let mut joined = vec![false; units.len()];
    for (i, (_, fragile, _)) in units.iter().enumerate() {
        if !fragile {
            continue;
        }
        if i > 0 && !units[i].2 {
            joined[i] = true;
        }
        if i + 1 < units.len() && !units[i + 1].2 {
            joined[i + 1] = true;
        }
    }
    join_units(units, &joined)
}

fn merge_all(units: &[(Range<usize>, bool, bool)]) -> Vec<Range<usize>> {
    let joined: Vec<bool> = units
        .iter()
        .enumerate()
        .map(|(i, (_, _, barrier))| i > 0 && !barrier)
        .collect();
    join_units(units, &joined)
}

fn join_units(units: &[(Range<usize>, bool, bool)], joined: &[bool]) -> Vec<Range<usize>> {
    let mut windows: Vec<Range<usize>> = Vec::new();
    for (i, (range, _, _)) in units.iter().enumerate() {
        match windows.last_mut() {
            Some(last) if joined[i] => last.end = range.end,
            _ => windows.push(range.clone()),
        }
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{RunFrame, Segment, SegmentKind};
    use crate::style::RunStyle;

    fn text_seg(text: &str) -> Segment {
        Segment {
            range: 0..0,
            kind: SegmentKind::Text {
                style: RunStyle::plain(),
                text: text.to_string(),
                annotation: None,
                frame: RunFrame::default(),
            },
        }
    }

    fn structural() -> Segment {
        Segment {
            range: 0..0,
            kind: SegmentKind::Structural,
        }
    }

    fn para(segments: Vec<Segment>) -> Paragraph {
        Paragraph {
            range: 0..0,
            segments,
        }
    }

    #[test]
    fn test_offsets_skip_structural() {
        let p = para(vec![text_seg("ab"), structural(), text_seg(""), text_seg("あい")]);
        let logical = assemble(&p, &MergeConfig::default());
        assert_eq!(logical.text, "abあい");
        assert_eq!(logical.offsets.spans().len(), 3);
        assert_eq!(logical.offsets.locate(0), Some((0, 0)));
        assert_eq!(logical.offsets.locate(1), Some((0, 1)));
        // zero-width run at index 2 owns nothing
        assert_eq!(logical.offsets.locate(2), Some((3, 0)));
        assert_eq!(logical.offsets.locate(5), Some((3, 3)));
        assert_eq!(logical.offsets.locate(8), None);
        assert_eq!(logical.offsets.to_logical(3, 3), Some(5));
        assert_eq!(logical.offsets.to_logical(2, 0), Some(2));
        assert_eq!(logical.offsets.to_logical(1, 0), None);
        assert_eq!(logical.windows, vec![0..2, 2..8]);
    }

    #[test]
    fn test_fragile_merge() {
        let p = para(vec![text_seg("a"), text_seg("("), text_seg("５"), text_seg(")"), text_seg("b")]);
        let logical = assemble(&p, &MergeConfig::default());
        assert_eq!(logical.text, "a(５)b");
        // a + ( + ５ + ) + b all chain together through the two fragile runs
        assert_eq!(logical.windows, vec![0..logical.text.len()]);

        let p = para(vec![text_seg("x"), text_seg("y"), text_seg("（"), text_seg("z")]);
        let logical = assemble(&p, &MergeConfig::default());
        assert_eq!(logical.windows, vec![0..1, 1..logical.text.len()]);
    }

    #[test]
    fn test_structural_blocks_merge() {
        let p = para(vec![text_seg("a"), structural(), text_seg("("), text_seg("b")]);
        let logical = assemble(&p, &MergeConfig::default());
        assert_eq!(logical.windows, vec![0..1, 1..3]);

        let logical = assemble(&p, &MergeConfig::paragraph());
        assert_eq!(logical.windows, vec![0..1, 1..3]);
    }

    #[test]
    fn test_paragraph_mode_single_window() {
        let p = para(vec![text_seg("ab"), text_seg("cd"), text_seg("")]);
        let logical = assemble(&p, &MergeConfig::paragraph());
        assert_eq!(logical.windows, vec![0..4]);
    }

    #[test]
    fn test_no_text_is_empty() {
        let p = para(vec![structural()]);
        let logical = assemble(&p, &MergeConfig::default());
        assert!(logical.is_empty());
        assert!(logical.windows.is_empty());
    }
}
