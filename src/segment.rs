//! Paragraph and run model over a WordprocessingML part.

use crate::style::{Highlight, RunStyle};
use crate::xml::{self, Element};
use regex::Regex;
use std::ops::Range;

/// Content of one `w:r` inside a paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Consecutive `w:t` children of one run (with any zero-width markers among them).
    Text {
        style: RunStyle,
        text: String,
        /// Highlight already present on the run, if any.
        annotation: Option<Highlight>,
        frame: RunFrame,
    },
    /// Anything else (drawings, tabs, breaks, field codes, deleted text). Never rewritten.
    Structural,
}

/// Where a text segment sits inside its `w:r`.
///
/// The default frame is a segment that spans the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFrame {
    /// Other run content precedes the segment; the run is closed before new runs.
    pub closes_run: bool,
    /// Other run content follows the segment; the run is reopened after new runs.
    pub reopens_run: bool,
    /// Zero-width markers inside the segment, carried into the first rewritten run.
    pub markers: String,
}

/// Children that carry no text and may sit anywhere among `w:t` elements.
const ZERO_WIDTH_MARKERS: &[&str] = &["w:lastRenderedPageBreak"];

/// A run, or part of one, and where it sits in the part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Bytes replaced when the segment is rewritten: the whole `<w:r>..</w:r>`
    /// for a plain text run, otherwise the segment's children, widened to the
    /// run's start or end tag when nothing else of the run lies in between.
    pub range: Range<usize>,
    pub kind: SegmentKind,
}

impl Segment {
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            SegmentKind::Text { text, .. } => Some(text),
            SegmentKind::Structural => None,
        }
    }

    pub fn style(&self) -> Option<&RunStyle> {
        match &self.kind {
            SegmentKind::Text { style, .. } => Some(style),
            SegmentKind::Structural => None,
        }
    }

    pub fn frame(&self) -> Option<&RunFrame> {
        match &self.kind {
            SegmentKind::Text { frame, .. } => Some(frame),
            SegmentKind::Structural => None,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self.kind, SegmentKind::Structural)
    }
}

/// One `w:p` element and its runs in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub range: Range<usize>,
    pub segments: Vec<Segment>,
}

impl Paragraph {
    /// Concatenated text of all text runs.
    pub fn text(&self) -> String {
        self.segments.iter().filter_map(Segment::text).collect()
    }
}

/// Collect every paragraph of a part in document order.
///
/// Paragraphs living inside a run (text boxes in drawings) are opaque and skipped.
pub fn collect_paragraphs(xml: &str, roots: &[Element]) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    for root in roots {
        walk_blocks(xml, root, &mut paragraphs);
    }
    paragraphs
}

fn walk_blocks(xml: &str, element: &Element, out: &mut Vec<Paragraph>) {
    if element.is("w:p") {
        let mut segments = Vec::new();
        for child in &element.children {
            walk_runs(xml, child, &mut segments);
        }
        out.push(Paragraph {
            range: element.outer.clone(),
            segments,
        });
        return;
    }
    if element.is("w:r") {
        return;
    }
    for child in &element.children {
        walk_blocks(xml, child, out);
    }
}

/// Runs inside a paragraph, including those wrapped by hyperlinks,
/// insertions, content controls or smart tags.
fn walk_runs(xml: &str, element: &Element, out: &mut Vec<Segment>) {
    if element.is("w:r") {
        out.extend(read_runs(xml, element));
        return;
    }
    if element.is("w:p") {
        return;
    }
    for child in &element.children {
        walk_runs(xml, child, out);
    }
}

/// Split a `w:r` into segments.
///
/// Consecutive `w:t` children (and zero-width markers between them) form a text
/// segment; every other child is a structural segment of its own. A run without
/// `w:t` is one structural segment.
fn read_runs(xml: &str, run: &Element) -> Vec<Segment> {
    if run.self_closing || !run.children.iter().any(|c| c.is("w:t")) {
        return vec![Segment {
            range: run.outer.clone(),
            kind: SegmentKind::Structural,
        }];
    }

    let properties = run.child("w:rPr").map(|p| p.outer_text(xml).to_string());
    let annotation = properties.as_deref().and_then(existing_highlight);
    let style = RunStyle::new(run.start_tag(xml), properties);

    let content: Vec<&Element> = run.children.iter().filter(|c| !c.is("w:rPr")).collect();
    let mut segments = Vec::new();
    let mut i = 0;
    while i < content.len() {
        if !is_text_child(content[i]) {
            segments.push(Segment {
                range: content[i].outer.clone(),
                kind: SegmentKind::Structural,
            });
            i += 1;
            continue;
        }
        let first = i;
        while i < content.len() && is_text_child(content[i]) {
            i += 1;
        }
        let group = &content[first..i];
        if !group.iter().any(|c| c.is("w:t")) {
            // markers alone stay where they are
            continue;
        }

        let closes_run = first > 0;
        let reopens_run = i < content.len();
        let start = if closes_run {
            group[0].outer.start
        } else {
            run.outer.start
        };
        let end = if reopens_run {
            group[group.len() - 1].outer.end
        } else {
            run.outer.end
        };
        let markers: String = group
            .iter()
            .filter(|c| !c.is("w:t"))
            .map(|c| c.outer_text(xml))
            .collect();
        segments.push(Segment {
            range: start..end,
            kind: SegmentKind::Text {
                style: style.clone(),
                text: group_text(xml, group),
                annotation,
                frame: RunFrame {
                    closes_run,
                    reopens_run,
                    markers,
                },
            },
        });
    }
    segments
}

fn is_text_child(child: &Element) -> bool {
    child.is("w:t") || ZERO_WIDTH_MARKERS.contains(&child.name.as_str())
}

fn group_text(xml: &str, group: &[&Element]) -> String {
    let mut text = String::new();
    for t in group.iter().filter(|c| c.is("w:t")) {
        match xml::unescape_text(t.inner_text(xml)) {
            Ok(decoded) => text.push_str(&decoded),
            Err(e) => {
                log::debug!("undecodable run text at byte {}: {}", t.outer.start, e);
                return String::new();
            }
        }
    }
    text
}

fn existing_highlight(rpr: &str) -> Option<Highlight> {
    lazy_static::lazy_static! {
        static ref HIGHLIGHT: Regex =
            Regex::new(r#"<w:highlight\s+w:val="([^"]+)""#).expect("invalid regex");
    }
    HIGHLIGHT
        .captures(rpr)
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(xml: &str) -> Vec<Paragraph> {
        let roots = xml::parse(xml).unwrap();
        collect_paragraphs(xml, &roots)
    }

    #[test]
    fn test_runs_and_wrappers() {
        let xml = concat!(
            "<w:body><w:p><w:pPr><w:jc w:val=\"left\"/></w:pPr>",
            "<w:r><w:rPr><w:b/></w:rPr><w:t>ab</w:t></w:r>",
            "<w:hyperlink r:id=\"rId1\"><w:r><w:t>c</w:t><w:t>d</w:t></w:r></w:hyperlink>",
            "<w:r><w:tab/></w:r>",
            "</w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>e&amp;f</w:t></w:r></w:p></w:tc></w:tr></w:tbl></w:body>"
        );
        let ps = paragraphs(xml);
        assert_eq!(ps.len(), 2);
        assert_eq!(ps[0].segments.len(), 3);
        assert_eq!(ps[0].text(), "abcd");
        assert!(ps[0].segments[2].is_structural());
        assert_eq!(
            ps[0].segments[0].style().unwrap().properties(),
            Some("<w:rPr><w:b/></w:rPr>")
        );
        assert_eq!(ps[1].text(), "e&f");
    }

    #[test]
    fn test_textbox_paragraphs_are_opaque() {
        let xml = concat!(
            "<w:p><w:r><w:t>a</w:t></w:r>",
            "<w:r><mc:AlternateContent><mc:Choice><w:drawing><w:txbxContent>",
            "<w:p><w:r><w:t>inner</w:t></w:r></w:p>",
            "</w:txbxContent></w:drawing></mc:Choice></mc:AlternateContent></w:r></w:p>"
        );
        let ps = paragraphs(xml);
        assert_eq!(ps.len(), 1);
        assert_eq!(ps[0].text(), "a");
        assert!(ps[0].segments[1].is_structural());
    }

    #[test]
    fn test_existing_highlight_read() {
        let xml = r#"<w:p><w:r><w:rPr><w:highlight w:val="yellow"/></w:rPr><w:t>x</w:t></w:r></w:p>"#;
        let ps = paragraphs(xml);
        match &ps[0].segments[0].kind {
            SegmentKind::Text { annotation, .. } => assert_eq!(*annotation, Some(Highlight::Yellow)),
            SegmentKind::Structural => panic!("expected text run"),
        }
    }

    #[test]
    fn test_mixed_run_is_split() {
        let xml = concat!(
            "<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>a</w:t><w:tab/><w:t>b</w:t>",
            "<w:lastRenderedPageBreak/><w:t>c</w:t></w:r></w:p>"
        );
        let ps = paragraphs(xml);
        let segs = &ps[0].segments;
        assert_eq!(segs.len(), 3);
        assert_eq!(ps[0].text(), "abc");
        assert!(segs[1].is_structural());
        assert_eq!(&xml[segs[1].range.clone()], "<w:tab/>");

        assert_eq!(&xml[segs[0].range.clone()], "<w:r><w:rPr><w:b/></w:rPr><w:t>a</w:t>");
        let head = segs[0].frame().unwrap();
        assert!(!head.closes_run && head.reopens_run);

        assert_eq!(
            &xml[segs[2].range.clone()],
            "<w:t>b</w:t><w:lastRenderedPageBreak/><w:t>c</w:t></w:r>"
        );
        let tail = segs[2].frame().unwrap();
        assert!(tail.closes_run && !tail.reopens_run);
        assert_eq!(tail.markers, "<w:lastRenderedPageBreak/>");
        assert_eq!(segs[2].style(), segs[0].style());
    }

    #[test]
    fn test_marker_run_is_text() {
        let xml = "<w:p><w:r><w:lastRenderedPageBreak/><w:t>x</w:t></w:r></w:p>";
        let ps = paragraphs(xml);
        assert_eq!(ps[0].segments.len(), 1);
        assert_eq!(ps[0].segments[0].range, 5..xml.len() - 6);
        assert_eq!(ps[0].segments[0].text(), Some("x"));
        assert_eq!(ps[0].segments[0].frame().unwrap().markers, "<w:lastRenderedPageBreak/>");
    }

    #[test]
    fn test_undecodable_text_is_empty() {
        let xml = "<w:p><w:r><w:t>a&bogus;b</w:t></w:r></w:p>";
        let ps = paragraphs(xml);
        assert_eq!(ps[0].segments[0].text(), Some(""));
    }
}
