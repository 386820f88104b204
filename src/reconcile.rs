//! Maps resolved spans back onto a paragraph's runs.
//!
//! Unchanged text keeps its run's formatting exactly; each span becomes one new
//! run in the style of the run owning the span's first character, with the
//! span's highlight layered on. Structural runs are never touched.

use crate::assemble::LogicalText;
use crate::error::{ProofError, Result};
use crate::matcher::MatchSpan;
use crate::segment::Paragraph;
use crate::style::Highlight;
use std::collections::BTreeMap;
use std::ops::Range;

/// Output piece destined for the slot of one original run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Original text, original formatting.
    Plain(String),
    /// Replacement text under a highlight.
    Marked { text: String, highlight: Highlight },
}

impl Piece {
    pub fn text(&self) -> &str {
        match self {
            Piece::Plain(t) => t,
            Piece::Marked { text, .. } => text,
        }
    }
}

/// New content for one run that changed. Empty `pieces` removes the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    /// Index into [`Paragraph::segments`].
    pub segment: usize,
    pub pieces: Vec<Piece>,
}

/// Replace `range` of the part with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEdit {
    pub range: Range<usize>,
    pub replacement: String,
}

/// Decide what every run of the paragraph becomes. Only changed runs are returned.
pub fn plan(
    paragraph: &Paragraph,
    logical: &LogicalText,
    spans: &[MatchSpan],
) -> Result<Vec<SegmentPlan>> {
    let text = &logical.text;
    let mut slots: BTreeMap<usize, Vec<Piece>> = logical
        .offsets
        .spans()
        .iter()
        .filter(|s| !s.range.is_empty())
        .map(|s| (s.segment, Vec::new()))
        .collect();

    let mut cursor = 0;
    for span in spans {
        if span.start < cursor || span.start >= span.end || span.end > text.len() {
            return Err(ProofError::Reconcile(format!(
                "span {}..{} of rule '{}' is out of order or outside 0..{}",
                span.start,
                span.end,
                span.rule,
                text.len()
            )));
        }
        if !text.is_char_boundary(span.start) || !text.is_char_boundary(span.end) {
            return Err(ProofError::Reconcile(format!(
                "span {}..{} of rule '{}' splits a character",
                span.start, span.end, span.rule
            )));
        }

        emit_plain(logical, cursor..span.start, &mut slots);

        let (owner, _) = logical.offsets.locate(span.start).ok_or_else(|| {
            ProofError::Reconcile(format!("no run owns logical offset {}", span.start))
        })?;
        let covered = logical.offsets.overlapping(span.start..span.end).count();
        if covered > 1 {
            log::debug!(
                "span '{}' of rule '{}' covers {} runs; using the first run's formatting",
                span.matched,
                span.rule,
                covered
            );
        }
        slots
            .get_mut(&owner)
            .ok_or_else(|| ProofError::Reconcile(format!("run {} is not a text run", owner)))?
            .push(Piece::Marked {
                text: span.replacement.clone(),
                highlight: span.highlight,
            });
        cursor = span.end;
    }
    emit_plain(logical, cursor..text.len(), &mut slots);

    let mut plans = Vec::new();
    for (segment, pieces) in slots {
        let original = paragraph
            .segments
            .get(segment)
            .and_then(|s| s.text())
            .ok_or_else(|| ProofError::Reconcile(format!("run {} has no text", segment)))?;
        let unchanged = matches!(pieces.as_slice(), [Piece::Plain(t)] if t == original);
        if !unchanged {
            plans.push(SegmentPlan { segment, pieces });
        }
    }
    Ok(plans)
}

/// Copy `range` of the logical text into the slots of the runs it came from.
fn emit_plain(logical: &LogicalText, range: Range<usize>, slots: &mut BTreeMap<usize, Vec<Piece>>) {
    if range.is_empty() {
        return;
    }
    for span in logical.offsets.overlapping(range.clone()) {
        let start = range.start.max(span.range.start);
        let end = range.end.min(span.range.end);
        let slice = &logical.text[start..end];
        let Some(pieces) = slots.get_mut(&span.segment) else {
            continue;
        };
        match pieces.last_mut() {
            Some(Piece::Plain(prev)) => prev.push_str(slice),
            _ => pieces.push(Piece::Plain(slice.to_string())),
        }
    }
}

/// Render plans into byte-range edits on the part.
pub fn render(paragraph: &Paragraph, plans: &[SegmentPlan]) -> Result<Vec<RunEdit>> {
    let mut edits = Vec::with_capacity(plans.len());
    for plan in plans {
        let segment = paragraph
            .segments
            .get(plan.segment)
            .ok_or_else(|| ProofError::Reconcile(format!("run {} does not exist", plan.segment)))?;
        let style = segment
            .style()
            .ok_or_else(|| ProofError::Reconcile(format!("run {} is structural", plan.segment)))?;

        let frame = segment.frame().cloned().unwrap_or_default();

        let mut replacement = String::new();
        if frame.closes_run {
            replacement.push_str("</w:r>");
        }
        let mut markers = frame.markers.as_str();
        for piece in &plan.pieces {
            match piece {
                Piece::Plain(text) => replacement.push_str(&style.render_run_with(markers, text)),
                Piece::Marked { text, highlight } => replacement
                    .push_str(&style.with_highlight(*highlight)?.render_run_with(markers, text)),
            }
            markers = "";
        }
        if frame.reopens_run {
            replacement.push_str(&style.reopen());
            replacement.push_str(markers);
        }
        edits.push(RunEdit {
            range: segment.range.clone(),
            replacement,
        });
    }
    Ok(edits)
}

/// Plan and render in one step. On error nothing is produced, so the
/// paragraph stays exactly as it was.
pub fn reconcile(
    paragraph: &Paragraph,
    logical: &LogicalText,
    spans: &[MatchSpan],
) -> Result<Vec<RunEdit>> {
    let plans = plan(paragraph, logical, spans)?;
    render(paragraph, &plans)
}

/// Apply disjoint edits to `xml`.
pub fn apply_edits(xml: &str, edits: &mut [RunEdit]) -> Result<String> {
    edits.sort_by_key(|e| e.range.start);
    let mut out = String::with_capacity(xml.len());
    let mut last = 0;
    for edit in edits.iter() {
        if edit.range.start < last || edit.range.end > xml.len() {
            return Err(ProofError::Reconcile(format!(
                "edit {}..{} overlaps a previous edit or runs past the part",
                edit.range.start, edit.range.end
            )));
        }
        out.push_str(&xml[last..edit.range.start]);
        out.push_str(&edit.replacement);
        last = edit.range.end;
    }
    out.push_str(&xml[last..]);
    Ok(out)
}
