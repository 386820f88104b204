//! Paragraph driver: assemble, match, reconcile and audit every paragraph of a part.

use crate::assemble::{assemble, LogicalText, MergeConfig};
use crate::audit::{AuditRecord, AuditSink};
use crate::error::Result;
use crate::matcher::{match_rules, MatchSpan};
use crate::reconcile::{apply_edits, reconcile, RunEdit};
use crate::rules::RuleSet;
use crate::segment::{collect_paragraphs, Paragraph};
use crate::xml;
use rayon::prelude::*;

/// A paragraph left unchanged, or a rule skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub part: String,
    pub paragraph: Option<usize>,
    pub message: String,
}

/// Summary of one processed part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartReport {
    pub part: String,
    pub paragraphs: usize,
    /// Paragraphs with at least one committed span.
    pub changed: usize,
    pub spans: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// What processing one paragraph produced. Nothing is applied until the
/// driver commits it.
#[derive(Debug, Default)]
struct ParagraphOutcome {
    edits: Vec<RunEdit>,
    records: Vec<AuditRecord>,
    diagnostics: Vec<Diagnostic>,
}

/// Proofreading engine configured with a rule set and a boundary-merge policy.
#[derive(Debug, Clone)]
pub struct Engine {
    rules: RuleSet,
    merge: MergeConfig,
    parallel: bool,
}

/// Builder for [`Engine`].
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    rules: Option<RuleSet>,
    merge: MergeConfig,
    parallel: bool,
}

impl EngineBuilder {
    /// Rules to apply; defaults to [`RuleSet::japanese_proofreading`].
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
    }

    /// Process paragraphs of a part on the rayon pool. Audit order is unchanged.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            rules: self.rules.unwrap_or_else(RuleSet::japanese_proofreading),
            merge: self.merge,
            parallel: self.parallel,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::builder().build()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn merge_config(&self) -> &MergeConfig {
        &self.merge
    }

    /// Rewrite every paragraph of `xml`, sending audit records to `sink` in
    /// document order. Returns the new part text.
    ///
    /// A paragraph that fails to reconcile is left as it was and reported as a
    /// diagnostic. Only malformed XML or a failing sink is an error.
    pub fn process_part(
        &self,
        part: &str,
        xml_text: &str,
        sink: &mut dyn AuditSink,
    ) -> Result<(String, PartReport)> {
        let roots = xml::parse(xml_text)?;
        let paragraphs = collect_paragraphs(xml_text, &roots);

        let outcomes: Vec<ParagraphOutcome> = if self.parallel {
            paragraphs
                .par_iter()
                .enumerate()
                .map(|(i, p)| self.process_paragraph(part, i, p))
                .collect()
        } else {
            paragraphs
                .iter()
                .enumerate()
                .map(|(i, p)| self.process_paragraph(part, i, p))
                .collect()
        };

        let mut report = PartReport {
            part: part.to_string(),
            paragraphs: paragraphs.len(),
            ..PartReport::default()
        };
        let mut edits = Vec::new();
        for outcome in outcomes {
            if !outcome.records.is_empty() {
                report.changed += 1;
                report.spans += outcome.records.len();
            }
            for record in &outcome.records {
                sink.record(record)?;
            }
            report.diagnostics.extend(outcome.diagnostics);
            edits.extend(outcome.edits);
        }

        let output = apply_edits(xml_text, &mut edits)?;
        log::debug!(
            "{}: {} paragraphs, {} changed, {} spans",
            part,
            report.paragraphs,
            report.changed,
            report.spans
        );
        Ok((output, report))
    }

    fn process_paragraph(&self, part: &str, index: usize, paragraph: &Paragraph) -> ParagraphOutcome {
        let mut outcome = ParagraphOutcome::default();
        let logical = assemble(paragraph, &self.merge);
        if logical.is_empty() {
            return outcome;
        }

        let matched = match_rules(&logical, &self.rules);
        for failure in matched.failures {
            outcome.diagnostics.push(Diagnostic {
                part: part.to_string(),
                paragraph: Some(index),
                message: format!("rule '{}' skipped: {}", failure.rule, failure.message),
            });
        }
        if matched.spans.is_empty() {
            return outcome;
        }

        match reconcile(paragraph, &logical, &matched.spans) {
            Ok(edits) => {
                outcome.records = matched
                    .spans
                    .iter()
                    .map(|span| audit_record(part, index, paragraph, &logical, span))
                    .collect();
                outcome.edits = edits;
            }
            Err(e) => {
                log::warn!("{} paragraph {}: left unchanged: {}", part, index + 1, e);
                outcome.diagnostics.push(Diagnostic {
                    part: part.to_string(),
                    paragraph: Some(index),
                    message: format!("left unchanged: {}", e),
                });
            }
        }
        outcome
    }
}

fn audit_record(
    part: &str,
    index: usize,
    paragraph: &Paragraph,
    logical: &LogicalText,
    span: &MatchSpan,
) -> AuditRecord {
    let segment_text = logical
        .offsets
        .locate(span.start)
        .and_then(|(seg, _)| paragraph.segments.get(seg))
        .and_then(|s| s.text())
        .unwrap_or_default()
        .to_string();
    let window_text = logical
        .window_at(span.start)
        .map(|w| logical.text[w.clone()].to_string())
        .unwrap_or_default();
    AuditRecord {
        part: part.to_string(),
        paragraph: index,
        rule: span.rule.clone(),
        original: span.matched.clone(),
        replacement: span.replacement.clone(),
        highlight: span.highlight,
        segment_text,
        window_text,
    }
}
