//! Runs a rule set over a paragraph's logical text and resolves overlaps.

use crate::assemble::LogicalText;
use crate::rules::RuleSet;
use crate::style::Highlight;

/// A committed substitution on the logical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    /// Logical byte offsets, end exclusive.
    pub start: usize,
    pub end: usize,
    pub replacement: String,
    pub highlight: Highlight,
    pub rule: String,
    pub matched: String,
}

/// A rule dropped for one paragraph because its rewriter failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule: String,
    pub message: String,
}

/// Candidate before conflict resolution; `order` is the rule's position in the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub order: usize,
    pub span: MatchSpan,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Sorted by `start`, pairwise non-overlapping.
    pub spans: Vec<MatchSpan>,
    pub failures: Vec<RuleFailure>,
}

/// Find every rule's candidates in `logical`, in rule order.
///
/// Every rule scans the original text, never another rule's output. A match
/// whose replacement equals the matched text is not an edit and is dropped.
pub fn find_raw(logical: &LogicalText, rules: &RuleSet) -> (Vec<RawMatch>, Vec<RuleFailure>) {
    let mut raw = Vec::new();
    let mut failures = Vec::new();

    for (order, rule) in rules.iter().enumerate() {
        if !rule.applies_to(&logical.text) {
            continue;
        }
        let mut found = Vec::new();
        let mut failed = None;
        'windows: for window in &logical.windows {
            for capture in rule.find(&logical.text, window.clone()) {
                match rule.rewrite(&capture) {
                    Ok(replacement) => {
                        if replacement == capture.matched() {
                            continue;
                        }
                        found.push(RawMatch {
                            order,
                            span: MatchSpan {
                                start: capture.range.start,
                                end: capture.range.end,
                                replacement,
                                highlight: rule.highlight(),
                                rule: rule.name().to_string(),
                                matched: capture.matched().to_string(),
                            },
                        });
                    }
                    Err(e) => {
                        failed = Some(e.to_string());
                        break 'windows;
                    }
                }
            }
        }
        match failed {
            Some(message) => {
                log::warn!("skipping rule '{}' for this paragraph: {}", rule.name(), message);
                failures.push(RuleFailure {
                    rule: rule.name().to_string(),
                    message,
                });
            }
            None => raw.extend(found),
        }
    }
    (raw, failures)
}

/// First-committed-wins: order by start, then rule order, and keep a match
/// only if it starts at or after the end of the last kept one.
pub fn resolve(mut raw: Vec<RawMatch>) -> Vec<MatchSpan> {
    raw.sort_by_key(|m| (m.span.start, m.order));
    let mut kept: Vec<MatchSpan> = Vec::new();
    let mut last_end = 0;
    for m in raw {
        if m.span.start >= last_end {
            last_end = m.span.end;
            kept.push(m.span);
        }
    }
    kept
}

/// Raw matching followed by conflict resolution.
pub fn match_rules(logical: &LogicalText, rules: &RuleSet) -> MatchOutcome {
    if logical.is_empty() || rules.is_empty() {
        return MatchOutcome::default();
    }
    let (raw, failures) = find_raw(logical, rules);
    MatchOutcome {
        spans: resolve(raw),
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::OffsetMap;
    use crate::rules::{Rewrite, Rule};

    fn logical(text: &str) -> LogicalText {
        LogicalText {
            text: text.to_string(),
            offsets: OffsetMap::default(),
            windows: vec![0..text.len()],
        }
    }

    fn raw(order: usize, start: usize, end: usize) -> RawMatch {
        RawMatch {
            order,
            span: MatchSpan {
                start,
                end,
                replacement: format!("r{}", order),
                highlight: Highlight::Blue,
                rule: format!("rule{}", order),
                matched: String::new(),
            },
        }
    }

    #[test]
    fn test_resolve_first_committed_wins() {
        let spans = resolve(vec![raw(1, 0, 3), raw(0, 2, 5), raw(0, 0, 1), raw(2, 5, 6)]);
        let got: Vec<(usize, usize, &str)> = spans
            .iter()
            .map(|s| (s.start, s.end, s.rule.as_str()))
            .collect();
        assert_eq!(got, vec![(0, 1, "rule0"), (2, 5, "rule0"), (5, 6, "rule2")]);
    }

    #[test]
    fn test_resolve_non_overlapping_output() {
        let spans = resolve(vec![raw(0, 4, 8), raw(1, 1, 6), raw(2, 0, 2), raw(3, 7, 9), raw(4, 9, 10)]);
        for pair in spans.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        assert_eq!(spans[0].start, 0);
    }

    #[test]
    fn test_full_and_half_width() {
        let rules = RuleSet::new()
            .with(Rule::new("letters", "[Ａ-Ｚ]", Rewrite::HalfWidth, Highlight::Blue).unwrap())
            .with(Rule::new("digits", "[０-９]", Rewrite::HalfWidth, Highlight::Green).unwrap());
        let outcome = match_rules(&logical("Ａ１"), &rules);
        assert_eq!(outcome.spans.len(), 2);
        assert_eq!(outcome.spans[0].replacement, "A");
        assert_eq!(outcome.spans[0].highlight, Highlight::Blue);
        assert_eq!(outcome.spans[1].replacement, "1");
        assert_eq!(outcome.spans[1].highlight, Highlight::Green);
    }

    #[test]
    fn test_identity_replacement_dropped() {
        let rules = RuleSet::new()
            .with(Rule::new("same", "÷", Rewrite::map(&[('÷', "÷")]), Highlight::Yellow).unwrap());
        assert!(match_rules(&logical("1÷2"), &rules).spans.is_empty());
    }

    #[test]
    fn test_failing_rule_skipped_others_apply() {
        let rules = RuleSet::new()
            .with(Rule::new("half", "[Ａあ]", Rewrite::HalfWidth, Highlight::Blue).unwrap())
            .with(Rule::new("digits", "[０-９]", Rewrite::HalfWidth, Highlight::Green).unwrap());
        let outcome = match_rules(&logical("Ａあ１"), &rules);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].rule, "half");
        assert_eq!(outcome.spans.len(), 1);
        assert_eq!(outcome.spans[0].rule, "digits");
    }

    #[test]
    fn test_matches_stay_in_windows() {
        let rules = RuleSet::new()
            .with(Rule::new("pair", "ab", Rewrite::Literal("X".into()), Highlight::Red).unwrap());
        let mut text = logical("ab");
        text.windows = vec![0..1, 1..2];
        assert!(match_rules(&text, &rules).spans.is_empty());
    }
}
