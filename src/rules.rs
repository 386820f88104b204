//! Rewrite rules: a pattern that finds candidates and a rewriter that turns
//! the captured groups into replacement text.

use crate::error::{ProofError, Result};
use crate::style::Highlight;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::ops::Range;
use std::path::Path;

// ─── Width folding ───────────────────────────────────────────────────────────

/// Half-width form of a full-width ASCII variant or the ideographic space.
pub fn to_half_width(c: char) -> Option<char> {
    match c {
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0),
        '\u{3000}' => Some(' '),
        _ => None,
    }
}

/// Full-width form of a printable ASCII character.
pub fn to_full_width(c: char) -> Option<char> {
    match c {
        '!'..='~' => char::from_u32(c as u32 + 0xFEE0),
        ' ' => Some('\u{3000}'),
        _ => None,
    }
}

fn fold_half_width(text: &str) -> String {
    text.chars().map(|c| to_half_width(c).unwrap_or(c)).collect()
}

// ─── Scripts and preconditions ──────────────────────────────────────────────

/// Writing systems a rule can require in the paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Hiragana, katakana or CJK ideographs.
    Japanese,
    /// ASCII or full-width Latin letters.
    Latin,
}

impl Script {
    pub fn occurs_in(&self, text: &str) -> bool {
        lazy_static::lazy_static! {
            static ref JAPANESE: Regex =
                Regex::new(r"[ぁ-んァ-ヶ一-龠々〆ー]").expect("invalid regex");
            static ref LATIN: Regex = Regex::new(r"[A-Za-zＡ-Ｚａ-ｚ]").expect("invalid regex");
        }
        match self {
            Script::Japanese => JAPANESE.is_match(text),
            Script::Latin => LATIN.is_match(text),
        }
    }
}

/// Paragraph-level condition checked once before a rule scans.
#[derive(Debug, Clone)]
pub enum Precondition {
    ContainsScript(Script),
    Matches(Regex),
}

impl Precondition {
    pub fn holds(&self, text: &str) -> bool {
        match self {
            Precondition::ContainsScript(script) => script.occurs_in(text),
            Precondition::Matches(re) => re.is_match(text),
        }
    }
}

// ─── Guards (look-around) ───────────────────────────────────────────────────

/// Context test on the text right before or after a candidate match.
#[derive(Debug, Clone)]
pub enum Guard {
    FollowedBy(Regex),
    NotFollowedBy(Regex),
    PrecededBy(Regex),
    NotPrecededBy(Regex),
}

impl Guard {
    pub fn followed_by(pattern: &str) -> std::result::Result<Guard, regex::Error> {
        Ok(Guard::FollowedBy(Regex::new(&format!("^(?:{})", pattern))?))
    }

    pub fn not_followed_by(pattern: &str) -> std::result::Result<Guard, regex::Error> {
        Ok(Guard::NotFollowedBy(Regex::new(&format!("^(?:{})", pattern))?))
    }

    pub fn preceded_by(pattern: &str) -> std::result::Result<Guard, regex::Error> {
        Ok(Guard::PrecededBy(Regex::new(&format!("(?:{})$", pattern))?))
    }

    pub fn not_preceded_by(pattern: &str) -> std::result::Result<Guard, regex::Error> {
        Ok(Guard::NotPrecededBy(Regex::new(&format!("(?:{})$", pattern))?))
    }

    /// Whether a candidate at `start..end` of `window` passes.
    pub fn admits(&self, window: &str, start: usize, end: usize) -> bool {
        match self {
            Guard::FollowedBy(re) => re.is_match(&window[end..]),
            Guard::NotFollowedBy(re) => !re.is_match(&window[end..]),
            Guard::PrecededBy(re) => re.is_match(&window[..start]),
            Guard::NotPrecededBy(re) => !re.is_match(&window[..start]),
        }
    }
}

// ─── Captures and rewriters ─────────────────────────────────────────────────

/// One candidate found by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Logical-text byte range.
    pub range: Range<usize>,
    /// Group texts; index 0 is the whole match.
    pub groups: Vec<Option<String>>,
}

impl Capture {
    pub fn matched(&self) -> &str {
        self.groups
            .first()
            .and_then(|g| g.as_deref())
            .unwrap_or("")
    }

    fn group(&self, index: usize) -> &str {
        self.groups
            .get(index)
            .and_then(|g| g.as_deref())
            .unwrap_or("")
    }
}

/// Turns a capture into replacement text. Pure: depends only on the capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    Literal(String),
    /// `$1` / `${1}` group references, `$$` for a dollar sign.
    Template(String),
    /// Template expansion followed by folding full-width ASCII to half-width.
    NarrowTemplate(String),
    /// Every character of the match to its half-width form.
    HalfWidth,
    /// Every character of the match to its full-width form.
    FullWidth,
    /// Character table; characters not in the table are kept.
    Map(BTreeMap<char, String>),
    /// The first rewrite, then the second applied to its output as a whole.
    Then(Box<Rewrite>, Box<Rewrite>),
}

impl Rewrite {
    /// Build a [`Rewrite::Map`] from `(from, to)` pairs.
    pub fn map(pairs: &[(char, &str)]) -> Rewrite {
        Rewrite::Map(pairs.iter().map(|(k, v)| (*k, v.to_string())).collect())
    }

    pub fn apply(&self, capture: &Capture) -> std::result::Result<String, String> {
        match self {
            Rewrite::Literal(text) => Ok(text.clone()),
            Rewrite::Template(template) => expand(template, capture),
            Rewrite::NarrowTemplate(template) => Ok(fold_half_width(&expand(template, capture)?)),
            Rewrite::HalfWidth => capture
                .matched()
                .chars()
                .map(|c| to_half_width(c).ok_or_else(|| format!("no half-width form for '{}'", c)))
                .collect(),
            Rewrite::FullWidth => capture
                .matched()
                .chars()
                .map(|c| to_full_width(c).ok_or_else(|| format!("no full-width form for '{}'", c)))
                .collect(),
            Rewrite::Map(table) => Ok(capture
                .matched()
                .chars()
                .map(|c| table.get(&c).cloned().unwrap_or_else(|| c.to_string()))
                .collect()),
            Rewrite::Then(first, second) => {
                let text = first.apply(capture)?;
                second.apply(&Capture {
                    range: capture.range.clone(),
                    groups: vec![Some(text)],
                })
            }
        }
    }

    /// Template whose group references must exist in the pattern.
    fn template(&self) -> Option<&str> {
        match self {
            Rewrite::Template(t) | Rewrite::NarrowTemplate(t) => Some(t),
            Rewrite::Then(first, _) => first.template(),
            _ => None,
        }
    }
}

enum Piece<'a> {
    Text(&'a str),
    Group(usize),
}

fn parse_template(template: &str) -> std::result::Result<Vec<Piece<'_>>, String> {
    let mut pieces = Vec::new();
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        if pos > 0 {
            pieces.push(Piece::Text(&rest[..pos]));
        }
        let after = &rest[pos + 1..];
        if let Some(tail) = after.strip_prefix('$') {
            pieces.push(Piece::Text("$"));
            rest = tail;
        } else if let Some(braced) = after.strip_prefix('{') {
            let close = braced
                .find('}')
                .ok_or_else(|| format!("unterminated '${{' in '{}'", template))?;
            let index = braced[..close]
                .parse()
                .map_err(|_| format!("bad group reference '${{{}}}'", &braced[..close]))?;
            pieces.push(Piece::Group(index));
            rest = &braced[close + 1..];
        } else {
            let digits = after.chars().take_while(char::is_ascii_digit).count();
            if digits == 0 {
                return Err(format!("'$' must be followed by a group number in '{}'", template));
            }
            let index = after[..digits]
                .parse()
                .map_err(|_| format!("bad group reference in '{}'", template))?;
            pieces.push(Piece::Group(index));
            rest = &after[digits..];
        }
    }
    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    Ok(pieces)
}

fn expand(template: &str, capture: &Capture) -> std::result::Result<String, String> {
    let mut out = String::new();
    for piece in parse_template(template)? {
        match piece {
            Piece::Text(t) => out.push_str(t),
            Piece::Group(i) => out.push_str(capture.group(i)),
        }
    }
    Ok(out)
}

// ─── Rules ──────────────────────────────────────────────────────────────────

/// A named rewrite rule.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    pattern: Regex,
    rewrite: Rewrite,
    highlight: Highlight,
    precondition: Option<Precondition>,
    guards: Vec<Guard>,
}

impl Rule {
    /// Compile a rule. Template group references are checked against the pattern.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        rewrite: Rewrite,
        highlight: Highlight,
    ) -> Result<Rule> {
        let name = name.into();
        let invalid = |message: String| ProofError::InvalidRule {
            name: name.clone(),
            message,
        };
        let pattern = Regex::new(pattern).map_err(|e| invalid(e.to_string()))?;
        if let Some(template) = rewrite.template() {
            for piece in parse_template(template).map_err(invalid)? {
                if let Piece::Group(i) = piece {
                    if i >= pattern.captures_len() {
                        return Err(invalid(format!(
                            "template refers to group {} but the pattern has {}",
                            i,
                            pattern.captures_len() - 1
                        )));
                    }
                }
            }
        }
        Ok(Rule {
            name,
            pattern,
            rewrite,
            highlight,
            precondition: None,
            guards: Vec::new(),
        })
    }

    pub fn requires(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn highlight(&self) -> Highlight {
        self.highlight
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Precondition check against the paragraph's full logical text.
    pub fn applies_to(&self, text: &str) -> bool {
        self.precondition
            .as_ref()
            .map_or(true, |p| p.holds(text))
    }

    /// Leftmost-first, non-overlapping candidates inside `window` of `text`.
    ///
    /// Empty matches are skipped. A candidate rejected by a guard lets the scan
    /// resume one character after its start, as a failed look-around would.
    pub fn find(&self, text: &str, window: Range<usize>) -> Vec<Capture> {
        let hay = &text[window.clone()];
        let mut found = Vec::new();
        let mut pos = 0;
        while pos <= hay.len() {
            let Some(caps) = self.pattern.captures_at(hay, pos) else {
                break;
            };
            let Some(m) = caps.get(0) else {
                break;
            };
            if m.start() == m.end() {
                pos = next_char(hay, m.end());
                continue;
            }
            if !self.guards.iter().all(|g| g.admits(hay, m.start(), m.end())) {
                pos = next_char(hay, m.start());
                continue;
            }
            found.push(Capture {
                range: window.start + m.start()..window.start + m.end(),
                groups: caps
                    .iter()
                    .map(|g| g.map(|g| g.as_str().to_string()))
                    .collect(),
            });
            pos = m.end();
        }
        found
    }

    /// Replacement text for `capture`.
    pub fn rewrite(&self, capture: &Capture) -> Result<String> {
        self.rewrite
            .apply(capture)
            .map_err(|message| ProofError::Rewrite {
                rule: self.name.clone(),
                matched: capture.matched().to_string(),
                message,
            })
    }
}

fn next_char(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| pos + c.len_utf8())
}

// ─── Rule sets ──────────────────────────────────────────────────────────────

/// Ordered rules. Order is the tie-break when matches start at the same offset.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Character-class proofreading for Japanese business documents.
    ///
    /// Applying the set to its own output finds nothing further. The bracket
    /// rules rewrite their interior the way the letter, digit and symbol rules
    /// would, since those rules lose to the bracket span on the same pass.
    pub fn japanese_proofreading() -> RuleSet {
        let build = || -> Result<RuleSet> {
            Ok(RuleSet::new()
                .with(Rule::new(
                    "括弧内が英数字のみの全角括弧を半角に変換",
                    r"（([0-9０-９]{1,2}|[a-zａ-ｚ]|[a-zａ-ｚ][-－][0-9０-９]{1,2}(?:[-－][0-9０-９]{1,2})?)）",
                    Rewrite::NarrowTemplate("($1)".to_string()),
                    Highlight::Magenta,
                )?)
                .with(
                    Rule::new(
                        "和文を囲む半角括弧を全角に変換",
                        r"\(([^0-9A-Za-z０-９Ａ-Ｚａ-ｚ()（）]+)\)",
                        Rewrite::Then(
                            Box::new(Rewrite::Template("（$1）".to_string())),
                            Box::new(Rewrite::Map(symbol_table())),
                        ),
                        Highlight::Magenta,
                    )?
                    .requires(Precondition::ContainsScript(Script::Japanese)),
                )
                .with(
                    Rule::new(
                        "全角英字を半角英字に変換",
                        r"[Ａ-Ｚａ-ｚ]",
                        Rewrite::HalfWidth,
                        Highlight::Blue,
                    )?
                    .guard(Guard::not_followed_by("．").map_err(|e| {
                        ProofError::InvalidRule {
                            name: "全角英字を半角英字に変換".to_string(),
                            message: e.to_string(),
                        }
                    })?),
                )
                .with(Rule::new(
                    "全角数字を半角数字に変換",
                    r"[０-９]",
                    Rewrite::HalfWidth,
                    Highlight::Green,
                )?)
                .with(Rule::new(
                    "全角記号を半角記号に変換",
                    &format!("[{}]", NARROWED_SYMBOLS),
                    Rewrite::HalfWidth,
                    Highlight::Red,
                )?)
                .with(Rule::new(
                    "半角記号を全角記号に変換",
                    &format!(
                        "[{}]",
                        WIDENED_SYMBOLS.iter().map(|(c, _)| *c).collect::<String>()
                    ),
                    Rewrite::map(WIDENED_SYMBOLS),
                    Highlight::Yellow,
                )?))
        };
        build().expect("built-in rule is valid")
    }

    /// Load rules from CSV with a header row.
    ///
    /// Columns: `name,pattern,rewrite,argument,highlight,requires,followed_by,
    /// not_followed_by,preceded_by,not_preceded_by`; only the first five are
    /// required. `rewrite` is one of `literal`, `template`, `narrow-template`,
    /// `half-width`, `full-width`, `map` (argument `ａ=a ｂ=b`); `requires` is
    /// `japanese`, `latin` or `regex:<pattern>`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<RuleSet> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let mut set = RuleSet::new();
        for record in csv_reader.deserialize::<RuleRecord>() {
            set.push(record?.into_rule()?);
        }
        Ok(set)
    }

    pub fn from_csv_path(path: &Path) -> Result<RuleSet> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }
}

/// Full-width symbols narrowed by the built-in set.
const NARROWED_SYMBOLS: &str = "！＂＃＄＆＇＜＞＠［＼］＾＿｀｛｜｝／";

/// Half-width symbols widened by the built-in set. None needs escaping in a class.
const WIDENED_SYMBOLS: &[(char, &str)] = &[
    ('~', "〜"),
    (':', "："),
    ('%', "％"),
    ('+', "＋"),
    ('*', "×"),
    ('=', "＝"),
];

/// Both symbol tables of the built-in set as one character map.
fn symbol_table() -> BTreeMap<char, String> {
    let mut table: BTreeMap<char, String> = NARROWED_SYMBOLS
        .chars()
        .filter_map(|c| to_half_width(c).map(|h| (c, h.to_string())))
        .collect();
    table.extend(WIDENED_SYMBOLS.iter().map(|(c, s)| (*c, s.to_string())));
    table
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

type GuardBuilder = fn(&str) -> std::result::Result<Guard, regex::Error>;

#[derive(Debug, Deserialize)]
struct RuleRecord {
    name: String,
    pattern: String,
    rewrite: String,
    #[serde(default)]
    argument: Option<String>,
    highlight: String,
    #[serde(default)]
    requires: Option<String>,
    #[serde(default)]
    followed_by: Option<String>,
    #[serde(default)]
    not_followed_by: Option<String>,
    #[serde(default)]
    preceded_by: Option<String>,
    #[serde(default)]
    not_preceded_by: Option<String>,
}

impl RuleRecord {
    fn into_rule(self) -> Result<Rule> {
        let name = self.name.clone();
        let invalid = |message: String| ProofError::InvalidRule {
            name: name.clone(),
            message,
        };
        let argument = self.argument.unwrap_or_default();
        let rewrite = match self.rewrite.trim() {
            "literal" => Rewrite::Literal(argument),
            "template" => Rewrite::Template(argument),
            "narrow-template" => Rewrite::NarrowTemplate(argument),
            "half-width" => Rewrite::HalfWidth,
            "full-width" => Rewrite::FullWidth,
            "map" => Rewrite::Map(parse_map(&argument).map_err(invalid)?),
            other => return Err(invalid(format!("unknown rewrite '{}'", other))),
        };
        let highlight: Highlight = self.highlight.parse().map_err(invalid)?;
        let mut rule = Rule::new(self.name.as_str(), &self.pattern, rewrite, highlight)?;

        if let Some(requires) = self.requires.as_deref().map(str::trim) {
            let precondition = match requires {
                "japanese" => Precondition::ContainsScript(Script::Japanese),
                "latin" => Precondition::ContainsScript(Script::Latin),
                other => match other.strip_prefix("regex:") {
                    Some(p) => Precondition::Matches(
                        Regex::new(p).map_err(|e| invalid(e.to_string()))?,
                    ),
                    None => return Err(invalid(format!("unknown precondition '{}'", other))),
                },
            };
            rule = rule.requires(precondition);
        }

        let guards: [(Option<String>, GuardBuilder); 4] = [
            (self.followed_by, Guard::followed_by),
            (self.not_followed_by, Guard::not_followed_by),
            (self.preceded_by, Guard::preceded_by),
            (self.not_preceded_by, Guard::not_preceded_by),
        ];
        for (pattern, build) in guards {
            if let Some(p) = pattern {
                rule = rule.guard(build(&p).map_err(|e| invalid(e.to_string()))?);
            }
        }
        Ok(rule)
    }
}

/// Parse `ａ=a ＝==` style tables: key character, `=`, value up to whitespace.
fn parse_map(argument: &str) -> std::result::Result<BTreeMap<char, String>, String> {
    let mut table = BTreeMap::new();
    for entry in argument.split_whitespace() {
        let mut chars = entry.chars();
        let key = chars.next().ok_or_else(|| "empty map entry".to_string())?;
        if chars.next() != Some('=') {
            return Err(format!("map entry '{}' is not of the form x=y", entry));
        }
        table.insert(key, chars.as_str().to_string());
    }
    if table.is_empty() {
        return Err("map rewrite needs at least one entry".to_string());
    }
    Ok(table)
}
