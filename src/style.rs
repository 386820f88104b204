//! Run formatting and review highlights.

use crate::error::{ProofError, Result};
use crate::xml::{self, escape_text};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Highlight colour marking an automated edit.
///
/// The variants are the `ST_HighlightColor` values Word renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Highlight {
    Yellow,
    Green,
    Cyan,
    Magenta,
    Blue,
    Red,
    DarkBlue,
    DarkCyan,
    DarkGreen,
    DarkMagenta,
    DarkRed,
    DarkYellow,
    DarkGray,
    LightGray,
    Black,
}

impl Highlight {
    pub const ALL: [Highlight; 15] = [
        Highlight::Yellow,
        Highlight::Green,
        Highlight::Cyan,
        Highlight::Magenta,
        Highlight::Blue,
        Highlight::Red,
        Highlight::DarkBlue,
        Highlight::DarkCyan,
        Highlight::DarkGreen,
        Highlight::DarkMagenta,
        Highlight::DarkRed,
        Highlight::DarkYellow,
        Highlight::DarkGray,
        Highlight::LightGray,
        Highlight::Black,
    ];

    /// Attribute value written to `w:highlight/@w:val`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Highlight::Yellow => "yellow",
            Highlight::Green => "green",
            Highlight::Cyan => "cyan",
            Highlight::Magenta => "magenta",
            Highlight::Blue => "blue",
            Highlight::Red => "red",
            Highlight::DarkBlue => "darkBlue",
            Highlight::DarkCyan => "darkCyan",
            Highlight::DarkGreen => "darkGreen",
            Highlight::DarkMagenta => "darkMagenta",
            Highlight::DarkRed => "darkRed",
            Highlight::DarkYellow => "darkYellow",
            Highlight::DarkGray => "darkGray",
            Highlight::LightGray => "lightGray",
            Highlight::Black => "black",
        }
    }
}

impl fmt::Display for Highlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Highlight {
    type Err = String;

    /// Case-insensitive. `purple` is accepted as `magenta` since Word has no purple highlight.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("purple") {
            return Ok(Highlight::Magenta);
        }
        Highlight::ALL
            .iter()
            .copied()
            .find(|h| h.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown highlight colour '{}'", s))
    }
}

/// `w:rPr` children that the schema orders after `w:highlight`.
const AFTER_HIGHLIGHT: &[&str] = &[
    "w:u",
    "w:effect",
    "w:bdr",
    "w:shd",
    "w:fitText",
    "w:vertAlign",
    "w:rtl",
    "w:cs",
    "w:em",
    "w:lang",
    "w:eastAsianLayout",
    "w:specVanish",
    "w:oMath",
    "w:rPrChange",
];

/// Formatting of a run: its start tag and its `w:rPr` element, held as text.
///
/// Values are immutable; every split gets its own clone and highlighting
/// produces a new value, so no two runs ever share a mutable style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStyle {
    open_tag: String,
    properties: Option<String>,
}

impl RunStyle {
    pub fn new(open_tag: impl Into<String>, properties: Option<String>) -> Self {
        Self {
            open_tag: open_tag.into(),
            properties,
        }
    }

    /// Plain `<w:r>` without properties.
    pub fn plain() -> Self {
        Self::new("<w:r>", None)
    }

    pub fn open_tag(&self) -> &str {
        &self.open_tag
    }

    pub fn properties(&self) -> Option<&str> {
        self.properties.as_deref()
    }

    /// Copy of this style with `highlight` layered on top.
    ///
    /// An existing `w:highlight` is replaced; every other property is kept.
    pub fn with_highlight(&self, highlight: Highlight) -> Result<RunStyle> {
        let tag = format!(r#"<w:highlight w:val="{}"/>"#, highlight.as_str());
        let properties = match self.properties.as_deref() {
            None => format!("<w:rPr>{}</w:rPr>", tag),
            Some(rpr) => insert_highlight(rpr, &tag)?,
        };
        Ok(RunStyle {
            open_tag: self.open_tag.clone(),
            properties: Some(properties),
        })
    }

    /// Render a complete run carrying `text` in this style.
    pub fn render_run(&self, text: &str) -> String {
        self.render_run_with("", text)
    }

    /// Like [`render_run`](Self::render_run), with `leading` content placed
    /// between the properties and the text.
    pub fn render_run_with(&self, leading: &str, text: &str) -> String {
        format!(
            r#"{}{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
            self.reopen(),
            leading,
            escape_text(text)
        )
    }

    /// Start tag and properties of a run in this style, without content.
    pub fn reopen(&self) -> String {
        format!("{}{}", self.open_tag, self.properties.as_deref().unwrap_or(""))
    }
}

fn insert_highlight(rpr: &str, tag: &str) -> Result<String> {
    let roots = xml::parse(rpr)?;
    let root = match roots.as_slice() {
        [root] if root.is("w:rPr") => root,
        _ => {
            return Err(ProofError::Reconcile(format!(
                "run properties are not a single <w:rPr>: {}",
                rpr
            )))
        }
    };

    if root.self_closing {
        return Ok(format!("<w:rPr>{}</w:rPr>", tag));
    }

    let mut out = rpr.to_string();
    if let Some(existing) = root.child("w:highlight") {
        out.replace_range(existing.outer.clone(), tag);
        return Ok(out);
    }
    let at = root
        .children
        .iter()
        .find(|c| AFTER_HIGHLIGHT.contains(&c.name.as_str()))
        .map(|c| c.outer.start)
        .unwrap_or(root.inner.end);
    out.insert_str(at, tag);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_parse() {
        assert_eq!("blue".parse::<Highlight>().unwrap(), Highlight::Blue);
        assert_eq!("darkBlue".parse::<Highlight>().unwrap(), Highlight::DarkBlue);
        assert_eq!("DARKBLUE".parse::<Highlight>().unwrap(), Highlight::DarkBlue);
        assert_eq!("purple".parse::<Highlight>().unwrap(), Highlight::Magenta);
        assert!("orange".parse::<Highlight>().is_err());
    }

    #[test]
    fn test_highlight_without_properties() {
        let style = RunStyle::plain().with_highlight(Highlight::Green).unwrap();
        assert_eq!(
            style.properties(),
            Some(r#"<w:rPr><w:highlight w:val="green"/></w:rPr>"#)
        );
    }

    #[test]
    fn test_highlight_schema_position() {
        let base = RunStyle::new(
            "<w:r>",
            Some(r#"<w:rPr><w:b/><w:sz w:val="21"/><w:u w:val="single"/><w:lang w:eastAsia="ja-JP"/></w:rPr>"#.to_string()),
        );
        let marked = base.with_highlight(Highlight::Blue).unwrap();
        assert_eq!(
            marked.properties(),
            Some(r#"<w:rPr><w:b/><w:sz w:val="21"/><w:highlight w:val="blue"/><w:u w:val="single"/><w:lang w:eastAsia="ja-JP"/></w:rPr>"#)
        );
        // the source value is untouched
        assert!(!base.properties().unwrap().contains("highlight"));
    }

    #[test]
    fn test_highlight_replaces_existing() {
        let base = RunStyle::new(
            "<w:r>",
            Some(r#"<w:rPr><w:i/><w:highlight w:val="yellow"/></w:rPr>"#.to_string()),
        );
        let marked = base.with_highlight(Highlight::Red).unwrap();
        assert_eq!(
            marked.properties(),
            Some(r#"<w:rPr><w:i/><w:highlight w:val="red"/></w:rPr>"#)
        );
    }

    #[test]
    fn test_highlight_empty_rpr() {
        let base = RunStyle::new("<w:r>", Some("<w:rPr/>".to_string()));
        let marked = base.with_highlight(Highlight::Cyan).unwrap();
        assert_eq!(
            marked.properties(),
            Some(r#"<w:rPr><w:highlight w:val="cyan"/></w:rPr>"#)
        );
    }

    #[test]
    fn test_render_run_escapes() {
        let style = RunStyle::new(r#"<w:r w:rsidR="00A1">"#, Some("<w:rPr><w:b/></w:rPr>".to_string()));
        assert_eq!(
            style.render_run("a<b"),
            r#"<w:r w:rsidR="00A1"><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">a&lt;b</w:t></w:r>"#
        );
    }
}
