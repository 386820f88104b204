//! Minimal XML element scanner that keeps byte ranges into the source text.
//!
//! Parts are never re-serialized from a DOM. The engine only replaces the byte
//! ranges of runs it rewrites, so everything else in a part (declaration,
//! namespace declarations, attribute order, whitespace) survives byte-for-byte.

use crate::error::{ProofError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::ops::Range;

/// An element located in a part, with its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written, e.g. `w:r`.
    pub name: String,
    /// From `<` of the start tag to `>` of the end tag.
    pub outer: Range<usize>,
    /// Content between the start and end tags (empty for `<x/>`).
    pub inner: Range<usize>,
    pub self_closing: bool,
    pub children: Vec<Element>,
}

impl Element {
    /// True when the qualified name equals `name`.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// The start tag text (`<w:r w:rsidR="..">`), or the whole element when self-closing.
    pub fn start_tag<'a>(&self, xml: &'a str) -> &'a str {
        if self.self_closing {
            &xml[self.outer.clone()]
        } else {
            &xml[self.outer.start..self.inner.start]
        }
    }

    pub fn outer_text<'a>(&self, xml: &'a str) -> &'a str {
        &xml[self.outer.clone()]
    }

    pub fn inner_text<'a>(&self, xml: &'a str) -> &'a str {
        &xml[self.inner.clone()]
    }

    /// First direct child with the given qualified name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(name))
    }
}

/// Scan `xml` into a forest of top-level elements.
pub fn parse(xml: &str) -> Result<Vec<Element>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut roots: Vec<Element> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| ProofError::Xml {
            position: reader.buffer_position(),
            message: e.to_string(),
        })?;
        let end = reader.buffer_position();
        match event {
            Event::Start(e) => {
                let start = tag_start(xml, end)?;
                stack.push(Element {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    outer: start..end,
                    inner: end..end,
                    self_closing: false,
                    children: Vec::new(),
                });
            }
            Event::Empty(e) => {
                let start = tag_start(xml, end)?;
                let element = Element {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    outer: start..end,
                    inner: end..end,
                    self_closing: true,
                    children: Vec::new(),
                };
                attach(&mut stack, &mut roots, element);
            }
            Event::End(_) => {
                let start = tag_start(xml, end)?;
                let mut element = stack.pop().ok_or_else(|| ProofError::Xml {
                    position: start,
                    message: "unexpected closing tag".to_string(),
                })?;
                element.inner = element.inner.start..start;
                element.outer = element.outer.start..end;
                attach(&mut stack, &mut roots, element);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ProofError::Xml {
            position: open.outer.start,
            message: format!("unclosed element <{}>", open.name),
        });
    }
    Ok(roots)
}

fn attach(stack: &mut [Element], roots: &mut Vec<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => roots.push(element),
    }
}

/// Locate the `<` opening the tag that ends at `end`.
///
/// Raw `<` cannot occur inside a tag, so the nearest one to the left is the start.
fn tag_start(xml: &str, end: usize) -> Result<usize> {
    xml[..end].rfind('<').ok_or_else(|| ProofError::Xml {
        position: end,
        message: "tag without opening '<'".to_string(),
    })
}

/// Decode character and entity references in element content.
pub fn unescape_text(raw: &str) -> Result<Cow<'_, str>> {
    quick_xml::escape::unescape(raw).map_err(|e| ProofError::Xml {
        position: 0,
        message: e.to_string(),
    })
}

/// Escape `&`, `<` and `>` for element content.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    quick_xml::escape::partial_escape(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ranges() {
        let xml = r#"<?xml version="1.0"?><w:p><w:r><w:t>ab</w:t></w:r><w:br/></w:p>"#;
        let roots = parse(xml).unwrap();
        assert_eq!(roots.len(), 1);
        let p = &roots[0];
        assert_eq!(p.name, "w:p");
        assert_eq!(p.outer_text(xml), &xml[21..]);
        assert_eq!(p.children.len(), 2);

        let run = &p.children[0];
        assert_eq!(run.outer_text(xml), "<w:r><w:t>ab</w:t></w:r>");
        assert_eq!(run.start_tag(xml), "<w:r>");
        assert_eq!(run.child("w:t").unwrap().inner_text(xml), "ab");

        let br = &p.children[1];
        assert!(br.self_closing);
        assert_eq!(br.start_tag(xml), "<w:br/>");
    }

    #[test]
    fn test_attribute_with_gt() {
        let xml = r#"<a x="1>2"><b/></a>"#;
        let roots = parse(xml).unwrap();
        assert_eq!(roots[0].start_tag(xml), r#"<a x="1>2">"#);
        assert_eq!(roots[0].children[0].outer_text(xml), "<b/>");
    }

    #[test]
    fn test_mismatched_is_error() {
        assert!(parse("<a><b></a>").is_err());
        assert!(parse("<a><b/>").is_err());
    }

    #[test]
    fn test_escape_roundtrip_entities() {
        assert_eq!(unescape_text("a&amp;b&lt;c").unwrap(), "a&b<c");
        assert_eq!(escape_text("a&b<c>"), "a&amp;b&lt;c&gt;");
        assert_eq!(escape_text("（あ）\"'"), "（あ）\"'");
    }
}
