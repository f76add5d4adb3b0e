//! Entry renderers.
//!
//! Each renderer appends the body of one transcript block to a byte buffer:
//! pretty-printed XML, verbatim text, or a size/CRC32 summary.

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::checksum::CheckedBuffer;
use crate::classify::Classification;
use crate::error::XmlError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// XML pretty-printing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlStyle {
    pub indent_char: u8,
    pub indent_size: usize,
    pub omit_declaration: bool,
}

impl Default for XmlStyle {
    /// Two-space indentation without an XML declaration.
    fn default() -> Self {
        Self {
            indent_char: b' ',
            indent_size: 2,
            omit_declaration: true,
        }
    }
}

/// Render the captured bytes of an entry according to its classification.
pub fn render(
    classification: Classification,
    buf: &CheckedBuffer,
    style: &XmlStyle,
    out: &mut Vec<u8>,
) -> Result<(), XmlError> {
    match classification {
        Classification::Xml => render_xml(buf.as_bytes(), style, out),
        Classification::PlainText => {
            render_text(buf.as_bytes(), out);
            Ok(())
        }
        Classification::Binary => {
            render_binary(buf.len(), buf.crc32(), out);
            Ok(())
        }
    }
}

/// Copy text content verbatim; no newline is added.
pub fn render_text(data: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(data);
}

/// Size and checksum lines for opaque content.
///
/// The CRC is lowercase hex without zero padding.
pub fn render_binary(size: u64, crc32: u32, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("File size:\t{size}\nChecksum:\t{crc32:x}\n").as_bytes());
}

/// Parse `data` as an XML document and write it re-indented, followed by a newline.
///
/// Whitespace-only text is dropped, other text is kept verbatim and keeps its
/// element on one line. Elements without content become empty-element tags.
/// Nothing is written to `out` when the document is malformed: besides what
/// the tokenizer reports, this covers invalid UTF-8, bare `&` and unknown
/// entities, invalid element and attribute names, and `<` in attribute values.
pub fn render_xml(data: &[u8], style: &XmlStyle, out: &mut Vec<u8>) -> Result<(), XmlError> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    let mut reader = Reader::from_reader(data);
    reader.config_mut().check_end_names = true;
    let decoder = reader.decoder();

    let mut writer = Writer::new_with_indent(Vec::new(), style.indent_char, style.indent_size);
    let mut open: Vec<String> = Vec::new();
    let mut roots = 0usize;
    // Start tag held back until we know whether the element has content
    let mut pending: Option<BytesStart> = None;

    loop {
        let event = reader.read_event()?;

        if let Event::Text(ref text) = event {
            if text.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
        }

        if let Some(start) = pending.take() {
            if let Event::End(_) = event {
                open.pop();
                writer.write_event(Event::Empty(start))?;
                continue;
            }
            writer.write_event(Event::Start(start))?;
        }

        match event {
            Event::Start(start) => {
                let name = check_element(&start, decoder)?;
                if open.is_empty() {
                    roots += 1;
                    check_single_root(roots)?;
                }
                open.push(name);
                pending = Some(start);
            }
            Event::End(end) => {
                open.pop();
                writer.write_event(Event::End(end))?;
            }
            Event::Empty(empty) => {
                check_element(&empty, decoder)?;
                if open.is_empty() {
                    roots += 1;
                    check_single_root(roots)?;
                }
                writer.write_event(Event::Empty(empty))?;
            }
            Event::Text(_) | Event::CData(_) if open.is_empty() => {
                return Err(XmlError::Structure(
                    "content outside of the root element".to_string(),
                ));
            }
            Event::Text(text) => {
                text.unescape()?;
                writer.write_event(Event::Text(text))?;
            }
            Event::Decl(decl) => {
                if !style.omit_declaration {
                    writer.write_event(Event::Decl(decl))?;
                }
            }
            Event::Eof => break,
            other => {
                decoder.decode(&other).map_err(quick_xml::Error::from)?;
                writer.write_event(other)?;
            }
        }
    }

    if let Some(name) = open.last() {
        return Err(XmlError::Structure(format!("element <{name}> is never closed")));
    }
    if roots == 0 {
        return Err(XmlError::Structure("no root element".to_string()));
    }

    out.extend_from_slice(&writer.into_inner());
    out.push(b'\n');
    Ok(())
}

/// Check the name and attributes of a start or empty tag, returning the name.
fn check_element(start: &BytesStart, decoder: Decoder) -> Result<String, XmlError> {
    let name = decode_name(start.name().as_ref(), decoder)?;

    for attr in start.attributes() {
        let attr = attr?;
        decode_name(attr.key.as_ref(), decoder)?;
        if attr.value.contains(&b'<') {
            return Err(XmlError::Structure(format!(
                "'<' in a value of attribute on <{name}>"
            )));
        }
        attr.unescape_value()?;
    }

    Ok(name)
}

fn decode_name(raw: &[u8], decoder: Decoder) -> Result<String, XmlError> {
    let name = decoder.decode(raw).map_err(quick_xml::Error::from)?;

    let mut chars = name.chars();
    let valid = chars.next().is_some_and(is_name_start) && chars.all(is_name_char);
    if !valid {
        return Err(XmlError::Structure(format!("invalid name '{name}'")));
    }
    Ok(name.into_owned())
}

// Name productions of XML 1.0 (fifth edition)
fn is_name_start(c: char) -> bool {
    matches!(c,
        ':' | '_' | 'A'..='Z' | 'a'..='z'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

fn check_single_root(roots: usize) -> Result<(), XmlError> {
    if roots > 1 {
        return Err(XmlError::Structure("more than one root element".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pretty(xml: &str) -> String {
        let mut out = Vec::new();
        render_xml(xml.as_bytes(), &XmlStyle::default(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn malformed(xml: &str) -> XmlError {
        let mut out = Vec::new();
        let err = render_xml(xml.as_bytes(), &XmlStyle::default(), &mut out).unwrap_err();
        assert!(out.is_empty());
        err
    }

    #[test]
    fn indents_nested_elements_by_two_spaces() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="urn:w"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;
        assert_eq!(
            pretty(xml),
            "<w:document xmlns:w=\"urn:w\">\n  <w:body>\n    <w:p>\n      <w:r>\n        <w:t>Hello</w:t>\n      </w:r>\n    </w:p>\n    <w:sectPr/>\n  </w:body>\n</w:document>\n"
        );
    }

    #[test]
    fn pretty_output_is_a_fixed_point() {
        let once = pretty("<a x=\"1\"><b>text &amp; more</b><c/><!-- note --><d><e/></d></a>");
        assert_eq!(pretty(&once), once);
    }

    #[test]
    fn keeps_declaration_when_asked() {
        let style = XmlStyle {
            omit_declaration: false,
            ..XmlStyle::default()
        };
        let mut out = Vec::new();
        render_xml(b"<?xml version=\"1.0\"?><a/>", &style, &mut out).unwrap();
        assert_eq!(out, b"<?xml version=\"1.0\"?>\n<a/>\n");
    }

    #[test]
    fn collapses_elements_without_content() {
        assert_eq!(pretty("<a><b></b><c>  </c></a>"), "<a>\n  <b/>\n  <c/>\n</a>\n");
    }

    #[test]
    fn strips_byte_order_mark() {
        assert_eq!(pretty("\u{feff}<a/>"), "<a/>\n");
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(malformed("<a><b></a>"), XmlError::Syntax(_)));
        malformed("<a><b></b>");
        assert!(matches!(malformed("<a/><b/>"), XmlError::Structure(_)));
        assert!(matches!(malformed("plain words"), XmlError::Structure(_)));
        assert!(matches!(malformed("   "), XmlError::Structure(_)));
        assert!(matches!(malformed("<a x=\"1\" x=\"2\"/>"), XmlError::Attribute(_)));
    }

    #[test]
    fn rejects_bad_references_names_and_encoding() {
        assert!(matches!(malformed("<a>AT&T</a>"), XmlError::Syntax(_)));
        assert!(matches!(malformed("<a>&nbsp;</a>"), XmlError::Syntax(_)));
        assert!(matches!(malformed("<a b=\"&copy;\"/>"), XmlError::Syntax(_)));
        assert!(matches!(malformed("<a b=\"<\"/>"), XmlError::Structure(_)));
        assert!(matches!(malformed("<1a/>"), XmlError::Structure(_)));
        assert!(matches!(malformed("<a><-b/></a>"), XmlError::Structure(_)));
        malformed("<a 2b=\"x\"/>");

        let mut out = Vec::new();
        let err = render_xml(b"<a>\xff\xfe</a>", &XmlStyle::default(), &mut out).unwrap_err();
        assert!(matches!(err, XmlError::Syntax(_)), "{err}");
        assert!(out.is_empty());
    }

    #[test]
    fn accepts_references_and_unicode_names() {
        assert_eq!(
            pretty("<d\u{e9}f x=\"&lt;&#65;&quot;\">a &amp; b &#x263A;</d\u{e9}f>"),
            "<d\u{e9}f x=\"&lt;&#65;&quot;\">a &amp; b &#x263A;</d\u{e9}f>\n"
        );
    }

    #[test]
    fn binary_summary_has_unpadded_hex() {
        let mut out = Vec::new();
        render_binary(10, 0xe38a6876, &mut out);
        render_binary(0, 0x00000abc, &mut out);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "File size:\t10\nChecksum:\te38a6876\nFile size:\t0\nChecksum:\tabc\n"
        );
    }

    #[test]
    fn dispatches_on_classification() {
        let mut buf = CheckedBuffer::new();
        buf.write(b"hello\n");

        let mut out = Vec::new();
        render(Classification::PlainText, &buf, &XmlStyle::default(), &mut out).unwrap();
        assert_eq!(out, b"hello\n");

        out.clear();
        render(Classification::Binary, &buf, &XmlStyle::default(), &mut out).unwrap();
        assert_eq!(out, b"File size:\t6\nChecksum:\t363a3020\n");
    }
}
