//! Rendering strategy chosen from an entry's name.

/// How an entry's content is rendered in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Pretty-printed XML
    Xml,
    /// Raw bytes, copied verbatim
    PlainText,
    /// Size and CRC32 summary
    Binary,
}

/// Classify an entry by its file extension.
///
/// Suffix matches are case-sensitive and the content is never inspected, so
/// `a.XML` is [`Classification::Binary`].
pub fn classify(name: &str) -> Classification {
    if name.ends_with(".xml") || name.ends_with(".xhtml") {
        Classification::Xml
    } else if name.ends_with(".txt") {
        Classification::PlainText
    } else {
        Classification::Binary
    }
}
