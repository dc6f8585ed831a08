//! Document acquisition and parsing.
//!
//! Bytes come from a [`source::InputSource`], are parsed by either the tolerant HTML parser or the strict XML parser
//! (see [`ParseMode`]), and end up in the same read-only [`Document`] arena.

mod encoding;
mod parse_html;
mod parse_xml;
pub mod serialize;
pub mod source;
mod tree;

pub use source::{resolve, ByteSource, Input, InputSource, SourceError, FALLBACK_DOCUMENT};
pub use tree::*;

pub(crate) use tree::TreeBuilder;

/// How to turn input bytes into a [`Document`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParseMode {
    /// Recovering HTML parser: unclosed tags, bad nesting and stray text are repaired, never rejected.
    #[default]
    Tolerant,
    /// Strict XML: any well-formedness error fails the parse.
    Raw,
}

/// A document that could not be parsed. Only raw mode produces these.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("{message} (at byte {position})")]
    Syntax { position: u64, message: String },

    #[error("input is not valid {encoding}")]
    Encoding { encoding: &'static str },
}

/// Parses `bytes` into a [`Document`] using the given mode.
pub fn parse(bytes: &[u8], mode: ParseMode) -> Result<Document, ParseError> {
    match mode {
        ParseMode::Tolerant => Ok(parse_html::parse_html(bytes)),
        ParseMode::Raw => parse_xml::parse_xml(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::utils_for_test::*;

    #[test]
    fn malformed_markup_is_tolerated_but_not_raw() {
        let input = b"<div><span></div>";
        let doc = parse(input, ParseMode::Tolerant).unwrap();
        assert_eq!(doc.mode(), ParseMode::Tolerant);

        unwrap!(parse(input, ParseMode::Raw), Err(ParseError::Syntax { .. }));
    }

    #[test]
    fn fallback_document_parses_in_both_modes() {
        for mode in [ParseMode::Tolerant, ParseMode::Raw] {
            let doc = parse(FALLBACK_DOCUMENT, mode).unwrap();
            let root = doc.root_element().unwrap();
            assert_eq!(doc.name(root), Some("html"));
        }
    }
}
