//! Character encoding detection.
//!
//! A byte order mark wins. Otherwise the first kilobyte is scanned for a `charset=` (from a `<meta>` tag) or an
//! `encoding=` (from an XML declaration). Otherwise the input is UTF-8.

use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;
use tracing::debug;

const SNIFF_LEN: usize = 1024;

/// Decodes bytes for the tolerant parser. Malformed sequences become U+FFFD.
pub(crate) fn decode_lossy(bytes: &[u8]) -> Cow<'_, str> {
    let encoding = detect(bytes);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!(encoding = used.name(), "replaced malformed byte sequences");
    }
    text
}

/// Decodes bytes for the strict parser. Malformed sequences are an error naming the encoding.
pub(crate) fn decode_strict(bytes: &[u8]) -> Result<Cow<'_, str>, &'static Encoding> {
    let (encoding, bom_len) = match Encoding::for_bom(bytes) {
        Some(found) => found,
        None => (detect(bytes), 0),
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
        .ok_or(encoding)
}

fn detect(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    let declared = find_label(head, b"charset=").or_else(|| find_label(head, b"encoding="));
    match declared.and_then(Encoding::for_label) {
        // A document can't honestly declare UTF-16 in ASCII-compatible bytes.
        Some(encoding) if encoding.output_encoding() == UTF_8 => UTF_8,
        Some(encoding) => {
            debug!(encoding = encoding.name(), "using declared encoding");
            encoding
        }
        None => UTF_8,
    }
}

fn find_label<'a>(head: &'a [u8], key: &[u8]) -> Option<&'a [u8]> {
    let start = head
        .windows(key.len())
        .position(|window| window.eq_ignore_ascii_case(key))?
        + key.len();
    let rest = &head[start..];
    let rest = rest.strip_prefix(b"\"").or_else(|| rest.strip_prefix(b"'")).unwrap_or(rest);
    let len = rest
        .iter()
        .position(|&b| !(b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':')))
        .unwrap_or(rest.len());
    if len == 0 {
        None
    } else {
        Some(&rest[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_utf8() {
        assert_eq!(decode_lossy("<p>héllo</p>".as_bytes()), "<p>héllo</p>");
    }

    #[test]
    fn malformed_utf8_is_replaced() {
        assert_eq!(decode_lossy(b"<p>a\xFFb</p>"), "<p>a\u{FFFD}b</p>");
    }

    #[test]
    fn bom_is_stripped() {
        assert_eq!(decode_lossy(b"\xEF\xBB\xBF<p>x</p>"), "<p>x</p>");
    }

    #[test]
    fn meta_charset_is_honoured() {
        let bytes = b"<meta charset=\"iso-8859-1\"><p>caf\xE9</p>";
        assert_eq!(decode_lossy(bytes), "<meta charset=\"iso-8859-1\"><p>caf\u{E9}</p>");
    }

    #[test]
    fn http_equiv_charset_is_honoured() {
        let bytes = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\"><p>\x93q\x94</p>";
        assert!(decode_lossy(bytes).ends_with("<p>\u{201C}q\u{201D}</p>"));
    }

    #[test]
    fn xml_declaration_encoding() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>\xE9</r>";
        assert_eq!(decode_strict(bytes).unwrap(), "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>\u{E9}</r>");
    }

    #[test]
    fn unknown_label_falls_back_to_utf8() {
        assert_eq!(detect(b"<meta charset=\"klingon\">"), UTF_8);
    }

    #[test]
    fn strict_decoding_rejects_malformed_bytes() {
        assert_eq!(decode_strict(b"<r>\xFF</r>").unwrap_err(), UTF_8);
    }
}
