use crate::html::encoding::decode_strict;
use crate::html::{Document, ParseError, ParseMode, TreeBuilder};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use tracing::debug;

/// Parses well-formed XML. Any well-formedness problem is an error; nothing is repaired.
pub(crate) fn parse_xml(bytes: &[u8]) -> Result<Document, ParseError> {
    let text = decode_strict(bytes).map_err(|encoding| ParseError::Encoding {
        encoding: encoding.name(),
    })?;
    let mut reader = Reader::from_str(&text);
    reader.config_mut().check_end_names = true;

    let mut builder = TreeBuilder::new(ParseMode::Raw);
    let mut seen_root = false;
    let mut at_start = true;
    loop {
        let event = reader.read_event().map_err(|err| ParseError::Syntax {
            position: reader.error_position() as u64,
            message: err.to_string(),
        })?;
        let position = reader.buffer_position() as u64;
        let syntax = |message: String| ParseError::Syntax { position, message };

        match event {
            Event::Start(start) => {
                open(&mut builder, &start, &mut seen_root).map_err(syntax)?;
            }
            Event::Empty(start) => {
                open(&mut builder, &start, &mut seen_root).map_err(syntax)?;
                builder.close_element();
            }
            Event::End(_) => builder.close_element(),
            Event::Text(text) => {
                if contains_bytes(&text, b"]]>") {
                    return Err(syntax("\"]]>\" is not allowed in character data".to_string()));
                }
                let unescaped = text.unescape().map_err(|err| syntax(err.to_string()))?;
                character_data(&mut builder, &unescaped).map_err(syntax)?;
            }
            Event::CData(cdata) => {
                let content = String::from_utf8_lossy(&cdata);
                character_data(&mut builder, &content).map_err(syntax)?;
            }
            Event::Comment(comment) => {
                if contains_bytes(&comment, b"--") || comment.ends_with(b"-") {
                    return Err(syntax("\"--\" is not allowed inside a comment".to_string()));
                }
                builder.comment(&String::from_utf8_lossy(&comment));
            }
            Event::PI(pi) => {
                let content = String::from_utf8_lossy(&pi);
                let (target, data) = match content.split_once(char::is_whitespace) {
                    Some((target, data)) => (target, data.trim_start()),
                    None => (&*content, ""),
                };
                check_name(target, "processing instruction target").map_err(syntax)?;
                if target.eq_ignore_ascii_case("xml") {
                    return Err(syntax(format!("processing instruction target {target:?} is reserved")));
                }
                builder.processing_instruction(target, data);
            }
            Event::Decl(_) if !at_start => {
                return Err(syntax("the XML declaration is only allowed at the start of the document".to_string()));
            }
            Event::DocType(_) if seen_root => {
                return Err(syntax("a DOCTYPE must come before the root element".to_string()));
            }
            Event::Decl(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
        at_start = false;
    }

    if let Some(name) = builder.current_element_name() {
        return Err(ParseError::Syntax {
            position: reader.buffer_position() as u64,
            message: format!("unexpected end of input: <{name}> is not closed"),
        });
    }
    if !seen_root {
        return Err(ParseError::Syntax {
            position: reader.buffer_position() as u64,
            message: "no root element".to_string(),
        });
    }
    let document = builder.finish();
    debug!(nodes = document.len(), "parsed XML document");
    Ok(document)
}

fn open(builder: &mut TreeBuilder, start: &BytesStart, seen_root: &mut bool) -> Result<(), String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    check_name(&name, "element")?;
    if builder.depth() == 0 {
        if *seen_root {
            return Err(format!("junk after document element: <{name}>"));
        }
        *seen_root = true;
    }
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        check_name(&key, "attribute")?;
        if attr.value.contains(&b'<') {
            return Err(format!("\"<\" is not allowed in the value of attribute {key:?}"));
        }
        let value = attr.unescape_value().map_err(|err| err.to_string())?;
        attributes.push((key, value.into_owned()));
    }
    builder.open_element(&name, attributes);
    Ok(())
}

fn character_data(builder: &mut TreeBuilder, text: &Cow<'_, str>) -> Result<(), String> {
    if builder.depth() > 0 {
        builder.text(text);
        Ok(())
    } else if text.trim().is_empty() {
        Ok(())
    } else {
        Err(format!("text outside of the root element: {:?}", text.trim()))
    }
}

fn check_name(name: &str, what: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) && chars.all(is_name_char) => Ok(()),
        _ => Err(format!("invalid {what} name: {name:?}")),
    }
}

/// The XML 1.0 `NameStartChar` production.
fn is_name_start_char(ch: char) -> bool {
    matches!(ch,
        ':' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}'
    )
}

/// The XML 1.0 `NameChar` production.
fn is_name_char(ch: char) -> bool {
    is_name_start_char(ch)
        || matches!(ch, '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::NodeKind;
    use crate::util::utils_for_test::*;

    #[test]
    fn well_formed_document() {
        let doc = parse_xml(b"<?xml version=\"1.0\"?>\n<root a=\"1\"><item>x &amp; y</item><empty/></root>\n").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.name(root), Some("root"));
        assert_eq!(doc.attribute(root, "a"), Some("1"));
        let names: Vec<_> = doc.children(root).iter().filter_map(|&id| doc.name(id)).collect();
        assert_eq!(names, ["item", "empty"]);
        assert_eq!(doc.string_value(root), "x & y");
    }

    #[test]
    fn cdata_comments_and_pis() {
        let doc = parse_xml(b"<r><![CDATA[<raw>]]><!--c--><?target some data?></r>").unwrap();
        let root = doc.root_element().unwrap();
        let kinds: Vec<_> = doc.children(root).iter().map(|&id| doc.kind(id).clone()).collect();
        assert_eq!(
            kinds,
            [
                NodeKind::Text("<raw>".to_string()),
                NodeKind::Comment("c".to_string()),
                NodeKind::ProcessingInstruction {
                    target: "target".to_string(),
                    data: "some data".to_string()
                },
            ]
        );
    }

    #[test]
    fn html_is_not_automatically_wrapped() {
        let doc = parse_xml(b"<p>hi</p>").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.name(root), Some("p"));
        assert_eq!(doc.children(doc.root()).len(), 1);
    }

    #[test]
    fn mismatched_end_tag() {
        unwrap!(parse_xml(b"<a><b></a>"), Err(ParseError::Syntax { .. }));
    }

    #[test]
    fn unclosed_element() {
        unwrap!(parse_xml(b"<a><b></b>"), Err(ParseError::Syntax { .. }));
    }

    #[test]
    fn two_roots() {
        unwrap!(parse_xml(b"<a/><b/>"), Err(ParseError::Syntax { message, .. }));
        assert!(message.contains("<b>"), "{message}");
    }

    #[test]
    fn text_outside_root() {
        unwrap!(parse_xml(b"hello <a/>"), Err(ParseError::Syntax { .. }));
        unwrap!(parse_xml(b"<a/> trailing"), Err(ParseError::Syntax { .. }));
    }

    #[test]
    fn no_root() {
        unwrap!(parse_xml(b"<!-- only a comment -->"), Err(ParseError::Syntax { message, .. }));
        assert_eq!(message, "no root element");
    }

    #[test]
    fn unknown_entity() {
        unwrap!(parse_xml(b"<a>&nbsp;</a>"), Err(ParseError::Syntax { .. }));
    }

    fn syntax_message(xml: &str) -> String {
        unwrap!(parse_xml(xml.as_bytes()), Err(ParseError::Syntax { message, .. }));
        message
    }

    #[test]
    fn names_must_be_xml_names() {
        assert_eq!(syntax_message("<1a/>"), r#"invalid element name: "1a""#);
        assert_eq!(syntax_message("<a -b='1'/>"), r#"invalid attribute name: "-b""#);
        assert_eq!(syntax_message("<a><?9pi?></a>"), r#"invalid processing instruction target name: "9pi""#);
        assert!(parse_xml("<x:a_b-c.d é='1'/>".as_bytes()).is_ok());
    }

    #[test]
    fn raw_lt_in_attribute_value() {
        assert!(syntax_message("<a b='<'/>").contains("\"<\" is not allowed"));
        assert!(parse_xml(b"<a b='&lt;'/>").is_ok());
    }

    #[test]
    fn cdata_end_in_text() {
        assert!(syntax_message("<a>]]></a>").contains("]]>"));
        assert!(parse_xml(b"<a>]]&gt; ]] ></a>").is_ok());
    }

    #[test]
    fn double_hyphen_in_comment() {
        assert!(syntax_message("<a><!-- -- --></a>").contains("\"--\""));
        assert!(syntax_message("<a><!-- x---></a>").contains("\"--\""));
        assert!(parse_xml(b"<a><!-- - x - --></a>").is_ok());
    }

    #[test]
    fn misplaced_declaration() {
        assert!(syntax_message("<a/><?xml version='1.0'?>").contains("XML declaration"));
        assert!(syntax_message(" <?xml version='1.0'?><a/>").contains("XML declaration"));
        assert!(syntax_message("<a><?XML x?></a>").contains("reserved"));
        assert!(parse_xml(b"<?xml version='1.0'?><?xml-stylesheet href='s'?><a/>").is_ok());
    }

    #[test]
    fn doctype_after_root() {
        assert!(syntax_message("<a/><!DOCTYPE a>").contains("DOCTYPE"));
        assert!(parse_xml(b"<!DOCTYPE a><a/>").is_ok());
    }

    #[test]
    fn invalid_utf8() {
        unwrap!(parse_xml(b"<a>\xFF</a>"), Err(ParseError::Encoding { encoding }));
        assert_eq!(encoding, "UTF-8");
    }
}
