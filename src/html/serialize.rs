//! Markup serialization of a node and its subtree.
//!
//! Tolerant documents serialize as HTML: void elements have no end tag and raw-text elements (`<script>`, `<style>`)
//! write their text unescaped. Raw documents serialize as XML: a childless element becomes `<name/>`.

use crate::html::{Document, NodeId, NodeKind, ParseMode};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext"];

enum Visit {
    Enter(NodeId),
    Leave(NodeId),
}

/// The outer markup of `node`: its start tag, contents and end tag.
pub fn outer_markup(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    let mut stack = vec![Visit::Enter(node)];
    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(id) => enter(doc, id, &mut out, &mut stack),
            Visit::Leave(id) => {
                if let Some(name) = doc.name(id) {
                    push_end_tag(&mut out, name);
                }
            }
        }
    }
    out
}

fn enter(doc: &Document, id: NodeId, out: &mut String, stack: &mut Vec<Visit>) {
    match doc.kind(id) {
        NodeKind::Document => push_children(doc, id, stack),
        NodeKind::Element { name } => {
            out.push('<');
            out.push_str(name);
            for &attr in doc.attributes(id) {
                if let NodeKind::Attribute { name, value } = doc.kind(attr) {
                    out.push(' ');
                    push_attribute(out, name, value);
                }
            }
            let html = doc.mode() == ParseMode::Tolerant;
            if html && VOID_ELEMENTS.contains(&name.as_str()) {
                out.push('>');
            } else if !html && doc.children(id).is_empty() {
                out.push_str("/>");
            } else if html && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                out.push('>');
                for &child in doc.children(id) {
                    out.push_str(&doc.string_value(child));
                }
                push_end_tag(out, name);
            } else {
                out.push('>');
                stack.push(Visit::Leave(id));
                push_children(doc, id, stack);
            }
        }
        NodeKind::Attribute { name, value } => push_attribute(out, name, value),
        NodeKind::Text(text) => push_escaped(out, text, TEXT_ESCAPES),
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
    }
}

fn push_children(doc: &Document, id: NodeId, stack: &mut Vec<Visit>) {
    stack.extend(doc.children(id).iter().rev().map(|&child| Visit::Enter(child)));
}

fn push_end_tag(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn push_attribute(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str("=\"");
    push_escaped(out, value, ATTRIBUTE_ESCAPES);
    out.push('"');
}

const TEXT_ESCAPES: &[(char, &str)] = &[('&', "&amp;"), ('<', "&lt;"), ('>', "&gt;")];
const ATTRIBUTE_ESCAPES: &[(char, &str)] = &[('&', "&amp;"), ('"', "&quot;"), ('<', "&lt;")];

fn push_escaped(out: &mut String, text: &str, escapes: &[(char, &str)]) {
    for ch in text.chars() {
        match escapes.iter().find(|(special, _)| *special == ch) {
            Some((_, entity)) => out.push_str(entity),
            None => out.push(ch),
        }
    }
}
