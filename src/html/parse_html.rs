use crate::html::encoding::decode_lossy;
use crate::html::{Document, ParseMode, TreeBuilder};
use scraper::{Html, Node};
use tracing::debug;

/// Parses HTML with the html5ever-backed recovering parser. This never fails: any input produces a document with an
/// `html` root element.
pub(crate) fn parse_html(bytes: &[u8]) -> Document {
    let text = decode_lossy(bytes);
    let html = Html::parse_document(&text);
    if let Some(first) = html.errors.first() {
        debug!(count = html.errors.len(), first = %first, "recovered from malformed HTML");
    }

    let mut builder = TreeBuilder::new(ParseMode::Tolerant);
    // Parallel to the builder's stack of open elements, with the document at the bottom.
    let mut open = vec![html.tree.root().id()];
    for node in html.tree.root().descendants().skip(1) {
        let parent = node.parent().map(|parent| parent.id());
        while open.len() > 1 && open.last() != parent.as_ref() {
            open.pop();
            builder.close_element();
        }
        match node.value() {
            Node::Element(element) => {
                let attributes = element.attrs().map(|(name, value)| (name.to_string(), value.to_string()));
                builder.open_element(element.name(), attributes);
                open.push(node.id());
            }
            Node::Text(text) => builder.text(text),
            Node::Comment(comment) => builder.comment(comment),
            Node::ProcessingInstruction(pi) => builder.processing_instruction(&pi.target, &pi.data),
            Node::Document | Node::Fragment | Node::Doctype(_) => {}
        }
    }
    builder.finish()
}
