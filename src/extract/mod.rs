//! Evaluates compiled queries against a document and turns the matches into text.

use crate::html::serialize::outer_markup;
use crate::html::{Document, NodeId, NodeKind};
use crate::select::CompiledQuery;
use crate::xpath::{self, Value, XPathError};
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ExtractOptions {
    /// When set, matched elements yield this attribute's value instead of their content.
    pub attribute: Option<String>,
    /// Stop at the first match and only report whether there was one.
    pub existence_only: bool,
    pub render: ElementRender,
}

/// How a matched element becomes text when no attribute is requested.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ElementRender {
    /// The element's string-value: all its descendant text.
    #[default]
    Text,
    /// The element's serialized markup, tags included.
    Markup,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExtractionOutcome {
    /// Trimmed, non-empty texts, ordered by selector and then by document order.
    Texts(Vec<String>),
    Exists(bool),
}

/// One item of an evaluation result.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MatchedNode {
    /// A string result, or an attribute or text node's value.
    Text(String),
    /// An element, comment, processing instruction or the document itself.
    Node(NodeId),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("could not evaluate {selector:?}: {source}")]
pub struct EvalError {
    pub selector: String,
    #[source]
    pub source: XPathError,
}

/// Evaluates each query in order and collects what it matched.
///
/// The context node is the root element, or the document node if there isn't one. In existence mode, evaluation stops
/// at the first query that yields any non-empty text; the remaining queries are never evaluated.
pub fn extract(
    doc: &Document,
    queries: &[CompiledQuery],
    options: &ExtractOptions,
) -> Result<ExtractionOutcome, EvalError> {
    let context = doc.root_element().unwrap_or(doc.root());
    let mut texts = Vec::new();

    for query in queries {
        let value = xpath::evaluate(doc, context, &query.expr).map_err(|source| EvalError {
            selector: query.selector.raw.clone(),
            source,
        })?;
        let mut kept = 0;
        for matched in matched_nodes(doc, value) {
            let Some(text) = render(doc, matched, options) else {
                continue;
            };
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            if options.existence_only {
                debug!(selector = %query.selector, "found a match; skipping any remaining selectors");
                return Ok(ExtractionOutcome::Exists(true));
            }
            texts.push(trimmed.to_string());
            kept += 1;
        }
        debug!(selector = %query.selector, xpath = %query.xpath, kept, "evaluated selector");
    }

    if options.existence_only {
        Ok(ExtractionOutcome::Exists(false))
    } else {
        Ok(ExtractionOutcome::Texts(texts))
    }
}

/// Splits an evaluation result into items, in document order for node-sets.
pub fn matched_nodes(doc: &Document, value: Value) -> Vec<MatchedNode> {
    match value {
        Value::NodeSet(nodes) => nodes
            .into_iter()
            .map(|node| match doc.kind(node) {
                NodeKind::Attribute { .. } | NodeKind::Text(_) => MatchedNode::Text(doc.string_value(node)),
                _ => MatchedNode::Node(node),
            })
            .collect(),
        scalar => vec![MatchedNode::Text(scalar.to_xpath_string(doc))],
    }
}

fn render(doc: &Document, matched: MatchedNode, options: &ExtractOptions) -> Option<String> {
    let node = match matched {
        MatchedNode::Text(text) => return Some(text),
        MatchedNode::Node(node) => node,
    };
    match &options.attribute {
        Some(name) => doc.attribute(node, name).map(str::to_string),
        None => match options.render {
            ElementRender::Text => Some(doc.string_value(node)),
            ElementRender::Markup => Some(outer_markup(doc, node)),
        },
    }
}
