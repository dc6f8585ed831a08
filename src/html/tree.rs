use crate::html::ParseMode;

/// A handle to a node within a [`Document`].
///
/// Ids are assigned in document order, so comparing two ids compares their position in the document. Attributes sort
/// after the element that owns them and before that element's children.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The node's arena index, which is also its position in document order.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element { name: String },
    Attribute { name: String, value: String },
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: Vec<NodeId>,
    /// Position within the parent's children. Attributes and the document node use 0.
    sibling_index: usize,
    /// One past the last arena index belonging to this node's subtree (its attributes included).
    subtree_end: usize,
}

/// A parsed document: an immutable arena of nodes.
///
/// Documents are built once by [`crate::html::parse`] and never mutated afterward.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<Node>,
    mode: ParseMode,
}

impl Document {
    /// The document node, parent of the root element.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The first element child of the document node, if there is one.
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&id| self.is_element(id))
    }

    /// Which parser built this document.
    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].attributes
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element { .. })
    }

    pub fn is_attribute(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Attribute { .. })
    }

    /// Looks up an attribute's value on an element. Returns `None` for non-elements.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id).iter().find_map(|&attr| match self.kind(attr) {
            NodeKind::Attribute { name: attr_name, value } if attr_name == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// The node's name: tag name for elements, attribute name, or processing-instruction target.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { name } | NodeKind::Attribute { name, .. } => Some(name),
            NodeKind::ProcessingInstruction { target, .. } => Some(target),
            NodeKind::Document | NodeKind::Text(_) | NodeKind::Comment(_) => None,
        }
    }

    /// The XPath string-value of a node.
    ///
    /// For the document and elements, this is the concatenation of all descendant text, in document order.
    pub fn string_value(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Document | NodeKind::Element { .. } => {
                let mut result = String::new();
                for desc in self.descendants(id) {
                    if let NodeKind::Text(text) = self.kind(desc) {
                        result.push_str(text);
                    }
                }
                result
            }
            NodeKind::Attribute { value, .. } => value.clone(),
            NodeKind::Text(text) | NodeKind::Comment(text) => text.clone(),
            NodeKind::ProcessingInstruction { data, .. } => data.clone(),
        }
    }

    /// All descendants of the node in document order, excluding attributes.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let end = self.nodes[id.0].subtree_end;
        self.non_attributes(id.0 + 1..end)
    }

    /// Whether `node` is inside `ancestor`'s subtree, attributes included. A node doesn't contain itself.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor.0 < node.0 && node.0 < self.nodes[ancestor.0].subtree_end
    }

    /// Nodes after this one in document order, excluding its descendants and all attributes.
    pub fn following(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let start = self.nodes[id.0].subtree_end;
        self.non_attributes(start..self.nodes.len())
    }

    /// Nodes before this one, nearest first, excluding its ancestors and all attributes.
    pub fn preceding(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        // An attribute's owner element precedes it in the arena but is one of its ancestors.
        let ancestors: Vec<NodeId> = self.ancestors(id).collect();
        (0..id.0)
            .rev()
            .map(NodeId)
            .filter(move |&other| !self.is_attribute(other) && !ancestors.contains(&other))
    }

    /// Ancestors of the node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&node| self.parent(node))
    }

    /// Siblings after this node, nearest first. Attributes have no siblings.
    pub fn following_siblings(&self, id: NodeId) -> &[NodeId] {
        match self.sibling_range(id) {
            Some((siblings, index)) => &siblings[index + 1..],
            None => &[],
        }
    }

    /// Siblings before this node, in document order (the nearest is last).
    pub fn preceding_siblings(&self, id: NodeId) -> &[NodeId] {
        match self.sibling_range(id) {
            Some((siblings, index)) => &siblings[..index],
            None => &[],
        }
    }

    fn sibling_range(&self, id: NodeId) -> Option<(&[NodeId], usize)> {
        if self.is_attribute(id) {
            return None;
        }
        let parent = self.parent(id)?;
        Some((self.children(parent), self.nodes[id.0].sibling_index))
    }

    fn non_attributes(&self, range: std::ops::Range<usize>) -> impl Iterator<Item = NodeId> + '_ {
        range.map(NodeId).filter(move |&id| !self.is_attribute(id))
    }
}

/// Incrementally builds a [`Document`] from parser events.
///
/// Nodes must be added in document order; the builder relies on that to keep arena order equal to document order.
pub(crate) struct TreeBuilder {
    nodes: Vec<Node>,
    open: Vec<NodeId>,
    mode: ParseMode,
}

impl TreeBuilder {
    pub(crate) fn new(mode: ParseMode) -> Self {
        let document = Node {
            kind: NodeKind::Document,
            parent: None,
            children: Vec::new(),
            attributes: Vec::new(),
            sibling_index: 0,
            subtree_end: 1,
        };
        Self {
            nodes: vec![document],
            open: vec![NodeId(0)],
            mode,
        }
    }

    /// The number of elements currently open (the document node is not counted).
    pub(crate) fn depth(&self) -> usize {
        self.open.len() - 1
    }

    /// The name of the innermost open element.
    pub(crate) fn current_element_name(&self) -> Option<&str> {
        if self.depth() == 0 {
            return None;
        }
        self.open.last().and_then(|&id| match &self.nodes[id.0].kind {
            NodeKind::Element { name } => Some(name.as_str()),
            _ => None,
        })
    }

    pub(crate) fn open_element<I>(&mut self, name: &str, attributes: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let element = self.push_child(NodeKind::Element { name: name.to_string() });
        for (attr_name, value) in attributes {
            let attr = self.push_node(NodeKind::Attribute { name: attr_name, value }, Some(element), 0);
            self.nodes[element.0].attributes.push(attr);
        }
        self.open.push(element);
    }

    pub(crate) fn close_element(&mut self) {
        if self.depth() == 0 {
            return;
        }
        if let Some(id) = self.open.pop() {
            self.nodes[id.0].subtree_end = self.nodes.len();
        }
    }

    /// Appends text to the current element, merging with an immediately preceding text node.
    pub(crate) fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let last_index = self.nodes.len() - 1;
        let parent = self.current();
        if self.nodes[parent.0].children.last() == Some(&NodeId(last_index)) {
            if let NodeKind::Text(existing) = &mut self.nodes[last_index].kind {
                existing.push_str(text);
                return;
            }
        }
        self.push_child(NodeKind::Text(text.to_string()));
    }

    pub(crate) fn comment(&mut self, text: &str) {
        self.push_child(NodeKind::Comment(text.to_string()));
    }

    pub(crate) fn processing_instruction(&mut self, target: &str, data: &str) {
        self.push_child(NodeKind::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
    }

    /// Closes anything still open and returns the finished document.
    pub(crate) fn finish(mut self) -> Document {
        while self.depth() > 0 {
            self.close_element();
        }
        self.nodes[0].subtree_end = self.nodes.len();
        Document {
            nodes: self.nodes,
            mode: self.mode,
        }
    }

    fn current(&self) -> NodeId {
        *self.open.last().unwrap_or(&NodeId(0))
    }

    fn push_child(&mut self, kind: NodeKind) -> NodeId {
        let parent = self.current();
        let sibling_index = self.nodes[parent.0].children.len();
        let id = self.push_node(kind, Some(parent), sibling_index);
        self.nodes[parent.0].children.push(id);
        id
    }

    fn push_node(&mut self, kind: NodeKind, parent: Option<NodeId>, sibling_index: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
            attributes: Vec::new(),
            sibling_index,
            subtree_end: id.0 + 1,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `<a x="1">one<b/>two</a><c/>`
    fn sample() -> Document {
        let mut builder = TreeBuilder::new(ParseMode::Raw);
        builder.open_element("a", [("x".to_string(), "1".to_string())]);
        builder.text("one");
        builder.open_element("b", []);
        builder.close_element();
        builder.text("two");
        builder.close_element();
        builder.open_element("c", []);
        builder.close_element();
        builder.finish()
    }

    fn names(doc: &Document, ids: impl IntoIterator<Item = NodeId>) -> Vec<String> {
        ids.into_iter()
            .map(|id| match doc.kind(id) {
                NodeKind::Text(text) => format!("'{text}'"),
                _ => doc.name(id).unwrap_or("?").to_string(),
            })
            .collect()
    }

    #[test]
    fn arena_order_is_document_order() {
        let doc = sample();
        let all: Vec<NodeId> = doc.descendants(doc.root()).collect();
        assert_eq!(names(&doc, all), ["a", "'one'", "b", "'two'", "c"]);
    }

    #[test]
    fn attributes_are_owned_but_not_children() {
        let doc = sample();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.attribute(a, "x"), Some("1"));
        assert_eq!(doc.attribute(a, "y"), None);
        let attr = doc.attributes(a)[0];
        assert_eq!(doc.parent(attr), Some(a));
        assert!(!doc.children(a).contains(&attr));
        assert!(doc.following_siblings(attr).is_empty());
    }

    #[test]
    fn string_value_concatenates_descendant_text() {
        let doc = sample();
        assert_eq!(doc.string_value(doc.root()), "onetwo");
    }

    #[test]
    fn adjacent_text_merges() {
        let mut builder = TreeBuilder::new(ParseMode::Raw);
        builder.open_element("p", []);
        builder.text("hello ");
        builder.text("world");
        builder.finish_and_check(|doc| {
            let p = doc.root_element().unwrap();
            assert_eq!(doc.children(p).len(), 1);
            assert_eq!(doc.string_value(p), "hello world");
        });
    }

    #[test]
    fn following_and_preceding() {
        let doc = sample();
        let a = doc.root_element().unwrap();
        let b = doc.children(a)[1];
        assert_eq!(names(&doc, doc.following(b)), ["'two'", "c"]);
        assert_eq!(names(&doc, doc.preceding(b)), ["'one'"]);

        let attr = doc.attributes(a)[0];
        assert_eq!(names(&doc, doc.following(attr)), ["'one'", "b", "'two'", "c"]);
        assert!(doc.preceding(attr).next().is_none());
    }

    #[test]
    fn siblings() {
        let doc = sample();
        let a = doc.root_element().unwrap();
        let b = doc.children(a)[1];
        assert_eq!(names(&doc, doc.preceding_siblings(b).iter().copied()), ["'one'"]);
        assert_eq!(names(&doc, doc.following_siblings(b).iter().copied()), ["'two'"]);
        assert_eq!(names(&doc, doc.ancestors(b)), ["a", "?"]);
    }

    #[test]
    fn subtree_containment() {
        let doc = sample();
        let a = doc.root_element().unwrap();
        let attr = doc.attributes(a)[0];
        let b = doc.children(a)[1];
        let c = doc.children(doc.root())[1];
        assert!(doc.contains(a, attr));
        assert!(doc.contains(a, b));
        assert!(!doc.contains(a, a));
        assert!(!doc.contains(a, c));
        assert!(!doc.contains(b, a));
        assert!(doc.contains(doc.root(), c));
        assert_eq!(a.index() + 1, attr.index());
    }

    impl TreeBuilder {
        fn finish_and_check(self, check: impl FnOnce(&Document)) {
            check(&self.finish())
        }
    }
}
