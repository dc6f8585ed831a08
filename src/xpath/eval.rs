use crate::html::{Document, NodeId, NodeKind};
use crate::xpath::ast::{Axis, BinaryOp, Expr, LocationPath, NodeTest, Step};
use crate::xpath::value::Value;
use crate::xpath::XPathError;

/// Evaluates expressions against one document.
pub(crate) struct Evaluator<'a> {
    pub(crate) doc: &'a Document,
}

/// The dynamic context: context node, proximity position (1-based) and context size.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Context {
    pub(crate) node: NodeId,
    pub(crate) position: usize,
    pub(crate) size: usize,
}

impl Context {
    pub(crate) fn new(node: NodeId) -> Self {
        Self {
            node,
            position: 1,
            size: 1,
        }
    }
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    pub(crate) fn eval(&self, expr: &Expr, ctx: &Context) -> Result<Value, XPathError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Literal(s) => Ok(Value::String(s.clone())),
            Expr::Variable(name) => Err(XPathError::UnboundVariable { name: name.clone() }),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, ctx),
            Expr::Negate(inner) => {
                let value = self.eval(inner, ctx)?;
                Ok(Value::Number(-value.to_number(self.doc)))
            }
            Expr::Function { name, args } => self.call_function(name, args, ctx),
            Expr::Path(path) => self.eval_location_path(path, ctx),
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let nodes = self.eval_node_set(primary, ctx, "a filtered expression")?;
                let nodes = self.apply_predicates(nodes, predicates)?;
                self.apply_steps(nodes, steps).map(Value::NodeSet)
            }
            Expr::Union(left, right) => {
                let mut nodes = self.eval_node_set(left, ctx, "an operand of |")?;
                nodes.extend(self.eval_node_set(right, ctx, "an operand of |")?);
                Ok(Value::NodeSet(into_document_order(nodes)))
            }
        }
    }

    /// Evaluates an expression that must produce a node-set.
    pub(crate) fn eval_node_set(
        &self,
        expr: &Expr,
        ctx: &Context,
        role: &'static str,
    ) -> Result<Vec<NodeId>, XPathError> {
        match self.eval(expr, ctx)? {
            Value::NodeSet(nodes) => Ok(nodes),
            _ => Err(XPathError::NotANodeSet { role }),
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr, ctx: &Context) -> Result<Value, XPathError> {
        match op {
            BinaryOp::Or => {
                let result = self.eval(left, ctx)?.to_boolean() || self.eval(right, ctx)?.to_boolean();
                Ok(Value::Boolean(result))
            }
            BinaryOp::And => {
                let result = self.eval(left, ctx)?.to_boolean() && self.eval(right, ctx)?.to_boolean();
                Ok(Value::Boolean(result))
            }
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                Ok(Value::Boolean(self.compare(op, &left, &right)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let left = self.eval(left, ctx)?.to_number(self.doc);
                let right = self.eval(right, ctx)?.to_number(self.doc);
                let result = match op {
                    BinaryOp::Add => left + right,
                    BinaryOp::Sub => left - right,
                    BinaryOp::Mul => left * right,
                    BinaryOp::Div => left / right,
                    _ => left % right,
                };
                Ok(Value::Number(result))
            }
        }
    }

    /// Compares two values. A node-set compares true if any of its nodes' string-values does.
    fn compare(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::NodeSet(lhs), Value::NodeSet(rhs)) => {
                let rhs: Vec<Value> = rhs.iter().map(|&node| self.node_string(node)).collect();
                lhs.iter().any(|&node| {
                    let lhs = self.node_string(node);
                    rhs.iter().any(|rhs| self.compare_atomic(op, &lhs, rhs))
                })
            }
            (Value::NodeSet(nodes), Value::Boolean(_)) => {
                self.compare_atomic(op, &Value::Boolean(!nodes.is_empty()), right)
            }
            (Value::Boolean(_), Value::NodeSet(nodes)) => {
                self.compare_atomic(op, left, &Value::Boolean(!nodes.is_empty()))
            }
            (Value::NodeSet(nodes), _) => nodes
                .iter()
                .any(|&node| self.compare_atomic(op, &self.node_string(node), right)),
            (_, Value::NodeSet(nodes)) => nodes
                .iter()
                .any(|&node| self.compare_atomic(op, left, &self.node_string(node))),
            _ => self.compare_atomic(op, left, right),
        }
    }

    fn compare_atomic(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        match op {
            BinaryOp::Eq | BinaryOp::Neq => {
                let equal = if matches!(left, Value::Boolean(_)) || matches!(right, Value::Boolean(_)) {
                    left.to_boolean() == right.to_boolean()
                } else if matches!(left, Value::Number(_)) || matches!(right, Value::Number(_)) {
                    left.to_number(self.doc) == right.to_number(self.doc)
                } else {
                    left.to_xpath_string(self.doc) == right.to_xpath_string(self.doc)
                };
                equal == (op == BinaryOp::Eq)
            }
            _ => {
                let (left, right) = (left.to_number(self.doc), right.to_number(self.doc));
                match op {
                    BinaryOp::Lt => left < right,
                    BinaryOp::Lte => left <= right,
                    BinaryOp::Gt => left > right,
                    _ => left >= right,
                }
            }
        }
    }

    fn node_string(&self, node: NodeId) -> Value {
        Value::String(self.doc.string_value(node))
    }

    fn eval_location_path(&self, path: &LocationPath, ctx: &Context) -> Result<Value, XPathError> {
        let start = if path.absolute { self.doc.root() } else { ctx.node };
        self.apply_steps(vec![start], &path.steps).map(Value::NodeSet)
    }

    fn apply_steps(&self, mut nodes: Vec<NodeId>, steps: &[Step]) -> Result<Vec<NodeId>, XPathError> {
        let mut seen = Visited::new(self.doc.len());
        for step in steps {
            let descending =
                step.predicates.is_empty() && matches!(step.axis, Axis::Descendant | Axis::DescendantOrSelf);
            let mut walked: Option<NodeId> = None;
            let mut next = Vec::new();
            for &node in &nodes {
                if descending && !self.doc.is_attribute(node) {
                    // Everything below a walked subtree was already found from its root.
                    if walked.is_some_and(|outer| self.doc.contains(outer, node)) {
                        continue;
                    }
                    walked = Some(node);
                }
                let candidates: Vec<NodeId> = self
                    .axis(node, step.axis)
                    .into_iter()
                    .filter(|&candidate| self.matches_test(candidate, &step.test, step.axis))
                    .collect();
                for found in self.apply_predicates(candidates, &step.predicates)? {
                    if seen.insert(found) {
                        next.push(found);
                    }
                }
            }
            for &found in &next {
                seen.remove(found);
            }
            next.sort_unstable();
            nodes = next;
        }
        Ok(nodes)
    }

    /// Filters `nodes` (given in axis order) through each predicate in turn.
    fn apply_predicates(&self, mut nodes: Vec<NodeId>, predicates: &[Expr]) -> Result<Vec<NodeId>, XPathError> {
        for predicate in predicates {
            let size = nodes.len();
            let mut kept = Vec::with_capacity(size);
            for (index, &node) in nodes.iter().enumerate() {
                let ctx = Context {
                    node,
                    position: index + 1,
                    size,
                };
                let keep = match self.eval(predicate, &ctx)? {
                    Value::Number(n) => n == ctx.position as f64,
                    other => other.to_boolean(),
                };
                if keep {
                    kept.push(node);
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    /// The nodes on `axis` from `node`, in axis order (nearest first for reverse axes).
    fn axis(&self, node: NodeId, axis: Axis) -> Vec<NodeId> {
        let doc = self.doc;
        match axis {
            Axis::Child => doc.children(node).to_vec(),
            Axis::Descendant => doc.descendants(node).collect(),
            Axis::DescendantOrSelf => std::iter::once(node).chain(doc.descendants(node)).collect(),
            Axis::Parent => doc.parent(node).into_iter().collect(),
            Axis::Ancestor => doc.ancestors(node).collect(),
            Axis::AncestorOrSelf => std::iter::once(node).chain(doc.ancestors(node)).collect(),
            Axis::FollowingSibling => doc.following_siblings(node).to_vec(),
            Axis::PrecedingSibling => doc.preceding_siblings(node).iter().rev().copied().collect(),
            Axis::Following => doc.following(node).collect(),
            Axis::Preceding => doc.preceding(node).collect(),
            Axis::Attribute => doc.attributes(node).to_vec(),
            Axis::Namespace => Vec::new(),
            Axis::SelfAxis => vec![node],
        }
    }

    fn matches_test(&self, node: NodeId, test: &NodeTest, axis: Axis) -> bool {
        let kind = self.doc.kind(node);
        let principal = |kind: &NodeKind| match axis {
            Axis::Attribute => matches!(kind, NodeKind::Attribute { .. }),
            _ => matches!(kind, NodeKind::Element { .. }),
        };
        match test {
            NodeTest::Node => true,
            NodeTest::Text => matches!(kind, NodeKind::Text(_)),
            NodeTest::Comment => matches!(kind, NodeKind::Comment(_)),
            NodeTest::ProcessingInstruction(expected) => match kind {
                NodeKind::ProcessingInstruction { target, .. } => expected.as_ref().map_or(true, |t| t == target),
                _ => false,
            },
            NodeTest::Wildcard => principal(kind),
            NodeTest::PrefixWildcard(prefix) => {
                principal(kind)
                    && self
                        .doc
                        .name(node)
                        .and_then(|name| name.split_once(':'))
                        .is_some_and(|(actual, _)| actual == prefix)
            }
            NodeTest::Name(name) => principal(kind) && self.doc.name(node) == Some(name.as_str()),
        }
    }
}

/// A set of nodes, as one bit per arena index.
struct Visited {
    bits: Vec<u64>,
}

impl Visited {
    fn new(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(64)],
        }
    }

    /// Adds the node, returning whether it was absent.
    fn insert(&mut self, node: NodeId) -> bool {
        let (word, mask) = Self::locate(node);
        let absent = self.bits[word] & mask == 0;
        self.bits[word] |= mask;
        absent
    }

    fn remove(&mut self, node: NodeId) {
        let (word, mask) = Self::locate(node);
        self.bits[word] &= !mask;
    }

    fn locate(node: NodeId) -> (usize, u64) {
        let index = node.index();
        (index / 64, 1 << (index % 64))
    }
}

/// Sorts into document order and removes duplicates.
pub(crate) fn into_document_order(mut nodes: Vec<NodeId>) -> Vec<NodeId> {
    nodes.sort_unstable();
    nodes.dedup();
    nodes
}
