use crate::xpath::ast::{Axis, BinaryOp, Expr, LocationPath, NodeTest, Step};
use pest::Parser;
use pest_derive::Parser;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

#[derive(Parser)]
#[grammar = "xpath/xpath.pest"]
struct XPathPairs;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

/// An XPath expression that doesn't parse. Displays as a pest diagnostic pointing at the offending position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XPathSyntaxError {
    pest_error: Rc<pest::error::Error<Rule>>,
}

impl XPathSyntaxError {
    fn new_from_span(span: pest::Span, message: String) -> Self {
        Self {
            pest_error: Rc::new(pest::error::Error::new_from_span(
                pest::error::ErrorVariant::CustomError { message },
                span,
            )),
        }
    }
}

impl Display for XPathSyntaxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.pest_error, f)
    }
}

impl std::error::Error for XPathSyntaxError {}

/// Parses an XPath 1.0 expression.
pub fn parse(text: &str) -> Result<Expr, XPathSyntaxError> {
    let mut pairs = XPathPairs::parse(Rule::top, text).map_err(format_err)?;
    match pairs.next() {
        Some(top) => build_expr(first_child(&top)?),
        None => Ok(Expr::Path(LocationPath {
            absolute: false,
            steps: Vec::new(),
        })),
    }
}

fn format_err(err: pest::error::Error<Rule>) -> XPathSyntaxError {
    let renamed = err.renamed_rules(|rule| {
        match rule {
            Rule::EOI => "end of input",
            Rule::WHITESPACE => "whitespace",
            Rule::top | Rule::expr => "expression",
            Rule::or_expr
            | Rule::and_expr
            | Rule::equality_expr
            | Rule::relational_expr
            | Rule::additive_expr
            | Rule::multiplicative_expr
            | Rule::unary_expr
            | Rule::union_expr
            | Rule::path_expr
            | Rule::primary_expr => "expression",
            Rule::filter_path | Rule::filter_expr => "filter expression",
            Rule::variable => "variable",
            Rule::function_call | Rule::function_name => "function call",
            Rule::location_path | Rule::relative_path => "location path",
            Rule::absolute_path => "absolute location path",
            Rule::descendant_root | Rule::descendant_sep => "_//_",
            Rule::root | Rule::child_sep => "_/_",
            Rule::step | Rule::axis_step => "location step",
            Rule::abbrev_parent => "_.._",
            Rule::abbrev_self => "_._",
            Rule::abbrev_attribute => "_@_",
            Rule::axis_name => "axis name",
            Rule::type_test | Rule::node_type => "node type test",
            Rule::pi_test => "_processing-instruction()_",
            Rule::node_test | Rule::name_test => "node test",
            Rule::predicate => "predicate",
            Rule::literal | Rule::double_quoted | Rule::single_quoted => "string literal",
            Rule::number => "number",
            Rule::qname | Rule::ncname => "name",
            Rule::name_start | Rule::name_char => "name character",
            Rule::op_or => "_or_",
            Rule::op_and => "_and_",
            Rule::op_div => "_div_",
            Rule::op_mod => "_mod_",
            Rule::op_eq => "_=_",
            Rule::op_neq => "_!=_",
            Rule::op_lt => "_<_",
            Rule::op_le => "_<=_",
            Rule::op_gt => "_>_",
            Rule::op_ge => "_>=_",
            Rule::op_add => "_+_",
            Rule::op_sub | Rule::op_neg => "_-_",
            Rule::op_mul => "_*_",
            Rule::op_union => "_|_",
        }
        .to_string()
        .replace('_', "\"")
    });
    XPathSyntaxError {
        pest_error: Rc::new(renamed),
    }
}

fn build_expr(pair: Pair) -> Result<Expr, XPathSyntaxError> {
    match pair.as_rule() {
        Rule::expr | Rule::path_expr => build_expr(first_child(&pair)?),
        Rule::or_expr
        | Rule::and_expr
        | Rule::equality_expr
        | Rule::relational_expr
        | Rule::additive_expr
        | Rule::multiplicative_expr => build_binary_chain(pair),
        Rule::unary_expr => {
            let mut negations = 0;
            let mut operand = None;
            for child in pair.clone().into_inner() {
                match child.as_rule() {
                    Rule::op_neg => negations += 1,
                    _ => operand = Some(build_expr(child)?),
                }
            }
            let mut expr = operand.ok_or_else(|| unexpected(&pair))?;
            for _ in 0..negations {
                expr = Expr::Negate(Box::new(expr));
            }
            Ok(expr)
        }
        Rule::union_expr => {
            let mut operands = pair.clone().into_inner().filter(|child| child.as_rule() != Rule::op_union);
            let mut expr = build_expr(operands.next().ok_or_else(|| unexpected(&pair))?)?;
            for operand in operands {
                expr = Expr::Union(Box::new(expr), Box::new(build_expr(operand)?));
            }
            Ok(expr)
        }
        Rule::filter_path => build_filter_path(pair),
        Rule::location_path => Ok(Expr::Path(build_location_path(first_child(&pair)?)?)),
        Rule::variable => Ok(Expr::Variable(first_child(&pair)?.as_str().to_string())),
        Rule::literal => Ok(Expr::Literal(first_child(&pair)?.as_str().to_string())),
        Rule::number => pair
            .as_str()
            .parse()
            .map(Expr::Number)
            .map_err(|_| XPathSyntaxError::new_from_span(pair.as_span(), "invalid number".to_string())),
        Rule::function_call => {
            let mut inner = pair.clone().into_inner();
            let name = inner.next().ok_or_else(|| unexpected(&pair))?.as_str().to_string();
            let args = inner.map(build_expr).collect::<Result<_, _>>()?;
            Ok(Expr::Function { name, args })
        }
        _ => Err(unexpected(&pair)),
    }
}

fn build_binary_chain(pair: Pair) -> Result<Expr, XPathSyntaxError> {
    let mut inner = pair.clone().into_inner();
    let mut expr = build_expr(inner.next().ok_or_else(|| unexpected(&pair))?)?;
    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_rule() {
            Rule::op_or => BinaryOp::Or,
            Rule::op_and => BinaryOp::And,
            Rule::op_eq => BinaryOp::Eq,
            Rule::op_neq => BinaryOp::Neq,
            Rule::op_lt => BinaryOp::Lt,
            Rule::op_le => BinaryOp::Lte,
            Rule::op_gt => BinaryOp::Gt,
            Rule::op_ge => BinaryOp::Gte,
            Rule::op_add => BinaryOp::Add,
            Rule::op_sub => BinaryOp::Sub,
            Rule::op_mul => BinaryOp::Mul,
            Rule::op_div => BinaryOp::Div,
            Rule::op_mod => BinaryOp::Mod,
            _ => return Err(unexpected(&op_pair)),
        };
        let right = inner.next().ok_or_else(|| unexpected(&op_pair))?;
        expr = Expr::Binary {
            op,
            left: Box::new(expr),
            right: Box::new(build_expr(right)?),
        };
    }
    Ok(expr)
}

fn build_filter_path(pair: Pair) -> Result<Expr, XPathSyntaxError> {
    let mut inner = pair.clone().into_inner();
    let filter = inner.next().ok_or_else(|| unexpected(&pair))?;
    let mut filter_inner = filter.clone().into_inner();
    let primary = build_expr(filter_inner.next().ok_or_else(|| unexpected(&filter))?)?;
    let predicates = filter_inner.map(build_predicate).collect::<Result<Vec<_>, _>>()?;

    let mut steps = Vec::new();
    if let Some(separator) = inner.next() {
        if separator.as_rule() == Rule::descendant_sep {
            steps.push(Step::descendant_or_self());
        }
        let relative = inner.next().ok_or_else(|| unexpected(&separator))?;
        build_relative_path(relative, &mut steps)?;
    }

    if predicates.is_empty() && steps.is_empty() {
        return Ok(primary);
    }
    Ok(Expr::Filter {
        primary: Box::new(primary),
        predicates,
        steps,
    })
}

fn build_location_path(pair: Pair) -> Result<LocationPath, XPathSyntaxError> {
    let mut steps = Vec::new();
    match pair.as_rule() {
        Rule::relative_path => {
            build_relative_path(pair, &mut steps)?;
            Ok(LocationPath { absolute: false, steps })
        }
        Rule::absolute_path => {
            let mut inner = pair.clone().into_inner();
            let start = inner.next().ok_or_else(|| unexpected(&pair))?;
            if start.as_rule() == Rule::descendant_root {
                steps.push(Step::descendant_or_self());
            }
            if let Some(relative) = inner.next() {
                build_relative_path(relative, &mut steps)?;
            }
            Ok(LocationPath { absolute: true, steps })
        }
        _ => Err(unexpected(&pair)),
    }
}

fn build_relative_path(pair: Pair, steps: &mut Vec<Step>) -> Result<(), XPathSyntaxError> {
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::child_sep => {}
            Rule::descendant_sep => steps.push(Step::descendant_or_self()),
            Rule::step => steps.push(build_step(first_child(&child)?)?),
            _ => return Err(unexpected(&child)),
        }
    }
    Ok(())
}

fn build_step(pair: Pair) -> Result<Step, XPathSyntaxError> {
    match pair.as_rule() {
        Rule::abbrev_self => Ok(Step {
            axis: Axis::SelfAxis,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }),
        Rule::abbrev_parent => Ok(Step {
            axis: Axis::Parent,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }),
        Rule::axis_step => {
            let mut axis = Axis::Child;
            let mut test = None;
            let mut predicates = Vec::new();
            for child in pair.clone().into_inner() {
                match child.as_rule() {
                    Rule::axis_name => {
                        axis = Axis::from_name(child.as_str()).ok_or_else(|| {
                            XPathSyntaxError::new_from_span(child.as_span(), "unknown axis".to_string())
                        })?
                    }
                    Rule::abbrev_attribute => axis = Axis::Attribute,
                    Rule::type_test => {
                        test = Some(match first_child(&child)?.as_str() {
                            "comment" => NodeTest::Comment,
                            "text" => NodeTest::Text,
                            _ => NodeTest::Node,
                        })
                    }
                    Rule::pi_test => {
                        let target = match child.into_inner().next() {
                            Some(literal) => Some(first_child(&literal)?.as_str().to_string()),
                            None => None,
                        };
                        test = Some(NodeTest::ProcessingInstruction(target));
                    }
                    Rule::name_test => {
                        let text = child.as_str();
                        test = Some(if text == "*" {
                            NodeTest::Wildcard
                        } else if let Some(prefix) = text.strip_suffix(":*") {
                            NodeTest::PrefixWildcard(prefix.to_string())
                        } else {
                            NodeTest::Name(text.to_string())
                        });
                    }
                    Rule::predicate => predicates.push(build_predicate(child)?),
                    _ => return Err(unexpected(&child)),
                }
            }
            let test = test.ok_or_else(|| unexpected(&pair))?;
            Ok(Step { axis, test, predicates })
        }
        _ => Err(unexpected(&pair)),
    }
}

fn build_predicate(pair: Pair) -> Result<Expr, XPathSyntaxError> {
    build_expr(first_child(&pair)?)
}

fn first_child<'a>(pair: &Pair<'a>) -> Result<Pair<'a>, XPathSyntaxError> {
    pair.clone().into_inner().next().ok_or_else(|| unexpected(pair))
}

fn unexpected(pair: &Pair) -> XPathSyntaxError {
    XPathSyntaxError::new_from_span(pair.as_span(), format!("unexpected {:?}", pair.as_rule()))
}
