use crate::query::css_to_xpath;
use crate::query::{CssTranslator, DetachedSpan, InnerTranslateError, TranslateError};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "query/css.pest"]
struct CssPairs;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

/// The built-in CSS3 → XPath 1.0 translator.
#[derive(Copy, Clone, Debug, Default)]
pub struct Css3Translator;

impl CssTranslator for Css3Translator {
    fn translate(&self, css: &str) -> Result<String, TranslateError> {
        let group = parse(css)?;
        css_to_xpath::translate(&group)
    }
}

/// Comma-separated selectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SelectorGroup(pub(crate) Vec<ComplexSelector>);

/// Compound selectors joined by combinators. `rest` is in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ComplexSelector {
    pub(crate) first: Compound,
    pub(crate) rest: Vec<(Combinator, Compound)>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

/// A type selector (`None` when it's `*` or omitted) and its qualifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Compound {
    pub(crate) element: Option<String>,
    pub(crate) qualifiers: Vec<Qualifier>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Qualifier {
    pub(crate) kind: QualifierKind,
    pub(crate) span: DetachedSpan,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum QualifierKind {
    Id(String),
    Class(String),
    Attribute {
        name: String,
        test: Option<(AttributeOp, String)>,
    },
    /// `:not(...)`, whose argument is a compound with at most one qualifier.
    Negation(Box<Compound>),
    Nth {
        kind: NthKind,
        a: i64,
        b: i64,
    },
    Contains(String),
    Lang(String),
    /// Lowercased.
    PseudoClass(String),
    PseudoElement(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum AttributeOp {
    Equals,
    Includes,
    DashMatch,
    PrefixMatch,
    SuffixMatch,
    SubstringMatch,
    Different,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum NthKind {
    Child,
    LastChild,
    OfType,
    LastOfType,
}

pub(crate) fn parse(css: &str) -> Result<SelectorGroup, TranslateError> {
    let mut pairs = CssPairs::parse(Rule::top, css).map_err(format_err)?;
    let Some(top) = pairs.next() else {
        return Err(syntax_error("empty selector"));
    };
    let group = first_child(&top)?;
    let selectors = group
        .into_inner()
        .map(build_complex)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SelectorGroup(selectors))
}

fn format_err(err: pest::error::Error<Rule>) -> TranslateError {
    let renamed = err.renamed_rules(|rule| {
        match rule {
            Rule::EOI => "end of input",
            Rule::ws => "whitespace",
            Rule::top | Rule::selector_group => "selector",
            Rule::complex_selector | Rule::compound => "selector",
            Rule::combinator => "combinator",
            Rule::child => "_>_",
            Rule::adjacent => "_+_",
            Rule::sibling => "_~_",
            Rule::descendant => "whitespace",
            Rule::type_selector | Rule::element_name => "element name",
            Rule::namespace_prefix => "namespace prefix",
            Rule::universal => "_*_",
            Rule::qualifier => "_#_, _._, _[_ or _:_",
            Rule::hash => "_#id_",
            Rule::class => "_.class_",
            Rule::attrib => "attribute selector",
            Rule::attr_name => "attribute name",
            Rule::attr_op => "_=_, _~=_, _|=_, _^=_, _$=_, _*=_ or _!=_",
            Rule::attr_value => "identifier or string",
            Rule::negation => "_:not(...)_",
            Rule::negation_arg => "simple selector",
            Rule::nth => "_:nth-child(...)_",
            Rule::nth_kind => "_nth-child_, _nth-last-child_, _nth-of-type_ or _nth-last-of-type_",
            Rule::nth_expr => "_odd_, _even_ or _an+b_",
            Rule::nth_odd => "_odd_",
            Rule::nth_even => "_even_",
            Rule::nth_an_b | Rule::nth_a => "_an+b_",
            Rule::nth_sign => "_+_ or _-_",
            Rule::nth_digits | Rule::nth_b => "integer",
            Rule::contains => "_:contains(...)_",
            Rule::lang => "_:lang(...)_",
            Rule::pseudo_element => "pseudo-element",
            Rule::pseudo_class => "pseudo-class",
            Rule::ident | Rule::ident_start | Rule::ident_char => "identifier",
            Rule::name => "name",
            Rule::string | Rule::double_quoted | Rule::single_quoted => "string",
            Rule::escaped_newline | Rule::escape => "escape sequence",
        }
        .to_string()
        .replace('_', "\"")
    });
    syntax_error(renamed)
}

fn syntax_error(rendered: impl ToString) -> TranslateError {
    TranslateError::from_inner(InnerTranslateError::Syntax(rendered.to_string()))
}

fn other_error(pair: &Pair, message: impl Into<String>) -> TranslateError {
    TranslateError::from_inner(InnerTranslateError::Other(pair.as_span().into(), message.into()))
}

fn unexpected(pair: &Pair) -> TranslateError {
    other_error(pair, format!("unexpected {:?}", pair.as_rule()))
}

fn first_child<'a>(pair: &Pair<'a>) -> Result<Pair<'a>, TranslateError> {
    pair.clone().into_inner().next().ok_or_else(|| unexpected(pair))
}

fn build_complex(pair: Pair) -> Result<ComplexSelector, TranslateError> {
    let mut inner = pair.clone().into_inner();
    let first = build_compound(inner.next().ok_or_else(|| unexpected(&pair))?)?;
    let mut rest = Vec::new();
    while let Some(combinator) = inner.next() {
        let kind = match first_child(&combinator)?.as_rule() {
            Rule::descendant => Combinator::Descendant,
            Rule::child => Combinator::Child,
            Rule::adjacent => Combinator::Adjacent,
            Rule::sibling => Combinator::Sibling,
            _ => return Err(unexpected(&combinator)),
        };
        let compound = inner.next().ok_or_else(|| unexpected(&combinator))?;
        rest.push((kind, build_compound(compound)?));
    }
    Ok(ComplexSelector { first, rest })
}

fn build_compound(pair: Pair) -> Result<Compound, TranslateError> {
    let mut compound = Compound {
        element: None,
        qualifiers: Vec::new(),
    };
    for child in pair.into_inner() {
        add_to_compound(&mut compound, child)?;
    }
    Ok(compound)
}

fn add_to_compound(compound: &mut Compound, pair: Pair) -> Result<(), TranslateError> {
    let span = DetachedSpan::from(pair.as_span());
    let kind = match pair.as_rule() {
        Rule::type_selector => {
            compound.element = build_type_selector(pair)?;
            return Ok(());
        }
        Rule::hash => QualifierKind::Id(unescape(first_child(&pair)?.as_str())),
        Rule::class => QualifierKind::Class(unescape(first_child(&pair)?.as_str())),
        Rule::attrib => build_attrib(pair)?,
        Rule::negation => {
            let arg = first_child(&pair)?;
            let mut negated = Compound {
                element: None,
                qualifiers: Vec::new(),
            };
            add_to_compound(&mut negated, first_child(&arg)?)?;
            QualifierKind::Negation(Box::new(negated))
        }
        Rule::nth => build_nth(pair)?,
        Rule::contains => QualifierKind::Contains(string_or_ident(first_child(&pair)?)?),
        Rule::lang => QualifierKind::Lang(string_or_ident(first_child(&pair)?)?),
        Rule::pseudo_element => QualifierKind::PseudoElement(unescape(first_child(&pair)?.as_str())),
        Rule::pseudo_class => {
            QualifierKind::PseudoClass(unescape(first_child(&pair)?.as_str()).to_ascii_lowercase())
        }
        _ => return Err(unexpected(&pair)),
    };
    compound.qualifiers.push(Qualifier { kind, span });
    Ok(())
}

fn build_type_selector(pair: Pair) -> Result<Option<String>, TranslateError> {
    let mut element = None;
    for child in pair.clone().into_inner() {
        match child.as_rule() {
            Rule::namespace_prefix => return Err(other_error(&child, "namespaces are not supported")),
            Rule::universal => element = None,
            Rule::element_name => element = Some(unescape(first_child(&child)?.as_str())),
            _ => return Err(unexpected(&child)),
        }
    }
    Ok(element)
}

fn build_attrib(pair: Pair) -> Result<QualifierKind, TranslateError> {
    let mut inner = pair.clone().into_inner();
    let name_pair = inner.next().ok_or_else(|| unexpected(&pair))?;
    let name = unescape(first_child(&name_pair)?.as_str());
    let test = match inner.next() {
        None => None,
        Some(op_pair) => {
            let op = match op_pair.as_str() {
                "=" => AttributeOp::Equals,
                "~=" => AttributeOp::Includes,
                "|=" => AttributeOp::DashMatch,
                "^=" => AttributeOp::PrefixMatch,
                "$=" => AttributeOp::SuffixMatch,
                "*=" => AttributeOp::SubstringMatch,
                "!=" => AttributeOp::Different,
                _ => return Err(unexpected(&op_pair)),
            };
            let value = inner.next().ok_or_else(|| unexpected(&op_pair))?;
            Some((op, string_or_ident(first_child(&value)?)?))
        }
    };
    Ok(QualifierKind::Attribute { name, test })
}

fn build_nth(pair: Pair) -> Result<QualifierKind, TranslateError> {
    let mut inner = pair.clone().into_inner();
    let kind_pair = inner.next().ok_or_else(|| unexpected(&pair))?;
    let kind = match kind_pair.as_str().to_ascii_lowercase().as_str() {
        "nth-child" => NthKind::Child,
        "nth-last-child" => NthKind::LastChild,
        "nth-of-type" => NthKind::OfType,
        "nth-last-of-type" => NthKind::LastOfType,
        _ => return Err(unexpected(&kind_pair)),
    };
    let expr = inner.next().ok_or_else(|| unexpected(&kind_pair))?;
    let series = first_child(&expr)?;
    let (a, b) = match series.as_rule() {
        Rule::nth_odd => (2, 1),
        Rule::nth_even => (2, 0),
        Rule::nth_b => (0, parse_integer(&series, series.as_str())?),
        Rule::nth_an_b => {
            let mut parts = series.clone().into_inner();
            let a_pair = parts.next().ok_or_else(|| unexpected(&series))?;
            let a_text = &a_pair.as_str()[..a_pair.as_str().len() - 1];
            let a = match a_text {
                "" | "+" => 1,
                "-" => -1,
                digits => parse_integer(&a_pair, digits)?,
            };
            let b = match (parts.next(), parts.next()) {
                (Some(sign), Some(digits)) => {
                    let b = parse_integer(&digits, digits.as_str())?;
                    if sign.as_str() == "-" {
                        -b
                    } else {
                        b
                    }
                }
                _ => 0,
            };
            (a, b)
        }
        _ => return Err(unexpected(&series)),
    };
    Ok(QualifierKind::Nth { kind, a, b })
}

fn parse_integer(pair: &Pair, text: &str) -> Result<i64, TranslateError> {
    text.parse()
        .map_err(|_| other_error(pair, format!("invalid series: {text}")))
}

fn string_or_ident(pair: Pair) -> Result<String, TranslateError> {
    match pair.as_rule() {
        Rule::ident => Ok(unescape(pair.as_str())),
        Rule::string => Ok(unescape(first_child(&pair)?.as_str())),
        _ => Err(unexpected(&pair)),
    }
}

/// Resolves CSS escapes: `\` followed by up to six hex digits (and an optional whitespace character) is that code
/// point, `\` followed by a newline is nothing, and `\` followed by anything else is that character.
fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        let mut hex = String::new();
        while let Some(&digit) = chars.peek() {
            if hex.len() == 6 || !digit.is_ascii_hexdigit() {
                break;
            }
            hex.push(digit);
            chars.next();
        }
        if hex.is_empty() {
            match chars.next() {
                Some('\r') => {
                    chars.next_if_eq(&'\n');
                }
                Some('\n' | '\u{0C}') | None => {}
                Some(other) => result.push(other),
            }
            continue;
        }
        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .filter(|&code| code != 0)
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        result.push(decoded);
        match chars.peek() {
            Some(' ' | '\t' | '\n') => {
                chars.next();
            }
            Some('\r') => {
                chars.next();
                chars.next_if_eq(&'\n');
            }
            _ => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::utils_for_test::*;

    fn parse_one(css: &str) -> ComplexSelector {
        get_only(parse(css).unwrap_or_else(|err| panic!("{}", err.to_string(css))).0)
    }

    fn only_qualifier(css: &str) -> QualifierKind {
        let selector = parse_one(css);
        assert!(selector.rest.is_empty());
        get_only(selector.first.qualifiers).kind
    }

    #[test]
    fn type_and_universal() {
        let selector = parse_one("div");
        assert_eq!(selector.first.element.as_deref(), Some("div"));
        assert!(selector.first.qualifiers.is_empty());

        let selector = parse_one("*");
        assert_eq!(selector.first.element, None);
    }

    #[test]
    fn combinators() {
        let selector = parse_one("  html body>p + a ~ span  ");
        let kinds: Vec<_> = selector.rest.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(
            kinds,
            [
                Combinator::Descendant,
                Combinator::Child,
                Combinator::Adjacent,
                Combinator::Sibling
            ]
        );
        let names: Vec<_> = selector.rest.iter().map(|(_, c)| c.element.clone().unwrap_or_default()).collect();
        assert_eq!(names, ["body", "p", "a", "span"]);
    }

    #[test]
    fn groups() {
        let group = unwrap_ok(parse("a, b ,c"));
        assert_eq!(group.0.len(), 3);
    }

    #[test]
    fn qualifiers() {
        assert_eq!(only_qualifier("#main"), QualifierKind::Id("main".to_string()));
        assert_eq!(only_qualifier(".wide"), QualifierKind::Class("wide".to_string()));
        assert_eq!(
            only_qualifier("[href]"),
            QualifierKind::Attribute {
                name: "href".to_string(),
                test: None,
            }
        );
        assert_eq!(
            only_qualifier("[ lang |= 'en' ]"),
            QualifierKind::Attribute {
                name: "lang".to_string(),
                test: Some((AttributeOp::DashMatch, "en".to_string())),
            }
        );
        assert_eq!(
            only_qualifier(r#"[title!="a b"]"#),
            QualifierKind::Attribute {
                name: "title".to_string(),
                test: Some((AttributeOp::Different, "a b".to_string())),
            }
        );
        assert_eq!(only_qualifier(":First-Child"), QualifierKind::PseudoClass("first-child".to_string()));
        assert_eq!(only_qualifier("::before"), QualifierKind::PseudoElement("before".to_string()));
        assert_eq!(only_qualifier(":contains('x y')"), QualifierKind::Contains("x y".to_string()));
        assert_eq!(only_qualifier(":lang(fr)"), QualifierKind::Lang("fr".to_string()));
    }

    #[test]
    fn negation() {
        unwrap!(only_qualifier(":not(.a)"), QualifierKind::Negation(negated));
        assert_eq!(negated.element, None);
        assert_eq!(get_only(negated.qualifiers).kind, QualifierKind::Class("a".to_string()));

        unwrap!(only_qualifier(":not( p )"), QualifierKind::Negation(negated));
        assert_eq!(negated.element.as_deref(), Some("p"));
    }

    #[test]
    fn nth_series() {
        let cases = [
            ("odd", 2, 1),
            ("even", 2, 0),
            ("3", 0, 3),
            ("-1", 0, -1),
            ("n", 1, 0),
            ("-n+3", -1, 3),
            ("+2n - 1", 2, -1),
            ("10N+0", 10, 0),
        ];
        for (series, want_a, want_b) in cases {
            let css = format!(":nth-child({series})");
            unwrap!(only_qualifier(&css), QualifierKind::Nth { kind, a, b });
            assert_eq!(kind, NthKind::Child);
            assert_eq!((a, b), (want_a, want_b), "{series}");
        }
        unwrap!(only_qualifier(":nth-last-of-type(2)"), QualifierKind::Nth { kind, .. });
        assert_eq!(kind, NthKind::LastOfType);
    }

    #[test]
    fn escapes() {
        assert_eq!(unescape(r"a\.b"), "a.b");
        assert_eq!(unescape(r"\31 23"), "123");
        assert_eq!(unescape(r"\E9t\E9"), "été");
        assert_eq!(unescape(r"\0"), "\u{FFFD}");
        assert_eq!(only_qualifier(r"#\31 0"), QualifierKind::Id("10".to_string()));
        assert_eq!(only_qualifier(r#"[title="say \"hi\""]"#), {
            QualifierKind::Attribute {
                name: "title".to_string(),
                test: Some((AttributeOp::Equals, "say \"hi\"".to_string())),
            }
        });
    }

    #[test]
    fn syntax_errors() {
        for bad in ["", "a,", "a >", "[href", "a[=x]", "#", ".1", ":nth-child(x)", "[a=1]", "a:not(:not(b))"] {
            unwrap!(parse(bad), Err(err));
            unwrap!(err.inner, InnerTranslateError::Syntax(_));
        }
    }

    #[test]
    fn namespaces_are_rejected() {
        unwrap!(parse("svg|rect"), Err(err));
        unwrap!(err.inner, InnerTranslateError::Other(span, message));
        assert_eq!(message, "namespaces are not supported");
        assert_eq!(span, DetachedSpan { start: 0, end: 4 });
    }

    fn unwrap_ok(result: Result<SelectorGroup, TranslateError>) -> SelectorGroup {
        result.unwrap_or_else(|err| panic!("{err}"))
    }
}
