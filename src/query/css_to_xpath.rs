use crate::query::css::{
    AttributeOp, Combinator, ComplexSelector, Compound, NthKind, Qualifier, QualifierKind, SelectorGroup,
};
use crate::query::{DetachedSpan, InnerTranslateError, TranslateError};
use std::fmt::{Display, Formatter};

const PREFIX: &str = "descendant-or-self::";

/// Translates each selector of the group, joining them as an XPath union.
pub(crate) fn translate(group: &SelectorGroup) -> Result<String, TranslateError> {
    let mut translated = Vec::with_capacity(group.0.len());
    for selector in &group.0 {
        translated.push(format!("{PREFIX}{}", complex_to_xpath(selector)?));
    }
    Ok(translated.join(" | "))
}

/// A location path under construction: `path` is everything up to the last step, which is `element[condition]`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct XPathExpr {
    path: String,
    element: String,
    condition: String,
}

impl XPathExpr {
    fn for_element(element: Option<&str>) -> Self {
        let mut expr = Self {
            path: String::new(),
            element: element.unwrap_or("*").to_string(),
            condition: String::new(),
        };
        if !is_safe_name(&expr.element) {
            expr.add_name_test();
        }
        expr
    }

    fn add_condition(&mut self, condition: &str) {
        self.condition = if self.condition.is_empty() {
            condition.to_string()
        } else {
            format!("({}) and ({condition})", self.condition)
        };
    }

    /// Moves the element name into the condition, leaving `*` as the node test.
    fn add_name_test(&mut self) {
        if self.element == "*" {
            return;
        }
        let test = format!("name() = {}", literal(&self.element));
        self.add_condition(&test);
        self.element = "*".to_string();
    }

    fn join(self, combiner: &str, other: XPathExpr) -> Self {
        let mut path = self.to_string();
        path.push_str(combiner);
        if other.path != "*/" {
            path.push_str(&other.path);
        }
        Self {
            path,
            element: other.element,
            condition: other.condition,
        }
    }
}

impl Display for XPathExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.path, self.element)?;
        if !self.condition.is_empty() {
            write!(f, "[{}]", self.condition)?;
        }
        Ok(())
    }
}

fn complex_to_xpath(selector: &ComplexSelector) -> Result<XPathExpr, TranslateError> {
    let mut xpath = compound_to_xpath(&selector.first)?;
    for (combinator, compound) in &selector.rest {
        let right = compound_to_xpath(compound)?;
        xpath = match combinator {
            Combinator::Descendant => xpath.join("/descendant-or-self::*/", right),
            Combinator::Child => xpath.join("/", right),
            Combinator::Adjacent => {
                let mut joined = xpath.join("/following-sibling::", right);
                joined.add_name_test();
                joined.add_condition("position() = 1");
                joined
            }
            Combinator::Sibling => xpath.join("/following-sibling::", right),
        };
    }
    Ok(xpath)
}

fn compound_to_xpath(compound: &Compound) -> Result<XPathExpr, TranslateError> {
    let mut xpath = XPathExpr::for_element(compound.element.as_deref());
    for qualifier in &compound.qualifiers {
        apply_qualifier(&mut xpath, qualifier)?;
    }
    Ok(xpath)
}

fn apply_qualifier(xpath: &mut XPathExpr, qualifier: &Qualifier) -> Result<(), TranslateError> {
    match &qualifier.kind {
        QualifierKind::Id(id) => xpath.add_condition(&format!("@id = {}", literal(id))),
        QualifierKind::Class(class) => add_includes(xpath, "@class", class),
        QualifierKind::Attribute { name, test } => {
            let attribute = if is_safe_name(name) {
                format!("@{name}")
            } else {
                format!("attribute::*[name() = {}]", literal(name))
            };
            match test {
                None => xpath.add_condition(&attribute),
                Some((op, value)) => add_attribute_test(xpath, &attribute, *op, value),
            }
        }
        QualifierKind::Negation(negated) => {
            let mut negated = compound_to_xpath(negated)?;
            negated.add_name_test();
            if negated.condition.is_empty() {
                xpath.add_condition("false()");
            } else {
                xpath.add_condition(&format!("not({})", negated.condition));
            }
        }
        QualifierKind::Nth { kind, a, b } => add_nth(xpath, *kind, *a, *b, qualifier.span)?,
        QualifierKind::Contains(text) => xpath.add_condition(&format!("contains(string(.), {})", literal(text))),
        QualifierKind::Lang(lang) => xpath.add_condition(&format!("lang({})", literal(lang))),
        QualifierKind::PseudoClass(name) => add_pseudo_class(xpath, name, qualifier.span)?,
        QualifierKind::PseudoElement(_) => return Err(pseudo_element(qualifier.span)),
    }
    Ok(())
}

fn add_attribute_test(xpath: &mut XPathExpr, name: &str, op: AttributeOp, value: &str) {
    let value_literal = literal(value);
    let condition = match op {
        AttributeOp::Equals => format!("{name} = {value_literal}"),
        AttributeOp::Includes => return add_includes(xpath, name, value),
        AttributeOp::DashMatch => {
            let dashed = literal(&format!("{value}-"));
            format!("{name} and ({name} = {value_literal} or starts-with({name}, {dashed}))")
        }
        AttributeOp::PrefixMatch if !value.is_empty() => format!("{name} and starts-with({name}, {value_literal})"),
        AttributeOp::SuffixMatch if !value.is_empty() => {
            let offset = value.chars().count() - 1;
            format!("{name} and substring({name}, string-length({name})-{offset}) = {value_literal}")
        }
        AttributeOp::SubstringMatch if !value.is_empty() => format!("{name} and contains({name}, {value_literal})"),
        AttributeOp::PrefixMatch | AttributeOp::SuffixMatch | AttributeOp::SubstringMatch => "false()".to_string(),
        AttributeOp::Different if value.is_empty() => format!("{name} != {value_literal}"),
        AttributeOp::Different => format!("not({name}) or {name} != {value_literal}"),
    };
    xpath.add_condition(&condition);
}

/// Whitespace-separated word match, as for `.class` and `[attr~=value]`.
fn add_includes(xpath: &mut XPathExpr, name: &str, value: &str) {
    if value.is_empty() || value.contains([' ', '\t', '\r', '\n', '\u{0C}']) {
        xpath.add_condition("false()");
        return;
    }
    let padded = literal(&format!(" {value} "));
    xpath.add_condition(&format!(
        "{name} and contains(concat(' ', normalize-space({name}), ' '), {padded})"
    ));
}

/// `:nth-*(an+b)`: the element's 1-based index among the counted siblings is `an+b` for some `n >= 0`.
fn add_nth(xpath: &mut XPathExpr, kind: NthKind, a: i64, b: i64, span: DetachedSpan) -> Result<(), TranslateError> {
    let (last, of_type) = match kind {
        NthKind::Child => (false, false),
        NthKind::LastChild => (true, false),
        NthKind::OfType => (false, true),
        NthKind::LastOfType => (true, true),
    };
    let node_test = if of_type {
        require_element(xpath, "nth-of-type", span)?
    } else {
        "*".to_string()
    };

    let b_min_1 = b.saturating_sub(1);
    if a == 1 && b_min_1 <= 0 {
        return Ok(());
    }
    if a < 0 && b_min_1 < 0 {
        xpath.add_condition("false()");
        return Ok(());
    }

    let axis = if last { "following-sibling" } else { "preceding-sibling" };
    let count = format!("count({axis}::{node_test})");
    if a == 0 {
        xpath.add_condition(&format!("{count} = {b_min_1}"));
        return Ok(());
    }

    let mut parts = Vec::with_capacity(2);
    if a > 0 {
        if b_min_1 > 0 {
            parts.push(format!("{count} >= {b_min_1}"));
        }
    } else {
        parts.push(format!("{count} <= {b_min_1}"));
    }
    if a.unsigned_abs() != 1 {
        let offset = (-i128::from(b_min_1)).rem_euclid(i128::from(a.unsigned_abs()));
        let left = if offset == 0 {
            count
        } else {
            format!("({count} +{offset})")
        };
        parts.push(format!("{left} mod {a} = 0"));
    }

    let condition = if parts.len() > 1 {
        parts.iter().map(|part| format!("({part})")).collect::<Vec<_>>().join(" and ")
    } else {
        parts.join(" and ")
    };
    xpath.add_condition(&condition);
    Ok(())
}

fn add_pseudo_class(xpath: &mut XPathExpr, name: &str, span: DetachedSpan) -> Result<(), TranslateError> {
    let condition = match name {
        "first-child" => "count(preceding-sibling::*) = 0".to_string(),
        "last-child" => "count(following-sibling::*) = 0".to_string(),
        "only-child" => "count(parent::*/child::*) = 1".to_string(),
        "first-of-type" => {
            let element = require_element(xpath, name, span)?;
            format!("count(preceding-sibling::{element}) = 0")
        }
        "last-of-type" => {
            let element = require_element(xpath, name, span)?;
            format!("count(following-sibling::{element}) = 0")
        }
        "only-of-type" => {
            let element = require_element(xpath, name, span)?;
            format!("count(parent::*/child::{element}) = 1")
        }
        "empty" => "not(*) and not(string-length())".to_string(),
        "root" => "not(parent::*)".to_string(),
        "link" | "visited" | "hover" | "active" | "focus" | "target" | "enabled" | "disabled" | "checked" => {
            "false()".to_string()
        }
        "before" | "after" | "first-line" | "first-letter" => return Err(pseudo_element(span)),
        _ => {
            return Err(TranslateError::from_inner(InnerTranslateError::Other(
                span,
                format!("unknown pseudo-class :{name}"),
            )))
        }
    };
    xpath.add_condition(&condition);
    Ok(())
}

fn require_element(xpath: &XPathExpr, pseudo: &str, span: DetachedSpan) -> Result<String, TranslateError> {
    if xpath.element == "*" {
        return Err(TranslateError::from_inner(InnerTranslateError::Other(
            span,
            format!("*:{pseudo} is not supported; it needs an element name"),
        )));
    }
    Ok(xpath.element.clone())
}

fn pseudo_element(span: DetachedSpan) -> TranslateError {
    TranslateError::from_inner(InnerTranslateError::Other(
        span,
        "pseudo-elements are not supported".to_string(),
    ))
}

fn is_safe_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
        }
        _ => false,
    }
}

/// Quotes a string as an XPath literal, falling back to `concat()` when it holds both kinds of quote.
fn literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in text.chars() {
        let is_quote = ch == '\'';
        if is_quote != in_quotes && !current.is_empty() {
            pieces.push(quote_piece(&current, in_quotes));
            current.clear();
        }
        in_quotes = is_quote;
        current.push(ch);
    }
    if !current.is_empty() {
        pieces.push(quote_piece(&current, in_quotes));
    }
    format!("concat({})", pieces.join(","))
}

fn quote_piece(piece: &str, is_apostrophes: bool) -> String {
    if is_apostrophes {
        format!("\"{piece}\"")
    } else {
        format!("'{piece}'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Css3Translator, CssTranslator};
    use crate::util::utils_for_test::*;

    fn check(css: &str, expected: &str) {
        let actual = Css3Translator
            .translate(css)
            .unwrap_or_else(|err| panic!("{css}: {}", err.to_string(css)));
        assert_eq!(actual, expected, "translating {css:?}");
        if let Err(err) = crate::xpath::parse(&actual) {
            panic!("{actual} doesn't parse as XPath: {err}");
        }
    }

    fn check_error(css: &str, expected_message: &str) {
        unwrap!(Css3Translator.translate(css), Err(err));
        unwrap!(err.inner, InnerTranslateError::Other(_, message));
        assert_eq!(message, expected_message);
    }

    #[test]
    fn elements_and_combinators() {
        check("div", "descendant-or-self::div");
        check("*", "descendant-or-self::*");
        check("div p", "descendant-or-self::div/descendant-or-self::*/p");
        check("div > p", "descendant-or-self::div/p");
        check("h1 ~ p", "descendant-or-self::h1/following-sibling::p");
        check(
            "h1 + p",
            "descendant-or-self::h1/following-sibling::*[(name() = 'p') and (position() = 1)]",
        );
        check(
            "ul > li a",
            "descendant-or-self::ul/li/descendant-or-self::*/a",
        );
    }

    #[test]
    fn groups_become_unions() {
        check("div, p", "descendant-or-self::div | descendant-or-self::p");
    }

    #[test]
    fn ids_and_classes() {
        check("#main", "descendant-or-self::*[@id = 'main']");
        check(
            "p.intro",
            "descendant-or-self::p[@class and contains(concat(' ', normalize-space(@class), ' '), ' intro ')]",
        );
        check(
            ".a.b",
            "descendant-or-self::*[(@class and contains(concat(' ', normalize-space(@class), ' '), ' a ')) \
             and (@class and contains(concat(' ', normalize-space(@class), ' '), ' b '))]",
        );
        check(
            "div#x > .y",
            "descendant-or-self::div[@id = 'x']/*[@class and contains(concat(' ', normalize-space(@class), ' '), ' y ')]",
        );
    }

    #[test]
    fn attributes() {
        check("[data-x]", "descendant-or-self::*[@data-x]");
        check("a[href='/a']", "descendant-or-self::a[@href = '/a']");
        check("a[href^='http']", "descendant-or-self::a[@href and starts-with(@href, 'http')]");
        check(
            "a[href$='.pdf']",
            "descendant-or-self::a[@href and substring(@href, string-length(@href)-3) = '.pdf']",
        );
        check("a[href*=example]", "descendant-or-self::a[@href and contains(@href, 'example')]");
        check(
            "a[rel~='nofollow']",
            "descendant-or-self::a[@rel and contains(concat(' ', normalize-space(@rel), ' '), ' nofollow ')]",
        );
        check(
            "[lang|=en]",
            "descendant-or-self::*[@lang and (@lang = 'en' or starts-with(@lang, 'en-'))]",
        );
        check("[a!=x]", "descendant-or-self::*[not(@a) or @a != 'x']");
        check("[a!='']", "descendant-or-self::*[@a != '']");
        check(r"[\31 x]", "descendant-or-self::*[attribute::*[name() = '1x']]");
    }

    #[test]
    fn never_matching_attribute_tests() {
        check("[a^='']", "descendant-or-self::*[false()]");
        check("[a$='']", "descendant-or-self::*[false()]");
        check("[a*='']", "descendant-or-self::*[false()]");
        check("[a~='x y']", "descendant-or-self::*[false()]");
    }

    #[test]
    fn structural_pseudo_classes() {
        check("p:first-child", "descendant-or-self::p[count(preceding-sibling::*) = 0]");
        check("p:last-child", "descendant-or-self::p[count(following-sibling::*) = 0]");
        check("p:only-child", "descendant-or-self::p[count(parent::*/child::*) = 1]");
        check("p:first-of-type", "descendant-or-self::p[count(preceding-sibling::p) = 0]");
        check("p:last-of-type", "descendant-or-self::p[count(following-sibling::p) = 0]");
        check("p:only-of-type", "descendant-or-self::p[count(parent::*/child::p) = 1]");
        check("p:empty", "descendant-or-self::p[not(*) and not(string-length())]");
        check("html:root", "descendant-or-self::html[not(parent::*)]");
        check("a:hover", "descendant-or-self::a[false()]");
    }

    #[test]
    fn nth() {
        check("li:nth-child(2)", "descendant-or-self::li[count(preceding-sibling::*) = 1]");
        check("li:nth-child(odd)", "descendant-or-self::li[count(preceding-sibling::*) mod 2 = 0]");
        check(
            "li:nth-child(even)",
            "descendant-or-self::li[(count(preceding-sibling::*) +1) mod 2 = 0]",
        );
        check(
            "li:nth-child(3n+4)",
            "descendant-or-self::li[(count(preceding-sibling::*) >= 3) and (count(preceding-sibling::*) mod 3 = 0)]",
        );
        check(
            "li:nth-last-child(-n+2)",
            "descendant-or-self::li[count(following-sibling::*) <= 1]",
        );
        check("li:nth-child(n)", "descendant-or-self::li");
        check("li:nth-child(-n)", "descendant-or-self::li[false()]");
        check("li:nth-of-type(2)", "descendant-or-self::li[count(preceding-sibling::li) = 1]");
        check(
            "li:nth-last-of-type(-2n+3)",
            "descendant-or-self::li[(count(following-sibling::li) <= 2) and (count(following-sibling::li) mod -2 = 0)]",
        );
    }

    #[test]
    fn negation() {
        check(
            "p:not(.intro)",
            "descendant-or-self::p[not(@class and contains(concat(' ', normalize-space(@class), ' '), ' intro '))]",
        );
        check("a:not([href])", "descendant-or-self::a[not(@href)]");
        check("div :not(p)", "descendant-or-self::div/descendant-or-self::*/*[not(name() = 'p')]");
        check(":not(*)", "descendant-or-self::*[false()]");
    }

    #[test]
    fn text_and_lang() {
        check(r#"p:contains("it's")"#, r#"descendant-or-self::p[contains(string(.), "it's")]"#);
        check("a:lang(en)", "descendant-or-self::a[lang('en')]");
    }

    #[test]
    fn literals() {
        assert_eq!(literal("plain"), "'plain'");
        assert_eq!(literal("it's"), "\"it's\"");
        assert_eq!(literal(r#"a'b"c"#), r#"concat('a',"'",'b"c')"#);
        assert_eq!(literal(r#"''x""#), r#"concat("''",'x"')"#);
    }

    #[test]
    fn untranslatable() {
        check_error("p::before", "pseudo-elements are not supported");
        check_error("p:after", "pseudo-elements are not supported");
        check_error("p:bogus", "unknown pseudo-class :bogus");
        check_error("*:first-of-type", "*:first-of-type is not supported; it needs an element name");
        check_error(".x:nth-of-type(2)", "*:nth-of-type is not supported; it needs an element name");
    }
}
