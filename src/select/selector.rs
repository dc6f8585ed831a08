use crate::query::CssTranslator;
use crate::xpath;
use std::fmt::{Display, Formatter};
use tracing::debug;

/// A selector as the user wrote it, classified once.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Selector {
    pub raw: String,
    pub kind: SelectorKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    XPath,
    Css,
}

impl Selector {
    /// Classifies `raw`: it's XPath if it starts with `//`, `./` or `(`, and CSS otherwise.
    pub fn classify(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let kind = if raw.starts_with("//") || raw.starts_with("./") || raw.starts_with('(') {
            SelectorKind::XPath
        } else {
            SelectorKind::Css
        };
        Self { raw, kind }
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A selector ready to evaluate.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledQuery {
    pub selector: Selector,
    /// The XPath text: the selector itself, or its translation.
    pub xpath: String,
    pub expr: xpath::Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    /// CSS selectors were given, but there's no translator to compile them with.
    #[error("CSS selectors need a CSS translator, which is not available in this build: {}", .selectors.join(", "))]
    CapabilityMissing { selectors: Vec<String> },

    #[error("invalid selector {selector:?}:\n{message}")]
    InvalidSelector { selector: String, message: String },
}

/// Compiles selectors into [`CompiledQuery`]s.
pub struct SelectorCompiler {
    translator: Option<Box<dyn CssTranslator>>,
}

impl Default for SelectorCompiler {
    /// A compiler with the built-in CSS translator, if this build has one.
    fn default() -> Self {
        #[cfg(feature = "css")]
        let translator: Option<Box<dyn CssTranslator>> = Some(Box::new(crate::query::Css3Translator));
        #[cfg(not(feature = "css"))]
        let translator: Option<Box<dyn CssTranslator>> = None;
        Self { translator }
    }
}

impl SelectorCompiler {
    /// A compiler that only accepts XPath.
    pub fn without_css() -> Self {
        Self { translator: None }
    }

    pub fn with_translator(translator: impl CssTranslator + 'static) -> Self {
        Self {
            translator: Some(Box::new(translator)),
        }
    }

    /// Compiles every selector, in order, or fails on the first one that doesn't compile.
    pub fn compile<S: AsRef<str>>(&self, selectors: &[S]) -> Result<Vec<CompiledQuery>, SelectError> {
        let selectors: Vec<Selector> = selectors.iter().map(|raw| Selector::classify(raw.as_ref())).collect();

        if self.translator.is_none() {
            let css: Vec<String> = selectors
                .iter()
                .filter(|selector| selector.kind == SelectorKind::Css)
                .map(|selector| selector.raw.clone())
                .collect();
            if !css.is_empty() {
                return Err(SelectError::CapabilityMissing { selectors: css });
            }
        }

        selectors.into_iter().map(|selector| self.compile_one(selector)).collect()
    }

    fn compile_one(&self, selector: Selector) -> Result<CompiledQuery, SelectError> {
        let xpath = match (selector.kind, &self.translator) {
            (SelectorKind::XPath, _) => selector.raw.clone(),
            (SelectorKind::Css, Some(translator)) => {
                translator
                    .translate(&selector.raw)
                    .map_err(|err| SelectError::InvalidSelector {
                        selector: selector.raw.clone(),
                        message: err.to_string(&selector.raw),
                    })?
            }
            (SelectorKind::Css, None) => {
                return Err(SelectError::CapabilityMissing {
                    selectors: vec![selector.raw],
                })
            }
        };
        let expr = xpath::parse(&xpath).map_err(|err| SelectError::InvalidSelector {
            selector: selector.raw.clone(),
            message: err.to_string(),
        })?;
        debug!(selector = %selector, %xpath, "compiled selector");
        Ok(CompiledQuery { selector, xpath, expr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TranslateError;
    use crate::util::utils_for_test::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn classification() {
        assert_eq!(Selector::classify("//div").kind, SelectorKind::XPath);
        assert_eq!(Selector::classify("./p").kind, SelectorKind::XPath);
        assert_eq!(Selector::classify("(//a)[1]").kind, SelectorKind::XPath);
        assert_eq!(Selector::classify("/html/body").kind, SelectorKind::Css);
        assert_eq!(Selector::classify("div > p").kind, SelectorKind::Css);
        assert_eq!(Selector::classify(".x").kind, SelectorKind::Css);
    }

    #[test]
    fn xpath_passes_through() {
        let compiler = SelectorCompiler::without_css();
        let compiled = get_only(compiler.compile(&["//a/@href"]).unwrap());
        assert_eq!(compiled.xpath, "//a/@href");
        assert_eq!(compiled.selector.kind, SelectorKind::XPath);
    }

    #[test]
    fn invalid_xpath() {
        let compiler = SelectorCompiler::without_css();
        unwrap!(compiler.compile(&["//a["]), Err(SelectError::InvalidSelector { selector, message }));
        assert_eq!(selector, "//a[");
        assert!(message.contains("//a["), "{message}");
    }

    #[cfg(feature = "css")]
    #[test]
    fn one_query_per_selector_in_order() {
        let compiler = SelectorCompiler::default();
        let compiled = compiler.compile(&["h1", "//p", "a.x"]).unwrap();
        let raws: Vec<_> = compiled.iter().map(|c| c.selector.raw.as_str()).collect();
        assert_eq!(raws, ["h1", "//p", "a.x"]);
        assert_eq!(compiled[0].xpath, "descendant-or-self::h1");
        assert_eq!(compiled[1].xpath, "//p");
    }

    #[cfg(feature = "css")]
    #[test]
    fn invalid_css() {
        let compiler = SelectorCompiler::default();
        unwrap!(compiler.compile(&["//p", "p::before"]), Err(SelectError::InvalidSelector { selector, message }));
        assert_eq!(selector, "p::before");
        assert!(message.contains("pseudo-elements are not supported"), "{message}");
    }

    /// Counts calls, and translates everything to `//x`.
    struct CountingTranslator(Rc<Cell<usize>>);

    impl CssTranslator for CountingTranslator {
        fn translate(&self, _css: &str) -> Result<String, TranslateError> {
            self.0.set(self.0.get() + 1);
            Ok("//x".to_string())
        }
    }

    #[test]
    fn custom_translator() {
        let calls = Rc::new(Cell::new(0));
        let compiler = SelectorCompiler::with_translator(CountingTranslator(Rc::clone(&calls)));
        let compiled = compiler.compile(&["a", "//b", "c"]).unwrap();
        assert_eq!(compiled.len(), 3);
        assert_eq!(compiled[2].xpath, "//x");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn missing_capability_is_checked_first() {
        let compiler = SelectorCompiler::without_css();
        let result = compiler.compile(&["//a[", "div", "//p", "span"]);
        unwrap!(result, Err(SelectError::CapabilityMissing { selectors }));
        assert_eq!(selectors, ["div", "span"]);
    }

    #[test]
    fn no_selectors() {
        let compiler = SelectorCompiler::without_css();
        let compiled = compiler.compile::<&str>(&[]).unwrap();
        assert!(compiled.is_empty());
    }
}
