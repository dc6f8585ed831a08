//! CSS selector support: a [CssTranslator] turns a CSS3 selector into an equivalent XPath 1.0 expression.

#[cfg(feature = "css")]
mod css;
#[cfg(feature = "css")]
mod css_to_xpath;
mod error;

#[cfg(feature = "css")]
pub use css::Css3Translator;
pub use error::*;

/// Translates CSS selectors to XPath.
pub trait CssTranslator {
    fn translate(&self, css: &str) -> Result<String, TranslateError>;
}
