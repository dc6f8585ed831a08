//! Selector classification and compilation.
//!
//! Each selector is either XPath, used as is, or CSS, translated to XPath through a [`crate::query::CssTranslator`].
//! Either way the XPath is parsed up front, so that every syntax error surfaces before any input is read.

mod selector;

pub use selector::*;
