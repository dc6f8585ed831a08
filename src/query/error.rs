use pest::Span;
use std::fmt::{Display, Formatter};

/// A CSS selector that could not be translated to XPath.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TranslateError {
    pub(crate) inner: InnerTranslateError,
}

impl TranslateError {
    pub(crate) fn from_inner(inner: InnerTranslateError) -> Self {
        Self { inner }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum InnerTranslateError {
    /// An already-rendered grammar error.
    Syntax(String),
    /// Valid syntax with no XPath equivalent, like a pseudo-element.
    Other(DetachedSpan, String),
}

impl std::error::Error for TranslateError {}

impl Display for TranslateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            InnerTranslateError::Syntax(rendered) => Display::fmt(rendered, f),
            InnerTranslateError::Other(_, message) => Display::fmt(message, f),
        }
    }
}

impl TranslateError {
    /// Renders the error against the selector text it came from, pointing at the offending span when there is one.
    pub fn to_string(&self, css: &str) -> String {
        match &self.inner {
            InnerTranslateError::Syntax(rendered) => rendered.clone(),
            InnerTranslateError::Other(span, message) => match Span::new(css, span.start, span.end) {
                None => message.to_string(),
                Some(span) => {
                    let pest_err = pest::error::Error::<()>::new_from_span(
                        pest::error::ErrorVariant::CustomError {
                            message: message.to_string(),
                        },
                        span,
                    );
                    pest_err.to_string()
                }
            },
        }
    }
}

/// Like a [pest::Span], but without a reference to the underlying `&str`, and thus cheaply Copyable.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Hash)]
pub struct DetachedSpan {
    pub start: usize,
    pub end: usize,
}

impl From<pest::Span<'_>> for DetachedSpan {
    fn from(value: pest::Span) -> Self {
        Self {
            start: value.start(),
            end: value.end(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_error_points_at_span() {
        let err = TranslateError::from_inner(InnerTranslateError::Other(
            DetachedSpan { start: 1, end: 7 },
            "pseudo-elements are not supported".to_string(),
        ));
        assert_eq!(format!("{err}"), "pseudo-elements are not supported");

        let rendered = err.to_string("p::before");
        assert!(rendered.contains("p::before"), "{rendered}");
        assert!(rendered.contains("^----^"), "{rendered}");
        assert!(rendered.contains("pseudo-elements are not supported"), "{rendered}");
    }

    #[test]
    fn out_of_range_span_falls_back_to_message() {
        let err = TranslateError::from_inner(InnerTranslateError::Other(
            DetachedSpan { start: 4, end: 40 },
            "oops".to_string(),
        ));
        assert_eq!(err.to_string("a"), "oops");
    }
}
