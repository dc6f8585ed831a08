//! Renders an [`ExtractionOutcome`] as text and writes it out.

use crate::extract::ExtractionOutcome;
use std::io;
use std::io::Write;
use tracing::debug;

/// Written before the texts when wrapping the output in an HTML document.
pub const HTML_PROLOGUE: &str = "<!DOCTYPE html>\n<html>\n<body>\n";

/// Written after the texts when wrapping the output in an HTML document. A final newline follows it.
pub const HTML_EPILOGUE: &str = "</body>\n</html>";

/// Formats the outcome.
///
/// Texts are joined by tabs into a single line, optionally wrapped in [`HTML_PROLOGUE`] and [`HTML_EPILOGUE`], and
/// always end with exactly one newline. An existence check has no output.
pub fn format(outcome: &ExtractionOutcome, wrap_in_html: bool) -> String {
    let texts = match outcome {
        ExtractionOutcome::Exists(_) => return String::new(),
        ExtractionOutcome::Texts(texts) => texts,
    };
    let joined = texts.join("\t");
    let mut result = String::with_capacity(joined.len() + HTML_PROLOGUE.len() + HTML_EPILOGUE.len() + 1);
    if wrap_in_html {
        result.push_str(HTML_PROLOGUE);
        result.push_str(&joined);
        result.push_str(HTML_EPILOGUE);
    } else {
        result.push_str(&joined);
    }
    result.push('\n');
    result
}

/// Writes and flushes `text`. A reader that has gone away (a broken pipe) is not an error.
pub fn write_output(mut out: impl Write, text: &str) -> io::Result<()> {
    let result = out.write_all(text.as_bytes()).and_then(|()| out.flush());
    match result {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            debug!("output closed early: {err}");
            Ok(())
        }
        other => other,
    }
}
