use crate::extract::{extract, EvalError, ExtractOptions, ExtractionOutcome};
use crate::html::{ByteSource, ParseError, SourceError};
use crate::output::write_output;
use crate::run::RunOptions;
use crate::select::{SelectError, SelectorCompiler};
use crate::{html, output};
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::{env, io};
use tracing::debug;

/// The run's overall possible error. All of them are fatal, and none produce partial output.
#[derive(Debug)]
pub enum Error {
    /// The options don't make sense together. See [`RunOptions::validate`].
    Configuration(String),

    /// CSS selectors were given, but this build can't translate them.
    CapabilityMissing(Vec<String>),

    /// A CSS selector didn't translate, or an XPath expression didn't parse.
    InvalidSelector { selector: String, message: String },

    /// Couldn't read the input.
    Source(SourceError),

    /// The input isn't well-formed XML. Only raw input mode produces this.
    Parse(ParseError),

    /// A selector parsed, but failed when evaluated.
    Eval(EvalError),

    /// Couldn't write the results.
    Output(io::Error),
}

impl std::error::Error for Error {}

impl From<SelectError> for Error {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::CapabilityMissing { selectors } => Error::CapabilityMissing(selectors),
            SelectError::InvalidSelector { selector, message } => Error::InvalidSelector { selector, message },
        }
    }
}

fn portable_errors() -> bool {
    !env::var("SCRAPE_PORTABLE_ERRORS").unwrap_or_default().is_empty()
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Configuration(message) => writeln!(f, "Invalid options: {message}"),
            Error::CapabilityMissing(selectors) => {
                writeln!(f, "CSS selectors aren't supported by this build; use XPath instead:")?;
                for selector in selectors {
                    writeln!(f, "  {selector}")?;
                }
                Ok(())
            }
            Error::InvalidSelector { selector, message } => {
                writeln!(f, "Invalid selector {selector:?}:")?;
                writeln!(f, "{message}")
            }
            Error::Source(SourceError::Io(input, err)) => {
                if portable_errors() {
                    writeln!(f, "{} while reading {input}", err.kind())
                } else {
                    writeln!(f, "{err} while reading {input}")
                }
            }
            Error::Source(err) => writeln!(f, "{err}"),
            Error::Parse(err) => {
                writeln!(f, "Input is not well-formed XML:")?;
                writeln!(f, "{err}")
            }
            Error::Eval(err) => {
                writeln!(f, "Couldn't evaluate selector {:?}:", err.selector)?;
                writeln!(f, "{}", err.source)
            }
            Error::Output(err) => {
                if portable_errors() {
                    writeln!(f, "{} while writing output", err.kind())
                } else {
                    writeln!(f, "{err} while writing output")
                }
            }
        }
    }
}

/// A simple facade for handling I/O.
///
/// This trait lets you do "I/O-y stuff" like mocking out stdin or reading files. The [`run`] method uses it; reading
/// comes from the [`ByteSource`] supertrait.
pub trait OsFacade: ByteSource {
    /// Get a writer for stdout (or your mock of it).
    fn stdout(&mut self) -> impl Write;

    /// Handle an error.
    fn write_error(&mut self, err: Error);
}

/// Runs scrape end to end, reporting any error to [`OsFacade::write_error`].
///
/// Returns whether the run succeeded: `false` for any error, and also for an existence check that found nothing.
pub fn run(options: &RunOptions, os: &mut impl OsFacade) -> bool {
    match run_or_error(options, os) {
        Ok(ok) => ok,
        Err(err) => {
            os.write_error(err);
            false
        }
    }
}

/// Like [`run`], but returns the error instead of reporting it.
///
/// Selectors are compiled before any input is read, so a bad selector never waits on standard input.
pub fn run_or_error(options: &RunOptions, os: &mut impl OsFacade) -> Result<bool, Error> {
    options.validate()?;
    let queries = SelectorCompiler::default().compile(&options.selectors)?;

    let bytes = html::resolve(&options.input_source(), &*os).map_err(Error::Source)?;
    let mode = options.parse_mode();
    let doc = html::parse(&bytes, mode).map_err(Error::Parse)?;
    debug!(?mode, nodes = doc.len(), "parsed document");

    let outcome = extract(&doc, &queries, &ExtractOptions::from(options)).map_err(Error::Eval)?;
    let text = output::format(&outcome, options.include_body_tags);
    if !text.is_empty() {
        write_output(os.stdout(), &text).map_err(Error::Output)?;
    }

    Ok(match outcome {
        ExtractionOutcome::Exists(exists) => exists,
        ExtractionOutcome::Texts(_) => true,
    })
}
