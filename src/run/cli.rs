use crate::extract::{ElementRender, ExtractOptions};
use crate::html::{InputSource, ParseMode};
use crate::run::Error;
use clap::Parser;
use derive_builder::Builder;

macro_rules! create_options_structs {
    (
        $(
            $(#[$meta:meta])*
            clap $clap:tt
            pub $name:ident : $ty:ty
        ),* $(,)?
    ) => {
        #[derive(Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Parser)]
        #[command(version, about, long_about = None)]
        #[doc(hidden)]
        pub struct CliOptions {
            $(
            $(#[$meta])*
            #[arg$clap]
            pub(crate) $name: $ty,
            )*

            // clap-only stuff:

            /// An HTML file to read. If neither this nor --input-file is given, or if this is "-", standard input is
            /// used.
            #[arg(value_name = "HTML")]
            pub(crate) html: Option<String>,
        }

        /// Options analogous to the scrape CLI's switches.
        #[derive(Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Builder)]
        #[builder(default, setter(into))]
        pub struct RunOptions {
            $(
            $(#[$meta])*
            pub $name: $ty,
            )*

            /// The positional `HTML` argument. `"-"` means standard input.
            pub html: Option<String>,

            /// The document itself, used instead of any file or standard input. There's no CLI equivalent.
            pub inline_input: Option<Vec<u8>>,
        }

        impl From<CliOptions> for RunOptions {
            fn from(value: CliOptions) -> Self {
                Self {
                    $($name: value.$name,)*
                    html: value.html,
                    inline_input: None,
                }
            }
        }
    };
}

create_options_structs! {
    /// A CSS3 selector or XPath expression; repeat for more than one. Selectors starting with "//", "./" or "(" are
    /// XPath, and everything else is CSS.
    ///
    /// Results are printed selector by selector, each in document order.
    clap(short = 'e', long = "selectors", visible_alias = "expression", value_name = "SELECTOR")
    pub selectors: Vec<String>,

    /// Print this attribute's value for each matched element, instead of its text.
    clap(short, long, value_name = "NAME")
    pub attribute: Option<String>,

    /// Wrap the output in a minimal HTML document.
    clap(short = 'b', long)
    pub include_body_tags: bool,

    /// Print nothing; exit with 0 if any selector matched, and 1 otherwise.
    clap(short = 'x', long)
    pub check_existence: bool,

    /// Parse the input as strict XML instead of forgiving HTML.
    clap(short, long)
    pub raw_input: bool,

    /// Print each matched element's markup, instead of just its text.
    clap(short, long)
    pub markup: bool,

    /// Read the document from this file.
    clap(short = 'f', long, value_name = "PATH")
    pub input_file: Option<String>,
}

impl RunOptions {
    /// Checks the options that clap can't check by itself (and that library callers might get wrong).
    pub fn validate(&self) -> Result<(), Error> {
        if self.selectors.is_empty() {
            return Err(Error::Configuration(
                "at least one selector is required (use -e or --selectors)".to_string(),
            ));
        }
        let positional_file = self.html.as_ref().filter(|path| path.as_str() != "-");
        if let (Some(flag), Some(positional)) = (&self.input_file, positional_file) {
            return Err(Error::Configuration(format!(
                "can't read both --input-file {flag:?} and {positional:?}"
            )));
        }
        if self.inline_input.is_some() && (self.input_file.is_some() || positional_file.is_some()) {
            return Err(Error::Configuration(
                "inline input can't be combined with an input file".to_string(),
            ));
        }
        Ok(())
    }

    pub fn input_source(&self) -> InputSource {
        if let Some(bytes) = &self.inline_input {
            return InputSource::Inline(bytes.clone());
        }
        match (&self.input_file, &self.html) {
            (Some(path), _) => InputSource::File(path.clone()),
            (None, Some(path)) if path != "-" => InputSource::File(path.clone()),
            _ => InputSource::Stream,
        }
    }

    pub fn parse_mode(&self) -> ParseMode {
        if self.raw_input {
            ParseMode::Raw
        } else {
            ParseMode::Tolerant
        }
    }
}

impl From<&RunOptions> for ExtractOptions {
    fn from(options: &RunOptions) -> Self {
        Self {
            attribute: options.attribute.clone(),
            existence_only: options.check_existence,
            render: if options.markup {
                ElementRender::Markup
            } else {
                ElementRender::Text
            },
        }
    }
}
