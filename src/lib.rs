//! Extract elements from HTML documents using CSS3 selectors or XPath expressions.
//!
//! The crate is organized as a short pipeline:
//!
//! - [`select`] classifies each selector as CSS or XPath and compiles it (CSS via [`query`]) into an [`xpath::Expr`]
//! - [`html`] reads the input and parses it into a [`html::Document`], either forgivingly or as strict XML
//! - [`extract`] evaluates the compiled queries against the document
//! - [`output`] renders the results
//!
//! [`run`] ties all of these together the way the `scrape` CLI does.
pub mod extract;
pub mod html;
pub mod output;
pub mod query;
pub mod run;
pub mod select;
mod util;
pub mod xpath;
