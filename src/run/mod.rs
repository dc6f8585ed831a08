//! End-to-end runs.
//!
//! This module combines the [`crate::select`], [`crate::html`], [`crate::extract`] and [`crate::output`] mods into a
//! single workflow. It's useful for building functionality like the CLI's, but running it within-process.
//!
//! ## Example
//!
//! ```
//! use scrape::html::ByteSource;
//! use scrape::run;
//!
//! // First, let's define a mocked I/O. Replace this with whatever you need.
//! #[derive(Default)]
//! struct MockIo {
//!     stdout: Vec<u8>,
//! }
//!
//! impl ByteSource for MockIo {
//!     fn read_stdin(&self) -> std::io::Result<Vec<u8>> {
//!         Ok(b"<ul><li>hello</li><li>world</li></ul>".to_vec())
//!     }
//!
//!     fn read_file(&self, path: &str) -> std::io::Result<Vec<u8>> {
//!         Err(std::io::Error::new(std::io::ErrorKind::NotFound, path))
//!     }
//! }
//!
//! impl run::OsFacade for MockIo {
//!     fn stdout(&mut self) -> impl std::io::Write {
//!         &mut self.stdout
//!     }
//!
//!     fn write_error(&mut self, err: run::Error) {
//!         eprintln!("{err}")
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = run::RunOptionsBuilder::default()
//!     .selectors(vec!["//li".to_string()])
//!     .build()?;
//!
//! let mut os_facade = MockIo::default();
//! let ok = run::run(&options, &mut os_facade);
//! let stdout_text = String::from_utf8(os_facade.stdout)?;
//!
//! assert!(ok);
//! assert_eq!(stdout_text, "hello\tworld\n");
//! #
//! #     Ok(())
//! # }
//! ```
mod cli;
mod run_main;

pub use cli::*;
pub use run_main::*;
