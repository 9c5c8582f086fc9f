//! Shared primitives used by every crate in the workspace: the error model,
//! locator-kind parsing, cell sanitization, the output-sink abstraction, and
//! the row timestamp helper.

mod error;
mod locator;
mod sanitize;
mod sink;
mod timestamp;

pub use error::{BoxError, Error, ErrorKind};
pub use locator::LocatorKind;
pub use sanitize::sanitize_cell;
pub use sink::{CsvSink, OutputSink, Row};
pub use timestamp::timestamp;

pub type Result<T, E = Error> = std::result::Result<T, E>;
