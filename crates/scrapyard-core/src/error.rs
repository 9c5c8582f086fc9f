use std::fmt;

/// Type alias for a type-erased [`std::error::Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Category of failure raised anywhere in the scrape coordinator.
///
/// Mirrors the error taxonomy of the design: each kind carries its own recovery
/// policy, decided by the caller (usually the target engine), never by the kind
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or missing configuration; fatal, reported before any resource
    /// is allocated.
    Configuration,

    /// Container or driver failed to start for a connection.
    Resource,

    /// Navigation timed out.
    Network,

    /// Proxy pool exhaustion or per-proxy usage-limit errors.
    Proxy,

    /// Element lookup, click, dropdown-selection, or table-parsing failure.
    PageModel,

    /// OCR image fetch or recognition failure.
    Ocr,

    /// Filesystem I/O failure (input file, output sink, log file).
    Io,

    /// A user interrupt was observed mid-operation.
    Interrupt,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Resource => "resource",
            Self::Network => "network",
            Self::Proxy => "proxy",
            Self::PageModel => "page_model",
            Self::Ocr => "ocr",
            Self::Io => "io",
            Self::Interrupt => "interrupt",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for every crate in the workspace.
///
/// Carries a [`ErrorKind`] for programmatic dispatch, a human message, and an
/// optional source for chaining, following the shape the corpus's own
/// scraping framework uses for its backend errors.
#[derive(thiserror::Error)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(kind: ErrorKind, message: impl Into<String>, source: BoxError) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source),
        }
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this error class is safe to retry by the caller (proxy
    /// exhaustion, transient navigation timeouts).
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Network | ErrorKind::Proxy)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Error");
        debug.field("kind", &self.kind).field("message", &self.message);
        if let Some(ref source) = self.source {
            debug.field("source", source);
        }
        debug.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Io, "I/O error", Box::new(error))
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::with_source(ErrorKind::Io, "CSV error", Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::new(ErrorKind::Proxy, "pool exhausted");
        assert_eq!(err.to_string(), "[proxy] pool exhausted");
    }

    #[test]
    fn retryable_kinds() {
        assert!(Error::new(ErrorKind::Network, "timeout").is_retryable());
        assert!(Error::new(ErrorKind::Proxy, "usage limit").is_retryable());
        assert!(!Error::new(ErrorKind::Configuration, "bad config").is_retryable());
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::from(std::io::ErrorKind::NotFound);
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
