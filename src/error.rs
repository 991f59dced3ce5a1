//! Unified error type.

use http::StatusCode;

use crate::middleware::otel::TemplateError;

/// The error type returned by tsu's fallible operations.
///
/// Two families live here. Infrastructure failures (binding a port, reading a
/// request body) come from the server itself. Application failures are
/// raised by handlers with [`Error::new`] and travel inside the
/// [`Response`](crate::Response) so middleware can observe them on the way
/// out; the server renders them last.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("invalid uri: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error("cannot read request body: {0}")]
    Body(String),

    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("cannot execute span name template: {0}")]
    SpanName(#[source] TemplateError),
}

impl Error {
    /// An application error rendered with `status`.
    ///
    /// The message is the error's `Display` output, verbatim.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    /// Shorthand for a `500 Internal Server Error` application error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// The status the server answers with when this error reaches it.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            Self::Body(_) | Self::InvalidUri(_) => StatusCode::BAD_REQUEST,
            Self::Io(_) | Self::Addr(_) | Self::SpanName(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TemplateError> for Error {
    fn from(e: TemplateError) -> Self {
        Self::SpanName(e)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn application_error_displays_its_message_only() {
        let err = Error::internal("boom");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn span_name_error_wraps_the_template_cause() {
        let err = Error::from(TemplateError::Unclosed { offset: 3 });
        assert_eq!(
            err.to_string(),
            "cannot execute span name template: unclosed placeholder at byte 3",
        );
        assert!(err.source().is_some());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn client_errors_keep_their_status() {
        assert_eq!(Error::new(StatusCode::NOT_FOUND, "nope").status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::Body("eof".into()).status(), StatusCode::BAD_REQUEST);
    }
}
